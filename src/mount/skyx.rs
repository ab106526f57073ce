//! TheSkyX Professional scripting client.
//!
//! TheSkyX exposes a TCP server (port 3040 by default) that evaluates
//! JavaScript snippets. Each command opens a fresh connection, sends one
//! script wrapped in the socket packet markers, and reads a reply of the form
//! `output|No error. Error = 0.`; any other status is a failure.
//!
//! Motion commands are issued with `Asynchronous = 1` so the script returns as
//! soon as the mount accepts the slew, and completion is polled through
//! `IsSlewComplete`.

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use super::{DeviceGateway, Equatorial, Horizontal};
use crate::common::constants::{SKYX_CONNECTION_READ_FAILURES, SKYX_IO_TIMEOUT};
use crate::error::{ActionError, ActionResult};
use crate::solar::SunLocator;

const SCRIPT_HEADER: &str = "/* Java Script */\n/* Socket Start Packet */\n";
const SCRIPT_FOOTER: &str = "\n/* Socket End Packet */\n";

/// Connection parameters for TheSkyX's TCP server.
#[derive(Debug, Clone)]
pub struct SkyXClient {
    host: String,
    port: u16,
    timeout: Duration,
}

impl SkyXClient {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: SKYX_IO_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Run one script and return the text before the status separator.
    pub fn run(&self, body: &str) -> ActionResult<String> {
        let addr = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| ActionError::Connection(format!("{}: {e}", self.address())))?
            .next()
            .ok_or_else(|| {
                ActionError::Connection(format!("{}: no address resolved", self.address()))
            })?;

        let mut stream = TcpStream::connect_timeout(&addr, self.timeout)
            .map_err(|e| ActionError::Connection(format!("{}: {e}", self.address())))?;
        stream.set_read_timeout(Some(self.timeout)).ok();
        stream.set_write_timeout(Some(self.timeout)).ok();

        stream
            .write_all(wrap_script(body).as_bytes())
            .map_err(|e| ActionError::Connection(format!("write failed: {e}")))?;

        let mut reply = Vec::new();
        let mut buffer = [0u8; 1024];
        loop {
            match stream.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => {
                    reply.extend_from_slice(&buffer[..n]);
                    if reply_complete(&String::from_utf8_lossy(&reply)) {
                        break;
                    }
                }
                Err(e) => {
                    return Err(ActionError::Connection(format!("read failed: {e}")));
                }
            }
        }

        parse_reply(&String::from_utf8_lossy(&reply))
    }

    fn run_flag(&self, body: &str) -> ActionResult<bool> {
        let output = self.run(body)?;
        match output.trim() {
            "1" | "true" => Ok(true),
            "0" | "false" => Ok(false),
            other => Err(ActionError::Protocol(format!("expected a flag, got '{other}'"))),
        }
    }

    fn run_pair(&self, body: &str) -> ActionResult<(f64, f64)> {
        parse_pair(&self.run(body)?)
    }
}

fn wrap_script(body: &str) -> String {
    format!("{SCRIPT_HEADER}{body}{SCRIPT_FOOTER}")
}

/// A reply is complete once the status after `|` ends with a period.
fn reply_complete(text: &str) -> bool {
    text.rsplit_once('|')
        .is_some_and(|(_, status)| status.contains("Error = ") && status.trim_end().ends_with('.'))
}

fn parse_reply(text: &str) -> ActionResult<String> {
    let (output, status) = text
        .rsplit_once('|')
        .ok_or_else(|| ActionError::Protocol(format!("missing status in '{}'", text.trim())))?;

    let code = status
        .rsplit_once("Error = ")
        .map(|(_, code)| code.trim().trim_end_matches('.'))
        .ok_or_else(|| ActionError::Protocol(format!("unreadable status '{}'", status.trim())))?;

    if code == "0" {
        Ok(output.trim().to_string())
    } else {
        Err(ActionError::Protocol(status.trim().to_string()))
    }
}

fn parse_pair(output: &str) -> ActionResult<(f64, f64)> {
    let (first, second) = output
        .split_once(',')
        .ok_or_else(|| ActionError::Protocol(format!("expected two values, got '{output}'")))?;
    let number = |s: &str| {
        s.trim()
            .parse::<f64>()
            .map_err(|_| ActionError::Protocol(format!("not a number: '{}'", s.trim())))
    };
    Ok((number(first)?, number(second)?))
}

/// Strip characters that would end a JavaScript string literal.
fn script_label(label: &str) -> String {
    label
        .chars()
        .filter(|c| !matches!(c, '\'' | '"' | '\\' | '\n' | '\r'))
        .collect()
}

fn flag(on: bool) -> u8 {
    u8::from(on)
}

/// Mount driver backed by TheSkyX's `sky6RASCOMTele` object.
pub struct SkyXMount {
    client: SkyXClient,
    /// Last connection state TheSkyX actually reported.
    connected: bool,
    failed_connection_reads: u32,
}

impl SkyXMount {
    pub fn new(client: SkyXClient) -> Self {
        Self {
            client,
            connected: false,
            failed_connection_reads: 0,
        }
    }

    fn exec(&self, body: &str) -> ActionResult<()> {
        self.client.run(body).map(|_| ())
    }
}

impl DeviceGateway for SkyXMount {
    fn name(&self) -> &'static str {
        "TheSkyX"
    }

    fn connect(&mut self) -> ActionResult<()> {
        let connected = self
            .client
            .run_flag("sky6RASCOMTele.Connect();\nOut = sky6RASCOMTele.IsConnected;")?;
        self.connected = connected;
        self.failed_connection_reads = 0;
        if connected {
            Ok(())
        } else {
            Err(ActionError::Connection(
                "TheSkyX could not reach the mount".to_string(),
            ))
        }
    }

    fn disconnect(&mut self) -> ActionResult<()> {
        self.exec("sky6RASCOMTele.Disconnect();\nOut = 0;")?;
        self.connected = false;
        Ok(())
    }

    fn is_connected(&mut self) -> bool {
        match self.client.run_flag("Out = sky6RASCOMTele.IsConnected;") {
            Ok(connected) => {
                self.connected = connected;
                self.failed_connection_reads = 0;
            }
            Err(e) => {
                self.failed_connection_reads += 1;
                log_debug!(
                    "IsConnected unreadable ({} in a row): {e}",
                    self.failed_connection_reads
                );
                if self.failed_connection_reads >= SKYX_CONNECTION_READ_FAILURES {
                    self.connected = false;
                }
            }
        }
        self.connected
    }

    fn find_home(&mut self) -> ActionResult<()> {
        self.exec("sky6RASCOMTele.FindHome();\nOut = 0;")
    }

    fn set_tracking(
        &mut self,
        on: bool,
        ignore_rates: bool,
        ra_rate: f64,
        dec_rate: f64,
    ) -> ActionResult<()> {
        self.exec(&format!(
            "sky6RASCOMTele.SetTracking({}, {}, {ra_rate}, {dec_rate});\nOut = 0;",
            flag(on),
            flag(ignore_rates)
        ))
    }

    fn tracking_rates(&mut self) -> ActionResult<(f64, f64)> {
        self.client.run_pair(
            "Out = sky6RASCOMTele.dRaTrackingRate + ',' + sky6RASCOMTele.dDecTrackingRate;",
        )
    }

    fn is_tracking(&mut self) -> bool {
        self.client
            .run_flag("Out = sky6RASCOMTele.IsTracking;")
            .unwrap_or(false)
    }

    fn slew_to_ra_dec(&mut self, target: Equatorial, label: &str) -> ActionResult<()> {
        self.exec(&format!(
            "sky6RASCOMTele.Asynchronous = 1;\nsky6RASCOMTele.SlewToRaDec({}, {}, '{}');\nOut = 0;",
            target.ra_hours,
            target.dec_degrees,
            script_label(label)
        ))
        .map_err(|e| ActionError::slew(label, e.to_string()))
    }

    fn slew_to_az_alt(&mut self, target: Horizontal, label: &str) -> ActionResult<()> {
        self.exec(&format!(
            "sky6RASCOMTele.Asynchronous = 1;\nsky6RASCOMTele.SlewToAzAlt({}, {}, '{}');\nOut = 0;",
            target.azimuth,
            target.altitude,
            script_label(label)
        ))
        .map_err(|e| ActionError::slew(label, e.to_string()))
    }

    fn is_slewing(&mut self) -> bool {
        self.slew_state().unwrap_or(false)
    }

    fn slew_state(&mut self) -> ActionResult<bool> {
        // IsSlewComplete reads 0 while the mount is still moving
        self.client
            .run_flag("Out = sky6RASCOMTele.IsSlewComplete;")
            .map(|complete| !complete)
    }

    fn park(&mut self) -> ActionResult<()> {
        self.exec("sky6RASCOMTele.Park();\nOut = 0;")
    }

    fn unpark(&mut self) -> ActionResult<()> {
        self.exec("sky6RASCOMTele.Unpark();\nOut = 0;")
    }

    fn is_parked(&mut self) -> bool {
        self.client
            .run_flag("Out = sky6RASCOMTele.IsParked();")
            .unwrap_or(false)
    }

    fn ra_dec(&mut self) -> ActionResult<Equatorial> {
        let (ra_hours, dec_degrees) = self.client.run_pair(
            "sky6RASCOMTele.GetRaDec();\nOut = sky6RASCOMTele.dRa + ',' + sky6RASCOMTele.dDec;",
        )?;
        Ok(Equatorial {
            ra_hours,
            dec_degrees,
        })
    }

    fn az_alt(&mut self) -> ActionResult<Horizontal> {
        let (azimuth, altitude) = self.client.run_pair(
            "sky6RASCOMTele.GetAzAlt();\nOut = sky6RASCOMTele.dAz + ',' + sky6RASCOMTele.dAlt;",
        )?;
        Ok(Horizontal { azimuth, altitude })
    }
}

/// Sun locator backed by TheSkyX's star chart.
pub struct SkyXLocator {
    client: SkyXClient,
}

impl SkyXLocator {
    pub fn new(client: SkyXClient) -> Self {
        Self { client }
    }

    /// Find `body` and read two object-information properties as numbers.
    fn find_properties(&self, body: &str, first: u32, second: u32) -> ActionResult<(f64, f64)> {
        if body.is_empty() || body.contains(['\'', '"', '\\']) {
            return Err(ActionError::Lookup(body.to_string()));
        }
        let script = format!(
            "sky6StarChart.Find('{body}');\n\
             sky6ObjectInformation.Property({first});\n\
             var a = sky6ObjectInformation.ObjInfoPropOut;\n\
             sky6ObjectInformation.Property({second});\n\
             var b = sky6ObjectInformation.ObjInfoPropOut;\n\
             Out = a + ',' + b;"
        );
        match self.client.run_pair(&script) {
            Err(ActionError::Protocol(_)) => Err(ActionError::Lookup(body.to_string())),
            other => other,
        }
    }
}

impl SunLocator for SkyXLocator {
    fn name(&self) -> &'static str {
        "TheSkyX"
    }

    fn locate(&self, body: &str) -> ActionResult<Equatorial> {
        let (ra_hours, dec_degrees) = self.find_properties(body, 54, 55)?;
        Ok(Equatorial {
            ra_hours,
            dec_degrees,
        })
    }

    fn current_az_alt(&self, body: &str) -> ActionResult<Horizontal> {
        let (azimuth, altitude) = self.find_properties(body, 58, 59)?;
        Ok(Horizontal { azimuth, altitude })
    }
}
