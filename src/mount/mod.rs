//! Device gateway abstraction for telescope mounts.
//!
//! The scheduler never talks to hardware directly; it drives a
//! [`DeviceGateway`] and reads a fresh [`MountStatus`] snapshot every tick.
//!
//! ## Implementations
//!
//! - **TheSkyX** (`skyx`): scripts sent to TheSkyX Professional's TCP server
//! - **Simulator** (`simulator`): in-memory mount with fault injection, used by
//!   `heliotrack simulate` and the test suite
//!
//! Motion commands return as soon as the driver accepts them. Callers that need
//! the mount at rest use [`wait_for_slew`], which polls `is_slewing` with a
//! bounded timeout so a second motion is never commanded while one is in flight.

pub mod simulator;
pub mod skyx;

use std::fmt;
use std::time::Duration;

use crate::common::constants::SLEW_POLL_INTERVAL;
use crate::config::{Config, Device};
use crate::error::{ActionError, ActionResult};

/// Equatorial coordinates of date: right ascension in hours, declination in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Equatorial {
    pub ra_hours: f64,
    pub dec_degrees: f64,
}

impl fmt::Display for Equatorial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RA {} Dec {}",
            crate::common::utils::format_ra(self.ra_hours),
            crate::common::utils::format_degrees(self.dec_degrees)
        )
    }
}

/// Horizontal coordinates in degrees, azimuth measured from north through east.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Horizontal {
    pub azimuth: f64,
    pub altitude: f64,
}

impl Horizontal {
    /// The same altitude with the azimuth rotated by `offset` degrees.
    pub fn offset_azimuth(self, offset: f64) -> Self {
        Self {
            azimuth: (self.azimuth + offset).rem_euclid(360.0),
            altitude: self.altitude,
        }
    }
}

impl fmt::Display for Horizontal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Az {:.3}° Alt {:.3}°", self.azimuth, self.altitude)
    }
}

/// Commands and predicates the scheduler needs from a mount driver.
///
/// Predicates answer `false` when the driver cannot be reached, so a lost
/// connection reads the same as a disconnected mount.
#[cfg_attr(test, mockall::automock)]
pub trait DeviceGateway {
    /// Human-readable driver name for logs.
    fn name(&self) -> &'static str;

    fn connect(&mut self) -> ActionResult<()>;

    fn disconnect(&mut self) -> ActionResult<()>;

    fn is_connected(&mut self) -> bool;

    fn find_home(&mut self) -> ActionResult<()>;

    /// Switch tracking on or off.
    ///
    /// With `ignore_rates` the driver uses its own (sidereal) rates and the
    /// `ra_rate`/`dec_rate` arguments are ignored.
    fn set_tracking(
        &mut self,
        on: bool,
        ignore_rates: bool,
        ra_rate: f64,
        dec_rate: f64,
    ) -> ActionResult<()>;

    /// RA/Dec tracking rates the driver reports as in effect.
    fn tracking_rates(&mut self) -> ActionResult<(f64, f64)>;

    fn is_tracking(&mut self) -> bool;

    /// Start a slew to equatorial coordinates; `label` names the target in the driver.
    fn slew_to_ra_dec(&mut self, target: Equatorial, label: &str) -> ActionResult<()>;

    /// Start a slew to horizontal coordinates.
    fn slew_to_az_alt(&mut self, target: Horizontal, label: &str) -> ActionResult<()>;

    fn is_slewing(&mut self) -> bool;

    /// Whether a slew is in progress, or why the driver could not say.
    ///
    /// [`wait_for_slew`] polls this instead of [`is_slewing`](Self::is_slewing)
    /// so an unreadable state is never mistaken for a mount at rest.
    fn slew_state(&mut self) -> ActionResult<bool> {
        Ok(self.is_slewing())
    }

    fn park(&mut self) -> ActionResult<()>;

    fn unpark(&mut self) -> ActionResult<()>;

    fn is_parked(&mut self) -> bool;

    /// Current pointing in equatorial coordinates.
    fn ra_dec(&mut self) -> ActionResult<Equatorial>;

    /// Current pointing in horizontal coordinates.
    fn az_alt(&mut self) -> ActionResult<Horizontal>;
}

/// Live mount flags read at the start of a tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MountStatus {
    pub connected: bool,
    pub tracking: bool,
    pub slewing: bool,
    pub parked: bool,
}

impl MountStatus {
    /// Query every predicate once. A disconnected mount reports all flags false.
    pub fn read(gateway: &mut dyn DeviceGateway) -> Self {
        if !gateway.is_connected() {
            return Self::default();
        }
        Self {
            connected: true,
            tracking: gateway.is_tracking(),
            slewing: gateway.is_slewing(),
            parked: gateway.is_parked(),
        }
    }
}

impl fmt::Display for MountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.connected {
            return write!(f, "disconnected");
        }
        let flag = |on: bool| if on { "yes" } else { "no" };
        write!(
            f,
            "connected, tracking: {}, slewing: {}, parked: {}",
            flag(self.tracking),
            flag(self.slewing),
            flag(self.parked)
        )
    }
}

/// Block until the mount stops slewing or `timeout` elapses.
///
/// A slew state the driver cannot report counts as still slewing.
pub fn wait_for_slew(
    gateway: &mut dyn DeviceGateway,
    label: &str,
    timeout: Duration,
) -> ActionResult<()> {
    let started = crate::time::source::now();
    loop {
        let unreadable = match gateway.slew_state() {
            Ok(false) => return Ok(()),
            Ok(true) => None,
            Err(e) => Some(e),
        };

        let waited = (crate::time::source::now() - started)
            .to_std()
            .unwrap_or_default();
        if waited >= timeout {
            let reason = match unreadable {
                Some(e) => format!("slew state unreadable after {}s: {e}", timeout.as_secs()),
                None => format!("did not settle within {}s", timeout.as_secs()),
            };
            return Err(ActionError::slew(label, reason));
        }
        crate::time::source::sleep(SLEW_POLL_INTERVAL);
    }
}

/// Create the gateway selected by `device` in the configuration.
pub fn create_gateway(config: &Config) -> anyhow::Result<Box<dyn DeviceGateway>> {
    let gateway: Box<dyn DeviceGateway> = match config.device() {
        Device::SkyX => Box::new(skyx::SkyXMount::new(skyx::SkyXClient::new(
            config.skyx_host(),
            config.skyx_port(),
        ))),
        Device::Simulator => Box::new(simulator::SimulatedMount::new(config.simulator_options()?)),
    };
    Ok(gateway)
}
