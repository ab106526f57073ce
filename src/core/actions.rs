//! Action handlers.
//!
//! Each handler runs a short sequence of gateway calls, writes every step to
//! the event log, and reports success as a boolean. Errors stop the current
//! handler but never the scheduler: the guards see the unfinished state on the
//! next tick and pick the recovery action.

use chrono::NaiveDate;
use std::fmt;

use super::SchedulerSettings;
use super::schedule::ScheduleConfig;
use crate::error::ActionError;
use crate::io::day_log::{EventLog, LogLevel};
use crate::mount::{self, DeviceGateway};
use crate::solar::SunLocator;

/// What the scheduler decided to do on a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Connect,
    Initialize,
    /// Start of the calibration window with this index.
    Calibrate(usize),
    /// End of the calibration window with this index.
    FinishCalibration(usize),
    Flip,
    TurnOff,
    Reconnect,
    ResumeTracking,
}

impl Action {
    /// Source tag written next to every log entry the handler produces.
    pub fn source(&self) -> &'static str {
        match self {
            Action::Connect => "connect",
            Action::Initialize => "initialize",
            Action::Calibrate(_) => "calibrate",
            Action::FinishCalibration(_) => "finish_calibration",
            Action::Flip => "flip",
            Action::TurnOff => "turn_off",
            Action::Reconnect => "reconnect",
            Action::ResumeTracking => "resume_tracking",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Calibrate(i) => write!(f, "calibrate (window {})", i + 1),
            Action::FinishCalibration(i) => write!(f, "finish calibration (window {})", i + 1),
            other => f.write_str(&other.source().replace('_', " ")),
        }
    }
}

/// Borrowed collaborators for running one action.
pub struct ActionContext<'a> {
    pub gateway: &'a mut dyn DeviceGateway,
    pub locator: &'a dyn SunLocator,
    pub log: &'a mut dyn EventLog,
    pub schedule: &'a ScheduleConfig,
    pub settings: &'a SchedulerSettings,
    /// Date of the tick, used for the day log header.
    pub today: NaiveDate,
}

impl ActionContext<'_> {
    /// Run `action` to completion or to its first failure.
    pub fn run(&mut self, action: Action) -> bool {
        let source = action.source();
        match action {
            Action::Connect => self.connect(source),
            Action::Initialize => self.initialize(source),
            Action::Calibrate(index) => self.calibrate(index, source),
            Action::FinishCalibration(_) | Action::Flip | Action::ResumeTracking => {
                self.acquire_target(source)
            }
            Action::TurnOff => self.turn_off(source),
            Action::Reconnect => self.reconnect(source),
        }
    }

    fn info(&mut self, text: impl AsRef<str>, source: &str) {
        self.log.log(LogLevel::Info, text.as_ref(), source);
    }

    fn warning(&mut self, text: impl AsRef<str>, source: &str) {
        self.log.log(LogLevel::Warning, text.as_ref(), source);
    }

    /// Log a failed step and report the handler as incomplete.
    fn fail(&mut self, step: &str, error: ActionError, source: &str) -> bool {
        self.log
            .log(LogLevel::Error, &format!("{step} failed: {error}"), source);
        false
    }

    /// Run one gateway step, logging `done` on success.
    fn step(
        &mut self,
        name: &str,
        done: &str,
        source: &str,
        op: impl FnOnce(&mut dyn DeviceGateway) -> Result<(), ActionError>,
    ) -> bool {
        match op(&mut *self.gateway) {
            Ok(()) => {
                self.info(done, source);
                true
            }
            Err(e) => self.fail(name, e, source),
        }
    }

    fn settle(&mut self, label: &str) -> Result<(), ActionError> {
        mount::wait_for_slew(&mut *self.gateway, label, self.settings.slew_timeout)
    }

    fn connect(&mut self, source: &str) -> bool {
        self.log.open_day(self.today);
        let name = self.gateway.name();
        self.step("Connection", &format!("Conectado ({name})"), source, |g| {
            g.connect()
        })
    }

    fn initialize(&mut self, source: &str) -> bool {
        self.unpark_and_home(source) && self.acquire_target(source)
    }

    fn unpark_and_home(&mut self, source: &str) -> bool {
        if self.gateway.is_parked() && !self.step("Unpark", "Unparked", source, |g| g.unpark()) {
            return false;
        }
        self.step("Find home", "Home position found", source, |g| {
            g.find_home()
        }) && match self.settle("home") {
            Ok(()) => true,
            Err(e) => self.fail("Find home", e, source),
        }
    }

    /// Resolve the target, slew to it, wait for the slew, and start tracking.
    fn acquire_target(&mut self, source: &str) -> bool {
        let target = self.settings.target.clone();

        let position = match self.locator.locate(&target) {
            Ok(position) => position,
            Err(e) => return self.fail("Target lookup", e, source),
        };
        // Never command a second motion while one is in flight
        if let Err(e) = self.settle(&target) {
            return self.fail("Slew", e, source);
        }

        self.info(format!("Slewing to {target} at {position}"), source);
        if let Err(e) = self.gateway.slew_to_ra_dec(position, &target) {
            return self.fail("Slew", e, source);
        }
        if let Err(e) = self.settle(&target) {
            return self.fail("Slew", e, source);
        }
        self.info(format!("Slew to {target} complete"), source);

        self.enable_tracking(source)
    }

    fn enable_tracking(&mut self, source: &str) -> bool {
        let (ignore_rates, ra_rate, dec_rate) = match self.settings.tracking_rates {
            Some((ra, dec)) => (false, ra, dec),
            None => (true, 0.0, 0.0),
        };
        if !self.step("Tracking", "Tracking on", source, |g| {
            g.set_tracking(true, ignore_rates, ra_rate, dec_rate)
        }) {
            return false;
        }
        match self.gateway.tracking_rates() {
            Ok((ra, dec)) => self.info(format!("RA Rate = {ra} Dec Rate = {dec}"), source),
            Err(e) => self.warning(format!("Tracking rates unavailable: {e}"), source),
        }
        true
    }

    fn calibrate(&mut self, index: usize, source: &str) -> bool {
        let Some(window) = self.schedule.calibration_windows.get(index).copied() else {
            return self.fail(
                "Calibration",
                ActionError::Protocol(format!("no calibration window {index}")),
                source,
            );
        };

        let current = match self.gateway.az_alt() {
            Ok(position) => position,
            Err(e) => {
                self.warning(
                    format!("Mount position unavailable ({e}), using computed target position"),
                    source,
                );
                match self.locator.current_az_alt(&self.settings.target) {
                    Ok(position) => position,
                    Err(e) => return self.fail("Calibration lookup", e, source),
                }
            }
        };

        let offset_position = current.offset_azimuth(window.azimuth_offset);
        if let Err(e) = self.settle("calibration") {
            return self.fail("Calibration slew", e, source);
        }
        self.info(
            format!(
                "Calibration {}: slewing from {current} to {offset_position}",
                index + 1
            ),
            source,
        );
        if let Err(e) = self.gateway.slew_to_az_alt(offset_position, "calibration") {
            return self.fail("Calibration slew", e, source);
        }
        match self.settle("calibration") {
            Ok(()) => {
                self.info(format!("Calibration {} position reached", index + 1), source);
                true
            }
            Err(e) => self.fail("Calibration slew", e, source),
        }
    }

    fn reconnect(&mut self, source: &str) -> bool {
        self.warning("Connection lost, reconnecting", source);
        let name = self.gateway.name();
        if !self.step("Reconnection", &format!("Reconnected to {name}"), source, |g| {
            g.connect()
        }) {
            return false;
        }
        if !self.unpark_and_home(source) {
            return false;
        }
        if self.gateway.is_tracking() {
            return true;
        }
        self.acquire_target(source)
    }

    /// Stop tracking, park, and disconnect in full shutdown mode.
    ///
    /// Steps that are already done are logged and skipped, so calling this
    /// repeatedly is harmless.
    fn turn_off(&mut self, source: &str) -> bool {
        if !self.gateway.is_connected() {
            self.warning("Mount already disconnected", source);
            return true;
        }

        let mut complete = true;

        if self.gateway.is_tracking() {
            complete &= self.step("Tracking off", "Tracking off", source, |g| {
                g.set_tracking(false, true, 0.0, 0.0)
            });
        } else {
            self.info("Tracking already off", source);
        }

        if self.gateway.is_parked() {
            self.info("Mount already parked", source);
        } else {
            let parked = self.step("Park", "Parked", source, |g| g.park());
            complete &= parked;
            if parked && let Err(e) = self.settle("park") {
                complete = self.fail("Park", e, source);
            }
        }

        if self.schedule.full_shutdown && complete {
            complete = self.step("Disconnect", "Disconnected", source, |g| g.disconnect());
        }

        complete
    }
}
