//! In-memory mount used by `heliotrack simulate` and the test suite.
//!
//! The simulator keeps the same observable behavior as a real driver: motion
//! commands are accepted immediately and finish after a number of `is_slewing`
//! polls, predicates read `false` while disconnected, and commands sent to a
//! disconnected mount fail. Faults can be injected up front through
//! [`SimulatorOptions`] or on demand from tests.
//!
//! Clones share the same mount, so a test can keep a handle for inspection
//! after boxing another clone into the scheduler.

use chrono::NaiveTime;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{DeviceGateway, Equatorial, Horizontal};
use crate::error::{ActionError, ActionResult};

/// Fault injection and timing knobs.
#[derive(Debug, Clone, Default)]
pub struct SimulatorOptions {
    /// Number of connect attempts that fail before one succeeds.
    pub failed_connects: u32,
    /// Number of `is_slewing` polls that report motion after each slew.
    pub slew_polls: u32,
    /// Drop a live connection once, the first time it is observed after this time.
    pub drop_connection_at: Option<NaiveTime>,
    /// Stop tracking the first time the clock passes this time.
    pub stall_tracking_at: Option<NaiveTime>,
    /// Zone the fault times are expressed in; local time when unset.
    pub timezone: Option<chrono_tz::Tz>,
}

/// Where the simulated optics point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pointing {
    Park,
    Home,
    Equatorial(Equatorial),
    Horizontal(Horizontal),
}

#[derive(Debug)]
struct MountState {
    connected: bool,
    tracking: bool,
    parked: bool,
    slew_polls_left: u32,
    pointing: Pointing,
    rates: Option<(f64, f64)>,
    failed_connects_left: u32,
    drop_fired: bool,
    stall_fired: bool,
    commands: Vec<String>,
}

/// Shared handle to one simulated mount.
#[derive(Debug, Clone)]
pub struct SimulatedMount {
    options: Arc<SimulatorOptions>,
    state: Arc<Mutex<MountState>>,
}

impl Default for SimulatedMount {
    fn default() -> Self {
        Self::new(SimulatorOptions::default())
    }
}

impl SimulatedMount {
    /// A disconnected, parked mount.
    pub fn new(options: SimulatorOptions) -> Self {
        let state = MountState {
            connected: false,
            tracking: false,
            parked: true,
            slew_polls_left: 0,
            pointing: Pointing::Park,
            rates: None,
            failed_connects_left: options.failed_connects,
            drop_fired: false,
            stall_fired: false,
            commands: Vec::new(),
        };
        Self {
            options: Arc::new(options),
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MountState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock the state after applying any scheduled fault that is now due.
    fn observe(&self) -> MutexGuard<'_, MountState> {
        let mut state = self.lock();
        let now = crate::time::clock::now_naive(self.options.timezone).time();

        if let Some(at) = self.options.drop_connection_at
            && !state.drop_fired
            && state.connected
            && now >= at
        {
            state.drop_fired = true;
            state.connected = false;
            state.tracking = false;
            state.slew_polls_left = 0;
        }
        if let Some(at) = self.options.stall_tracking_at
            && !state.stall_fired
            && state.connected
            && now >= at
        {
            state.stall_fired = true;
            state.tracking = false;
        }
        state
    }

    /// Lock the state for a command, recording it and requiring a connection.
    fn command(&self, name: &str) -> ActionResult<MutexGuard<'_, MountState>> {
        let mut state = self.observe();
        state.commands.push(name.to_string());
        if !state.connected {
            return Err(ActionError::NotConnected);
        }
        Ok(state)
    }

    /// Drop the connection as if the cable had been pulled.
    pub fn drop_connection(&self) {
        let mut state = self.lock();
        state.connected = false;
        state.tracking = false;
        state.slew_polls_left = 0;
    }

    /// Stop tracking without any command, as a stalled drive would.
    pub fn stall_tracking(&self) {
        self.lock().tracking = false;
    }

    /// Make the next `count` connect attempts fail.
    pub fn fail_next_connects(&self, count: u32) {
        self.lock().failed_connects_left = count;
    }

    pub fn pointing(&self) -> Pointing {
        self.lock().pointing
    }

    /// Custom tracking rates in use, `None` when the driver rates apply.
    pub fn custom_rates(&self) -> Option<(f64, f64)> {
        self.lock().rates
    }

    /// Every command received so far, in order.
    pub fn commands(&self) -> Vec<String> {
        self.lock().commands.clone()
    }

    pub fn clear_commands(&self) {
        self.lock().commands.clear();
    }

    fn start_slew(&self, state: &mut MountState, pointing: Pointing, label: &str) -> ActionResult<()> {
        if state.parked {
            return Err(ActionError::slew(label, "mount is parked"));
        }
        state.pointing = pointing;
        state.slew_polls_left = self.options.slew_polls;
        Ok(())
    }
}

impl DeviceGateway for SimulatedMount {
    fn name(&self) -> &'static str {
        "simulator"
    }

    fn connect(&mut self) -> ActionResult<()> {
        let mut state = self.observe();
        state.commands.push("connect".to_string());
        if state.failed_connects_left > 0 {
            state.failed_connects_left -= 1;
            return Err(ActionError::Connection(
                "simulated link refused the connection".to_string(),
            ));
        }
        state.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) -> ActionResult<()> {
        let mut state = self.observe();
        state.commands.push("disconnect".to_string());
        state.connected = false;
        state.tracking = false;
        Ok(())
    }

    fn is_connected(&mut self) -> bool {
        self.observe().connected
    }

    fn find_home(&mut self) -> ActionResult<()> {
        let mut state = self.command("find_home")?;
        if state.parked {
            return Err(ActionError::slew("home", "mount is parked"));
        }
        state.tracking = false;
        state.pointing = Pointing::Home;
        Ok(())
    }

    fn set_tracking(
        &mut self,
        on: bool,
        ignore_rates: bool,
        ra_rate: f64,
        dec_rate: f64,
    ) -> ActionResult<()> {
        let mut state = self.command(if on { "tracking_on" } else { "tracking_off" })?;
        if on && state.parked {
            return Err(ActionError::slew("tracking", "mount is parked"));
        }
        state.tracking = on;
        state.rates = (on && !ignore_rates).then_some((ra_rate, dec_rate));
        Ok(())
    }

    fn tracking_rates(&mut self) -> ActionResult<(f64, f64)> {
        let state = self.command("get_tracking_rates")?;
        Ok(state.rates.unwrap_or_default())
    }

    fn is_tracking(&mut self) -> bool {
        let state = self.observe();
        state.connected && state.tracking
    }

    fn slew_to_ra_dec(&mut self, target: Equatorial, label: &str) -> ActionResult<()> {
        let mut state = self.command("slew_ra_dec")?;
        self.start_slew(&mut state, Pointing::Equatorial(target), label)
    }

    fn slew_to_az_alt(&mut self, target: Horizontal, label: &str) -> ActionResult<()> {
        let mut state = self.command("slew_az_alt")?;
        self.start_slew(&mut state, Pointing::Horizontal(target), label)?;
        // A fixed horizontal position cannot be tracked
        state.tracking = false;
        Ok(())
    }

    fn is_slewing(&mut self) -> bool {
        let mut state = self.observe();
        if !state.connected || state.slew_polls_left == 0 {
            return false;
        }
        state.slew_polls_left -= 1;
        true
    }

    fn park(&mut self) -> ActionResult<()> {
        let mut state = self.command("park")?;
        state.tracking = false;
        state.parked = true;
        state.slew_polls_left = 0;
        state.pointing = Pointing::Park;
        Ok(())
    }

    fn unpark(&mut self) -> ActionResult<()> {
        let mut state = self.command("unpark")?;
        state.parked = false;
        Ok(())
    }

    fn is_parked(&mut self) -> bool {
        let state = self.observe();
        state.connected && state.parked
    }

    fn ra_dec(&mut self) -> ActionResult<Equatorial> {
        let state = self.command("get_ra_dec")?;
        match state.pointing {
            Pointing::Equatorial(position) => Ok(position),
            other => Err(ActionError::Protocol(format!(
                "no equatorial solution while pointing at {other:?}"
            ))),
        }
    }

    fn az_alt(&mut self) -> ActionResult<Horizontal> {
        let state = self.command("get_az_alt")?;
        match state.pointing {
            Pointing::Horizontal(position) => Ok(position),
            other => Err(ActionError::Protocol(format!(
                "no horizontal solution while pointing at {other:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mount::MountStatus;

    const SUN: Equatorial = Equatorial {
        ra_hours: 6.0,
        dec_degrees: 23.4,
    };

    fn connected_mount(options: SimulatorOptions) -> SimulatedMount {
        let mut mount = SimulatedMount::new(options);
        mount.connect().unwrap();
        mount.unpark().unwrap();
        mount
    }

    #[test]
    fn test_commands_require_connection() {
        let mut mount = SimulatedMount::default();
        assert!(matches!(mount.park(), Err(ActionError::NotConnected)));
        assert!(!mount.is_parked(), "predicates read false while disconnected");
        assert_eq!(MountStatus::read(&mut mount), MountStatus::default());
    }

    #[test]
    fn test_failed_connects_are_consumed() {
        let mut mount = SimulatedMount::new(SimulatorOptions {
            failed_connects: 2,
            ..Default::default()
        });
        assert!(mount.connect().is_err());
        assert!(mount.connect().is_err());
        assert!(mount.connect().is_ok());
        assert!(mount.is_connected());
    }

    #[test]
    fn test_slew_reports_motion_for_configured_polls() {
        let mut mount = connected_mount(SimulatorOptions {
            slew_polls: 2,
            ..Default::default()
        });
        mount.slew_to_ra_dec(SUN, "Sun").unwrap();
        assert!(mount.is_slewing());
        assert!(mount.is_slewing());
        assert!(!mount.is_slewing());
        assert_eq!(mount.ra_dec().unwrap(), SUN);
    }

    #[test]
    fn test_horizontal_slew_stops_tracking() {
        let mut mount = connected_mount(SimulatorOptions::default());
        mount.slew_to_ra_dec(SUN, "Sun").unwrap();
        mount.set_tracking(true, true, 0.0, 0.0).unwrap();

        let target = Horizontal {
            azimuth: 10.0,
            altitude: 45.0,
        };
        mount.slew_to_az_alt(target, "calibration").unwrap();
        assert!(!mount.is_tracking());
        assert_eq!(mount.az_alt().unwrap(), target);
        assert!(mount.ra_dec().is_err());
    }

    #[test]
    fn test_parked_mount_refuses_motion() {
        let mut mount = SimulatedMount::default();
        mount.connect().unwrap();
        assert!(mount.is_parked());
        assert!(mount.slew_to_ra_dec(SUN, "Sun").is_err());
        assert!(mount.find_home().is_err());
    }

    #[test]
    fn test_custom_rates_are_kept_until_tracking_stops() {
        let mut mount = connected_mount(SimulatorOptions::default());
        mount.set_tracking(true, false, 0.04, -0.01).unwrap();
        assert_eq!(mount.custom_rates(), Some((0.04, -0.01)));
        mount.set_tracking(false, true, 0.0, 0.0).unwrap();
        assert_eq!(mount.custom_rates(), None);
    }

    #[test]
    fn test_reported_rates_follow_tracking_mode() {
        let mut mount = connected_mount(SimulatorOptions::default());
        mount.set_tracking(true, false, 0.04, -0.01).unwrap();
        assert_eq!(mount.tracking_rates().unwrap(), (0.04, -0.01));
        mount.set_tracking(true, true, 0.0, 0.0).unwrap();
        assert_eq!(mount.tracking_rates().unwrap(), (0.0, 0.0));

        mount.drop_connection();
        assert!(matches!(mount.tracking_rates(), Err(ActionError::NotConnected)));
    }

    #[test]
    fn test_clones_share_state() {
        let mut mount = connected_mount(SimulatorOptions::default());
        let observer = mount.clone();
        mount.set_tracking(true, true, 0.0, 0.0).unwrap();

        observer.stall_tracking();
        assert!(!mount.is_tracking());

        observer.drop_connection();
        assert!(!mount.is_connected());
        assert!(observer.commands().contains(&"tracking_on".to_string()));
    }

    #[test]
    fn test_scheduled_drop_fires_once() {
        // Any time of day is past midnight, so the drop is due immediately
        let mut mount = SimulatedMount::new(SimulatorOptions {
            drop_connection_at: Some(NaiveTime::MIN),
            ..Default::default()
        });
        mount.connect().unwrap();
        assert!(!mount.is_connected());
        mount.connect().unwrap();
        assert!(mount.is_connected());
    }
}
