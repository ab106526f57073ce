//! Application-wide constants and configuration defaults.
//!
//! Defaults are applied whenever the matching key is missing from
//! `heliotrack.toml`; the MINIMUM/MAXIMUM pairs are the hard limits enforced by
//! `config::validation`.

use std::time::Duration;

use crate::config::{Device, Locator};

// # Schedule Defaults

/// Start of the operating day (hour, minute, second).
pub const DEFAULT_START_HOUR: u32 = 11;
pub const DEFAULT_START_MINUTES: u32 = 0;
pub const DEFAULT_START_SECONDS: u32 = 0;

/// Meridian flip.
pub const DEFAULT_FLIP_HOUR: u32 = 16;
pub const DEFAULT_FLIP_MINUTES: u32 = 0;

/// End of the operating day.
pub const DEFAULT_TURN_OFF_HOUR: u32 = 20;
pub const DEFAULT_TURN_OFF_MINUTES: u32 = 0;

// # Operation Defaults

pub const DEFAULT_TARGET: &str = "Sun";
pub const DEFAULT_TICK_INTERVAL: u64 = 1; // seconds
pub const DEFAULT_SLEW_TIMEOUT: u64 = 180; // seconds
pub const DEFAULT_FULL_SHUTDOWN: bool = true;

// # Device Defaults

pub const DEFAULT_DEVICE: Device = Device::SkyX;
pub const DEFAULT_LOCATOR: Locator = Locator::SkyX;
pub const DEFAULT_SKYX_HOST: &str = "127.0.0.1";
pub const DEFAULT_SKYX_PORT: u16 = 3040;

/// Connect/read/write timeout for a single TheSkyX script round-trip.
pub const SKYX_IO_TIMEOUT: Duration = Duration::from_secs(10);

/// Consecutive unreadable `IsConnected` replies before the mount counts as lost.
pub const SKYX_CONNECTION_READ_FAILURES: u32 = 3;

// # Validation Limits

pub const MINIMUM_TICK_INTERVAL: u64 = 1;
pub const MAXIMUM_TICK_INTERVAL: u64 = 60;

pub const MINIMUM_SLEW_TIMEOUT: u64 = 5;
pub const MAXIMUM_SLEW_TIMEOUT: u64 = 1800;

/// Calibration offsets beyond a half turn are almost certainly a typo.
pub const MAXIMUM_AZIMUTH_OFFSET: f64 = 180.0;

pub const MINIMUM_LATITUDE: f64 = -90.0;
pub const MAXIMUM_LATITUDE: f64 = 90.0;
pub const MINIMUM_LONGITUDE: f64 = -180.0;
pub const MAXIMUM_LONGITUDE: f64 = 180.0;

// # Scheduler Timing

/// Interval between `is_slewing` polls while waiting for a slew to settle.
pub const SLEW_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Longest gap between two ticks that still counts as "continuous".
///
/// One-shot events that fell inside a longer gap (system suspend, a hung
/// driver call) are dropped instead of being replayed late.
pub const MAX_EVENT_CATCHUP: Duration = Duration::from_secs(120);

/// Slew waits a single action may chain (home, settle before the target slew,
/// settle after it). The catch-up limit always covers that many slew timeouts.
pub const SLEW_WAITS_PER_ACTION: u32 = 3;

/// Backward clock steps up to this size never re-open an event window.
///
/// A larger step is taken as a clock correction and the window restarts from
/// the corrected time.
pub const MAX_CLOCK_STEP_BACK: Duration = Duration::from_secs(3600);

// # File Names

pub const CONFIG_FILE_NAME: &str = "heliotrack.toml";
pub const LOCK_FILE_NAME: &str = "heliotrack.lock";
pub const DAY_LOG_EXTENSION: &str = "log";

// # Exit Codes

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;

#[cfg(test)]
pub mod test_constants {
    pub const TEST_START: (u32, u32, u32) = (11, 0, 0);
    pub const TEST_FLIP: (u32, u32) = (16, 0);
    pub const TEST_TURN_OFF: (u32, u32) = (20, 0);
    pub const TEST_CALIBRATION_START: &str = "15:00:00";
    pub const TEST_CALIBRATION_END: &str = "15:00:30";
    pub const TEST_AZIMUTH_OFFSET: f64 = 10.0;
}
