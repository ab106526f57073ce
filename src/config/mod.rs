//! Configuration system for heliotrack.
//!
//! Settings live in `heliotrack.toml`, found at
//! `$XDG_CONFIG_HOME/heliotrack/heliotrack.toml` or in the directory passed
//! with `--config`. A commented default file is written on first start.
//!
//! ## Configuration Structure
//!
//! ```toml
//! #[Schedule]
//! start_hour = 11          # Start of the operating day (0-23)
//! start_minutes = 0        # (0-59)
//! start_seconds = 0        # (0-59)
//! flip_hour = 16           # Meridian flip (0-23)
//! flip_minutes = 0         # (0-59)
//! turn_off_hour = 20       # Stop tracking, park and disconnect (0-23)
//! turn_off_minutes = 0     # (0-59)
//! full_shutdown = true     # Disconnect after parking
//!
//! #[Operation]
//! target = "Sun"           # Body resolved by the locator
//! tick_interval = 1        # Seconds between scheduler ticks (1-60)
//! slew_timeout = 180       # Seconds to wait for a slew to settle (5-1800)
//!
//! #[Device]
//! device = "skyx"          # "skyx" or "simulator"
//! locator = "skyx"         # "skyx" or "ephemeris"
//! skyx_host = "127.0.0.1"
//! skyx_port = 3040
//!
//! [[calibration_windows]]
//! start = "15:00:00"
//! end = "15:00:30"
//! azimuth_offset = 10.0
//! ```
//!
//! Every field is optional; missing values fall back to the defaults in
//! `common::constants`. Loading rejects anything the scheduler could not run
//! with (out-of-range times, a schedule out of order, calibration windows
//! outside the operating day, unknown timezones) before a mount is touched.

pub mod builder;
pub mod loading;
pub mod validation;

use anyhow::{Context, Result};
use chrono::NaiveTime;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::common::constants::*;
use crate::core::{CalibrationWindow, ScheduleConfig, SchedulerSettings};
use crate::mount::simulator::SimulatorOptions;

// Re-export public API
pub use builder::create_default_config;
pub use loading::{get_config_path, get_custom_config_dir, load, load_from_path, set_config_dir};

/// Mount driver selection.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    /// TheSkyX Professional's TCP scripting server.
    #[serde(rename = "skyx")]
    SkyX,
    /// In-memory simulated mount.
    Simulator,
}

impl Device {
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::SkyX => "skyx",
            Device::Simulator => "simulator",
        }
    }
}

/// Sun position source.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Locator {
    /// TheSkyX's star chart.
    #[serde(rename = "skyx")]
    SkyX,
    /// Local solar ephemeris; needs `latitude` and `longitude`.
    Ephemeris,
}

impl Locator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Locator::SkyX => "skyx",
            Locator::Ephemeris => "ephemeris",
        }
    }
}

/// One `[[calibration_windows]]` entry.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CalibrationWindowConfig {
    pub start: String, // HH:MM:SS
    pub end: String,   // HH:MM:SS
    pub azimuth_offset: f64,
}

/// The `[simulator]` table.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct SimulatorConfig {
    pub failed_connects: Option<u32>,
    pub slew_polls: Option<u32>,
    pub drop_connection_at: Option<String>,
    pub stall_tracking_at: Option<String>,
}

/// Settings loaded from `heliotrack.toml`.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct Config {
    pub start_hour: Option<u32>,
    pub start_minutes: Option<u32>,
    pub start_seconds: Option<u32>,
    pub flip_hour: Option<u32>,
    pub flip_minutes: Option<u32>,
    pub turn_off_hour: Option<u32>,
    pub turn_off_minutes: Option<u32>,
    /// IANA zone the schedule is expressed in, local time when unset.
    pub timezone: Option<String>,

    pub target: Option<String>,
    pub tick_interval: Option<u64>, // seconds
    pub slew_timeout: Option<u64>,  // seconds
    pub full_shutdown: Option<bool>,
    pub tracking_ra_rate: Option<f64>,
    pub tracking_dec_rate: Option<f64>,
    pub log_dir: Option<String>,

    pub device: Option<Device>,
    pub locator: Option<Locator>,
    pub skyx_host: Option<String>,
    pub skyx_port: Option<u16>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,

    pub calibration_windows: Option<Vec<CalibrationWindowConfig>>,
    pub simulator: Option<SimulatorConfig>,
}

/// Parse `HH:MM:SS` or `HH:MM`.
pub fn parse_clock_time(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .with_context(|| format!("Invalid time '{value}'. Use HH:MM:SS"))
}

fn clock_time(hour: u32, minute: u32, second: u32, name: &str) -> Result<NaiveTime> {
    NaiveTime::from_hms_opt(hour, minute, second).with_context(|| {
        format!("{name} time {hour:02}:{minute:02}:{second:02} is not a valid time of day")
    })
}

impl Config {
    /// Load configuration using the module's load function
    pub fn load() -> Result<Self> {
        load()
    }

    /// Load from path using the module's load_from_path function
    pub fn load_from_path(path: &Path) -> Result<Self> {
        load_from_path(path)
    }

    pub fn get_config_path() -> Result<PathBuf> {
        get_config_path()
    }

    pub fn device(&self) -> Device {
        self.device.unwrap_or(DEFAULT_DEVICE)
    }

    pub fn locator(&self) -> Locator {
        self.locator.unwrap_or(DEFAULT_LOCATOR)
    }

    pub fn target(&self) -> &str {
        self.target.as_deref().unwrap_or(DEFAULT_TARGET)
    }

    pub fn skyx_host(&self) -> &str {
        self.skyx_host.as_deref().unwrap_or(DEFAULT_SKYX_HOST)
    }

    pub fn skyx_port(&self) -> u16 {
        self.skyx_port.unwrap_or(DEFAULT_SKYX_PORT)
    }

    pub fn full_shutdown(&self) -> bool {
        self.full_shutdown.unwrap_or(DEFAULT_FULL_SHUTDOWN)
    }

    pub fn start_time(&self) -> Result<NaiveTime> {
        clock_time(
            self.start_hour.unwrap_or(DEFAULT_START_HOUR),
            self.start_minutes.unwrap_or(DEFAULT_START_MINUTES),
            self.start_seconds.unwrap_or(DEFAULT_START_SECONDS),
            "start",
        )
    }

    pub fn flip_time(&self) -> Result<NaiveTime> {
        clock_time(
            self.flip_hour.unwrap_or(DEFAULT_FLIP_HOUR),
            self.flip_minutes.unwrap_or(DEFAULT_FLIP_MINUTES),
            0,
            "flip",
        )
    }

    pub fn turn_off_time(&self) -> Result<NaiveTime> {
        clock_time(
            self.turn_off_hour.unwrap_or(DEFAULT_TURN_OFF_HOUR),
            self.turn_off_minutes.unwrap_or(DEFAULT_TURN_OFF_MINUTES),
            0,
            "turn_off",
        )
    }

    /// The timezone the schedule is expressed in, `None` for local time.
    pub fn schedule_timezone(&self) -> Result<Option<chrono_tz::Tz>> {
        self.timezone
            .as_deref()
            .map(|name| {
                name.parse::<chrono_tz::Tz>()
                    .map_err(|_| anyhow::anyhow!("Unknown timezone '{name}'"))
            })
            .transpose()
    }

    /// Build the immutable schedule table.
    pub fn schedule(&self) -> Result<ScheduleConfig> {
        let windows = self
            .calibration_windows
            .iter()
            .flatten()
            .map(|w| {
                Ok(CalibrationWindow {
                    start: parse_clock_time(&w.start)?,
                    end: parse_clock_time(&w.end)?,
                    azimuth_offset: w.azimuth_offset,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        ScheduleConfig::new(
            self.start_time()?,
            self.flip_time()?,
            self.turn_off_time()?,
            windows,
            self.full_shutdown(),
        )
    }

    pub fn scheduler_settings(&self, debug_enabled: bool) -> Result<SchedulerSettings> {
        let tracking_rates = match (self.tracking_ra_rate, self.tracking_dec_rate) {
            (None, None) => None,
            (ra, dec) => Some((ra.unwrap_or(0.0), dec.unwrap_or(0.0))),
        };

        Ok(SchedulerSettings {
            target: self.target().to_string(),
            tick_interval: Duration::from_secs(self.tick_interval.unwrap_or(DEFAULT_TICK_INTERVAL)),
            slew_timeout: Duration::from_secs(self.slew_timeout.unwrap_or(DEFAULT_SLEW_TIMEOUT)),
            tracking_rates,
            timezone: self.schedule_timezone()?,
            debug_enabled,
        })
    }

    /// Directory for day logs: `log_dir`, else `$XDG_DATA_HOME/heliotrack/logs`.
    pub fn log_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.log_dir {
            return Ok(expand_home(dir));
        }
        let data_dir = dirs::data_dir().context("Could not determine data directory")?;
        Ok(data_dir.join("heliotrack").join("logs"))
    }

    pub fn simulator_options(&self) -> Result<SimulatorOptions> {
        let simulator = self.simulator.clone().unwrap_or_default();
        let parse = |value: Option<&String>| value.map(|v| parse_clock_time(v)).transpose();

        Ok(SimulatorOptions {
            failed_connects: simulator.failed_connects.unwrap_or(0),
            slew_polls: simulator.slew_polls.unwrap_or(0),
            drop_connection_at: parse(simulator.drop_connection_at.as_ref())?,
            stall_tracking_at: parse(simulator.stall_tracking_at.as_ref())?,
            timezone: self.schedule_timezone()?,
        })
    }

    pub fn log_config(&self) {
        log_block_start!("Loaded configuration");

        let fmt = |t: Result<NaiveTime>| {
            t.map(|t| t.format("%H:%M:%S").to_string())
                .unwrap_or_else(|_| "invalid".to_string())
        };
        log_indented!(
            "Start: {}, flip: {}, turn off: {}",
            fmt(self.start_time()),
            fmt(self.flip_time()),
            fmt(self.turn_off_time())
        );
        if let Some(tz) = &self.timezone {
            log_indented!("Timezone: {tz}");
        }
        log_indented!("Target: {}", self.target());

        match self.device() {
            Device::SkyX => log_indented!(
                "Device: TheSkyX at {}:{}",
                self.skyx_host(),
                self.skyx_port()
            ),
            Device::Simulator => log_indented!("Device: simulator"),
        }
        match (self.locator(), self.latitude, self.longitude) {
            (Locator::Ephemeris, Some(lat), Some(lon)) => {
                let lat_dir = if lat >= 0.0 { "N" } else { "S" };
                let lon_dir = if lon >= 0.0 { "E" } else { "W" };
                log_indented!(
                    "Locator: ephemeris at {:.3}°{lat_dir}, {:.3}°{lon_dir}",
                    lat.abs(),
                    lon.abs()
                );
            }
            (locator, _, _) => log_indented!("Locator: {}", locator.as_str()),
        }

        let windows = self.calibration_windows.as_deref().unwrap_or_default();
        if !windows.is_empty() {
            log_indented!("Calibration windows: {}", windows.len());
        }
        if !self.full_shutdown() {
            log_indented!("Full shutdown: off (mount stays connected)");
        }
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests;
