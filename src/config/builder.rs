//! Default configuration file generation.
//!
//! The file is assembled with [`ConfigBuilder`] so every setting carries an
//! aligned comment, then written through a temporary file in the same
//! directory and renamed into place.

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::common::constants::*;
use crate::common::utils::private_path;

/// Write a commented default configuration to `path`.
pub fn create_default_config(path: &Path) -> Result<()> {
    let parent = path
        .parent()
        .context("Configuration path has no parent directory")?;
    fs::create_dir_all(parent).context("Failed to create config directory")?;

    let mut content = default_config_content();
    content.push_str(CALIBRATION_EXAMPLE);

    let mut temp = tempfile::NamedTempFile::new_in(parent)
        .context("Failed to create temporary config file")?;
    temp.write_all(content.as_bytes())
        .context("Failed to write default config")?;
    temp.persist(path)
        .with_context(|| format!("Failed to save config to {}", private_path(path)))?;

    Ok(())
}

const CALIBRATION_EXAMPLE: &str = "

#[Calibration windows]
# Point the mount off the sun by an azimuth offset for a while, e.g. for
# flat fields. Windows must lie between the start and turn-off times.
#
# [[calibration_windows]]
# start = \"15:00:00\"
# end = \"15:00:30\"
# azimuth_offset = 10.0
";

fn default_config_content() -> String {
    ConfigBuilder::new()
        .add_section("Schedule")
        .add_setting(
            "start_hour",
            &DEFAULT_START_HOUR.to_string(),
            "Connect and start tracking (0-23)",
        )
        .add_setting("start_minutes", &DEFAULT_START_MINUTES.to_string(), "(0-59)")
        .add_setting("start_seconds", &DEFAULT_START_SECONDS.to_string(), "(0-59)")
        .add_setting(
            "flip_hour",
            &DEFAULT_FLIP_HOUR.to_string(),
            "Meridian flip (0-23)",
        )
        .add_setting("flip_minutes", &DEFAULT_FLIP_MINUTES.to_string(), "(0-59)")
        .add_setting(
            "turn_off_hour",
            &DEFAULT_TURN_OFF_HOUR.to_string(),
            "Stop tracking and park (0-23)",
        )
        .add_setting(
            "turn_off_minutes",
            &DEFAULT_TURN_OFF_MINUTES.to_string(),
            "(0-59)",
        )
        .add_setting(
            "full_shutdown",
            &DEFAULT_FULL_SHUTDOWN.to_string(),
            "Disconnect after parking",
        )
        .add_section("Operation")
        .add_setting(
            "target",
            &format!("\"{DEFAULT_TARGET}\""),
            "Body to point at and track",
        )
        .add_setting(
            "tick_interval",
            &DEFAULT_TICK_INTERVAL.to_string(),
            &format!(
                "Seconds between scheduler ticks ({MINIMUM_TICK_INTERVAL}-{MAXIMUM_TICK_INTERVAL})"
            ),
        )
        .add_setting(
            "slew_timeout",
            &DEFAULT_SLEW_TIMEOUT.to_string(),
            &format!(
                "Seconds to wait for a slew to finish ({MINIMUM_SLEW_TIMEOUT}-{MAXIMUM_SLEW_TIMEOUT})"
            ),
        )
        .add_section("Device")
        .add_setting(
            "device",
            &format!("\"{}\"", DEFAULT_DEVICE.as_str()),
            "Mount driver: \"skyx\" or \"simulator\"",
        )
        .add_setting(
            "locator",
            &format!("\"{}\"", DEFAULT_LOCATOR.as_str()),
            "Sun position source: \"skyx\" or \"ephemeris\"",
        )
        .add_setting(
            "skyx_host",
            &format!("\"{DEFAULT_SKYX_HOST}\""),
            "TheSkyX TCP server address",
        )
        .add_setting(
            "skyx_port",
            &DEFAULT_SKYX_PORT.to_string(),
            "TheSkyX TCP server port",
        )
        .build()
}

struct ConfigBuilder {
    entries: Vec<ConfigEntry>,
}

enum ConfigEntry {
    Section(String),
    Setting { line: String, comment: String },
}

impl ConfigBuilder {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn add_section(mut self, title: &str) -> Self {
        self.entries.push(ConfigEntry::Section(format!("#[{title}]")));
        self
    }

    fn add_setting(mut self, key: &str, value: &str, comment: &str) -> Self {
        self.entries.push(ConfigEntry::Setting {
            line: format!("{key} = {value}"),
            comment: format!("# {comment}"),
        });
        self
    }

    fn build(self) -> String {
        // Align all comments one space past the longest setting line
        let max_width = self
            .entries
            .iter()
            .filter_map(|entry| match entry {
                ConfigEntry::Setting { line, .. } => Some(line.len()),
                ConfigEntry::Section(_) => None,
            })
            .max()
            .unwrap_or(0)
            + 1;

        let mut result = Vec::new();
        for entry in self.entries {
            match entry {
                ConfigEntry::Section(title) => {
                    if !result.is_empty() {
                        result.push(String::new());
                    }
                    result.push(title);
                }
                ConfigEntry::Setting { line, comment } => {
                    let padding = " ".repeat(max_width - line.len());
                    result.push(format!("{line}{padding}{comment}"));
                }
            }
        }

        result.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comments_are_aligned() {
        let content = ConfigBuilder::new()
            .add_section("A")
            .add_setting("x", "1", "short")
            .add_setting("longer_key", "2", "long")
            .build();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "#[A]");
        assert_eq!(lines[1].find('#'), lines[2].find('#'));
    }

    #[test]
    fn test_default_content_parses_as_default_config() {
        let mut content = default_config_content();
        content.push_str(CALIBRATION_EXAMPLE);
        let config: crate::config::Config = toml::from_str(&content).unwrap();
        assert_eq!(config.start_hour, Some(DEFAULT_START_HOUR));
        assert_eq!(config.device(), DEFAULT_DEVICE);
        assert!(config.calibration_windows.is_none());
        assert!(crate::config::validation::validate_config(&config).is_ok());
    }
}
