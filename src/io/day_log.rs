//! Per-day event log.
//!
//! Every scheduler decision is appended to `<log_dir>/YYYYMMDD.log` as
//! `[LEVEL - HH:MM:SS] message (source)`. The file is opened, appended to and
//! closed for each entry, so a new file starts automatically at midnight and
//! an external log rotator can move files at any time. Each entry is mirrored
//! to the console through the leveled logging macros.
//!
//! A log write that fails is reported on the console and otherwise ignored:
//! losing a log line must never stop the mount from being driven.

use chrono::{NaiveDate, NaiveTime};
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use crate::common::constants::DAY_LOG_EXTENSION;
use crate::error::ActionError;
use crate::time::ClockReading;

/// Severity of a day-log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        })
    }
}

/// Sink for scheduler events.
pub trait EventLog {
    /// Mark the beginning of an operating day.
    fn open_day(&mut self, date: NaiveDate);

    /// Record one event. `source` tags the component that produced it.
    fn log(&mut self, level: LogLevel, text: &str, source: &str);
}

/// Render one log line, newline included.
pub fn format_entry(level: LogLevel, time: NaiveTime, text: &str, source: &str) -> String {
    format!("[{level} - {}] {text} ({source})\n", time.format("%H:%M:%S"))
}

/// Append-only day files under a directory.
#[derive(Debug, Clone)]
pub struct DayLog {
    dir: PathBuf,
    timezone: Option<chrono_tz::Tz>,
}

impl DayLog {
    /// Log into `dir`, dating entries in `timezone` (local time when `None`).
    pub fn new(dir: impl Into<PathBuf>, timezone: Option<chrono_tz::Tz>) -> Self {
        Self {
            dir: dir.into(),
            timezone,
        }
    }

    /// File that holds the entries for `date`.
    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!(
            "{}.{DAY_LOG_EXTENSION}",
            date.format("%Y%m%d")
        ))
    }

    fn append(&self, date: NaiveDate, text: &str) -> Result<(), ActionError> {
        std::fs::create_dir_all(&self.dir).map_err(ActionError::LogIo)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(date))
            .map_err(ActionError::LogIo)?;
        file.write_all(text.as_bytes()).map_err(ActionError::LogIo)
    }

    fn report_failure(&self, error: ActionError) {
        log_error!(
            "Day log in {} unavailable: {error}",
            crate::common::utils::private_path(&self.dir)
        );
    }
}

impl EventLog for DayLog {
    fn open_day(&mut self, date: NaiveDate) {
        log_block_start!("Operating day {}", date.format("%d/%m/%Y"));
        if let Err(e) = self.append(date, &format!("=== {} ===\n", date.format("%d/%m/%Y"))) {
            self.report_failure(e);
        }
    }

    fn log(&mut self, level: LogLevel, text: &str, source: &str) {
        let reading = ClockReading::now(self.timezone);

        match level {
            LogLevel::Info => log_info!("{text} ({source})"),
            LogLevel::Warning => log_warning!("{text} ({source})"),
            LogLevel::Error => log_error!("{text} ({source})"),
        }

        let line = format_entry(level, reading.time(), text, source);
        if let Err(e) = self.append(reading.date(), &line) {
            self.report_failure(e);
        }
    }
}

/// One recorded event, as kept by [`MemoryLog`].
#[cfg(any(test, feature = "testing-support"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub text: String,
    pub source: String,
}

/// In-memory event log for tests. Clones share the same entries.
#[cfg(any(test, feature = "testing-support"))]
#[derive(Debug, Clone, Default)]
pub struct MemoryLog {
    entries: std::sync::Arc<std::sync::Mutex<Vec<LogEntry>>>,
    days: std::sync::Arc<std::sync::Mutex<Vec<NaiveDate>>>,
}

#[cfg(any(test, feature = "testing-support"))]
impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    pub fn days(&self) -> Vec<NaiveDate> {
        self.days
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Whether any entry text contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.entries().iter().any(|e| e.text.contains(needle))
    }

    pub fn count(&self, level: LogLevel) -> usize {
        self.entries().iter().filter(|e| e.level == level).count()
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
    }
}

#[cfg(any(test, feature = "testing-support"))]
impl EventLog for MemoryLog {
    fn open_day(&mut self, date: NaiveDate) {
        self.days
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(date);
    }

    fn log(&mut self, level: LogLevel, text: &str, source: &str) {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(LogEntry {
                level,
                text: text.to_string(),
                source: source.to_string(),
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::Log;

    #[test]
    fn test_entry_format() {
        let time = NaiveTime::from_hms_opt(9, 5, 7).unwrap();
        assert_eq!(
            format_entry(LogLevel::Warning, time, "Connection lost", "scheduler"),
            "[WARNING - 09:05:07] Connection lost (scheduler)\n"
        );
    }

    #[test]
    fn test_day_log_appends_to_dated_file() {
        Log::set_enabled(false);
        let dir = tempfile::tempdir().unwrap();
        let mut log = DayLog::new(dir.path().join("logs"), None);

        let today = ClockReading::now(None).date();
        log.open_day(today);
        log.log(LogLevel::Info, "Connected", "connect");
        log.log(LogLevel::Error, "Slew failed", "initialize");

        let content = std::fs::read_to_string(log.path_for(today)).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], format!("=== {} ===", today.format("%d/%m/%Y")));
        assert!(lines[1].starts_with("[INFO - "));
        assert!(lines[1].ends_with("] Connected (connect)"));
        assert!(lines[2].starts_with("[ERROR - "));
    }

    #[test]
    fn test_unwritable_dir_does_not_panic() {
        Log::set_enabled(false);
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "").unwrap();

        // A regular file where the directory should be
        let mut log = DayLog::new(&blocker, None);
        log.log(LogLevel::Info, "still running", "test");
    }

    #[test]
    fn test_path_uses_day_key() {
        let log = DayLog::new("/var/log/heliotrack", None);
        let date = NaiveDate::from_ymd_opt(2026, 1, 9).unwrap();
        assert_eq!(
            log.path_for(date),
            PathBuf::from("/var/log/heliotrack/20260109.log")
        );
    }

    #[test]
    fn test_memory_log_shares_entries_between_clones() {
        let log = MemoryLog::new();
        let mut writer = log.clone();
        writer.log(LogLevel::Warning, "already parked", "turn_off");
        assert!(log.contains("already parked"));
        assert_eq!(log.count(LogLevel::Warning), 1);
    }
}
