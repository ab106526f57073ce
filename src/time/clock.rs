//! Per-tick wall-clock snapshots.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use std::fmt;

/// Date and time components read once per tick.
///
/// Readings are expressed in the schedule's timezone (local time unless the
/// configuration names one) and are never reused across ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockReading {
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub day: u32,
    pub month: u32,
    pub year: i32,
}

impl ClockReading {
    /// Read the clock from the global time source.
    pub fn now(tz: Option<chrono_tz::Tz>) -> Self {
        Self::from_datetime(now_naive(tz))
    }

    pub fn from_datetime(datetime: NaiveDateTime) -> Self {
        Self {
            hour: datetime.hour(),
            minute: datetime.minute(),
            second: datetime.second(),
            day: datetime.day(),
            month: datetime.month(),
            year: datetime.year(),
        }
    }

    pub fn date(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day).unwrap_or_default()
    }

    pub fn time(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour, self.minute, self.second).unwrap_or_default()
    }

    pub fn datetime(&self) -> NaiveDateTime {
        self.date().and_time(self.time())
    }

    /// The `YYYYMMDD` key the day log is filed under.
    pub fn day_key(&self) -> String {
        format!("{:04}{:02}{:02}", self.year, self.month, self.day)
    }
}

impl fmt::Display for ClockReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}/{:02}/{:04} {:02}:{:02}:{:02}",
            self.day, self.month, self.year, self.hour, self.minute, self.second
        )
    }
}

/// Current time as a naive datetime in `tz`, or in local time without one.
pub fn now_naive(tz: Option<chrono_tz::Tz>) -> NaiveDateTime {
    let now = crate::time::source::now();
    match tz {
        Some(tz) => now.with_timezone(&tz).naive_local(),
        None => now.naive_local(),
    }
}
