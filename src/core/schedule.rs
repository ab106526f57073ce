//! Schedule table and the per-tick event window.
//!
//! [`ScheduleConfig`] is built once from the configuration and never changes
//! while the scheduler runs. One-shot events (start, flip, calibration edges)
//! are matched against a [`TickWindow`]: the half-open span `(previous tick,
//! now]`. An event fires on the single tick whose window contains its instant,
//! which makes it independent of tick jitter and of the exact second the loop
//! happens to wake up at.

use anyhow::{Result, bail};
use chrono::{NaiveDateTime, NaiveTime, TimeDelta};
use std::fmt;
use std::time::Duration;

use crate::common::constants::MAX_EVENT_CATCHUP;

/// A period during which the mount is pointed off-target by an azimuth offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
    /// Degrees added to the current azimuth, may be negative.
    pub azimuth_offset: f64,
}

impl CalibrationWindow {
    /// Whether `time` lies in `[start, end)`.
    pub fn contains(&self, time: NaiveTime) -> bool {
        self.start <= time && time < self.end
    }
}

impl fmt::Display for CalibrationWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {} ({:+.2}°)",
            self.start.format("%H:%M:%S"),
            self.end.format("%H:%M:%S"),
            self.azimuth_offset
        )
    }
}

/// Static thresholds consulted on every tick.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleConfig {
    pub start: NaiveTime,
    pub flip: NaiveTime,
    pub turn_off: NaiveTime,
    pub calibration_windows: Vec<CalibrationWindow>,
    /// Disconnect after parking at the end of the day.
    pub full_shutdown: bool,
}

impl ScheduleConfig {
    /// Build and check a schedule.
    ///
    /// Requires `start < flip < turn_off` and every calibration window to be
    /// non-empty, inside `[start, turn_off)` and disjoint from the others.
    pub fn new(
        start: NaiveTime,
        flip: NaiveTime,
        turn_off: NaiveTime,
        mut calibration_windows: Vec<CalibrationWindow>,
        full_shutdown: bool,
    ) -> Result<Self> {
        if !(start < flip && flip < turn_off) {
            bail!(
                "Schedule must satisfy start < flip < turn_off (got {}, {}, {})",
                start.format("%H:%M:%S"),
                flip.format("%H:%M:%S"),
                turn_off.format("%H:%M:%S")
            );
        }

        calibration_windows.sort_by_key(|w| w.start);
        for window in &calibration_windows {
            if window.end <= window.start {
                bail!("Calibration window {window} ends before it starts");
            }
            if window.start < start || window.end > turn_off {
                bail!(
                    "Calibration window {window} lies outside the operating window {} - {}",
                    start.format("%H:%M:%S"),
                    turn_off.format("%H:%M:%S")
                );
            }
        }
        for pair in calibration_windows.windows(2) {
            if pair[1].start < pair[0].end {
                bail!("Calibration windows {} and {} overlap", pair[0], pair[1]);
            }
        }

        Ok(Self {
            start,
            flip,
            turn_off,
            calibration_windows,
            full_shutdown,
        })
    }

    /// Whether `time` lies in `[start, turn_off)`.
    pub fn in_operating_window(&self, time: NaiveTime) -> bool {
        self.start <= time && time < self.turn_off
    }

    /// Whether `time` lies in the minute that begins at `start`.
    pub fn in_start_minute(&self, time: NaiveTime) -> bool {
        let since_start = time.signed_duration_since(self.start);
        since_start >= TimeDelta::zero() && since_start < TimeDelta::seconds(60)
    }

    /// Index and bounds of the calibration window containing `time`, if any.
    pub fn calibration_window_at(&self, time: NaiveTime) -> Option<(usize, &CalibrationWindow)> {
        self.calibration_windows
            .iter()
            .enumerate()
            .find(|(_, w)| w.contains(time))
    }
}

/// The span of wall-clock time a tick is responsible for: `(since, now]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickWindow {
    pub since: NaiveDateTime,
    pub now: NaiveDateTime,
}

impl TickWindow {
    /// Window for a tick at `now` following a tick at `previous`, using the
    /// default catch-up limit.
    pub fn new(previous: Option<NaiveDateTime>, now: NaiveDateTime, interval: Duration) -> Self {
        Self::with_catchup(previous, now, interval, MAX_EVENT_CATCHUP)
    }

    /// Window for a tick at `now` when every instant up to `previous` has
    /// already been covered.
    ///
    /// A clock that reads `previous` again or steps back yields an empty
    /// window. Without a previous tick, or after a gap longer than `catchup`,
    /// the window covers only the last `interval`, so events that fell inside
    /// a long stall are skipped.
    pub fn with_catchup(
        previous: Option<NaiveDateTime>,
        now: NaiveDateTime,
        interval: Duration,
        catchup: Duration,
    ) -> Self {
        let interval = TimeDelta::from_std(interval).unwrap_or(TimeDelta::seconds(1));
        let catchup = TimeDelta::from_std(catchup).unwrap_or(TimeDelta::seconds(120));

        let since = match previous {
            Some(previous) if now <= previous => now,
            Some(previous) if now - previous <= catchup => previous,
            _ => now - interval,
        };
        Self { since, now }
    }

    /// Whether the window is empty.
    pub fn is_empty(&self) -> bool {
        self.since >= self.now
    }

    /// Whether a daily event at `time` occurs inside this window.
    pub fn contains(&self, time: NaiveTime) -> bool {
        let mut dates = vec![self.since.date(), self.now.date()];
        dates.dedup();
        dates.into_iter().any(|date| {
            let instant = date.and_time(time);
            self.since < instant && instant <= self.now
        })
    }
}
