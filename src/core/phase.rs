//! Scheduler phase, derived fresh on every tick.

use chrono::NaiveTime;
use std::fmt;

use super::schedule::ScheduleConfig;
use crate::mount::MountStatus;

/// Where in the operating day the scheduler is.
///
/// The phase is never stored as a source of truth: it is recomputed from the
/// clock, the schedule and the live mount status, so a restart mid-day lands
/// in the right phase without any persisted state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    /// Before the start of the operating day.
    Idle,
    /// Inside the operating window with no connection to the mount.
    AwaitingConnection,
    /// Connected and expected to follow the target.
    Tracking,
    /// Inside a calibration window.
    Calibrating,
    /// Past the turn-off time.
    ShutDown,
}

impl SchedulerPhase {
    pub fn derive(time: NaiveTime, status: &MountStatus, schedule: &ScheduleConfig) -> Self {
        if !schedule.in_operating_window(time) {
            return if time >= schedule.turn_off {
                SchedulerPhase::ShutDown
            } else {
                SchedulerPhase::Idle
            };
        }
        if !status.connected {
            SchedulerPhase::AwaitingConnection
        } else if schedule.calibration_window_at(time).is_some() {
            SchedulerPhase::Calibrating
        } else {
            SchedulerPhase::Tracking
        }
    }
}

impl fmt::Display for SchedulerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SchedulerPhase::Idle => "idle",
            SchedulerPhase::AwaitingConnection => "awaiting connection",
            SchedulerPhase::Tracking => "tracking",
            SchedulerPhase::Calibrating => "calibrating",
            SchedulerPhase::ShutDown => "shut down",
        })
    }
}
