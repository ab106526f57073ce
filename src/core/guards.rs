//! Ordered guard predicates that pick the action for a tick.
//!
//! Guards are checked top to bottom and the first one that matches wins; the
//! rest are skipped for that tick. One-shot guards (connect, calibration edges,
//! flip) match only on the tick whose [`TickWindow`] contains their instant.
//! Sustained guards (turn off, reconnect, resume tracking) compare ranges and
//! keep matching every tick until the mount state clears them.

use chrono::{NaiveDateTime, NaiveTime};

use super::actions::Action;
use super::schedule::{ScheduleConfig, TickWindow};
use crate::mount::MountStatus;

/// Everything a guard may look at.
#[derive(Debug, Clone, Copy)]
pub struct Tick {
    pub now: NaiveDateTime,
    pub window: TickWindow,
    pub status: MountStatus,
}

impl Tick {
    pub fn time(&self) -> NaiveTime {
        self.now.time()
    }
}

type Check = fn(&Tick, &ScheduleConfig) -> Option<Action>;

/// A named predicate producing an action.
pub struct Guard {
    pub name: &'static str,
    check: Check,
}

impl Guard {
    pub fn check(&self, tick: &Tick, schedule: &ScheduleConfig) -> Option<Action> {
        (self.check)(tick, schedule)
    }
}

/// Guards in priority order.
pub const GUARDS: [Guard; 8] = [
    Guard {
        name: "time_to_connect",
        check: time_to_connect,
    },
    Guard {
        name: "time_to_initialize",
        check: time_to_initialize,
    },
    Guard {
        name: "time_to_calibrate",
        check: time_to_calibrate,
    },
    Guard {
        name: "time_to_finish_calibration",
        check: time_to_finish_calibration,
    },
    Guard {
        name: "time_to_flip",
        check: time_to_flip,
    },
    Guard {
        name: "time_to_turn_off",
        check: time_to_turn_off,
    },
    Guard {
        name: "connection_lost",
        check: connection_lost,
    },
    Guard {
        name: "tracking_stalled",
        check: tracking_stalled,
    },
];

/// The first matching guard and its action.
pub fn evaluate(tick: &Tick, schedule: &ScheduleConfig) -> Option<(&'static str, Action)> {
    GUARDS
        .iter()
        .find_map(|guard| guard.check(tick, schedule).map(|action| (guard.name, action)))
}

/// Every matching guard in priority order.
pub fn matching_guards(tick: &Tick, schedule: &ScheduleConfig) -> Vec<(&'static str, Action)> {
    GUARDS
        .iter()
        .filter_map(|guard| guard.check(tick, schedule).map(|action| (guard.name, action)))
        .collect()
}

fn time_to_connect(tick: &Tick, schedule: &ScheduleConfig) -> Option<Action> {
    (!tick.status.connected && tick.window.contains(schedule.start)).then_some(Action::Connect)
}

fn time_to_initialize(tick: &Tick, schedule: &ScheduleConfig) -> Option<Action> {
    (tick.status.connected && !tick.status.tracking && schedule.in_start_minute(tick.time()))
        .then_some(Action::Initialize)
}

fn time_to_calibrate(tick: &Tick, schedule: &ScheduleConfig) -> Option<Action> {
    if !tick.status.connected {
        return None;
    }
    schedule
        .calibration_windows
        .iter()
        .position(|w| tick.window.contains(w.start))
        .map(Action::Calibrate)
}

fn time_to_finish_calibration(tick: &Tick, schedule: &ScheduleConfig) -> Option<Action> {
    if !tick.status.connected {
        return None;
    }
    schedule
        .calibration_windows
        .iter()
        .position(|w| tick.window.contains(w.end))
        .map(Action::FinishCalibration)
}

fn time_to_flip(tick: &Tick, schedule: &ScheduleConfig) -> Option<Action> {
    (tick.status.connected && tick.window.contains(schedule.flip)).then_some(Action::Flip)
}

fn time_to_turn_off(tick: &Tick, schedule: &ScheduleConfig) -> Option<Action> {
    let status = &tick.status;
    let unfinished = status.tracking || !status.parked || schedule.full_shutdown;
    (status.connected && tick.time() >= schedule.turn_off && unfinished).then_some(Action::TurnOff)
}

fn connection_lost(tick: &Tick, schedule: &ScheduleConfig) -> Option<Action> {
    (!tick.status.connected && schedule.in_operating_window(tick.time()))
        .then_some(Action::Reconnect)
}

fn tracking_stalled(tick: &Tick, schedule: &ScheduleConfig) -> Option<Action> {
    let status = &tick.status;
    let time = tick.time();
    (status.connected
        && schedule.in_operating_window(time)
        && !status.tracking
        && !status.slewing
        && schedule.calibration_window_at(time).is_none())
    .then_some(Action::ResumeTracking)
}
