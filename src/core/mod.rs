//! Daily scheduler and recovery state machine.
//!
//! This module drives the mount through the operating day. Every tick:
//!
//! - reads the clock and a fresh [`MountStatus`]
//! - derives the [`SchedulerPhase`] (logged when it changes)
//! - evaluates the ordered guards and runs at most one [`Action`]
//! - sleeps for the tick interval, waking early for signals
//!
//! Nothing about the mount is remembered between ticks. The scheduler only
//! keeps the latest tick time, so a one-shot event is matched in exactly one
//! window even when ticks jitter or the clock is stepped back.
//! Failed actions are logged and left for the guards to retry.

pub mod actions;
pub mod guards;
pub mod phase;
pub mod schedule;

pub use actions::Action;
pub use phase::SchedulerPhase;
pub use schedule::{CalibrationWindow, ScheduleConfig, TickWindow};

use anyhow::Result;
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;

use crate::common::constants::{
    DEFAULT_SLEW_TIMEOUT, DEFAULT_TARGET, DEFAULT_TICK_INTERVAL, MAX_CLOCK_STEP_BACK,
    MAX_EVENT_CATCHUP, SLEW_WAITS_PER_ACTION,
};
use crate::io::day_log::EventLog;
use crate::io::signals::{SignalMessage, SignalState};
use crate::mount::{DeviceGateway, MountStatus};
use crate::solar::SunLocator;
use crate::time::clock;
use actions::ActionContext;
use guards::Tick;

/// Operating parameters that are not part of the schedule table.
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Body resolved by the locator before every slew.
    pub target: String,
    pub tick_interval: Duration,
    /// Longest wait for a slew to settle.
    pub slew_timeout: Duration,
    /// Custom RA/Dec tracking rates; `None` keeps the driver's rates.
    pub tracking_rates: Option<(f64, f64)>,
    /// Zone the schedule is expressed in; local time when `None`.
    pub timezone: Option<chrono_tz::Tz>,
    pub debug_enabled: bool,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            target: DEFAULT_TARGET.to_string(),
            tick_interval: Duration::from_secs(DEFAULT_TICK_INTERVAL),
            slew_timeout: Duration::from_secs(DEFAULT_SLEW_TIMEOUT),
            tracking_rates: None,
            timezone: None,
            debug_enabled: false,
        }
    }
}

impl SchedulerSettings {
    /// Longest gap between ticks whose one-shot events are still fired late.
    ///
    /// Never shorter than the longest a single action can block, so an edge
    /// that passes while a slew settles is not lost.
    pub fn event_catchup(&self) -> Duration {
        MAX_EVENT_CATCHUP.max(self.slew_timeout * SLEW_WAITS_PER_ACTION + self.tick_interval)
    }
}

/// Parameters for creating a Scheduler.
pub struct SchedulerParams {
    pub gateway: Box<dyn DeviceGateway>,
    pub locator: Box<dyn SunLocator>,
    pub log: Box<dyn EventLog>,
    pub schedule: ScheduleConfig,
    pub settings: SchedulerSettings,
}

pub struct Scheduler {
    gateway: Box<dyn DeviceGateway>,
    locator: Box<dyn SunLocator>,
    log: Box<dyn EventLog>,
    schedule: ScheduleConfig,
    settings: SchedulerSettings,
    /// Latest tick time seen; event instants up to here are done.
    covered_until: Option<NaiveDateTime>,
    last_phase: Option<SchedulerPhase>,
    last_day: Option<NaiveDate>,
}

impl Scheduler {
    pub fn new(params: SchedulerParams) -> Self {
        Self {
            gateway: params.gateway,
            locator: params.locator,
            log: params.log,
            schedule: params.schedule,
            settings: params.settings,
            covered_until: None,
            last_phase: None,
            last_day: None,
        }
    }

    /// Phase derived on the most recent tick.
    pub fn phase(&self) -> Option<SchedulerPhase> {
        self.last_phase
    }

    /// Run one tick at the current time.
    pub fn tick(&mut self) -> Option<Action> {
        let now = clock::now_naive(self.settings.timezone);
        self.tick_at(now)
    }

    /// Run one tick as if the clock read `now`; returns the action taken.
    pub fn tick_at(&mut self, now: NaiveDateTime) -> Option<Action> {
        let status = MountStatus::read(self.gateway.as_mut());
        let window = self.advance_window(now);

        self.note_day(now.date());
        self.note_phase(SchedulerPhase::derive(now.time(), &status, &self.schedule));

        let tick = Tick {
            now,
            window,
            status,
        };
        let (guard, action) = guards::evaluate(&tick, &self.schedule)?;

        if self.settings.debug_enabled {
            log_debug!("{guard} matched at {} ({status})", now.format("%H:%M:%S"));
        }

        let completed = ActionContext {
            gateway: self.gateway.as_mut(),
            locator: self.locator.as_ref(),
            log: self.log.as_mut(),
            schedule: &self.schedule,
            settings: &self.settings,
            today: now.date(),
        }
        .run(action);

        if !completed && self.settings.debug_enabled {
            log_debug!("{action} incomplete, retrying on a later tick");
        }

        Some(action)
    }

    /// The event window for a tick at `now`, moving the covered mark forward.
    fn advance_window(&mut self, now: NaiveDateTime) -> TickWindow {
        let step_back_limit = TimeDelta::from_std(MAX_CLOCK_STEP_BACK).unwrap_or(TimeDelta::hours(1));
        let catchup = self.settings.event_catchup();

        let mut covered = self.covered_until;
        if let Some(previous) = covered {
            if previous - now > step_back_limit {
                log_warning!(
                    "Clock stepped back from {} to {}, restarting the event window",
                    previous.format("%d/%m/%Y %H:%M:%S"),
                    now.format("%d/%m/%Y %H:%M:%S")
                );
                covered = None;
            } else if (now - previous).to_std().is_ok_and(|gap| gap > catchup) {
                log_warning!(
                    "No tick for {}s, events since {} are skipped",
                    (now - previous).num_seconds(),
                    previous.format("%H:%M:%S")
                );
            }
        }

        let window =
            TickWindow::with_catchup(covered, now, self.settings.tick_interval, catchup);
        self.covered_until = Some(covered.map_or(now, |previous| previous.max(now)));
        window
    }

    fn note_day(&mut self, today: NaiveDate) {
        if self.last_day.is_some_and(|day| day != today) {
            log_block_start!("New day: {}", today.format("%d/%m/%Y"));
        }
        self.last_day = Some(today);
    }

    fn note_phase(&mut self, phase: SchedulerPhase) {
        if self.last_phase != Some(phase) {
            log_block_start!("Phase: {phase}");
            self.last_phase = Some(phase);
        }
    }

    /// Log the derived phase and live mount status.
    pub fn status_report(&mut self) {
        let now = clock::now_naive(self.settings.timezone);
        let status = MountStatus::read(self.gateway.as_mut());
        let phase = SchedulerPhase::derive(now.time(), &status, &self.schedule);

        log_block_start!("Status at {}", now.format("%H:%M:%S"));
        log_indented!("Phase: {phase}");
        log_indented!("Mount ({}): {status}", self.gateway.name());
        if let Some((index, window)) = self.schedule.calibration_window_at(now.time()) {
            log_indented!("Calibration window {}: {window}", index + 1);
        }
    }

    /// Tick until a shutdown is requested or the simulation ends.
    ///
    /// Stopping leaves the mount exactly as it is.
    pub fn run(&mut self, signals: &SignalState) -> Result<()> {
        let interval = self.settings.tick_interval;

        while signals.is_running() && !crate::time::source::simulation_ended() {
            self.tick();

            if crate::time::source::is_simulated() {
                crate::time::source::sleep(interval);
                while let Ok(message) = signals.signal_receiver.try_recv() {
                    if !self.handle_signal(message, signals) {
                        return Ok(());
                    }
                }
                continue;
            }

            match signals.signal_receiver.recv_timeout(interval) {
                Ok(message) => {
                    if !self.handle_signal(message, signals) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => std::thread::sleep(interval),
            }
        }

        Ok(())
    }

    /// Returns false when the loop should stop.
    fn handle_signal(&mut self, message: SignalMessage, signals: &SignalState) -> bool {
        match message {
            SignalMessage::StatusReport => {
                self.status_report();
                true
            }
            SignalMessage::Shutdown => {
                signals.request_shutdown();
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::day_log::MemoryLog;
    use crate::logger::Log;
    use crate::mount::MockDeviceGateway;
    use crate::solar::FixedLocator;
    use chrono::NaiveTime;

    fn schedule() -> ScheduleConfig {
        let t = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap();
        ScheduleConfig::new(t(11, 0), t(16, 0), t(20, 0), vec![], true).unwrap()
    }

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 20)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn scheduler_with(gateway: MockDeviceGateway) -> Scheduler {
        Log::set_enabled(false);
        Scheduler::new(SchedulerParams {
            gateway: Box::new(gateway),
            locator: Box::new(FixedLocator::sun()),
            log: Box::new(MemoryLog::new()),
            schedule: schedule(),
            settings: SchedulerSettings::default(),
        })
    }

    #[test]
    fn test_event_catchup_covers_blocking_actions() {
        let settings = SchedulerSettings::default();
        assert_eq!(settings.event_catchup(), Duration::from_secs(3 * 180 + 1));

        let quick = SchedulerSettings {
            slew_timeout: Duration::from_secs(5),
            ..SchedulerSettings::default()
        };
        assert_eq!(quick.event_catchup(), MAX_EVENT_CATCHUP);
    }

    #[test]
    fn test_idle_tick_only_reads_connection() {
        let mut gateway = MockDeviceGateway::new();
        gateway.expect_is_connected().times(2).return_const(false);
        // Any command would hit a missing expectation and panic

        let mut scheduler = scheduler_with(gateway);
        assert_eq!(scheduler.tick_at(at(9, 0, 0)), None);
        assert_eq!(scheduler.tick_at(at(22, 0, 0)), None);
        assert_eq!(scheduler.phase(), Some(SchedulerPhase::ShutDown));
    }

    #[test]
    fn test_connect_fires_at_start() {
        let mut gateway = MockDeviceGateway::new();
        gateway.expect_is_connected().return_const(false);
        gateway.expect_name().return_const("mock");
        gateway.expect_connect().times(1).returning(|| Ok(()));

        let mut scheduler = scheduler_with(gateway);
        assert_eq!(scheduler.tick_at(at(10, 59, 59)), None);
        assert_eq!(scheduler.tick_at(at(11, 0, 0)), Some(Action::Connect));
        assert_eq!(scheduler.phase(), Some(SchedulerPhase::AwaitingConnection));
    }

    #[test]
    fn test_run_stops_on_shutdown_message() {
        let mut gateway = MockDeviceGateway::new();
        gateway.expect_is_connected().return_const(false);
        // The wall clock may fall inside the operating window
        gateway.expect_name().return_const("mock");
        gateway
            .expect_connect()
            .returning(|| Err(crate::error::ActionError::Connection("offline".into())));

        let mut scheduler = scheduler_with(gateway);
        scheduler.settings.tick_interval = Duration::from_millis(10);

        let signals = SignalState::detached();
        signals
            .signal_sender
            .send(SignalMessage::Shutdown)
            .unwrap();

        assert!(scheduler.run(&signals).is_ok());
        assert!(!signals.is_running());
    }
}
