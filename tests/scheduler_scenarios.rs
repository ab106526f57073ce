//! Whole-day scenarios driven tick by tick against the simulated mount.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};

use heliotrack::core::{
    Action, CalibrationWindow, ScheduleConfig, Scheduler, SchedulerParams, SchedulerPhase,
    SchedulerSettings,
};
use heliotrack::io::day_log::{LogLevel, MemoryLog};
use heliotrack::logger::Log;
use heliotrack::mount::simulator::{Pointing, SimulatedMount, SimulatorOptions};
use heliotrack::mount::{DeviceGateway, Horizontal};
use heliotrack::solar::FixedLocator;

fn hms(h: u32, m: u32, s: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, s).unwrap()
}

fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 3, 20)
        .unwrap()
        .and_time(hms(h, m, s))
}

struct Rig {
    scheduler: Scheduler,
    mount: SimulatedMount,
    log: MemoryLog,
}

impl Rig {
    fn new(options: SimulatorOptions, full_shutdown: bool) -> Self {
        Log::set_enabled(false);

        let schedule = ScheduleConfig::new(
            hms(11, 0, 0),
            hms(16, 0, 0),
            hms(20, 0, 0),
            vec![CalibrationWindow {
                start: hms(15, 0, 0),
                end: hms(15, 0, 30),
                azimuth_offset: 10.0,
            }],
            full_shutdown,
        )
        .unwrap();

        let mount = SimulatedMount::new(options);
        let log = MemoryLog::new();
        let scheduler = Scheduler::new(SchedulerParams {
            gateway: Box::new(mount.clone()),
            locator: Box::new(FixedLocator::sun()),
            log: Box::new(log.clone()),
            schedule,
            settings: SchedulerSettings::default(),
        });

        Self {
            scheduler,
            mount,
            log,
        }
    }

    fn tick(&mut self, h: u32, m: u32, s: u32) -> Option<Action> {
        self.scheduler.tick_at(at(h, m, s))
    }

    fn tracking(&mut self) -> bool {
        self.mount.is_tracking()
    }

    /// Connect and start tracking the way the first minute of the day does.
    fn start_day(&mut self) {
        assert_eq!(self.tick(10, 59, 59), None);
        assert_eq!(self.tick(11, 0, 0), Some(Action::Connect));
        assert_eq!(self.tick(11, 0, 0), Some(Action::Initialize));
        assert!(self.tracking());
    }
}

#[test]
fn test_full_operating_day() {
    let mut rig = Rig::new(SimulatorOptions::default(), true);

    assert_eq!(rig.tick(9, 0, 0), None);
    assert_eq!(rig.scheduler.phase(), Some(SchedulerPhase::Idle));

    assert_eq!(rig.tick(10, 59, 59), None);
    assert_eq!(rig.tick(11, 0, 0), Some(Action::Connect));
    assert!(rig.log.contains("Conectado"));
    assert_eq!(rig.log.days(), vec![at(11, 0, 0).date()]);

    assert_eq!(rig.tick(11, 0, 0), Some(Action::Initialize));
    assert!(rig.tracking());
    assert!(matches!(rig.mount.pointing(), Pointing::Equatorial(_)));
    assert_eq!(rig.scheduler.phase(), Some(SchedulerPhase::Tracking));

    // Nothing to do while tracking
    assert_eq!(rig.tick(11, 0, 1), None);
    assert_eq!(rig.tick(11, 0, 2), None);

    assert_eq!(rig.tick(16, 0, 0), Some(Action::Flip));
    assert!(rig.tracking());
    assert_eq!(rig.tick(16, 0, 1), None);

    assert_eq!(rig.tick(20, 0, 0), Some(Action::TurnOff));
    assert!(!rig.tracking());
    assert!(!rig.mount.is_connected());
    assert!(rig.log.contains("Parked"));
    assert!(rig.log.contains("Disconnected"));

    assert_eq!(rig.tick(20, 0, 1), None);
    assert_eq!(rig.scheduler.phase(), Some(SchedulerPhase::ShutDown));
    assert_eq!(rig.log.count(LogLevel::Error), 0);
}

#[test]
fn test_calibration_window_offsets_and_restores_tracking() {
    let mut rig = Rig::new(SimulatorOptions::default(), true);
    rig.start_day();
    assert_eq!(rig.tick(14, 59, 59), None);

    assert_eq!(rig.tick(15, 0, 0), Some(Action::Calibrate(0)));
    match rig.mount.pointing() {
        Pointing::Horizontal(Horizontal { azimuth, altitude }) => {
            // Equatorial pointing has no az/alt in the simulator, so the
            // locator's 180° is offset by 10°
            assert!((azimuth - 190.0).abs() < 1e-9);
            assert!((altitude - 45.0).abs() < 1e-9);
        }
        other => panic!("expected a horizontal pointing, got {other:?}"),
    }
    assert!(!rig.tracking());

    // Tracking is deliberately off inside the window
    assert_eq!(rig.tick(15, 0, 15), None);
    assert_eq!(rig.scheduler.phase(), Some(SchedulerPhase::Calibrating));

    assert_eq!(rig.tick(15, 0, 30), Some(Action::FinishCalibration(0)));
    assert!(rig.tracking());
    assert!(matches!(rig.mount.pointing(), Pointing::Equatorial(_)));
    assert_eq!(rig.scheduler.phase(), Some(SchedulerPhase::Tracking));
}

#[test]
fn test_lost_connection_reconnects_instead_of_connecting() {
    let mut rig = Rig::new(SimulatorOptions::default(), true);
    rig.start_day();

    rig.mount.drop_connection();
    rig.mount.clear_commands();

    assert_eq!(rig.tick(13, 0, 0), Some(Action::Reconnect));
    assert!(rig.tracking());
    assert!(rig.log.contains("Reconnected to simulator"));

    let commands = rig.mount.commands();
    assert_eq!(commands.first().map(String::as_str), Some("connect"));
    assert!(commands.iter().any(|c| c == "slew_ra_dec"));
    assert!(commands.iter().any(|c| c == "tracking_on"));

    assert_eq!(rig.tick(13, 0, 1), None);
}

#[test]
fn test_stalled_tracking_is_resumed() {
    let mut rig = Rig::new(SimulatorOptions::default(), true);
    rig.start_day();

    rig.mount.stall_tracking();
    assert_eq!(rig.tick(12, 0, 0), Some(Action::ResumeTracking));
    assert!(rig.tracking());
}

#[test]
fn test_failed_connects_recover_through_reconnect() {
    let options = SimulatorOptions {
        failed_connects: 2,
        ..SimulatorOptions::default()
    };
    let mut rig = Rig::new(options, true);

    assert_eq!(rig.tick(11, 0, 0), Some(Action::Connect));
    assert!(!rig.mount.is_connected());
    assert_eq!(rig.scheduler.phase(), Some(SchedulerPhase::AwaitingConnection));

    assert_eq!(rig.tick(11, 0, 1), Some(Action::Reconnect));
    assert!(!rig.mount.is_connected());

    assert_eq!(rig.tick(11, 0, 2), Some(Action::Reconnect));
    assert!(rig.mount.is_connected());
    assert!(rig.tracking());

    assert_eq!(rig.log.count(LogLevel::Error), 2);
    assert_eq!(rig.tick(11, 0, 3), None);
}

#[test]
fn test_turn_off_without_full_shutdown_settles() {
    let mut rig = Rig::new(SimulatorOptions::default(), false);
    rig.start_day();

    assert_eq!(rig.tick(20, 0, 0), Some(Action::TurnOff));
    assert!(rig.mount.is_connected());
    assert!(rig.mount.is_parked());
    assert!(!rig.tracking());

    // Parked and not tracking: nothing left to do
    assert_eq!(rig.tick(20, 0, 1), None);
    assert_eq!(rig.tick(21, 30, 0), None);
    assert!(!rig.log.contains("Disconnected"));
}

#[test]
fn test_restart_after_turn_off_only_finishes_shutdown() {
    let mut rig = Rig::new(SimulatorOptions::default(), true);
    rig.mount.connect().unwrap();
    rig.mount.unpark().unwrap();

    // First tick of a process started late with the mount still connected
    assert_eq!(rig.tick(21, 0, 0), Some(Action::TurnOff));
    assert!(!rig.mount.is_connected());
    assert!(rig.log.contains("Tracking already off"));
    assert_eq!(rig.tick(21, 0, 1), None);
}

#[test]
fn test_start_missed_during_stall_is_caught_by_reconnect() {
    let mut rig = Rig::new(SimulatorOptions::default(), true);

    assert_eq!(rig.tick(10, 0, 0), None);
    // The process was suspended across the start instant
    assert_eq!(rig.tick(11, 30, 0), Some(Action::Reconnect));
    assert!(rig.tracking());
}

#[test]
fn test_new_day_reopens_day_log() {
    let mut rig = Rig::new(SimulatorOptions::default(), true);
    rig.start_day();
    assert_eq!(rig.tick(20, 0, 0), Some(Action::TurnOff));

    let next_day = NaiveDate::from_ymd_opt(2026, 3, 21).unwrap();
    assert_eq!(rig.scheduler.tick_at(next_day.and_time(hms(10, 59, 59))), None);
    assert_eq!(
        rig.scheduler.tick_at(next_day.and_time(hms(11, 0, 0))),
        Some(Action::Connect)
    );
    assert_eq!(rig.log.days(), vec![at(11, 0, 0).date(), next_day]);
}

#[test]
fn test_flip_fires_once_when_clock_steps_back() {
    let mut rig = Rig::new(SimulatorOptions::default(), true);
    rig.start_day();

    let ms = |h, m, s, milli| at(h, m, s) + TimeDelta::milliseconds(milli);
    let mut flips = 0;
    for now in [
        ms(15, 59, 59, 900),
        ms(16, 0, 0, 400),
        ms(16, 0, 1, 400),
        // Clock corrected backwards across nothing new
        ms(16, 0, 0, 600),
        ms(16, 0, 1, 600),
        // A larger step back, still well under an hour
        ms(15, 55, 0, 0),
        ms(16, 0, 0, 0),
        ms(16, 0, 2, 0),
    ] {
        if rig.scheduler.tick_at(now) == Some(Action::Flip) {
            flips += 1;
        }
    }

    assert_eq!(flips, 1);
    assert!(rig.tracking());
}

#[test]
fn test_flip_inside_a_long_slew_wait_is_not_lost() {
    let mut rig = Rig::new(SimulatorOptions::default(), true);
    rig.start_day();

    // A tick just before the flip, then an action that blocked for 150 s
    assert_eq!(rig.tick(15, 59, 0), None);
    assert_eq!(rig.tick(16, 1, 30), Some(Action::Flip));
}
