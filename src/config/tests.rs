use super::validation::validate_config;
use super::*;
use crate::common::constants::test_constants::*;
use serial_test::serial;
use std::fs;
use tempfile::tempdir;

fn create_test_config() -> Config {
    Config {
        start_hour: Some(TEST_START.0),
        start_minutes: Some(TEST_START.1),
        start_seconds: Some(TEST_START.2),
        flip_hour: Some(TEST_FLIP.0),
        flip_minutes: Some(TEST_FLIP.1),
        turn_off_hour: Some(TEST_TURN_OFF.0),
        turn_off_minutes: Some(TEST_TURN_OFF.1),
        calibration_windows: Some(vec![CalibrationWindowConfig {
            start: TEST_CALIBRATION_START.to_string(),
            end: TEST_CALIBRATION_END.to_string(),
            azimuth_offset: TEST_AZIMUTH_OFFSET,
        }]),
        ..Config::default()
    }
}

fn time(h: u32, m: u32, s: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, s).unwrap()
}

#[test]
#[serial]
fn test_config_load_default_creation() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("heliotrack").join("heliotrack.toml");

    // Save and restore XDG_CONFIG_HOME
    let original = std::env::var("XDG_CONFIG_HOME").ok();
    unsafe {
        std::env::set_var("XDG_CONFIG_HOME", temp_dir.path());
    }

    let result = Config::load();

    unsafe {
        match original {
            Some(val) => std::env::set_var("XDG_CONFIG_HOME", val),
            None => std::env::remove_var("XDG_CONFIG_HOME"),
        }
    }

    if let Err(e) = &result {
        eprintln!("Config::load() failed: {e:?}");
    }
    let config = result.unwrap();
    assert!(config_path.exists());
    assert_eq!(config.start_time().unwrap(), time(11, 0, 0));
    assert_eq!(config.device(), Device::SkyX);
}

#[test]
fn test_config_validation_basic() {
    let config = create_test_config();
    assert!(validate_config(&config).is_ok());

    let schedule = config.schedule().unwrap();
    assert_eq!(schedule.start, time(11, 0, 0));
    assert_eq!(schedule.flip, time(16, 0, 0));
    assert_eq!(schedule.turn_off, time(20, 0, 0));
    assert_eq!(schedule.calibration_windows.len(), 1);
    assert_eq!(schedule.calibration_windows[0].end, time(15, 0, 30));
    assert!(schedule.full_shutdown);
}

#[test]
fn test_config_validation_hour_out_of_range() {
    let mut config = create_test_config();
    config.flip_hour = Some(24);
    let err = validate_config(&config).unwrap_err();
    assert!(err.to_string().contains("flip_hour"));
}

#[test]
fn test_config_validation_minutes_out_of_range() {
    let mut config = create_test_config();
    config.start_seconds = Some(60);
    let err = validate_config(&config).unwrap_err();
    assert!(err.to_string().contains("start_seconds"));
}

#[test]
fn test_config_validation_schedule_out_of_order() {
    let mut config = create_test_config();
    config.flip_hour = Some(21);
    assert!(validate_config(&config).is_err());

    let mut config = create_test_config();
    config.turn_off_hour = Some(11);
    config.turn_off_minutes = Some(0);
    assert!(validate_config(&config).is_err());
}

#[test]
fn test_config_validation_calibration_outside_window() {
    let mut config = create_test_config();
    config.calibration_windows = Some(vec![CalibrationWindowConfig {
        start: "20:30:00".to_string(),
        end: "20:31:00".to_string(),
        azimuth_offset: 5.0,
    }]);
    assert!(validate_config(&config).is_err());
}

#[test]
fn test_config_validation_calibration_reversed() {
    let mut config = create_test_config();
    config.calibration_windows = Some(vec![CalibrationWindowConfig {
        start: "15:00:30".to_string(),
        end: "15:00:00".to_string(),
        azimuth_offset: 5.0,
    }]);
    assert!(validate_config(&config).is_err());
}

#[test]
fn test_config_validation_azimuth_offset_limit() {
    let mut config = create_test_config();
    if let Some(windows) = config.calibration_windows.as_mut() {
        windows[0].azimuth_offset = 270.0;
    }
    let err = validate_config(&config).unwrap_err();
    assert!(err.to_string().contains("azimuth_offset"));
}

#[test]
fn test_config_validation_tick_interval_limits() {
    let mut config = create_test_config();
    config.tick_interval = Some(0);
    assert!(validate_config(&config).is_err());

    config.tick_interval = Some(MAXIMUM_TICK_INTERVAL);
    assert!(validate_config(&config).is_ok());

    config.slew_timeout = Some(MAXIMUM_SLEW_TIMEOUT + 1);
    assert!(validate_config(&config).is_err());
}

#[test]
fn test_config_validation_ephemeris_requires_coordinates() {
    let mut config = create_test_config();
    config.locator = Some(Locator::Ephemeris);
    assert!(validate_config(&config).is_err());

    config.latitude = Some(-23.55);
    config.longitude = Some(-46.63);
    assert!(validate_config(&config).is_ok());

    config.latitude = Some(91.0);
    assert!(validate_config(&config).is_err());
}

#[test]
fn test_config_validation_unknown_timezone() {
    let mut config = create_test_config();
    config.timezone = Some("Mars/Olympus_Mons".to_string());
    assert!(validate_config(&config).is_err());

    config.timezone = Some("America/Sao_Paulo".to_string());
    assert!(validate_config(&config).is_ok());
    assert_eq!(
        config.schedule_timezone().unwrap(),
        Some(chrono_tz::America::Sao_Paulo)
    );
}

#[test]
fn test_config_validation_empty_target() {
    let mut config = create_test_config();
    config.target = Some("  ".to_string());
    assert!(validate_config(&config).is_err());
}

#[test]
fn test_parse_clock_time_formats() {
    assert_eq!(parse_clock_time("15:00:30").unwrap(), time(15, 0, 30));
    assert_eq!(parse_clock_time("15:00").unwrap(), time(15, 0, 0));
    assert!(parse_clock_time("25:00:00").is_err());
    assert!(parse_clock_time("3pm").is_err());
}

#[test]
fn test_scheduler_settings_tracking_rates() {
    let mut config = create_test_config();
    assert_eq!(config.scheduler_settings(false).unwrap().tracking_rates, None);

    config.tracking_ra_rate = Some(0.5);
    let settings = config.scheduler_settings(true).unwrap();
    assert_eq!(settings.tracking_rates, Some((0.5, 0.0)));
    assert!(settings.debug_enabled);
    assert_eq!(settings.target, "Sun");
}

#[test]
fn test_simulator_options_parse_fault_times() {
    let mut config = create_test_config();
    config.simulator = Some(SimulatorConfig {
        failed_connects: Some(2),
        slew_polls: None,
        drop_connection_at: Some("13:00:00".to_string()),
        stall_tracking_at: None,
    });
    let options = config.simulator_options().unwrap();
    assert_eq!(options.failed_connects, 2);
    assert_eq!(options.drop_connection_at, Some(time(13, 0, 0)));

    if let Some(simulator) = config.simulator.as_mut() {
        simulator.stall_tracking_at = Some("later".to_string());
    }
    assert!(validate_config(&config).is_err());
}

#[test]
fn test_load_from_path_parses_toml() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("heliotrack.toml");
    fs::write(
        &path,
        r#"
start_hour = 9
flip_hour = 13
turn_off_hour = 17
device = "simulator"
locator = "ephemeris"
latitude = 51.5
longitude = -0.12
full_shutdown = false

[[calibration_windows]]
start = "12:00:00"
end = "12:01:00"
azimuth_offset = -15.0

[simulator]
failed_connects = 1
"#,
    )
    .unwrap();

    let config = Config::load_from_path(&path).unwrap();
    assert_eq!(config.device(), Device::Simulator);
    assert_eq!(config.locator(), Locator::Ephemeris);
    assert!(!config.full_shutdown());
    let schedule = config.schedule().unwrap();
    assert_eq!(schedule.start, time(9, 0, 0));
    assert_eq!(schedule.calibration_windows[0].azimuth_offset, -15.0);
}

#[test]
fn test_load_from_path_rejects_unknown_device() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("heliotrack.toml");
    fs::write(&path, "device = \"ascom\"\n").unwrap();
    assert!(Config::load_from_path(&path).is_err());
}

#[test]
fn test_load_from_path_missing_file() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("absent.toml");
    assert!(Config::load_from_path(&path).is_err());
}

#[test]
fn test_log_dir_expands_home() {
    let mut config = create_test_config();
    config.log_dir = Some("/var/log/heliotrack".to_string());
    assert_eq!(
        config.log_dir().unwrap(),
        PathBuf::from("/var/log/heliotrack")
    );

    if let Some(home) = dirs::home_dir() {
        config.log_dir = Some("~/solar".to_string());
        assert_eq!(config.log_dir().unwrap(), home.join("solar"));
    }
}
