//! Implementation of the `check` command.
//!
//! Loads and validates the configuration without touching the mount, then
//! prints today's schedule and where in it the clock currently is.

use anyhow::Result;
use chrono::NaiveTime;

use crate::common::utils::private_path;
use crate::config::Config;
use crate::core::{ScheduleConfig, SchedulerPhase};
use crate::mount::MountStatus;
use crate::time::clock;

/// Validate the configuration and print today's schedule.
pub fn handle_check_command(debug_enabled: bool) -> Result<()> {
    log_version!();

    let config = Config::load()?;
    config.log_config();

    let schedule = config.schedule()?;
    let settings = config.scheduler_settings(debug_enabled)?;
    let now = clock::now_naive(settings.timezone);

    log_block_start!("Schedule for {}", now.format("%d/%m/%Y"));
    for (time, label) in schedule_events(&schedule) {
        let marker = if time > now.time() { " " } else { "✓" };
        log_indented!("{marker} {} {label}", time.format("%H:%M:%S"));
    }

    // Without a connection the phase only depends on the clock
    let phase = SchedulerPhase::derive(now.time(), &MountStatus::default(), &schedule);
    log_block_start!("Current time {}: {phase}", now.format("%H:%M:%S"));
    if let Some((time, label)) = schedule_events(&schedule)
        .into_iter()
        .find(|(time, _)| *time > now.time())
    {
        log_indented!("Next: {label} at {}", time.format("%H:%M:%S"));
    }

    if debug_enabled {
        log_pipe!();
        let config_path = Config::get_config_path()?;
        let log_dir = config.log_dir()?;
        log_debug!("Config file: {}", private_path(&config_path));
        log_debug!("Log directory: {}", private_path(&log_dir));
    }

    log_block_start!("Configuration is valid");
    log_end!();
    Ok(())
}

/// Every scheduled instant of the day in chronological order.
pub fn schedule_events(schedule: &ScheduleConfig) -> Vec<(NaiveTime, String)> {
    let mut events = vec![
        (schedule.start, "connect and start tracking".to_string()),
        (schedule.flip, "meridian flip".to_string()),
        (
            schedule.turn_off,
            if schedule.full_shutdown {
                "stop tracking, park and disconnect".to_string()
            } else {
                "stop tracking and park".to_string()
            },
        ),
    ];

    for (index, window) in schedule.calibration_windows.iter().enumerate() {
        events.push((
            window.start,
            format!(
                "calibration {} (azimuth {:+.1}°)",
                index + 1,
                window.azimuth_offset
            ),
        ));
        events.push((window.end, format!("calibration {} ends", index + 1)));
    }

    events.sort_by_key(|(time, _)| *time);
    events
}

/// Display help for the check command
pub fn display_help() {
    log_version!();
    log_block_start!("check - Validate configuration and show today's schedule");
    log_block_start!("Usage: heliotrack check [OPTIONS]");
    log_block_start!("Options:");
    log_indented!("-c, --config <dir>  Use custom configuration directory");
    log_indented!("-d, --debug         Also show resolved file locations");
    log_block_start!("Notes:");
    log_indented!("The mount is not contacted; use 'heliotrack status' for that.");
    log_end!();
}
