//! Implementation of the `simulate` command.
//!
//! Installs a simulated time source and hands control back to main, which then
//! runs the normal scheduler against the simulated mount. A whole operating
//! day, including connection drops and calibration windows, replays in seconds.
//!
//! With `--log` the console output goes to a file while the terminal shows a
//! progress bar.

use anyhow::{Result, bail};
use chrono::{DateTime, Local};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::common::utils::ProgressBar;
use crate::logger::{Log, LoggerGuard};
use crate::time::source::{self, SimulatedTimeSource, TimeSource};

/// Guards that need to stay alive for the duration of the simulation.
pub struct SimulationGuards {
    logger_guard: Option<LoggerGuard>,
    progress_handle: Option<thread::JoinHandle<()>>,
    progress_shutdown: Arc<AtomicBool>,
    log_to_file: bool,
    is_complete: bool,
}

impl SimulationGuards {
    /// Stop the progress monitor and flush the log file.
    pub fn complete_simulation(&mut self) {
        self.is_complete = true;
        self.stop_progress();

        if self.log_to_file {
            drop(self.logger_guard.take());
            println!("┣ Simulation complete");
            println!("╹");
        }
    }

    fn stop_progress(&mut self) {
        self.progress_shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.progress_handle.take() {
            let _ = handle.join();
            // Clear the progress bar line
            print!("\r\x1B[K");
            std::io::Write::flush(&mut std::io::stdout()).ok();
        }
    }
}

impl Drop for SimulationGuards {
    fn drop(&mut self) {
        if self.is_complete {
            return;
        }
        self.stop_progress();
        if self.log_to_file {
            drop(self.logger_guard.take());
            println!("┣ Simulation interrupted");
            println!("╹");
        }
    }
}

/// Parse the range, install the simulated clock and print the header.
///
/// `multiplier` of 0 selects fast-forward. Times are read in the schedule
/// timezone when the configuration names one.
pub fn handle_simulate_command(
    start_time: &str,
    end_time: &str,
    multiplier: f64,
    debug_enabled: bool,
    log_to_file: bool,
) -> Result<SimulationGuards> {
    if let Ok(Some(pid)) = crate::io::lock::running_instance_pid(&crate::io::lock::default_lock_dir())
    {
        log_version!();
        log_block_start!("Simulation Mode");
        log_pipe!();
        log_error!("Cannot run simulation: heliotrack is already running (PID: {pid})");
        log_indented!("A simulation would fight the live scheduler for the log directory");
        log_end!();
        std::process::exit(crate::common::constants::EXIT_FAILURE);
    }

    let timezone = crate::config::Config::load()
        .ok()
        .and_then(|config| config.schedule_timezone().ok().flatten());

    let parse = |label: &str, value: &str| -> Result<DateTime<Local>> {
        let parsed = match timezone {
            Some(tz) => source::parse_datetime_in_tz(value, tz),
            None => source::parse_datetime(value),
        };
        parsed.map_err(|e| anyhow::anyhow!("Invalid {label} time: {e}"))
    };
    let start = parse("start", start_time)?;
    let end = parse("end", end_time)?;

    if end <= start {
        bail!("End time must be after start time");
    }

    let sim_source = Arc::new(SimulatedTimeSource::new(start, end, multiplier));
    let progress_shutdown = Arc::new(AtomicBool::new(false));

    let mut guards = SimulationGuards {
        logger_guard: None,
        progress_handle: None,
        progress_shutdown: progress_shutdown.clone(),
        log_to_file,
        is_complete: false,
    };

    if log_to_file {
        // Terminal header first, without simulated timestamps
        log_version!();
        log_block_start!("Simulation Mode");
        log_simulation_details(start_time, end_time, multiplier, start, end);

        let log_filename = format!(
            "heliotrack-simulation-{}.log",
            Local::now().format("%Y%m%d-%H%M%S")
        );
        log_block_start!("Logging simulation output to: {log_filename}");

        source::init_time_source(sim_source.clone());
        Log::set_schedule_timezone(timezone);
        guards.logger_guard = Some(Log::start_file_logging(log_filename)?);
        guards.progress_handle = Some(spawn_progress_monitor(
            sim_source,
            start,
            end,
            progress_shutdown,
        ));
    } else {
        source::init_time_source(sim_source);
        Log::set_schedule_timezone(timezone);
    }

    log_version!();
    log_block_start!("Simulation Mode");
    log_simulation_details(start_time, end_time, multiplier, start, end);
    log_indented!("Running simulation...");

    if debug_enabled {
        log_pipe!();
        log_debug!("Simulated time source initialized");
    }

    Ok(guards)
}

/// Draw a progress bar on the terminal until the simulation ends.
fn spawn_progress_monitor(
    time_source: Arc<SimulatedTimeSource>,
    start_time: DateTime<Local>,
    end_time: DateTime<Local>,
    shutdown: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut progress_bar = ProgressBar::new(40);
        let total_ms = end_time
            .signed_duration_since(start_time)
            .num_milliseconds()
            .max(1) as f64;

        while !shutdown.load(Ordering::SeqCst) {
            let elapsed_ms = time_source
                .now()
                .signed_duration_since(start_time)
                .num_milliseconds() as f64;
            let progress = (elapsed_ms / total_ms).clamp(0.0, 1.0);
            let clock = time_source.now().format("%H:%M:%S").to_string();

            progress_bar.update(progress as f32, Some(&clock));

            if time_source.is_ended() {
                break;
            }
            thread::sleep(progress_bar.recommended_sleep());
        }
    })
}

fn log_simulation_details(
    display_start: &str,
    display_end: &str,
    multiplier: f64,
    start: DateTime<Local>,
    end: DateTime<Local>,
) {
    let duration = end.signed_duration_since(start);

    log_decorated!("Simulating from {display_start} to {display_end}");
    log_indented!(
        "Total simulated time: {} hours {} minutes",
        duration.num_hours(),
        duration.num_minutes() % 60
    );

    if multiplier == 0.0 {
        log_indented!("Time acceleration: fast-forward");
    } else {
        let real_secs = Duration::from_millis(duration.num_milliseconds().max(0) as u64)
            .as_secs_f64()
            / multiplier;
        log_indented!("Time acceleration: {multiplier}x (about {real_secs:.1} seconds)");
    }
}

/// Display help for the simulate command
pub fn display_help() {
    log_version!();
    log_block_start!("simulate - Replay a time range against the simulated mount");
    log_block_start!("Usage: heliotrack simulate <start> <end> [multiplier] [OPTIONS]");
    log_block_start!("Arguments:");
    log_indented!("<start>, <end>   \"YYYY-MM-DD HH:MM:SS\" in the schedule timezone");
    log_indented!("[multiplier]     Time acceleration, 0 = fast-forward (default 3600)");
    log_block_start!("Options:");
    log_indented!("--fast-forward   Same as a multiplier of 0");
    log_indented!("--log            Write output to a file and show a progress bar");
    log_block_start!("Notes:");
    log_indented!("The mount is always the simulator; faults come from the [simulator] table.");
    log_indented!("Sun positions come from the ephemeris at the configured site.");
    log_block_start!("Examples:");
    log_indented!("heliotrack simulate \"2026-03-20 10:59:00\" \"2026-03-20 20:01:00\" 0");
    log_end!();
}
