//! Application coordinator that manages the complete lifecycle of heliotrack.
//!
//! This module handles resource acquisition, initialization, and orchestration
//! of the scheduler. It manages:
//! - Configuration loading
//! - Lock file management for single-instance enforcement
//! - Signal handler setup
//! - Gateway, locator and day log creation
//!
//! The `Heliotrack` struct uses a builder pattern to support different startup contexts:
//! - Normal startup: `Heliotrack::new(debug_enabled).run()`
//! - Simulation mode: `Heliotrack::new(debug_enabled).without_lock().without_headers().simulated().run()`

use anyhow::{Context, Result};

use crate::{
    config::{Config, Locator},
    core::{Scheduler, SchedulerParams},
    io::day_log::DayLog,
    io::lock::{acquire_lock, default_lock_dir},
    io::signals::setup_signal_handler,
    logger::Log,
    mount::{DeviceGateway, create_gateway, simulator::SimulatedMount},
    solar::{EphemerisLocator, SunLocator, create_locator},
};

/// Builder for configuring and running the heliotrack scheduler.
///
/// # Examples
///
/// ```no_run
/// use heliotrack::Heliotrack;
///
/// # fn main() -> anyhow::Result<()> {
/// Heliotrack::new(false).run()?;
/// # Ok(())
/// # }
/// ```
pub struct Heliotrack {
    debug_enabled: bool,
    create_lock: bool,
    show_headers: bool,
    simulated: bool,
}

impl Heliotrack {
    /// Create a new runner with defaults matching normal run
    pub fn new(debug_enabled: bool) -> Self {
        Self {
            debug_enabled,
            create_lock: true,
            show_headers: true,
            simulated: false,
        }
    }

    /// Skip lock file creation
    pub fn without_lock(mut self) -> Self {
        self.create_lock = false;
        self
    }

    /// Skip header display (the simulate command prints its own)
    pub fn without_headers(mut self) -> Self {
        self.show_headers = false;
        self
    }

    /// Drive the simulated mount and the local ephemeris whatever the
    /// configuration selects.
    pub fn simulated(mut self) -> Self {
        self.simulated = true;
        self
    }

    /// Execute the application with the configured settings.
    ///
    /// Returns once a shutdown signal arrives or the simulation ends. The
    /// mount is left exactly as it was at that moment.
    pub fn run(self) -> Result<()> {
        if self.show_headers {
            log_version!();
            if self.debug_enabled {
                log_pipe!();
                log_debug!("Debug mode enabled - logging every guard that fires");
            }
        }

        let config = Config::load().context("Configuration failed")?;

        let device_name = if self.simulated {
            crate::config::Device::Simulator.as_str()
        } else {
            config.device().as_str()
        };

        // Handle the lock file before anything can touch the mount
        let lock = if self.create_lock {
            Some(acquire_lock(&default_lock_dir(), device_name)?)
        } else {
            None
        };

        let signal_state = setup_signal_handler(self.debug_enabled)?;

        config.log_config();

        let schedule = config.schedule()?;
        let settings = config.scheduler_settings(self.debug_enabled)?;
        Log::set_schedule_timezone(settings.timezone);

        let (gateway, locator) = if self.simulated {
            simulation_devices(&config)?
        } else {
            (create_gateway(&config)?, create_locator(&config)?)
        };

        let log_dir = config.log_dir()?;
        std::fs::create_dir_all(&log_dir).with_context(|| {
            format!(
                "Failed to create log directory {}",
                crate::common::utils::private_path(&log_dir)
            )
        })?;
        let log = DayLog::new(log_dir, settings.timezone);

        log_block_start!(
            "Mount: {}, locator: {}",
            gateway.name(),
            locator.name()
        );
        if lock.is_some() {
            log_block_start!("Lock acquired, starting heliotrack...");
        }

        let mut scheduler = Scheduler::new(SchedulerParams {
            gateway,
            locator,
            log: Box::new(log),
            schedule,
            settings,
        });

        scheduler.run(&signal_state)?;

        log_block_start!("Shutting down heliotrack...");
        if !crate::time::source::is_simulated() {
            log_end!();
        }
        Ok(())
    }
}

/// The simulated mount plus the ephemeris at the configured site.
fn simulation_devices(
    config: &Config,
) -> Result<(Box<dyn DeviceGateway>, Box<dyn SunLocator>)> {
    let gateway: Box<dyn DeviceGateway> =
        Box::new(SimulatedMount::new(config.simulator_options()?));

    let (latitude, longitude) = match (config.latitude, config.longitude) {
        (Some(lat), Some(lon)) => (lat, lon),
        _ => {
            log_pipe!();
            log_warning!("No latitude/longitude configured, simulating the sun from 0°N 0°E");
            (0.0, 0.0)
        }
    };
    if config.locator() == Locator::SkyX {
        log_indented!("Simulation uses the local ephemeris instead of TheSkyX");
    }

    let locator: Box<dyn SunLocator> = Box::new(EphemerisLocator::new(latitude, longitude));
    Ok((gateway, locator))
}
