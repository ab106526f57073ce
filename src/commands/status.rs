//! Implementation of the `status` command.
//!
//! Queries the configured mount and locator once. The mount is never
//! connected or moved: a disconnected mount is reported as such.

use anyhow::Result;

use crate::config::Config;
use crate::core::SchedulerPhase;
use crate::io::lock::{default_lock_dir, running_instance_pid};
use crate::mount::{DeviceGateway, MountStatus, create_gateway};
use crate::solar::{SunLocator, create_locator};
use crate::time::clock;

/// Print the mount status, its pointing and the target's position.
pub fn handle_status_command(debug_enabled: bool) -> Result<()> {
    log_version!();

    let config = Config::load()?;
    let schedule = config.schedule()?;
    let timezone = config.schedule_timezone()?;
    let target = config.target().to_string();

    match running_instance_pid(&default_lock_dir()) {
        Ok(Some(pid)) => log_block_start!("Scheduler running (PID: {pid})"),
        Ok(None) => log_block_start!("Scheduler not running"),
        Err(e) if debug_enabled => log_debug!("Could not inspect lock file: {e}"),
        Err(_) => {}
    }

    let mut gateway = create_gateway(&config)?;
    let locator = create_locator(&config)?;

    let now = clock::now_naive(timezone);
    let status = MountStatus::read(gateway.as_mut());
    let phase = SchedulerPhase::derive(now.time(), &status, &schedule);

    log_block_start!("Status at {}", now.format("%d/%m/%Y %H:%M:%S"));
    log_indented!("Phase: {phase}");
    log_indented!("Mount ({}): {status}", gateway.name());

    if status.connected {
        report_pointing(gateway.as_mut());
    }
    report_target(locator.as_ref(), &target);

    log_end!();
    Ok(())
}

fn report_pointing(gateway: &mut dyn DeviceGateway) {
    match gateway.ra_dec() {
        Ok(position) => log_indented!("Pointing: {position}"),
        Err(e) => log_warning!("Could not read RA/Dec: {e}"),
    }
    match gateway.az_alt() {
        Ok(position) => log_indented!("Pointing: {position}"),
        Err(e) => log_warning!("Could not read Az/Alt: {e}"),
    }
}

fn report_target(locator: &dyn SunLocator, target: &str) {
    log_block_start!("{target} ({})", locator.name());
    match locator.locate(target) {
        Ok(position) => log_indented!("{position}"),
        Err(e) => log_warning!("{e}"),
    }
    match locator.current_az_alt(target) {
        Ok(position) => log_indented!("{position}"),
        Err(e) => log_warning!("{e}"),
    }
}

/// Display help for the status command
pub fn display_help() {
    log_version!();
    log_block_start!("status - Query the mount and the target position once");
    log_block_start!("Usage: heliotrack status [OPTIONS]");
    log_block_start!("Options:");
    log_indented!("-c, --config <dir>  Use custom configuration directory");
    log_block_start!("Notes:");
    log_indented!("The mount is only read, never connected or moved.");
    log_indented!("Send SIGUSR1 to a running scheduler for its own status report.");
    log_end!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::Log;
    use crate::mount::simulator::SimulatedMount;
    use crate::solar::FixedLocator;

    #[test]
    fn test_report_pointing_reads_both_frames() {
        Log::set_enabled(false);
        let mut mount = SimulatedMount::default();
        mount.connect().unwrap();
        mount.clear_commands();

        report_pointing(&mut mount);
        report_target(&FixedLocator::sun(), "Sun");

        assert_eq!(mount.commands(), vec!["get_ra_dec", "get_az_alt"]);
    }
}
