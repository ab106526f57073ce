//! Help command implementation for heliotrack.
//!
//! Shows command-specific help or the command overview.

use anyhow::Result;

/// Show brief usage for a command (used for error messages)
pub fn show_command_usage(command: &str) {
    match command {
        "check" | "c" => log_block_start!("Usage: heliotrack check [OPTIONS]"),
        "status" | "s" => log_block_start!("Usage: heliotrack status [OPTIONS]"),
        "simulate" | "S" => {
            log_block_start!("Usage: heliotrack simulate <start> <end> [multiplier] [--log]")
        }
        _ => log_block_start!("Usage: heliotrack [OPTIONS] [COMMAND]"),
    }
}

/// Run the help command (dispatcher)
///
/// # Arguments
/// * `command` - Optional command name to get help for (None = general help)
pub fn run_help_command(command: Option<&str>) -> Result<()> {
    match command {
        None => display_general_help(),
        Some("run") => display_run_help(),
        Some("check") | Some("c") => super::check::display_help(),
        Some("status") | Some("s") => super::status::display_help(),
        Some("simulate") | Some("S") => super::simulate::display_help(),
        Some("help") | Some("h") => display_help_help(),
        Some(unknown) => {
            log_warning!("Unknown command: {unknown}");
            display_general_help();
        }
    }
    Ok(())
}

/// Display general help focused on commands (for the help command)
fn display_general_help() {
    log_version!();
    log_block_start!("Available Commands:");
    log_indented!("run                     Run the daily scheduler (default)");
    log_indented!("check, c                Validate configuration and show today's schedule");
    log_indented!("status, s               Query the mount and the target position once");
    log_indented!("simulate, S <start> <end> [multiplier]");
    log_indented!("                        Replay a time range against the simulated mount");
    log_indented!("help, h [COMMAND]       Show detailed help for a command");
    log_pipe!();
    log_info!("Use 'heliotrack help <command>' to see detailed help for a specific command.");
    log_indented!("Use 'heliotrack --help' to see all options and general usage.");
    log_end!();
}

fn display_run_help() {
    log_version!();
    log_block_start!("run - Run the daily scheduler");
    log_block_start!("Usage: heliotrack [run] [OPTIONS]");
    log_block_start!("Options:");
    log_indented!("-c, --config <dir>  Use custom configuration directory");
    log_indented!("-d, --debug         Log every guard that fires");
    log_block_start!("Signals:");
    log_indented!("SIGUSR1             Log the current phase and mount status");
    log_indented!("SIGINT, SIGTERM,    Stop the scheduler, leaving the mount as it is");
    log_indented!("SIGHUP");
    log_end!();
}

/// Display help for the help command itself
fn display_help_help() {
    log_version!();
    log_block_start!("help - Display help information");
    log_block_start!("Usage: heliotrack help [COMMAND]");
    log_block_start!("Arguments:");
    log_indented!("COMMAND  Optional command to get help for");
    log_indented!("         If omitted, shows general help");
    log_block_start!("Examples:");
    log_indented!("heliotrack help");
    log_indented!("heliotrack help simulate");
    log_end!();
}
