//! Main application entry point.
//!
//! Parses the command line, sets the configuration directory and dispatches to
//! the scheduler or one of the one-shot commands. Everything else lives in the
//! library so it can be tested.

use anyhow::Result;

use heliotrack::args::{CliAction, ParsedArgs, display_help, display_version_info};
use heliotrack::commands;
use heliotrack::common::constants::{EXIT_FAILURE, EXIT_SUCCESS};
use heliotrack::{Heliotrack, log_error_exit};

fn main() {
    let parsed = ParsedArgs::from_env();

    let code = match dispatch(parsed.action) {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            log_error_exit!("{e}");
            // The rest of the chain names the file or key at fault
            for cause in e.chain().skip(1) {
                eprintln!("  caused by: {cause}");
            }
            EXIT_FAILURE
        }
    };

    std::process::exit(code);
}

fn dispatch(action: CliAction) -> Result<()> {
    match action {
        CliAction::ShowVersion => {
            display_version_info();
            Ok(())
        }
        CliAction::ShowHelp => {
            display_help();
            Ok(())
        }
        CliAction::ShowHelpDueToError => {
            display_help();
            std::process::exit(EXIT_FAILURE);
        }
        CliAction::Help { command } => commands::help::run_help_command(command.as_deref()),
        CliAction::Run {
            debug_enabled,
            config_dir,
        } => {
            heliotrack::config::set_config_dir(config_dir)?;
            Heliotrack::new(debug_enabled).run()
        }
        CliAction::Check {
            debug_enabled,
            config_dir,
        } => {
            heliotrack::config::set_config_dir(config_dir)?;
            commands::check::handle_check_command(debug_enabled)
        }
        CliAction::Status {
            debug_enabled,
            config_dir,
        } => {
            heliotrack::config::set_config_dir(config_dir)?;
            commands::status::handle_status_command(debug_enabled)
        }
        CliAction::Simulate {
            debug_enabled,
            start_time,
            end_time,
            multiplier,
            log_to_file,
            config_dir,
        } => {
            heliotrack::config::set_config_dir(config_dir)?;
            let mut guards = commands::simulate::handle_simulate_command(
                &start_time,
                &end_time,
                multiplier,
                debug_enabled,
                log_to_file,
            )
            .inspect_err(|_| commands::help::show_command_usage("simulate"))?;

            Heliotrack::new(debug_enabled)
                .without_lock()
                .without_headers()
                .simulated()
                .run()?;

            guards.complete_simulation();
            Ok(())
        }
    }
}
