//! Command-line argument parsing and processing.
//!
//! Flags may appear anywhere on the command line; the first non-flag argument
//! selects the command and the ones after it are that command's arguments.
//! Without a command heliotrack runs the scheduler.

/// Default acceleration for `simulate` when no multiplier is given.
pub const DEFAULT_SIMULATION_MULTIPLIER: f64 = 3600.0;

/// Represents the parsed command-line arguments and their intended actions.
#[derive(Debug, PartialEq)]
pub enum CliAction {
    /// Run the scheduler
    Run {
        debug_enabled: bool,
        config_dir: Option<String>,
    },
    /// Validate the configuration and print today's schedule
    Check {
        debug_enabled: bool,
        config_dir: Option<String>,
    },
    /// Query the configured mount once
    Status {
        debug_enabled: bool,
        config_dir: Option<String>,
    },
    /// Replay a time range against the simulated mount
    Simulate {
        debug_enabled: bool,
        start_time: String,
        end_time: String,
        multiplier: f64, // 0 = fast-forward
        log_to_file: bool,
        config_dir: Option<String>,
    },
    /// Detailed help for one command, or the command overview
    Help { command: Option<String> },

    /// Display help information and exit
    ShowHelp,
    /// Display version information and exit
    ShowVersion,
    /// Show help due to unknown arguments and exit
    ShowHelpDueToError,
}

/// Result of parsing command-line arguments.
pub struct ParsedArgs {
    pub action: CliAction,
}

impl ParsedArgs {
    /// Parse command-line arguments into a structured result.
    ///
    /// The first item is the program name and is skipped.
    pub fn parse<I, S>(args: I) -> ParsedArgs
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args_vec: Vec<String> = args
            .into_iter()
            .skip(1)
            .map(|s| s.as_ref().to_string())
            .collect();

        let mut debug_enabled = false;
        let mut display_help = false;
        let mut display_version = false;
        let mut log_to_file = false;
        let mut fast_forward = false;
        let mut unknown_arg_found = false;
        let mut config_dir: Option<String> = None;
        let mut positional: Vec<String> = Vec::new();

        let mut i = 0;
        while i < args_vec.len() {
            let arg = &args_vec[i];
            match arg.as_str() {
                "--help" | "-h" => display_help = true,
                "--version" | "-V" | "-v" => display_version = true,
                "--debug" | "-d" => debug_enabled = true,
                "--log" => log_to_file = true,
                "--fast-forward" => fast_forward = true,
                "--config" | "-c" => {
                    // Parse: --config <directory>
                    if i + 1 < args_vec.len() && !args_vec[i + 1].starts_with('-') {
                        config_dir = Some(args_vec[i + 1].clone());
                        i += 1;
                    } else {
                        log_warning!("Missing directory for --config. Usage: --config <directory>");
                        unknown_arg_found = true;
                    }
                }
                other if other.starts_with('-') && other.parse::<f64>().is_err() => {
                    log_warning!("Unknown option: {other}");
                    unknown_arg_found = true;
                }
                _ => positional.push(arg.clone()),
            }
            i += 1;
        }

        // Version and help take precedence over everything else
        if display_version {
            return ParsedArgs {
                action: CliAction::ShowVersion,
            };
        }
        if unknown_arg_found {
            return ParsedArgs {
                action: CliAction::ShowHelpDueToError,
            };
        }
        if display_help {
            return ParsedArgs {
                action: CliAction::ShowHelp,
            };
        }

        let (command, rest) = match positional.split_first() {
            Some((command, rest)) => (command.as_str(), rest),
            None => ("run", &[][..]),
        };

        let takes_no_arguments = |name: &str| {
            if rest.is_empty() {
                true
            } else {
                log_warning!("'{name}' takes no arguments, got: {}", rest.join(" "));
                false
            }
        };

        let action = match command {
            "run" if takes_no_arguments("run") => CliAction::Run {
                debug_enabled,
                config_dir,
            },
            "check" | "c" if takes_no_arguments("check") => CliAction::Check {
                debug_enabled,
                config_dir,
            },
            "status" | "s" if takes_no_arguments("status") => CliAction::Status {
                debug_enabled,
                config_dir,
            },
            "help" | "h" => match rest {
                [] => CliAction::Help { command: None },
                [name] => CliAction::Help {
                    command: Some(name.clone()),
                },
                _ => CliAction::ShowHelpDueToError,
            },
            "simulate" | "S" => parse_simulate(rest, fast_forward)
                .map(|(start_time, end_time, multiplier)| CliAction::Simulate {
                    debug_enabled,
                    start_time,
                    end_time,
                    multiplier,
                    log_to_file,
                    config_dir,
                })
                .unwrap_or(CliAction::ShowHelpDueToError),
            "run" | "check" | "c" | "status" | "s" => CliAction::ShowHelpDueToError,
            unknown => {
                log_warning!("Unknown command: {unknown}");
                CliAction::ShowHelpDueToError
            }
        };

        ParsedArgs { action }
    }

    /// Convenience method to parse from std::env::args()
    pub fn from_env() -> ParsedArgs {
        Self::parse(std::env::args())
    }
}

/// Check the shape of `simulate <start> <end> [multiplier]`.
///
/// Full datetime parsing happens in the simulate command, which knows the
/// schedule timezone.
fn parse_simulate(rest: &[String], fast_forward: bool) -> Option<(String, String, f64)> {
    // Rough "YYYY-MM-DD HH:MM:SS" check
    let looks_like_datetime = |s: &str| {
        s.len() == 19
            && s.chars().nth(4) == Some('-')
            && s.chars().nth(7) == Some('-')
            && s.chars().nth(10) == Some(' ')
            && s.chars().nth(13) == Some(':')
            && s.chars().nth(16) == Some(':')
    };

    let (start, end, multiplier) = match rest {
        [start, end] => (start, end, None),
        [start, end, multiplier] => (start, end, Some(multiplier)),
        _ => {
            log_warning!(
                "Usage: heliotrack simulate \"YYYY-MM-DD HH:MM:SS\" \"YYYY-MM-DD HH:MM:SS\" [multiplier] [--fast-forward] [--log]"
            );
            return None;
        }
    };

    for (name, value) in [("start", start), ("end", end)] {
        if !looks_like_datetime(value) {
            log_error!("Invalid {name} time format: '{value}'. Use YYYY-MM-DD HH:MM:SS");
            return None;
        }
    }

    let multiplier = match multiplier {
        None if fast_forward => 0.0,
        None => DEFAULT_SIMULATION_MULTIPLIER,
        Some(value) => match value.parse::<f64>() {
            Ok(mult) if mult.is_finite() && mult >= 0.0 => mult,
            _ => {
                log_error!("Invalid multiplier: {value}. Use 0 for fast-forward or a positive factor");
                return None;
            }
        },
    };

    Some((start.clone(), end.clone(), multiplier))
}

/// Displays version information using custom logging style.
pub fn display_version_info() {
    log_version!();
    log_pipe!();
    println!("┗ {}", env!("CARGO_PKG_DESCRIPTION"));
}

/// Displays custom help message using logger methods.
pub fn display_help() {
    log_version!();
    log_block_start!(env!("CARGO_PKG_DESCRIPTION"));
    log_block_start!("Usage:");
    log_indented!("heliotrack [OPTIONS] [COMMAND]");
    log_block_start!("Options:");
    log_indented!("-c, --config <dir>     Use custom configuration directory");
    log_indented!("-d, --debug            Enable detailed debug output");
    log_indented!("-h, --help             Print help information");
    log_indented!("-V, --version          Print version information");
    log_block_start!("Commands:");
    log_indented!("run                    Run the daily scheduler (default)");
    log_indented!("check, c               Validate configuration and show today's schedule");
    log_indented!("status, s              Query the mount and the target position once");
    log_indented!("simulate, S <start> <end> [multiplier] [--log]");
    log_indented!("                       Replay a time range against the simulated mount");
    log_indented!("help, h [COMMAND]      Show detailed help for a command");
    log_end!();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliAction {
        ParsedArgs::parse(args.iter().copied()).action
    }

    #[test]
    fn test_parse_no_args() {
        assert_eq!(
            parse(&["heliotrack"]),
            CliAction::Run {
                debug_enabled: false,
                config_dir: None,
            }
        );
    }

    #[test]
    fn test_parse_debug_flag() {
        assert_eq!(
            parse(&["heliotrack", "-d", "run"]),
            CliAction::Run {
                debug_enabled: true,
                config_dir: None,
            }
        );
    }

    #[test]
    fn test_parse_config_dir_anywhere() {
        assert_eq!(
            parse(&["heliotrack", "check", "--config", "/etc/heliotrack"]),
            CliAction::Check {
                debug_enabled: false,
                config_dir: Some("/etc/heliotrack".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_missing_config_dir() {
        assert_eq!(
            parse(&["heliotrack", "--config"]),
            CliAction::ShowHelpDueToError
        );
    }

    #[test]
    fn test_parse_help_and_version() {
        assert_eq!(parse(&["heliotrack", "--help"]), CliAction::ShowHelp);
        assert_eq!(parse(&["heliotrack", "-h", "-V"]), CliAction::ShowVersion);
        assert_eq!(
            parse(&["heliotrack", "help", "simulate"]),
            CliAction::Help {
                command: Some("simulate".to_string())
            }
        );
    }

    #[test]
    fn test_parse_unknown_flag_and_command() {
        assert_eq!(
            parse(&["heliotrack", "--frobnicate"]),
            CliAction::ShowHelpDueToError
        );
        assert_eq!(
            parse(&["heliotrack", "point"]),
            CliAction::ShowHelpDueToError
        );
        assert_eq!(
            parse(&["heliotrack", "status", "extra"]),
            CliAction::ShowHelpDueToError
        );
    }

    #[test]
    fn test_parse_simulate_defaults() {
        assert_eq!(
            parse(&[
                "heliotrack",
                "simulate",
                "2026-03-20 10:59:00",
                "2026-03-20 20:01:00",
            ]),
            CliAction::Simulate {
                debug_enabled: false,
                start_time: "2026-03-20 10:59:00".to_string(),
                end_time: "2026-03-20 20:01:00".to_string(),
                multiplier: DEFAULT_SIMULATION_MULTIPLIER,
                log_to_file: false,
                config_dir: None,
            }
        );
    }

    #[test]
    fn test_parse_simulate_fast_forward_with_log() {
        let expected = CliAction::Simulate {
            debug_enabled: true,
            start_time: "2026-03-20 10:59:00".to_string(),
            end_time: "2026-03-20 20:01:00".to_string(),
            multiplier: 0.0,
            log_to_file: true,
            config_dir: None,
        };
        assert_eq!(
            parse(&[
                "heliotrack",
                "-d",
                "simulate",
                "2026-03-20 10:59:00",
                "2026-03-20 20:01:00",
                "0",
                "--log",
            ]),
            expected
        );
        assert_eq!(
            parse(&[
                "heliotrack",
                "simulate",
                "2026-03-20 10:59:00",
                "2026-03-20 20:01:00",
                "--fast-forward",
                "--log",
                "--debug",
            ]),
            expected
        );
    }

    #[test]
    fn test_parse_simulate_rejects_bad_input() {
        assert_eq!(
            parse(&["heliotrack", "simulate", "2026-03-20 10:59:00"]),
            CliAction::ShowHelpDueToError
        );
        assert_eq!(
            parse(&["heliotrack", "simulate", "10:59", "20:01"]),
            CliAction::ShowHelpDueToError
        );
        assert_eq!(
            parse(&[
                "heliotrack",
                "simulate",
                "2026-03-20 10:59:00",
                "2026-03-20 20:01:00",
                "-5",
            ]),
            CliAction::ShowHelpDueToError
        );
    }
}
