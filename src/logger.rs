//! Console logging with the box-drawing layout used throughout heliotrack.
//!
//! Every message goes through [`emit`], which renders one [`Line`] variant and
//! hands the text to [`write_output`]. Output normally lands on stdout; while a
//! [`LoggerGuard`] is alive (`simulate --log`) it is routed to a file through a
//! background writer thread with ANSI colors stripped.
//!
//! ## Logging Conventions
//!
//! - **`log_block_start!`**: opens a new conceptual block (phase change, a new
//!   operating day, startup steps). Prints an empty pipe `┃` then `┣ message`.
//! - **`log_decorated!`**: continues the current block with `┣ message`.
//! - **`log_indented!`**: nested details under the previous line, `┃   message`.
//! - **`log_pipe!`**: a bare `┃` for spacing, used before the semantic macros
//!   when they start their own block.
//! - **`log_version!`** / **`log_end!`**: the startup header and final marker.
//! - **`log_info!`, `log_warning!`, `log_error!`, `log_debug!`**: leveled lines
//!   with a colored `[LEVEL]` tag. The day log mirrors its entries through these.
//! - **`log_error_exit!`**: an error that terminates the current flow, drawn with
//!   the closing corner `┗`.
//!
//! In simulation mode every line is prefixed with the simulated wall-clock time
//! so a fast-forwarded day still reads like a real one.

use std::io::Write;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Sender, channel};

static LOGGING_ENABLED: AtomicBool = AtomicBool::new(true);

// Timezone the schedule is expressed in, for dual simulation timestamps
static SCHEDULE_TIMEZONE: OnceLock<Option<chrono_tz::Tz>> = OnceLock::new();

// Channel for routing output to file when --log is active
static LOG_CHANNEL: OnceLock<Option<Sender<LogMessage>>> = OnceLock::new();

enum LogMessage {
    Formatted(String),
    Shutdown,
}

/// The kinds of line the logging macros can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    Decorated,
    Indented,
    Pipe,
    BlockStart,
    Version,
    End,
    Info,
    Warning,
    Error,
    ErrorExit,
    Debug,
}

impl Line {
    /// Render a message for this line kind with the given timestamp prefix.
    pub fn render(self, prefix: &str, message: &str) -> String {
        match self {
            Line::Decorated => format!("{prefix}┣ {message}\n"),
            Line::Indented => format!("{prefix}┃   {message}\n"),
            Line::Pipe => format!("{prefix}┃\n"),
            Line::BlockStart => format!("{prefix}┃\n{prefix}┣ {message}\n"),
            Line::Version => format!(
                "{prefix}┏ heliotrack v{} ━━╸\n",
                env!("CARGO_PKG_VERSION")
            ),
            Line::End => format!("{prefix}╹\n"),
            Line::Info => format!("{prefix}┣[\x1b[32mINFO\x1b[0m] {message}\n"),
            Line::Warning => format!("{prefix}┣[\x1b[33mWARNING\x1b[0m] {message}\n"),
            Line::Error => format!("{prefix}┣[\x1b[31mERROR\x1b[0m] {message}\n"),
            Line::ErrorExit => format!("{prefix}┃\n{prefix}┗[\x1b[31mERROR\x1b[0m] {message}\n"),
            Line::Debug => format!("{prefix}┣[\x1b[36mDEBUG\x1b[0m] {message}\n"),
        }
    }
}

/// Global switches for the console logger.
pub struct Log;

impl Log {
    /// Enable or disable logging, e.g. to keep test output quiet.
    pub fn set_enabled(enabled: bool) {
        LOGGING_ENABLED.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled() -> bool {
        LOGGING_ENABLED.load(Ordering::SeqCst)
    }

    /// Record the schedule timezone so simulation timestamps can show it.
    pub fn set_schedule_timezone(tz: Option<chrono_tz::Tz>) {
        let _ = SCHEDULE_TIMEZONE.set(tz);
    }

    fn schedule_timezone() -> Option<chrono_tz::Tz> {
        SCHEDULE_TIMEZONE.get().and_then(|tz| *tz)
    }

    /// Start routing all console output to `file_path`.
    pub fn start_file_logging(file_path: String) -> anyhow::Result<LoggerGuard> {
        let (tx, rx) = channel();

        LOG_CHANNEL
            .set(Some(tx.clone()))
            .map_err(|_| anyhow::anyhow!("Logger channel already initialized"))?;

        let handle = std::thread::spawn(move || {
            let mut file = std::fs::File::create(&file_path)?;
            loop {
                match rx.recv() {
                    Ok(LogMessage::Formatted(text)) => file.write_all(text.as_bytes())?,
                    Ok(LogMessage::Shutdown) | Err(_) => {
                        file.flush()?;
                        break;
                    }
                }
            }
            Ok::<(), anyhow::Error>(())
        });

        Ok(LoggerGuard {
            tx,
            handle: Some(handle),
        })
    }

    /// Timestamp prefix for simulation mode, empty in real time.
    ///
    /// With a schedule timezone that differs from local time both clocks are
    /// shown as `[HH:MM:SSS] [HH:MM:SSL]`.
    pub fn get_timestamp_prefix() -> String {
        if !(crate::time::source::is_initialized() && crate::time::source::is_simulated()) {
            return String::new();
        }

        let local_now = crate::time::source::now();
        let local_str = local_now.format("%H:%M:%S").to_string();

        match Self::schedule_timezone() {
            Some(tz) => {
                let schedule_str = local_now.with_timezone(&tz).format("%H:%M:%S").to_string();
                if schedule_str != local_str {
                    format!("[{schedule_str}S] [{local_str}L] ")
                } else {
                    format!("[{local_str}] ")
                }
            }
            None => format!("[{local_str}] "),
        }
    }
}

/// Keeps the file writer thread alive; flushes and joins it on drop.
pub struct LoggerGuard {
    tx: Sender<LogMessage>,
    handle: Option<std::thread::JoinHandle<anyhow::Result<()>>>,
}

impl Drop for LoggerGuard {
    fn drop(&mut self) {
        let _ = self.tx.send(LogMessage::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Remove `ESC [ ... m` color sequences.
fn strip_ansi_codes(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '\x1b' && chars.peek() == Some(&'[') {
            chars.next();
            for ch in chars.by_ref() {
                if ch == 'm' {
                    break;
                }
            }
        } else {
            result.push(ch);
        }
    }

    result
}

/// Route rendered text to the log file (when active) or stdout.
pub fn write_output(text: &str) {
    if let Some(Some(tx)) = LOG_CHANNEL.get() {
        let _ = tx.send(LogMessage::Formatted(strip_ansi_codes(text)));
    } else {
        print!("{text}");
        let _ = std::io::stdout().flush();
    }
}

/// Render and write one line. The message is only built when logging is on.
pub fn emit(line: Line, message: impl FnOnce() -> String) {
    if Log::is_enabled() {
        let prefix = Log::get_timestamp_prefix();
        write_output(&line.render(&prefix, &message()));
    }
}

// # Logging Macros

/// Continue the current block: `┣ message`.
#[macro_export]
macro_rules! log_decorated {
    ($fmt:literal $($arg:tt)*) => {
        $crate::logger::emit($crate::logger::Line::Decorated, || format!($fmt $($arg)*))
    };
    ($expr:expr) => {
        $crate::logger::emit($crate::logger::Line::Decorated, || $expr.to_string())
    };
}

/// Nested detail: `┃   message`.
#[macro_export]
macro_rules! log_indented {
    ($fmt:literal $($arg:tt)*) => {
        $crate::logger::emit($crate::logger::Line::Indented, || format!($fmt $($arg)*))
    };
    ($expr:expr) => {
        $crate::logger::emit($crate::logger::Line::Indented, || $expr.to_string())
    };
}

/// Vertical spacer: `┃`.
#[macro_export]
macro_rules! log_pipe {
    () => {
        $crate::logger::emit($crate::logger::Line::Pipe, String::new)
    };
}

/// Open a new block: `┃` then `┣ message`.
#[macro_export]
macro_rules! log_block_start {
    ($fmt:literal $($arg:tt)*) => {
        $crate::logger::emit($crate::logger::Line::BlockStart, || format!($fmt $($arg)*))
    };
    ($expr:expr) => {
        $crate::logger::emit($crate::logger::Line::BlockStart, || $expr.to_string())
    };
}

/// Startup header.
#[macro_export]
macro_rules! log_version {
    () => {
        $crate::logger::emit($crate::logger::Line::Version, String::new)
    };
}

/// Final termination marker.
#[macro_export]
macro_rules! log_end {
    () => {
        $crate::logger::emit($crate::logger::Line::End, String::new)
    };
}

#[macro_export]
macro_rules! log_info {
    ($fmt:literal $($arg:tt)*) => {
        $crate::logger::emit($crate::logger::Line::Info, || format!($fmt $($arg)*))
    };
    ($expr:expr) => {
        $crate::logger::emit($crate::logger::Line::Info, || $expr.to_string())
    };
}

#[macro_export]
macro_rules! log_warning {
    ($fmt:literal $($arg:tt)*) => {
        $crate::logger::emit($crate::logger::Line::Warning, || format!($fmt $($arg)*))
    };
    ($expr:expr) => {
        $crate::logger::emit($crate::logger::Line::Warning, || $expr.to_string())
    };
}

#[macro_export]
macro_rules! log_error {
    ($fmt:literal $($arg:tt)*) => {
        $crate::logger::emit($crate::logger::Line::Error, || format!($fmt $($arg)*))
    };
    ($expr:expr) => {
        $crate::logger::emit($crate::logger::Line::Error, || $expr.to_string())
    };
}

/// An error that ends the current flow, drawn with the closing corner.
#[macro_export]
macro_rules! log_error_exit {
    ($fmt:literal $($arg:tt)*) => {
        $crate::logger::emit($crate::logger::Line::ErrorExit, || format!($fmt $($arg)*))
    };
    ($expr:expr) => {
        $crate::logger::emit($crate::logger::Line::ErrorExit, || $expr.to_string())
    };
}

#[macro_export]
macro_rules! log_debug {
    ($fmt:literal $($arg:tt)*) => {
        $crate::logger::emit($crate::logger::Line::Debug, || format!($fmt $($arg)*))
    };
    ($expr:expr) => {
        $crate::logger::emit($crate::logger::Line::Debug, || $expr.to_string())
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_block_start_repeats_prefix() {
        let text = Line::BlockStart.render("[11:00:00] ", "Phase: Tracking");
        assert_eq!(text, "[11:00:00] ┃\n[11:00:00] ┣ Phase: Tracking\n");
    }

    #[test]
    fn test_render_levels_carry_tags() {
        assert!(Line::Info.render("", "x").contains("INFO"));
        assert!(Line::Warning.render("", "x").contains("WARNING"));
        assert!(Line::ErrorExit.render("", "x").contains("┗"));
    }

    #[test]
    fn test_strip_ansi_codes() {
        let colored = Line::Error.render("", "slew failed");
        assert_eq!(strip_ansi_codes(&colored), "┣[ERROR] slew failed\n");
        assert_eq!(strip_ansi_codes("plain \x1b text"), "plain \x1b text");
    }
}
