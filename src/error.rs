//! Failure taxonomy for device, lookup, and log operations.
//!
//! These errors never escape an action handler: the scheduler logs them and
//! turns them into a failed outcome that the next tick retries.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ActionError {
    /// The mount (or the program driving it) could not be reached.
    #[error("mount unreachable: {0}")]
    Connection(String),

    /// A command needs a connected mount.
    #[error("mount not connected")]
    NotConnected,

    /// The celestial body could not be resolved.
    #[error("object '{0}' not found")]
    Lookup(String),

    /// A motion command was rejected or did not complete.
    #[error("slew to {label} failed: {reason}")]
    Slew { label: String, reason: String },

    /// The local solar position calculation rejected its inputs.
    #[error("solar position unavailable: {0}")]
    Ephemeris(String),

    /// The driver answered with something we could not interpret.
    #[error("unexpected reply from driver: {0}")]
    Protocol(String),

    /// The day log could not be written.
    #[error("log file inaccessible: {0}")]
    LogIo(#[source] std::io::Error),
}

impl ActionError {
    pub fn slew(label: &str, reason: impl Into<String>) -> Self {
        Self::Slew {
            label: label.to_string(),
            reason: reason.into(),
        }
    }
}

pub type ActionResult<T> = std::result::Result<T, ActionError>;
