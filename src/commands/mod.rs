//! Command-line command handlers for heliotrack.
//!
//! Each one-shot command lives in its own submodule; `run` is handled by
//! [`crate::Heliotrack`] directly.

pub mod check;
pub mod help;
pub mod simulate;
pub mod status;
