//! # Heliotrack Library
//!
//! Internal library for the heliotrack binary: an unattended daily scheduler
//! that keeps a solar telescope mount pointed at the sun.
//!
//! This library exists to enable testing of the scheduler internals and to
//! keep CLI dispatch (main.rs) separate from application logic.
//!
//! ## Architecture
//!
//! - **Entry Point**: `Heliotrack` provides the application API with resource management
//! - **Core Logic**: `core` derives the phase each tick and runs at most one guarded action
//! - **Devices**: `mount` with TheSkyX and simulated gateways, `solar` with sun locators
//! - **Configuration**: `config` module for TOML-based settings
//! - **Commands**: `commands` module for CLI subcommands (check, status, simulate)
//! - **Infrastructure**: day logs, lock file, signal handling, time source and console logging

// Import macros from logger module for use in all submodules
#[macro_use]
pub mod logger;

pub mod args;
pub mod commands;
pub mod common;
pub mod config;
pub mod core;
pub mod error;
pub mod io;
pub mod mount;
pub mod solar;
pub mod time;

mod heliotrack;

// Re-export for binary
pub use heliotrack::Heliotrack;
