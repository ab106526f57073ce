// External I/O operations module
pub mod day_log; // Per-day event log files
pub mod lock; // Single-instance lock file
pub mod signals; // Unix signal handling
