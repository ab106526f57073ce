//! Time handling: the swappable global time source and per-tick clock readings.

pub mod clock;
pub mod source;

pub use clock::ClockReading;
