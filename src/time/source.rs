//! Time source abstraction for real and simulated time.
//!
//! Everything time-dependent in heliotrack (the tick clock, the slew settle
//! wait, day-log timestamps) reads and sleeps through this module so that a
//! whole operating day can be replayed in seconds by the `simulate` command.

use chrono::{DateTime, Duration as ChronoDuration, Local, TimeZone};
use once_cell::sync::OnceCell;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration as StdDuration;

/// Global time source instance, defaults to RealTimeSource
static TIME_SOURCE: OnceCell<Arc<dyn TimeSource>> = OnceCell::new();

pub trait TimeSource: Send + Sync {
    fn now(&self) -> DateTime<Local>;

    /// Sleep for the specified duration (or simulate it)
    fn sleep(&self, duration: StdDuration);

    fn is_simulated(&self) -> bool;

    /// Check if simulation has ended (always false for real time)
    fn is_ended(&self) -> bool {
        false
    }
}

/// Wall-clock time.
pub struct RealTimeSource;

impl TimeSource for RealTimeSource {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }

    fn sleep(&self, duration: StdDuration) {
        std::thread::sleep(duration);
    }

    fn is_simulated(&self) -> bool {
        false
    }
}

/// Simulated time between a start and an end instant.
///
/// With a positive multiplier time flows continuously (`60.0` = one simulated
/// minute per real second). A multiplier of `0.0` selects fast-forward: each
/// sleep advances the clock by exactly the requested duration and returns
/// almost immediately.
pub struct SimulatedTimeSource {
    start_time: DateTime<Local>,
    end_time: DateTime<Local>,
    time_multiplier: f64,
    /// Simulated time elapsed through completed sleeps
    elapsed: Mutex<StdDuration>,
}

impl SimulatedTimeSource {
    pub fn new(start_time: DateTime<Local>, end_time: DateTime<Local>, multiplier: f64) -> Self {
        Self {
            start_time,
            end_time,
            time_multiplier: if multiplier < 0.0 { 3600.0 } else { multiplier },
            elapsed: Mutex::new(StdDuration::ZERO),
        }
    }

    fn elapsed(&self) -> StdDuration {
        *self.elapsed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current_time(&self) -> DateTime<Local> {
        let elapsed = ChronoDuration::from_std(self.elapsed())
            .unwrap_or_else(|_| ChronoDuration::days(36_500));
        self.start_time
            .checked_add_signed(elapsed)
            .map_or(self.end_time, |t| t.min(self.end_time))
    }

    fn is_fast_forward(&self) -> bool {
        self.time_multiplier == 0.0
    }
}

impl TimeSource for SimulatedTimeSource {
    fn now(&self) -> DateTime<Local> {
        self.current_time()
    }

    fn sleep(&self, duration: StdDuration) {
        // Never sleep past the end of the simulation
        let remaining = (self.end_time - self.current_time())
            .to_std()
            .unwrap_or(StdDuration::ZERO);
        let step = duration.min(remaining);

        if self.is_fast_forward() {
            // Yield briefly so the log writer thread keeps up
            std::thread::sleep(StdDuration::from_millis(1));
        } else if !step.is_zero() {
            std::thread::sleep(step.div_f64(self.time_multiplier));
        }

        let mut elapsed = self.elapsed.lock().unwrap_or_else(PoisonError::into_inner);
        *elapsed += step;
    }

    fn is_simulated(&self) -> bool {
        true
    }

    fn is_ended(&self) -> bool {
        self.current_time() >= self.end_time
    }
}

/// Initialize the global time source (call once at startup)
pub fn init_time_source(source: Arc<dyn TimeSource>) {
    TIME_SOURCE.set(source).ok();
}

pub fn is_initialized() -> bool {
    TIME_SOURCE.get().is_some()
}

fn source() -> &'static Arc<dyn TimeSource> {
    TIME_SOURCE.get_or_init(|| Arc::new(RealTimeSource))
}

pub fn now() -> DateTime<Local> {
    source().now()
}

pub fn sleep(duration: StdDuration) {
    source().sleep(duration)
}

pub fn is_simulated() -> bool {
    source().is_simulated()
}

pub fn simulation_ended() -> bool {
    source().is_ended()
}

/// Parse a datetime string in the format "YYYY-MM-DD HH:MM:SS" as local time.
pub fn parse_datetime(s: &str) -> Result<DateTime<Local>, String> {
    let naive = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map_err(|e| format!("Invalid datetime format: {e}. Use YYYY-MM-DD HH:MM:SS"))?;
    Local
        .from_local_datetime(&naive)
        .single()
        .ok_or_else(|| "Ambiguous or invalid local time".to_string())
}

/// Parse a datetime string in a specific timezone and convert it to local time.
pub fn parse_datetime_in_tz(s: &str, tz: chrono_tz::Tz) -> Result<DateTime<Local>, String> {
    let naive = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map_err(|e| format!("Invalid datetime format: {e}. Use YYYY-MM-DD HH:MM:SS"))?;
    tz.from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Local))
        .ok_or_else(|| format!("Ambiguous or invalid time in timezone {tz}"))
}
