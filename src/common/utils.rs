//! Small shared helpers for path display, coordinate formatting and the
//! simulation progress bar.

use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};

/// Render a path for logs with the home directory collapsed to `~`.
pub fn private_path(path: &Path) -> String {
    if let Some(home) = dirs::home_dir()
        && let Ok(stripped) = path.strip_prefix(&home)
    {
        return format!("~/{}", stripped.display());
    }
    path.display().to_string()
}

/// Format right ascension hours as `HHh MMm SS.Ss`.
pub fn format_ra(hours: f64) -> String {
    let hours = hours.rem_euclid(24.0);
    let h = hours.trunc();
    let minutes = (hours - h) * 60.0;
    let m = minutes.trunc();
    let s = (minutes - m) * 60.0;
    format!("{:02}h {:02}m {:04.1}s", h as u32, m as u32, s)
}

/// Format an angle in degrees as `±DD° MM' SS"`.
pub fn format_degrees(degrees: f64) -> String {
    let sign = if degrees < 0.0 { '-' } else { '+' };
    let abs = degrees.abs();
    let d = abs.trunc();
    let minutes = (abs - d) * 60.0;
    let m = minutes.trunc();
    let s = ((minutes - m) * 60.0).round().min(59.0);
    format!("{sign}{:02}° {:02}' {:02}\"", d as u32, m as u32, s as u32)
}

/// Single-line terminal progress bar, written straight to stdout.
///
/// It bypasses the logger so it stays on the terminal while `simulate --log`
/// routes everything else to a file.
pub struct ProgressBar {
    width: usize,
    last_drawn: Option<(usize, Instant)>,
}

impl ProgressBar {
    pub fn new(width: usize) -> Self {
        Self {
            width,
            last_drawn: None,
        }
    }

    /// Redraw at `progress` (0.0 to 1.0), skipping redraws that would not change the bar.
    pub fn update(&mut self, progress: f32, suffix: Option<&str>) {
        let filled = (progress.clamp(0.0, 1.0) * self.width as f32).round() as usize;
        if let Some((drawn, at)) = self.last_drawn
            && drawn == filled
            && at.elapsed() < Duration::from_secs(1)
        {
            return;
        }
        self.last_drawn = Some((filled, Instant::now()));

        let bar = format!(
            "{}{}",
            "█".repeat(filled),
            "░".repeat(self.width.saturating_sub(filled))
        );
        let percent = (progress.clamp(0.0, 1.0) * 100.0).round() as u32;
        let suffix = suffix.map(|s| format!(" {s}")).unwrap_or_default();

        print!("\r\x1B[K┣ [{bar}] {percent:>3}%{suffix}");
        let _ = std::io::stdout().flush();
    }

    /// Poll interval for the thread driving the bar.
    pub fn recommended_sleep(&self) -> Duration {
        Duration::from_millis(100)
    }
}
