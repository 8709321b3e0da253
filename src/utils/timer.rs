//! Wall-clock timing for experiment stages

use std::time::{Duration, Instant};
use tracing::info;

/// Timer for measuring execution time
#[derive(Debug)]
pub struct Timer {
    name: String,
    start: Instant,
    checkpoints: Vec<(String, Duration)>,
}

impl Timer {
    /// Create and start a new timer
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: Instant::now(),
            checkpoints: Vec::new(),
        }
    }

    /// Record a named checkpoint and log the time since the previous one
    pub fn checkpoint(&mut self, name: impl Into<String>) {
        let name = name.into();
        let now = self.start.elapsed();
        let prev = self.checkpoints.last().map(|(_, t)| *t).unwrap_or(Duration::ZERO);
        info!(
            timer = %self.name,
            "{} after {:.3}s (+{:.3}s)",
            name,
            now.as_secs_f64(),
            (now - prev).as_secs_f64()
        );
        self.checkpoints.push((name, now));
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    /// Stop and log the timer
    pub fn stop(self) -> Duration {
        let elapsed = self.start.elapsed();
        info!("{} completed in {:.3}s", self.name, elapsed.as_secs_f64());
        elapsed
    }
}
