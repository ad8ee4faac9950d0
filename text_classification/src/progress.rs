use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use log::info;
use machine_learning::metrics::MetricValues;
use trainer::Clock;

/// Where training stands after a step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub step: u64,
    pub loss: f32,
    pub learning_rate: f32,
    pub metrics: MetricValues,
}

impl Progress {
    /// The progress line, `elapsed` being the time since training started.
    pub fn line(&self, elapsed: Duration) -> String {
        format!(
            "step: {}  loss: {:.4}  learning_rate = {:.6}  elapsed seconds: {}  {}",
            self.step,
            self.loss,
            self.learning_rate,
            format_elapsed(elapsed),
            self.metrics
        )
    }
}

/// Formats a duration as `H:MM:SS`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60)
}

/// Logs training progress at most once per period.
#[derive(Debug)]
pub struct ProgressLogger {
    period: Duration,
    clock: Arc<dyn Clock>,
    started: Instant,
    last_logged: Instant,
    lines: usize,
}

impl ProgressLogger {
    /// Creates a new `ProgressLogger`, counting time from now.
    ///
    /// # Arguments
    /// * `period` - How long to wait between lines.
    /// * `clock` - Where time comes from.
    pub fn new(period: Duration, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();

        Self {
            period,
            clock,
            started: now,
            last_logged: now,
            lines: 0,
        }
    }

    /// Logs `progress` if strictly more than a period went by since the last line.
    ///
    /// # Returns
    /// The logged line, if any.
    pub fn log(&mut self, progress: &Progress) -> Option<String> {
        let now = self.clock.now();
        if now.duration_since(self.last_logged) <= self.period {
            return None;
        }

        self.last_logged = now;
        self.lines += 1;

        let line = progress.line(now.duration_since(self.started));
        info!("{line}");
        Some(line)
    }

    /// The amount of lines logged so far.
    pub fn lines(&self) -> usize {
        self.lines
    }
}
