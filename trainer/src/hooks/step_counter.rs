use std::{num::NonZeroU64, sync::Arc, time::Instant};

use log::info;

use super::{Hook, RunContext, RunValues};
use crate::{Result, clock::Clock};

/// Logs the training speed every few steps.
#[derive(Debug)]
pub struct StepCounterHook {
    every_steps: NonZeroU64,
    clock: Arc<dyn Clock>,
    last: Option<(u64, Instant)>,
    last_rate: Option<f64>,
}

impl StepCounterHook {
    pub fn new(every_steps: NonZeroU64, clock: Arc<dyn Clock>) -> Self {
        Self {
            every_steps,
            clock,
            last: None,
            last_rate: None,
        }
    }

    /// The most recently logged `global_step/sec`.
    pub fn last_rate(&self) -> Option<f64> {
        self.last_rate
    }
}

impl Hook for StepCounterHook {
    fn after_create_session(&mut self, _ctx: &mut RunContext, global_step: u64) -> Result<()> {
        self.last = Some((global_step, self.clock.now()));
        Ok(())
    }

    fn after_run(&mut self, _ctx: &mut RunContext, values: &RunValues) -> Result<()> {
        let now = self.clock.now();
        let Some((last_step, last_time)) = self.last else {
            self.last = Some((values.global_step, now));
            return Ok(());
        };

        let steps = values.global_step.saturating_sub(last_step);
        if steps < self.every_steps.get() {
            return Ok(());
        }

        let secs = now.duration_since(last_time).as_secs_f64();
        if secs > 0. {
            let rate = steps as f64 / secs;
            info!(global_step = values.global_step; "global_step/sec: {rate:.4}");
            self.last_rate = Some(rate);
        }

        self.last = Some((values.global_step, now));
        Ok(())
    }
}
