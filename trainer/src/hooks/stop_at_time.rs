use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use super::{Hook, RunContext, RunValues};
use crate::{
    Result,
    clock::{Clock, system_clock},
};

/// Requests a stop once a wall-clock budget is spent.
#[derive(Debug)]
pub struct StopAtTimeHook {
    budget: Duration,
    clock: Arc<dyn Clock>,
    deadline: Option<Instant>,
}

impl StopAtTimeHook {
    /// Creates a new `StopAtTimeHook` reading the system clock.
    ///
    /// # Arguments
    /// * `budget` - For how long the run may go on, counted from `begin`.
    pub fn new(budget: Duration) -> Self {
        Self::with_clock(budget, system_clock())
    }

    pub fn with_clock(budget: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            budget,
            clock,
            deadline: None,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

impl Hook for StopAtTimeHook {
    fn begin(&mut self) -> Result<()> {
        self.deadline = Some(self.clock.now() + self.budget);
        Ok(())
    }

    fn after_run(&mut self, ctx: &mut RunContext, _values: &RunValues) -> Result<()> {
        // Exactly at the deadline still runs.
        if self.deadline.is_some_and(|deadline| self.clock.now() > deadline) {
            ctx.request_stop();
        }

        Ok(())
    }
}
