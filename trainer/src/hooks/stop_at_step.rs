use log::debug;

use super::{Hook, RunContext, RunValues};
use crate::{Result, settings::StepBudget};

/// Requests a stop once the global step reaches a budget.
#[derive(Debug, Clone)]
pub struct StopAtStepHook {
    budget: StepBudget,
    last_step: Option<u64>,
}

impl StopAtStepHook {
    pub fn new(budget: StepBudget) -> Self {
        let last_step = match budget {
            StepBudget::Absolute(max_steps) => Some(max_steps),
            StepBudget::Relative(_) => None,
        };

        Self { budget, last_step }
    }

    /// The global step at which the run stops, known once the session exists.
    pub fn last_step(&self) -> Option<u64> {
        self.last_step
    }
}

impl Hook for StopAtStepHook {
    fn after_create_session(&mut self, ctx: &mut RunContext, global_step: u64) -> Result<()> {
        let last_step = match self.budget {
            StepBudget::Relative(num_steps) => global_step.saturating_add(num_steps.get()),
            StepBudget::Absolute(max_steps) => max_steps,
        };
        self.last_step = Some(last_step);

        debug!(global_step = global_step, last_step = last_step; "step budget");

        if global_step >= last_step {
            ctx.request_stop();
        }

        Ok(())
    }

    fn after_run(&mut self, ctx: &mut RunContext, values: &RunValues) -> Result<()> {
        if self.last_step.is_some_and(|last| values.global_step >= last) {
            ctx.request_stop();
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU64;

    use super::*;

    #[test]
    fn relative_budget_counts_from_the_session_step() {
        let mut hook = StopAtStepHook::new(StepBudget::Relative(NonZeroU64::new(5).unwrap()));
        let mut ctx = RunContext::new();
        hook.after_create_session(&mut ctx, 10).unwrap();

        assert_eq!(hook.last_step(), Some(15));
        assert!(!ctx.stop_requested());

        hook.after_run(&mut ctx, &RunValues::new(14)).unwrap();
        assert!(!ctx.stop_requested());
        hook.after_run(&mut ctx, &RunValues::new(15)).unwrap();
        assert!(ctx.stop_requested());
    }

    #[test]
    fn absolute_budget_already_met_stops_immediately() {
        let mut hook = StopAtStepHook::new(StepBudget::Absolute(3));
        let mut ctx = RunContext::new();
        hook.after_create_session(&mut ctx, 3).unwrap();

        assert!(ctx.stop_requested());
    }
}
