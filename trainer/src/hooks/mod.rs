mod step_counter;
mod stop_at_step;
mod stop_at_time;
mod summary_saver;

use std::collections::BTreeMap;

pub use step_counter::StepCounterHook;
pub use stop_at_step::StopAtStepHook;
pub use stop_at_time::StopAtTimeHook;
pub use summary_saver::SummarySaverHook;

use crate::Result;

/// Callbacks invoked by the monitored session around a run.
///
/// Every method defaults to doing nothing.
pub trait Hook {
    /// Called once, before the session is created.
    fn begin(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called once the session exists and the global step is known (restored or zero).
    fn after_create_session(&mut self, ctx: &mut RunContext, global_step: u64) -> Result<()> {
        let _ = (ctx, global_step);
        Ok(())
    }

    fn before_run(&mut self, global_step: u64) -> Result<()> {
        let _ = global_step;
        Ok(())
    }

    /// Called after every successful step with what the step fetched.
    fn after_run(&mut self, ctx: &mut RunContext, values: &RunValues) -> Result<()> {
        let _ = (ctx, values);
        Ok(())
    }

    /// Called once when the session closes.
    fn end(&mut self, global_step: u64) -> Result<()> {
        let _ = global_step;
        Ok(())
    }
}

/// Lets hooks ask the session to stop.
#[derive(Debug, Default)]
pub struct RunContext {
    stop_requested: bool,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&mut self) {
        self.stop_requested = true;
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested
    }
}

/// What a single step produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RunValues {
    /// The global step after the run.
    pub global_step: u64,
    pub scalars: BTreeMap<String, f32>,
}

impl RunValues {
    pub fn new(global_step: u64) -> Self {
        Self {
            global_step,
            scalars: BTreeMap::new(),
        }
    }

    pub fn with_scalar(mut self, name: impl Into<String>, value: f32) -> Self {
        self.scalars.insert(name.into(), value);
        self
    }

    pub fn scalar(&self, name: &str) -> Option<f32> {
        self.scalars.get(name).copied()
    }
}

/// The hooks a trainer contributes to its session.
#[derive(Default)]
pub struct HookSet {
    /// Installed on every task.
    pub hooks: Vec<Box<dyn Hook>>,
    /// Installed on the chief only.
    pub chief_only: Vec<Box<dyn Hook>>,
}

impl HookSet {
    pub fn new(hooks: Vec<Box<dyn Hook>>, chief_only: Vec<Box<dyn Hook>>) -> Self {
        Self { hooks, chief_only }
    }
}
