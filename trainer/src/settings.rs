use std::{
    num::{NonZeroU64, NonZeroUsize},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use crate::{
    clock::{Clock, system_clock},
    task_spec::logs_path,
};

const DEFAULT_SAVE_CHECKPOINT_SECS: u64 = 600;
const DEFAULT_SAVE_SUMMARIES_STEPS: u64 = 100;
const DEFAULT_LOG_STEP_COUNT_STEPS: u64 = 100;
const DEFAULT_MAX_TO_KEEP: usize = 5;

/// How many steps a run may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepBudget {
    /// Run this many more steps from wherever the global step is when the session starts.
    Relative(NonZeroU64),
    /// Run until the global step reaches this value.
    Absolute(u64),
}

/// Immutable execution bounds and cadences of a training run.
#[derive(Debug, Clone)]
pub struct TrainerSettings {
    log_dir: PathBuf,
    max_time: Option<Duration>,
    steps: Option<StepBudget>,
    save_checkpoint_secs: Option<NonZeroU64>,
    max_to_keep: Option<NonZeroUsize>,
    save_summaries_steps: Option<NonZeroU64>,
    log_step_count_steps: Option<NonZeroU64>,
    clock: Arc<dyn Clock>,
}

impl TrainerSettings {
    /// Creates settings with the default cadences: a checkpoint every 600 seconds with the
    /// last 5 kept, and summaries and step rate every 100 steps.
    ///
    /// # Arguments
    /// * `log_dir` - Where checkpoints and summaries go, resolved with `logs_path`.
    pub fn new(log_dir: impl AsRef<Path>) -> Self {
        Self {
            log_dir: logs_path(log_dir),
            max_time: None,
            steps: None,
            save_checkpoint_secs: NonZeroU64::new(DEFAULT_SAVE_CHECKPOINT_SECS),
            max_to_keep: NonZeroUsize::new(DEFAULT_MAX_TO_KEEP),
            save_summaries_steps: NonZeroU64::new(DEFAULT_SAVE_SUMMARIES_STEPS),
            log_step_count_steps: NonZeroU64::new(DEFAULT_LOG_STEP_COUNT_STEPS),
            clock: system_clock(),
        }
    }

    /// Stops the run once `max_time` of wall-clock time went by. A zero duration disables it.
    pub fn with_max_time(mut self, max_time: Duration) -> Self {
        self.max_time = Some(max_time);
        self
    }

    pub fn with_steps(mut self, steps: StepBudget) -> Self {
        self.steps = Some(steps);
        self
    }

    /// `None` disables the periodic checkpoints, the final one included.
    pub fn with_save_checkpoint_secs(mut self, secs: Option<NonZeroU64>) -> Self {
        self.save_checkpoint_secs = secs;
        self
    }

    /// How many checkpoints to keep on disk, `None` keeps them all.
    pub fn with_max_to_keep(mut self, max_to_keep: Option<NonZeroUsize>) -> Self {
        self.max_to_keep = max_to_keep;
        self
    }

    pub fn with_save_summaries_steps(mut self, steps: Option<NonZeroU64>) -> Self {
        self.save_summaries_steps = steps;
        self
    }

    pub fn with_log_step_count_steps(mut self, steps: Option<NonZeroU64>) -> Self {
        self.log_step_count_steps = steps;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// The time budget, if any and positive.
    pub fn max_time(&self) -> Option<Duration> {
        self.max_time.filter(|t| !t.is_zero())
    }

    pub fn steps(&self) -> Option<StepBudget> {
        self.steps
    }

    pub fn save_checkpoint_every(&self) -> Option<Duration> {
        self.save_checkpoint_secs
            .map(|secs| Duration::from_secs(secs.get()))
    }

    pub fn max_to_keep(&self) -> Option<NonZeroUsize> {
        self.max_to_keep
    }

    pub fn save_summaries_steps(&self) -> Option<NonZeroU64> {
        self.save_summaries_steps
    }

    pub fn log_step_count_steps(&self) -> Option<NonZeroU64> {
        self.log_step_count_steps
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_max_time_is_no_limit() {
        let settings = TrainerSettings::new("/tmp/run").with_max_time(Duration::ZERO);
        assert_eq!(settings.max_time(), None);
    }

    #[test]
    fn defaults_follow_the_usual_cadences() {
        let settings = TrainerSettings::new("/tmp/run");
        assert_eq!(
            settings.save_checkpoint_every(),
            Some(Duration::from_secs(600))
        );
        assert_eq!(settings.save_summaries_steps().map(NonZeroU64::get), Some(100));
        assert_eq!(settings.log_step_count_steps().map(NonZeroU64::get), Some(100));
        assert_eq!(settings.max_to_keep().map(NonZeroUsize::get), Some(5));
        assert_eq!(settings.steps(), None);
    }
}
