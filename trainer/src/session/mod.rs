pub mod checkpoint;

use std::{
    num::{NonZeroU64, NonZeroUsize},
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

pub use checkpoint::Checkpoint;
use log::{debug, info};

use crate::{
    Result, TrainerErr,
    clock::Clock,
    hooks::{Hook, HookSet, RunContext, RunValues, StepCounterHook, SummarySaverHook},
    settings::TrainerSettings,
};

/// What a monitored session needs to know about the run.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub is_chief: bool,
    pub log_dir: PathBuf,
    pub save_checkpoint_every: Option<Duration>,
    pub max_to_keep: Option<NonZeroUsize>,
    pub save_summaries_steps: Option<NonZeroU64>,
    pub log_step_count_steps: Option<NonZeroU64>,
    pub clock: Arc<dyn Clock>,
}

impl SessionConfig {
    pub fn from_settings(settings: &TrainerSettings, is_chief: bool) -> Self {
        Self {
            is_chief,
            log_dir: settings.log_dir().to_path_buf(),
            save_checkpoint_every: settings.save_checkpoint_every(),
            max_to_keep: settings.max_to_keep(),
            save_summaries_steps: settings.save_summaries_steps(),
            log_step_count_steps: settings.log_step_count_steps(),
            clock: settings.clock().clone(),
        }
    }
}

/// Owns the global step, the hooks and the stop flag of a run.
///
/// The lifecycle is `begin`, `after_create_session`, any amount of `run` until
/// `should_stop`, then `end`.
pub struct MonitoredSession {
    config: SessionConfig,
    hooks: Vec<Box<dyn Hook>>,
    global_step: u64,
    steps: u64,
    stop_requested: bool,
    last_checkpoint: Option<Instant>,
    ended: bool,
}

impl MonitoredSession {
    /// Creates a new `MonitoredSession`.
    ///
    /// # Arguments
    /// * `config` - The run's chief flag, log directory and cadences.
    /// * `hooks` - The hooks to install. Chief-only hooks are dropped on other tasks.
    pub fn new(config: SessionConfig, hooks: HookSet) -> Self {
        let HookSet {
            mut hooks,
            chief_only,
        } = hooks;

        if config.is_chief {
            hooks.extend(chief_only);

            if let Some(every) = config.log_step_count_steps {
                hooks.push(Box::new(StepCounterHook::new(every, config.clock.clone())));
            }
            if let Some(every) = config.save_summaries_steps {
                hooks.push(Box::new(SummarySaverHook::new(&config.log_dir, every)));
            }
        }

        Self {
            config,
            hooks,
            global_step: 0,
            steps: 0,
            stop_requested: false,
            last_checkpoint: None,
            ended: false,
        }
    }

    pub fn begin(&mut self) -> Result<()> {
        for hook in &mut self.hooks {
            hook.begin()?;
        }

        Ok(())
    }

    /// Resumes the global step from a restored checkpoint.
    pub fn restore_global_step(&mut self, global_step: u64) {
        info!(global_step = global_step; "restored global step");
        self.global_step = global_step;
    }

    pub fn after_create_session(&mut self) -> Result<()> {
        let mut ctx = RunContext::new();
        for hook in &mut self.hooks {
            hook.after_create_session(&mut ctx, self.global_step)?;
        }

        self.stop_requested |= ctx.stop_requested();
        self.last_checkpoint = Some(self.config.clock.now());
        Ok(())
    }

    /// Runs a single step through the hooks.
    ///
    /// # Arguments
    /// * `fetch` - The step itself: given the current global step, it returns the values it
    ///   produced, the new global step among them.
    ///
    /// # Returns
    /// The fetched values, or `None` if the input was exhausted, in which case the session
    /// stops.
    pub fn run<F>(&mut self, fetch: F) -> Result<Option<RunValues>>
    where
        F: FnOnce(u64) -> Result<RunValues>,
    {
        if self.stop_requested {
            return Err(TrainerErr::SessionStopped);
        }

        for hook in &mut self.hooks {
            hook.before_run(self.global_step)?;
        }

        let values = match fetch(self.global_step) {
            Ok(values) => values,
            Err(TrainerErr::OutOfRange) => {
                debug!(global_step = self.global_step; "input exhausted, stopping");
                self.stop_requested = true;
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        self.global_step = values.global_step;
        self.steps += 1;

        let mut ctx = RunContext::new();
        for hook in &mut self.hooks {
            hook.after_run(&mut ctx, &values)?;
        }
        self.stop_requested |= ctx.stop_requested();

        Ok(Some(values))
    }

    pub fn should_stop(&self) -> bool {
        self.stop_requested
    }

    pub fn request_stop(&mut self) {
        self.stop_requested = true;
    }

    pub fn global_step(&self) -> u64 {
        self.global_step
    }

    /// The amount of `run` calls that produced values.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn is_chief(&self) -> bool {
        self.config.is_chief
    }

    pub fn log_dir(&self) -> &Path {
        &self.config.log_dir
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.config.clock
    }

    /// Whether this session writes checkpoints at all.
    pub fn saves_checkpoints(&self) -> bool {
        self.config.is_chief && self.config.save_checkpoint_every.is_some()
    }

    /// Whether enough time went by since the last checkpoint to take another.
    pub fn checkpoint_due(&self) -> bool {
        if !self.config.is_chief {
            return false;
        }

        match (self.config.save_checkpoint_every, self.last_checkpoint) {
            (Some(every), Some(last)) => self.config.clock.now().duration_since(last) >= every,
            _ => false,
        }
    }

    /// Writes `state` as the checkpoint of the current global step.
    ///
    /// # Returns
    /// The path of the written checkpoint.
    pub fn save_checkpoint(&mut self, state: serde_json::Value) -> Result<PathBuf> {
        let checkpoint = Checkpoint {
            global_step: self.global_step,
            state,
        };

        let path = checkpoint::save(&self.config.log_dir, &checkpoint, self.config.max_to_keep)?;
        self.last_checkpoint = Some(self.config.clock.now());

        info!(global_step = self.global_step; "saved checkpoint to {}", path.display());
        Ok(path)
    }

    /// Reads the most recent checkpoint in the log directory, if any.
    pub fn latest_checkpoint(&self) -> Result<Option<Checkpoint>> {
        checkpoint::latest(&self.config.log_dir)
    }

    /// Runs the hooks' `end`. Further calls do nothing.
    pub fn end(&mut self) -> Result<()> {
        if self.ended {
            return Ok(());
        }
        self.ended = true;

        for hook in &mut self.hooks {
            hook.end(self.global_step)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::ManualClock,
        hooks::StopAtStepHook,
        settings::StepBudget,
    };

    fn config(dir: &Path, is_chief: bool, clock: &ManualClock) -> SessionConfig {
        SessionConfig {
            is_chief,
            log_dir: dir.to_path_buf(),
            save_checkpoint_every: Some(Duration::from_secs(60)),
            max_to_keep: NonZeroUsize::new(2),
            save_summaries_steps: NonZeroU64::new(1),
            log_step_count_steps: None,
            clock: Arc::new(clock.clone()),
        }
    }

    fn start(session: &mut MonitoredSession) {
        session.begin().unwrap();
        session.after_create_session().unwrap();
    }

    #[test]
    fn out_of_range_stops_the_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = MonitoredSession::new(
            config(dir.path(), true, &ManualClock::new()),
            HookSet::default(),
        );
        start(&mut session);

        assert!(session.run(|_| Err(TrainerErr::OutOfRange)).unwrap().is_none());
        assert!(session.should_stop());
        assert!(matches!(
            session.run(|step| Ok(RunValues::new(step + 1))),
            Err(TrainerErr::SessionStopped)
        ));
    }

    #[test]
    fn hooks_see_the_new_global_step() {
        let dir = tempfile::tempdir().unwrap();
        let hooks = HookSet::new(
            vec![Box::new(StopAtStepHook::new(StepBudget::Absolute(2)))],
            Vec::new(),
        );
        let mut session =
            MonitoredSession::new(config(dir.path(), false, &ManualClock::new()), hooks);
        start(&mut session);

        while !session.should_stop() {
            session.run(|step| Ok(RunValues::new(step + 1))).unwrap();
        }

        assert_eq!(session.global_step(), 2);
        assert_eq!(session.steps(), 2);
    }

    #[test]
    fn summaries_are_written_on_the_chief_only() {
        for is_chief in [true, false] {
            let dir = tempfile::tempdir().unwrap();
            let mut session =
                MonitoredSession::new(config(dir.path(), is_chief, &ManualClock::new()), HookSet::default());
            start(&mut session);

            session
                .run(|step| Ok(RunValues::new(step + 1).with_scalar("loss", 0.5)))
                .unwrap();

            let written = dir.path().join("summaries.jsonl").exists();
            assert_eq!(written, is_chief);
        }
    }

    #[test]
    fn checkpoints_follow_the_clock() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new();
        let mut session = MonitoredSession::new(config(dir.path(), true, &clock), HookSet::default());
        start(&mut session);

        assert!(!session.checkpoint_due());
        clock.advance(Duration::from_secs(60));
        assert!(session.checkpoint_due());

        session.run(|step| Ok(RunValues::new(step + 7))).unwrap();
        session.save_checkpoint(serde_json::json!([1, 2])).unwrap();
        assert!(!session.checkpoint_due());

        let latest = session.latest_checkpoint().unwrap().unwrap();
        assert_eq!(latest.global_step, 7);
    }

    #[test]
    fn non_chiefs_never_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new();
        let mut session = MonitoredSession::new(config(dir.path(), false, &clock), HookSet::default());
        start(&mut session);

        clock.advance(Duration::from_secs(600));
        assert!(!session.checkpoint_due());
        assert!(!session.saves_checkpoints());
    }

    #[test]
    fn old_checkpoints_are_pruned() {
        let dir = tempfile::tempdir().unwrap();
        let mut session =
            MonitoredSession::new(config(dir.path(), true, &ManualClock::new()), HookSet::default());
        start(&mut session);

        for _ in 0..4 {
            session.run(|step| Ok(RunValues::new(step + 1))).unwrap();
            session.save_checkpoint(serde_json::json!([])).unwrap();
        }

        let kept = std::fs::read_dir(dir.path())
            .unwrap()
            .filter(|entry| {
                let name = entry.as_ref().unwrap().file_name();
                name.to_string_lossy().starts_with("model.ckpt-")
            })
            .count();
        assert_eq!(kept, 2);
        assert_eq!(session.latest_checkpoint().unwrap().unwrap().global_step, 4);
    }
}
