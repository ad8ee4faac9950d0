use std::num::NonZeroUsize;

use log::info;

use crate::{
    Result, TrainerErr,
    coordinator::{Placement, coordinator_for},
    data::{ReadOptions, ShardSpec},
    hooks::{HookSet, StopAtStepHook, StopAtTimeHook},
    session::{MonitoredSession, SessionConfig},
    settings::TrainerSettings,
    task_spec::TaskSpec,
};

/// State a graph can snapshot into a checkpoint and be restored from.
///
/// Both default to having no state.
pub trait GraphState {
    fn snapshot(&self) -> Result<Option<serde_json::Value>> {
        Ok(None)
    }

    fn restore(&mut self, state: serde_json::Value) -> Result<()> {
        let _ = state;
        Ok(())
    }
}

impl GraphState for () {}

/// Everything a trainer needs to build its graph.
#[derive(Debug, Clone, Copy)]
pub struct GraphContext<'a> {
    pub task_spec: &'a TaskSpec,
    pub placement: &'a Placement,
    pub batch_size: NonZeroUsize,
    /// `None` trains until another budget stops the run.
    pub epochs: Option<NonZeroUsize>,
}

impl GraphContext<'_> {
    /// Shuffled reads of this task's shard in batches of `batch_size` for `epochs` epochs.
    pub fn read_options(&self) -> ReadOptions {
        ReadOptions {
            batch_size: self.batch_size,
            num_epochs: self.epochs,
            shuffle: true,
            shard: ShardSpec::for_task(self.task_spec),
            seed: 0,
        }
    }
}

/// How a finished run ended.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub global_step: u64,
    /// The steps this process ran.
    pub steps: u64,
}

/// A distributed training process.
///
/// Implementors build their graph in `create_graph` and advance it in `step`; `run` does the
/// rest: role checks, the cluster server, hooks, the session and checkpoints.
pub trait Trainer {
    type Graph: GraphState;

    fn task_spec(&self) -> &TaskSpec;

    fn settings(&self) -> &TrainerSettings;

    /// Builds the graph, once per run.
    fn create_graph(&mut self, ctx: &GraphContext<'_>) -> Result<Self::Graph> {
        let _ = ctx;
        Err(TrainerErr::NotImplemented("create_graph"))
    }

    /// Returns the hooks to install, on every task and on the chief only.
    fn create_hooks(&mut self, graph: &Self::Graph) -> Result<HookSet> {
        let _ = graph;
        Ok(HookSet::default())
    }

    /// Called on the chief once its session exists.
    fn after_create_session(&mut self, session: &MonitoredSession) -> Result<()> {
        let _ = session;
        Ok(())
    }

    /// Runs a single training step, usually through `session.run`.
    fn step(&mut self, session: &mut MonitoredSession, graph: &mut Self::Graph) -> Result<()> {
        let _ = (session, graph);
        Err(TrainerErr::NotImplemented("step"))
    }

    /// Trains until a hook or the input stops the session.
    ///
    /// # Arguments
    /// * `batch_size` - The size of every training batch.
    /// * `epochs` - How many passes over the data to read, `None` for no limit.
    ///
    /// # Returns
    /// Where the run ended, or an error if the task is misconfigured or a step fails.
    /// Parameter servers return an empty report once their server shuts down.
    fn run(&mut self, batch_size: NonZeroUsize, epochs: Option<NonZeroUsize>) -> Result<RunReport> {
        let task_spec = self.task_spec().clone();
        if task_spec.is_master() && task_spec.index > 0 {
            return Err(TrainerErr::DuplicateMaster {
                index: task_spec.index,
            });
        }

        let mut coordinator = coordinator_for(&task_spec)?;
        if task_spec.is_ps() {
            coordinator.join()?;
            return Ok(RunReport::default());
        }

        let settings = self.settings().clone();
        info!("log dir: {}", settings.log_dir().display());

        info!("creating graph...");
        let ctx = GraphContext {
            task_spec: &task_spec,
            placement: coordinator.placement(),
            batch_size,
            epochs,
        };
        let mut graph = self.create_graph(&ctx)?;

        let HookSet {
            mut hooks,
            chief_only,
        } = self.create_hooks(&graph)?;

        if let Some(max_time) = settings.max_time() {
            hooks.push(Box::new(StopAtTimeHook::with_clock(
                max_time,
                settings.clock().clone(),
            )));
        }
        if let Some(budget) = settings.steps() {
            hooks.push(Box::new(StopAtStepHook::new(budget)));
        }

        info!("creating monitored session...");
        let is_chief = task_spec.is_chief();
        let mut session = MonitoredSession::new(
            SessionConfig::from_settings(&settings, is_chief),
            HookSet::new(hooks, chief_only),
        );
        session.begin()?;

        if let Some(checkpoint) = session.latest_checkpoint()? {
            graph.restore(checkpoint.state)?;
            session.restore_global_step(checkpoint.global_step);
        }

        session.after_create_session()?;
        if is_chief {
            self.after_create_session(&session)?;
        }

        info!("starting training...");
        while !session.should_stop() {
            self.step(&mut session, &mut graph)?;

            if session.checkpoint_due() {
                save_checkpoint(&mut session, &graph)?;
            }
        }

        if session.saves_checkpoints() {
            save_checkpoint(&mut session, &graph)?;
        }
        session.end()?;

        let report = RunReport {
            global_step: session.global_step(),
            steps: session.steps(),
        };
        info!(global_step = report.global_step, steps = report.steps; "training finished");

        Ok(report)
    }
}

fn save_checkpoint<G: GraphState>(session: &mut MonitoredSession, graph: &G) -> Result<()> {
    if let Some(state) = graph.snapshot()? {
        session.save_checkpoint(state)?;
    }

    Ok(())
}
