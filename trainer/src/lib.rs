pub mod clock;
pub mod coordinator;
pub mod data;
pub mod error;
pub mod hooks;
pub mod session;
pub mod settings;
pub mod task_spec;
pub mod trainer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use coordinator::{ClusterCoordinator, Placement};
pub use data::{ReadOptions, ShardSpec};
pub use error::{Result, TrainerErr};
pub use hooks::{Hook, HookSet, RunContext, RunValues, StopAtStepHook, StopAtTimeHook};
pub use session::MonitoredSession;
pub use settings::{StepBudget, TrainerSettings};
pub use task_spec::{ClusterSpec, JobName, TaskSpec};
pub use trainer::{GraphContext, GraphState, RunReport, Trainer};
