mod role_aware;
mod single_process;

pub use role_aware::{RoleAware, ShutdownHandle};
pub use single_process::SingleProcess;

use crate::{Result, task_spec::TaskSpec};

/// Where the graph's pieces are meant to live.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Placement {
    pub worker_device: String,
    pub ps_device: String,
    pub dataset_device: String,
}

impl Placement {
    /// The devices of `task_spec` inside its cluster.
    pub fn for_task(task_spec: &TaskSpec) -> Self {
        let worker_device = format!("/job:{}/task:{}", task_spec.job_name, task_spec.index);

        Self {
            dataset_device: worker_device.clone(),
            worker_device,
            ps_device: "/job:ps".to_string(),
        }
    }
}

/// Sets a process up for its role in the cluster.
pub trait ClusterCoordinator {
    fn placement(&self) -> &Placement;

    /// Blocks serving the cluster until shutdown. Only meaningful for parameter servers.
    fn join(&mut self) -> Result<()>;
}

/// Picks the coordinator for `task_spec`: a server endpoint when there's a cluster, nothing
/// otherwise.
pub fn coordinator_for(task_spec: &TaskSpec) -> Result<Box<dyn ClusterCoordinator>> {
    match task_spec.cluster_spec {
        Some(_) => Ok(Box::new(RoleAware::start(task_spec)?)),
        None => Ok(Box::new(SingleProcess::new())),
    }
}
