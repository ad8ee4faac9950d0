use std::{
    collections::BTreeMap,
    env, fmt,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{Result, TrainerErr};

/// The environment variable holding this process' task configuration as JSON.
pub const TASK_CONFIG_VAR: &str = "TASK_CONFIG";

/// The environment variable that, when set, roots every relative log directory.
pub const LOGS_ROOT_VAR: &str = "LOGS_ROOT";

/// The role a process plays in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobName {
    Master,
    Worker,
    Ps,
}

impl JobName {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobName::Master => "master",
            JobName::Worker => "worker",
            JobName::Ps => "ps",
        }
    }
}

impl fmt::Display for JobName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The cluster topology: every job's ordered list of `host:port` addresses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterSpec(BTreeMap<JobName, Vec<String>>);

impl ClusterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a job and its task addresses.
    pub fn with_job<I, S>(mut self, job: JobName, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0
            .insert(job, addresses.into_iter().map(Into::into).collect());
        self
    }

    /// The addresses of `job`'s tasks, empty if the job isn't in the cluster.
    pub fn tasks(&self, job: JobName) -> &[String] {
        self.0.get(&job).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn has_job(&self, job: JobName) -> bool {
        !self.tasks(job).is_empty()
    }
}

/// What this process is: its role, its index within that role and the cluster around it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub job_name: JobName,
    pub index: usize,
    pub cluster_spec: Option<ClusterSpec>,
}

#[derive(Deserialize)]
struct RawTaskConfig {
    #[serde(default)]
    cluster: Option<ClusterSpec>,
    #[serde(default)]
    task: Option<RawTask>,
}

#[derive(Deserialize)]
struct RawTask {
    #[serde(rename = "type")]
    job: JobName,
    #[serde(default)]
    index: usize,
}

impl TaskSpec {
    pub fn new(job_name: JobName, index: usize, cluster_spec: Option<ClusterSpec>) -> Self {
        Self {
            job_name,
            index,
            cluster_spec,
        }
    }

    /// A standalone master without a cluster.
    pub fn local() -> Self {
        Self::new(JobName::Master, 0, None)
    }

    /// Reads the task from the `TASK_CONFIG` environment variable.
    ///
    /// # Returns
    /// The parsed task, `TaskSpec::local()` if the variable isn't set, or an error if it
    /// holds invalid JSON.
    pub fn from_env() -> Result<Self> {
        match env::var(TASK_CONFIG_VAR) {
            Ok(raw) if !raw.trim().is_empty() => Self::from_json(&raw),
            _ => Ok(Self::local()),
        }
    }

    /// Parses a task configuration of the shape
    /// `{"cluster": {"master": [..], "worker": [..], "ps": [..]}, "task": {"type": "worker", "index": 0}}`.
    pub fn from_json(raw: &str) -> Result<Self> {
        let RawTaskConfig { cluster, task } = serde_json::from_str(raw)?;
        let Some(RawTask { job, index }) = task else {
            return Ok(Self {
                cluster_spec: cluster,
                ..Self::local()
            });
        };

        if let Some(cluster) = &cluster {
            let tasks = cluster.tasks(job).len();
            if index >= tasks {
                return Err(TrainerErr::InvalidTaskSpec(format!(
                    "{job} index {index} out of range, the cluster has {tasks} {job} task(s)"
                )));
            }
        }

        Ok(Self::new(job, index, cluster))
    }

    pub fn is_master(&self) -> bool {
        self.job_name == JobName::Master
    }

    pub fn is_ps(&self) -> bool {
        self.job_name == JobName::Ps
    }

    pub fn is_worker(&self) -> bool {
        self.job_name == JobName::Worker
    }

    /// Whether this task owns checkpoints and summaries.
    ///
    /// Without a cluster every process is the chief. With one, the chief is master 0, or
    /// worker 0 when the cluster has no master job.
    pub fn is_chief(&self) -> bool {
        let Some(cluster) = &self.cluster_spec else {
            return true;
        };

        let chief_job = if cluster.has_job(JobName::Master) {
            JobName::Master
        } else {
            JobName::Worker
        };

        self.job_name == chief_job && self.index == 0
    }

    /// This task's `host:port` in the cluster, if it has one.
    pub fn address(&self) -> Option<&str> {
        self.cluster_spec
            .as_ref()?
            .tasks(self.job_name)
            .get(self.index)
            .map(String::as_str)
    }

    /// The amount of replicas reading data: masters and workers.
    pub fn num_workers(&self) -> usize {
        self.cluster_spec
            .as_ref()
            .map(|c| c.tasks(JobName::Master).len() + c.tasks(JobName::Worker).len())
            .unwrap_or(1)
            .max(1)
    }

    /// This task's position among the replicas, masters first. `None` for parameter servers.
    pub fn worker_index(&self) -> Option<usize> {
        let masters = self
            .cluster_spec
            .as_ref()
            .map(|c| c.tasks(JobName::Master).len())
            .unwrap_or(0);

        match self.job_name {
            JobName::Master => Some(self.index),
            JobName::Worker => Some(masters + self.index),
            JobName::Ps => None,
        }
    }
}

impl Default for TaskSpec {
    fn default() -> Self {
        Self::local()
    }
}

/// Resolves a log directory against the `LOGS_ROOT` environment variable.
pub fn logs_path(log_dir: impl AsRef<Path>) -> PathBuf {
    let root = env::var_os(LOGS_ROOT_VAR).map(PathBuf::from);
    logs_path_in(root.as_deref(), log_dir)
}

/// Joins a relative `log_dir` onto `root`; absolute directories and a missing root leave it
/// untouched.
pub fn logs_path_in(root: Option<&Path>, log_dir: impl AsRef<Path>) -> PathBuf {
    let log_dir = log_dir.as_ref();
    match root {
        Some(root) if log_dir.is_relative() => root.join(log_dir),
        _ => log_dir.to_path_buf(),
    }
}
