use std::{error::Error, fmt, io};

use machine_learning::MlErr;

/// The trainer module's result type.
pub type Result<T> = std::result::Result<T, TrainerErr>;

/// Training runtime failures.
#[derive(Debug)]
pub enum TrainerErr {
    /// More than one process claims the master role.
    DuplicateMaster { index: usize },
    /// A required `Trainer` extension point wasn't overridden.
    NotImplemented(&'static str),
    InvalidTaskSpec(String),
    /// A numeric guard found a `NaN` or infinite value.
    Numeric { msg: &'static str, value: f32 },
    /// The input pipeline is exhausted. The session turns it into a stop request.
    OutOfRange,
    /// `run` was called on a session that already stopped.
    SessionStopped,
    Ml(MlErr),
    Io(io::Error),
    Json(serde_json::Error),
    /// A failure raised by a concrete trainer while building or running its graph.
    Graph(Box<dyn Error + Send + Sync>),
}

impl fmt::Display for TrainerErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrainerErr::DuplicateMaster { index } => write!(
                f,
                "only one replica of master expected, got master with index {index}"
            ),
            TrainerErr::NotImplemented(what) => write!(f, "`{what}` should have been implemented"),
            TrainerErr::InvalidTaskSpec(detail) => write!(f, "invalid task spec: {detail}"),
            TrainerErr::Numeric { msg, value } => write!(f, "{msg} (got {value})"),
            TrainerErr::OutOfRange => f.write_str("input exhausted"),
            TrainerErr::SessionStopped => f.write_str("run called after the session stopped"),
            TrainerErr::Ml(e) => write!(f, "ml error: {e}"),
            TrainerErr::Io(e) => write!(f, "io error: {e}"),
            TrainerErr::Json(e) => write!(f, "json error: {e}"),
            TrainerErr::Graph(e) => write!(f, "graph error: {e}"),
        }
    }
}

impl Error for TrainerErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TrainerErr::Ml(e) => Some(e),
            TrainerErr::Io(e) => Some(e),
            TrainerErr::Json(e) => Some(e),
            TrainerErr::Graph(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<MlErr> for TrainerErr {
    fn from(value: MlErr) -> Self {
        match value {
            MlErr::NonFinite { msg, value } => Self::Numeric { msg, value },
            other => Self::Ml(other),
        }
    }
}

impl From<io::Error> for TrainerErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for TrainerErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Boundary conversion for binaries / I/O APIs.
impl From<TrainerErr> for io::Error {
    fn from(value: TrainerErr) -> Self {
        match value {
            TrainerErr::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
