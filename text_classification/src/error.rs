use std::{error::Error, fmt, io, path::PathBuf};

use machine_learning::MlErr;
use trainer::TrainerErr;

pub type Result<T> = std::result::Result<T, TextClassificationErr>;

#[derive(Debug)]
pub enum TextClassificationErr {
    /// A malformed value in an embeddings or dataset file. Lines and columns start at 1.
    Parse {
        path: PathBuf,
        line: usize,
        column: usize,
        detail: String,
    },
    /// The embeddings file doesn't hold `vocabulary x dim` values.
    EmbeddingsShape {
        path: PathBuf,
        rows: usize,
        expected_rows: usize,
    },
    /// There's no checkpoint to evaluate in the log directory.
    NoCheckpoint(PathBuf),
    InvalidConfig(String),
    Io(io::Error),
    Json(serde_json::Error),
    Ml(MlErr),
    Trainer(TrainerErr),
}

impl fmt::Display for TextClassificationErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextClassificationErr::Parse {
                path,
                line,
                column,
                detail,
            } => write!(
                f,
                "{}:{line}:{column}: {detail}",
                path.display()
            ),
            TextClassificationErr::EmbeddingsShape {
                path,
                rows,
                expected_rows,
            } => write!(
                f,
                "{} has {rows} embeddings, expected {expected_rows}",
                path.display()
            ),
            TextClassificationErr::NoCheckpoint(dir) => {
                write!(f, "no checkpoint found in {}", dir.display())
            }
            TextClassificationErr::InvalidConfig(detail) => {
                write!(f, "invalid configuration: {detail}")
            }
            TextClassificationErr::Io(e) => write!(f, "io error: {e}"),
            TextClassificationErr::Json(e) => write!(f, "json error: {e}"),
            TextClassificationErr::Ml(e) => write!(f, "ml error: {e}"),
            TextClassificationErr::Trainer(e) => write!(f, "trainer error: {e}"),
        }
    }
}

impl Error for TextClassificationErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TextClassificationErr::Io(e) => Some(e),
            TextClassificationErr::Json(e) => Some(e),
            TextClassificationErr::Ml(e) => Some(e),
            TextClassificationErr::Trainer(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for TextClassificationErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for TextClassificationErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<MlErr> for TextClassificationErr {
    fn from(value: MlErr) -> Self {
        Self::Ml(value)
    }
}

impl From<TrainerErr> for TextClassificationErr {
    fn from(value: TrainerErr) -> Self {
        Self::Trainer(value)
    }
}

/// Lets a trainer's graph building and steps use `?` on this crate's errors.
impl From<TextClassificationErr> for TrainerErr {
    fn from(value: TextClassificationErr) -> Self {
        match value {
            TextClassificationErr::Trainer(e) => e,
            TextClassificationErr::Ml(e) => e.into(),
            TextClassificationErr::Io(e) => TrainerErr::Io(e),
            TextClassificationErr::Json(e) => TrainerErr::Json(e),
            other => TrainerErr::Graph(Box::new(other)),
        }
    }
}
