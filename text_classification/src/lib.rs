pub mod cli;
pub mod config;
pub mod dataset;
pub mod embeddings;
pub mod error;
pub mod evaluate;
pub mod model;
pub mod progress;
pub mod train;

pub use cli::{Cli, Driver, Mode, Outcome, dispatch, main};
pub use config::TextClassificationConfig;
pub use dataset::{Batch, BatchReader, Split, TextClassificationDataset};
pub use error::{Result, TextClassificationErr};
pub use evaluate::{EvalReport, TextClassificationEvaluator, TextClassificationTest};
pub use model::{BagOfEmbeddings, TextClassificationModel};
pub use train::TextClassificationTrainer;
