use std::{
    fs,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{Result, TextClassificationErr};

const DEFAULT_EPOCHS: NonZeroUsize = NonZeroUsize::new(10).unwrap();
const DEFAULT_BATCH_SIZE: NonZeroUsize = NonZeroUsize::new(128).unwrap();

/// Where the data lives and how to train on it. Every field has a default, so a JSON file
/// only needs the ones it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TextClassificationConfig {
    /// Holds `train.csv` and `test.csv`.
    pub data_dir: PathBuf,
    /// Holds the `embeddings_{vocabulary_size}_{embeddings_size}` files.
    pub word2vec_dir: PathBuf,
    /// The log directory prefix, suffixed with the model's name.
    pub logdir: PathBuf,
    pub vocabulary_size: usize,
    pub embeddings_size: usize,
    pub output_classes: usize,
    pub epochs: NonZeroUsize,
    pub batch_size: NonZeroUsize,
    pub seed: u64,
    /// Seconds between progress lines on the chief.
    pub log_period_secs: u64,
}

impl Default for TextClassificationConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/text_classification"),
            word2vec_dir: PathBuf::from("data/word2vec"),
            logdir: PathBuf::from("logs/text_classification"),
            vocabulary_size: 20_000,
            embeddings_size: 300,
            output_classes: 9,
            epochs: DEFAULT_EPOCHS,
            batch_size: DEFAULT_BATCH_SIZE,
            seed: 0,
            log_period_secs: 5 * 60,
        }
    }
}

impl TextClassificationConfig {
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    fn validate(&self) -> Result<()> {
        if self.output_classes < 2 {
            return Err(TextClassificationErr::InvalidConfig(format!(
                "output_classes must be at least 2, got {}",
                self.output_classes
            )));
        }
        if self.vocabulary_size == 0 || self.embeddings_size == 0 {
            return Err(TextClassificationErr::InvalidConfig(
                "vocabulary_size and embeddings_size must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// The log directory of the model called `name`: `{logdir}_{name}`.
    pub fn logdir_for(&self, name: &str) -> PathBuf {
        let mut logdir = self.logdir.clone().into_os_string();
        logdir.push(format!("_{name}"));
        PathBuf::from(logdir)
    }

    pub fn log_period(&self) -> Duration {
        Duration::from_secs(self.log_period_secs)
    }
}
