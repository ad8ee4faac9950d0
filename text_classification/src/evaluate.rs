use log::info;
use machine_learning::metrics::{MetricValues, SingleLabelMetrics};
use trainer::{ReadOptions, session::checkpoint, task_spec::logs_path};

use crate::{
    Result, TextClassificationErr,
    config::TextClassificationConfig,
    dataset::TextClassificationDataset,
    embeddings::load_embedding_bag,
    model::TextClassificationModel,
    train::ParamsState,
};

/// The outcome of a pass over a dataset with a trained model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalReport {
    /// The global step of the evaluated checkpoint.
    pub global_step: u64,
    pub samples: usize,
    /// The mean loss per sample.
    pub loss: f32,
    pub metrics: MetricValues,
}

/// Restores the latest checkpoint and scores every sample of `dataset` once, in order.
fn evaluate<M: TextClassificationModel>(
    name: &str,
    dataset: &TextClassificationDataset,
    model: &M,
    config: &TextClassificationConfig,
) -> Result<EvalReport> {
    let logdir = logs_path(&config.logdir);
    let Some(checkpoint) = checkpoint::latest(&logdir)? else {
        return Err(TextClassificationErr::NoCheckpoint(logdir));
    };

    let embeddings = load_embedding_bag(
        &config.word2vec_dir,
        config.vocabulary_size,
        config.embeddings_size,
    )?;
    let mut classifier = model.model(config.output_classes, embeddings)?;
    let params = ParamsState::from_value(checkpoint.state, classifier.size())?;

    let mut metrics = SingleLabelMetrics::new(classifier.classes());
    let mut total_loss = 0.;
    let mut samples = 0;

    for batch in dataset.read(ReadOptions::single_pass(config.batch_size)) {
        let targets = model.targets(&batch.labels, classifier.classes())?;
        let outputs = classifier.forward(&params, &batch.tokens)?;
        let loss = model.loss(targets.view(), outputs.logits.view());

        total_loss += loss.value * batch.len() as f32;
        samples += batch.len();
        metrics.update(&outputs.prediction, &batch.labels)?;
    }

    let report = EvalReport {
        global_step: checkpoint.global_step,
        samples,
        loss: if samples == 0 { 0. } else { total_loss / samples as f32 },
        metrics: metrics.values(),
    };

    info!(
        global_step = report.global_step,
        samples = report.samples;
        "{name}: loss: {:.4}  {}", report.loss, report.metrics
    );

    Ok(report)
}

/// A validation pass over the training split with the latest trained model.
pub struct TextClassificationTest<M> {
    dataset: TextClassificationDataset,
    model: M,
    config: TextClassificationConfig,
}

impl<M: TextClassificationModel> TextClassificationTest<M> {
    /// Creates a new `TextClassificationTest`.
    ///
    /// # Arguments
    /// * `dataset` - The training samples.
    /// * `model` - The model whose checkpoints live in `config.logdir`.
    /// * `config` - The data locations and the batch size.
    pub fn new(dataset: TextClassificationDataset, model: M, config: TextClassificationConfig) -> Self {
        Self {
            dataset,
            model,
            config,
        }
    }

    pub fn run(&self) -> Result<EvalReport> {
        evaluate("test", &self.dataset, &self.model, &self.config)
    }
}

/// A pass over the held out test split with the latest trained model.
pub struct TextClassificationEvaluator<M> {
    dataset: TextClassificationDataset,
    model: M,
    config: TextClassificationConfig,
}

impl<M: TextClassificationModel> TextClassificationEvaluator<M> {
    pub fn new(dataset: TextClassificationDataset, model: M, config: TextClassificationConfig) -> Self {
        Self {
            dataset,
            model,
            config,
        }
    }

    pub fn run(&self) -> Result<EvalReport> {
        evaluate("eval", &self.dataset, &self.model, &self.config)
    }
}
