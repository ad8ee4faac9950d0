use std::sync::Arc;

use log::info;
use machine_learning::{
    arch::TextClassifier,
    check_numerics,
    metrics::{MetricValues, SingleLabelMetrics},
    optimization::{LearningRate, Optimizer},
};
use rand::{SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use trainer::{
    Clock, GraphContext, GraphState, MonitoredSession, RunReport, RunValues, StepBudget, TaskSpec,
    Trainer, TrainerErr, TrainerSettings,
};

use crate::{
    Result,
    config::TextClassificationConfig,
    dataset::{BatchReader, TextClassificationDataset},
    embeddings::load_embedding_bag,
    model::TextClassificationModel,
    progress::{Progress, ProgressLogger},
};

/// The trainable state written to checkpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamsState {
    pub params: Vec<f32>,
}

impl ParamsState {
    /// Reads the parameters of a checkpoint, checking they fit a model of `size` parameters.
    pub fn from_value(state: serde_json::Value, size: usize) -> trainer::Result<Vec<f32>> {
        let ParamsState { params } = serde_json::from_value(state)?;
        if params.len() != size {
            return Err(machine_learning::MlErr::SizeMismatch {
                what: "checkpoint parameters",
                got: params.len(),
                expected: size,
            }
            .into());
        }

        Ok(params)
    }
}

/// Everything a training step touches.
pub struct TextClassificationGraph {
    classifier: TextClassifier,
    params: Vec<f32>,
    grad: Vec<f32>,
    optimizer: Box<dyn Optimizer + Send>,
    learning_rate: LearningRate,
    reader: BatchReader,
    metrics: SingleLabelMetrics,
}

impl TextClassificationGraph {
    pub fn params(&self) -> &[f32] {
        &self.params
    }

    pub fn metrics(&self) -> MetricValues {
        self.metrics.values()
    }
}

impl GraphState for TextClassificationGraph {
    fn snapshot(&self) -> trainer::Result<Option<serde_json::Value>> {
        let state = ParamsState {
            params: self.params.clone(),
        };
        Ok(Some(serde_json::to_value(state)?))
    }

    fn restore(&mut self, state: serde_json::Value) -> trainer::Result<()> {
        self.params = ParamsState::from_value(state, self.classifier.size())?;
        Ok(())
    }
}

/// Trains a text classification model over a dataset for a fixed amount of epochs.
pub struct TextClassificationTrainer<M> {
    dataset: TextClassificationDataset,
    model: M,
    config: TextClassificationConfig,
    task_spec: TaskSpec,
    settings: TrainerSettings,
    progress: Option<ProgressLogger>,
}

impl<M: TextClassificationModel> TextClassificationTrainer<M> {
    /// Creates a new `TextClassificationTrainer` for the task in the environment.
    ///
    /// # Arguments
    /// * `dataset` - The samples to train on.
    /// * `model` - The model to train.
    /// * `config` - The data locations and the training sizes. `logdir` is used as is.
    ///
    /// # Returns
    /// The trainer, or an error if the task configuration in the environment is invalid.
    pub fn new(
        dataset: TextClassificationDataset,
        model: M,
        config: TextClassificationConfig,
    ) -> Result<Self> {
        Ok(Self::with_task_spec(
            dataset,
            model,
            config,
            TaskSpec::from_env()?,
        ))
    }

    pub fn with_task_spec(
        dataset: TextClassificationDataset,
        model: M,
        config: TextClassificationConfig,
        task_spec: TaskSpec,
    ) -> Self {
        let max_steps = max_steps(&config, dataset.size());
        let settings =
            TrainerSettings::new(&config.logdir).with_steps(StepBudget::Absolute(max_steps));

        Self {
            dataset,
            model,
            config,
            task_spec,
            settings,
            progress: None,
        }
    }

    /// Replaces the clock of every time based decision.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.settings = self.settings.with_clock(clock);
        self
    }

    /// Adjusts the base settings, the step budget included.
    pub fn with_settings(mut self, f: impl FnOnce(TrainerSettings) -> TrainerSettings) -> Self {
        self.settings = f(self.settings);
        self
    }

    /// Trains with the configured batch size until the step budget runs out.
    pub fn train(&mut self) -> trainer::Result<RunReport> {
        let batch_size = self.config.batch_size;
        self.run(batch_size, None)
    }

    /// The amount of progress lines logged by the last run, always zero off the chief.
    pub fn progress_lines(&self) -> usize {
        self.progress.as_ref().map_or(0, ProgressLogger::lines)
    }
}

/// `epochs * dataset_size / batch_size` steps rounded up, at least one.
pub fn max_steps(config: &TextClassificationConfig, dataset_size: usize) -> u64 {
    let steps = (config.epochs.get() * dataset_size).div_ceil(config.batch_size.get());
    steps.max(1) as u64
}

impl<M: TextClassificationModel> Trainer for TextClassificationTrainer<M> {
    type Graph = TextClassificationGraph;

    fn task_spec(&self) -> &TaskSpec {
        &self.task_spec
    }

    fn settings(&self) -> &TrainerSettings {
        &self.settings
    }

    fn create_graph(&mut self, ctx: &GraphContext<'_>) -> trainer::Result<TextClassificationGraph> {
        let config = &self.config;
        let embeddings = load_embedding_bag(
            &config.word2vec_dir,
            config.vocabulary_size,
            config.embeddings_size,
        )?;

        let classifier = self.model.model(config.output_classes, embeddings)?;
        let mut params = vec![0.; classifier.size()];
        classifier.init(&mut StdRng::seed_from_u64(config.seed), &mut params)?;

        let (optimizer, learning_rate) = self.model.optimize(params.len());
        let reader = self
            .dataset
            .read(ctx.read_options().with_seed(config.seed));

        info!(
            parameters = params.len(),
            samples = self.dataset.size();
            "built the text classification graph"
        );

        Ok(TextClassificationGraph {
            grad: vec![0.; params.len()],
            metrics: SingleLabelMetrics::new(classifier.classes()),
            classifier,
            params,
            optimizer,
            learning_rate,
            reader,
        })
    }

    fn after_create_session(&mut self, session: &MonitoredSession) -> trainer::Result<()> {
        self.progress = Some(ProgressLogger::new(
            self.config.log_period(),
            session.clock().clone(),
        ));
        Ok(())
    }

    fn step(
        &mut self,
        session: &mut MonitoredSession,
        graph: &mut TextClassificationGraph,
    ) -> trainer::Result<()> {
        let model = &self.model;

        let values = session.run(|global_step| {
            let batch = graph.reader.next_batch().ok_or(TrainerErr::OutOfRange)?;
            let targets = model.targets(&batch.labels, graph.classifier.classes())?;

            let outputs = graph.classifier.forward(&graph.params, &batch.tokens)?;
            let loss = model.loss(targets.view(), outputs.logits.view());
            let loss_value = check_numerics(loss.value, "loss is nan")?;

            graph.grad.fill(0.);
            graph
                .classifier
                .backward(&graph.params, &mut graph.grad, loss.gradient)?;

            let learning_rate = graph.learning_rate.value(global_step);
            graph
                .optimizer
                .update_params(learning_rate, &graph.grad, &mut graph.params)?;

            let metrics = graph.metrics.update(&outputs.prediction, &batch.labels)?;

            Ok(RunValues::new(global_step + 1)
                .with_scalar("loss", loss_value)
                .with_scalar("learning_rate", learning_rate)
                .with_scalar("precision", metrics.precision)
                .with_scalar("recall", metrics.recall)
                .with_scalar("accuracy", metrics.accuracy))
        })?;

        if let (Some(values), Some(progress)) = (values, self.progress.as_mut()) {
            progress.log(&Progress {
                step: values.global_step,
                loss: values.scalar("loss").unwrap_or_default(),
                learning_rate: values.scalar("learning_rate").unwrap_or_default(),
                metrics: graph.metrics(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use super::*;

    #[test]
    fn max_steps_covers_the_epochs() {
        let config = TextClassificationConfig {
            epochs: NonZeroUsize::new(3).unwrap(),
            batch_size: NonZeroUsize::new(4).unwrap(),
            ..Default::default()
        };

        // 7.5 steps cover the last partial batch too.
        assert_eq!(max_steps(&config, 10), 8);
        assert_eq!(max_steps(&config, 4), 3);
        assert_eq!(max_steps(&config, 1), 1);
        assert_eq!(max_steps(&config, 0), 1);
    }

    #[test]
    fn restore_rejects_foreign_checkpoints() {
        assert!(ParamsState::from_value(serde_json::json!({"params": [1.0, 2.0]}), 3).is_err());
        assert_eq!(
            ParamsState::from_value(serde_json::json!({"params": [1.0]}), 1).unwrap(),
            vec![1.]
        );
    }
}
