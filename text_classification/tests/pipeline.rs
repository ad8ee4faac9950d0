use std::{fs, path::Path, sync::Arc};

use machine_learning::{
    arch::{TextClassifier, layers::EmbeddingBag},
    optimization::{LearningRate, Optimizer, OptimizerSpec},
};
use ndarray::{Array2, ArrayView2};
use tempfile::TempDir;
use text_classification::{
    BagOfEmbeddings, Cli, Driver, Split, TextClassificationConfig, TextClassificationDataset,
    TextClassificationErr, TextClassificationEvaluator, TextClassificationModel,
    TextClassificationTest, TextClassificationTrainer, dispatch, model::Loss,
};
use trainer::{ClusterSpec, JobName, ManualClock, TaskSpec, TrainerErr};

const TRAIN: &str = "0,0 1\n1,2 3\n2,1 2\n0,0\n1,3\n2,2\n0,1 0\n1,3 3\n";
const TEST: &str = "0,0\n1,3\n2,2\n";
const EMBEDDINGS: &str = "1,0,0\n0.9,0.1,0\n0,1,0\n0,0,1\n";

/// Lays out the data, the embeddings and the log directory of a tiny problem.
fn fixture() -> (TempDir, TextClassificationConfig) {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    let word2vec = dir.path().join("word2vec");
    fs::create_dir_all(&data).unwrap();
    fs::create_dir_all(&word2vec).unwrap();

    fs::write(data.join("train.csv"), TRAIN).unwrap();
    fs::write(data.join("test.csv"), TEST).unwrap();
    fs::write(word2vec.join("embeddings_4_3"), EMBEDDINGS).unwrap();

    let config = TextClassificationConfig::from_json(&format!(
        r#"{{
            "data_dir": {data:?},
            "word2vec_dir": {word2vec:?},
            "logdir": {logdir:?},
            "vocabulary_size": 4,
            "embeddings_size": 3,
            "output_classes": 3,
            "epochs": 2,
            "batch_size": 2,
            "log_period_secs": 2
        }}"#,
        logdir = dir.path().join("logs").join("tc"),
    ))
    .unwrap();

    (dir, config)
}

fn dataset(config: &TextClassificationConfig, split: Split) -> TextClassificationDataset {
    TextClassificationDataset::open(&config.data_dir, split).unwrap()
}

/// A bag of embeddings whose every step takes a second of the given clock.
struct Ticking {
    inner: BagOfEmbeddings,
    clock: ManualClock,
}

impl Ticking {
    fn new(clock: ManualClock) -> Self {
        Self {
            inner: BagOfEmbeddings::new(vec![4]),
            clock,
        }
    }
}

impl TextClassificationModel for Ticking {
    fn model(
        &self,
        output_classes: usize,
        embeddings: EmbeddingBag,
    ) -> text_classification::Result<TextClassifier> {
        self.inner.model(output_classes, embeddings)
    }

    fn targets(
        &self,
        labels: &[usize],
        output_classes: usize,
    ) -> text_classification::Result<Array2<f32>> {
        self.clock.advance(std::time::Duration::from_secs(1));
        self.inner.targets(labels, output_classes)
    }

    fn optimize(&self, parameters: usize) -> (Box<dyn Optimizer + Send>, LearningRate) {
        self.inner.optimize(parameters)
    }
}

/// A model whose loss blows up.
struct Diverging;

impl TextClassificationModel for Diverging {
    fn model(
        &self,
        output_classes: usize,
        embeddings: EmbeddingBag,
    ) -> text_classification::Result<TextClassifier> {
        BagOfEmbeddings::default().model(output_classes, embeddings)
    }

    fn loss(&self, _targets: ArrayView2<f32>, logits: ArrayView2<f32>) -> Loss {
        Loss {
            value: f32::NAN,
            gradient: Array2::zeros(logits.raw_dim()),
        }
    }

    fn optimize(&self, parameters: usize) -> (Box<dyn Optimizer + Send>, LearningRate) {
        (
            OptimizerSpec::GradientDescent.build(parameters),
            LearningRate::Constant { value: 0.1 },
        )
    }
}

fn trainer_for(
    config: &TextClassificationConfig,
    task_spec: TaskSpec,
    clock: &ManualClock,
) -> TextClassificationTrainer<Ticking> {
    TextClassificationTrainer::with_task_spec(
        dataset(config, Split::Train),
        Ticking::new(clock.clone()),
        config.clone(),
        task_spec,
    )
    .with_clock(Arc::new(clock.clone()))
}

#[test]
fn trains_then_tests_and_evaluates_the_checkpoint() {
    let (_dir, config) = fixture();
    let clock = ManualClock::new();

    let report = trainer_for(&config, TaskSpec::local(), &clock)
        .train()
        .unwrap();

    // 2 epochs * 8 samples / batch of 2
    assert_eq!(report.global_step, 8);
    assert_eq!(report.steps, 8);
    assert!(Path::new(&config.logdir).join("model.ckpt-8.json").exists());
    assert!(Path::new(&config.logdir).join("summaries.jsonl").exists());

    let test = TextClassificationTest::new(
        dataset(&config, Split::Train),
        BagOfEmbeddings::new(vec![4]),
        config.clone(),
    )
    .run()
    .unwrap();
    assert_eq!(test.global_step, 8);
    assert_eq!(test.samples, 8);
    assert!(test.loss.is_finite());

    let eval = TextClassificationEvaluator::new(
        dataset(&config, Split::Test),
        BagOfEmbeddings::new(vec![4]),
        config.clone(),
    )
    .run()
    .unwrap();
    assert_eq!(eval.samples, 3);
    assert!((0. ..=1.).contains(&eval.metrics.accuracy));
}

#[test]
fn progress_is_logged_on_the_chief_only() {
    let (_dir, config) = fixture();

    let clock = ManualClock::new();
    let mut chief = trainer_for(&config, TaskSpec::local(), &clock);
    chief.train().unwrap();
    // One second per step and a 2 second period: lines at steps 3 and 6.
    assert_eq!(chief.progress_lines(), 2);

    let cluster = ClusterSpec::new()
        .with_job(JobName::Master, ["127.0.0.1:0"])
        .with_job(JobName::Worker, ["127.0.0.1:0"]);
    let mut config = config;
    config.logdir = config.logdir_for("worker");

    let clock = ManualClock::new();
    let mut worker = trainer_for(
        &config,
        TaskSpec::new(JobName::Worker, 0, Some(cluster)),
        &clock,
    );
    let report = worker.train().unwrap();

    assert_eq!(report.steps, 8);
    assert_eq!(worker.progress_lines(), 0);
}

#[test]
fn dispatch_picks_the_driver_of_the_mode() {
    let (dir, config) = fixture();
    let config_path = dir.path().join("config.json");
    fs::write(&config_path, serde_json::to_string(&config).unwrap()).unwrap();

    let cli = |mode: Option<&str>| Cli {
        mode: mode.map(str::to_owned),
        config: Some(config_path.clone()),
    };

    let train = dispatch(&cli(None), BagOfEmbeddings::default(), "bag").unwrap();
    assert!(matches!(train, Driver::Train(_)));

    let train = dispatch(&cli(Some("train")), BagOfEmbeddings::default(), "bag").unwrap();
    assert!(matches!(train, Driver::Train(_)));

    let test = dispatch(&cli(Some("test")), BagOfEmbeddings::default(), "bag").unwrap();
    assert!(matches!(test, Driver::Test(_)));

    let eval = dispatch(&cli(Some("eval")), BagOfEmbeddings::default(), "bag").unwrap();
    assert!(matches!(eval, Driver::Eval(_)));

    // Nothing was trained under `{logdir}_bag` yet.
    assert!(matches!(
        eval.run(),
        Err(TextClassificationErr::NoCheckpoint(dir)) if dir.ends_with("tc_bag")
    ));
}

#[test]
fn non_finite_loss_aborts_training() {
    let (_dir, config) = fixture();

    let mut trainer = TextClassificationTrainer::with_task_spec(
        dataset(&config, Split::Train),
        Diverging,
        config,
        TaskSpec::local(),
    );

    assert!(matches!(
        trainer.train(),
        Err(TrainerErr::Numeric {
            msg: "loss is nan",
            ..
        })
    ));
}

#[test]
fn missing_embeddings_fail_the_graph() {
    let (_dir, mut config) = fixture();
    config.embeddings_size = 5;

    let mut trainer = TextClassificationTrainer::with_task_spec(
        dataset(&config, Split::Train),
        BagOfEmbeddings::default(),
        config,
        TaskSpec::local(),
    );

    assert!(matches!(trainer.train(), Err(TrainerErr::Io(_))));
}
