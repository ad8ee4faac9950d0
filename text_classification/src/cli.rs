use std::path::PathBuf;

use clap::Parser;
use log::info;
use trainer::RunReport;

use crate::{
    Result,
    config::TextClassificationConfig,
    dataset::{Split, TextClassificationDataset},
    evaluate::{EvalReport, TextClassificationEvaluator, TextClassificationTest},
    model::TextClassificationModel,
    train::TextClassificationTrainer,
};

/// What to do with the model besides training it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Score the latest checkpoint on the training split.
    Test,
    /// Score the latest checkpoint on the test split.
    Eval,
}

#[derive(Parser, Debug)]
#[command(about = "Trains and evaluates text classification models")]
pub struct Cli {
    /// `test` or `eval`, anything else trains.
    pub mode: Option<String>,

    /// JSON file overriding the default configuration.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// The mode asked for, `None` meaning train.
    pub fn mode(&self) -> Option<Mode> {
        match self.mode.as_deref() {
            Some("test") => Some(Mode::Test),
            Some("eval") => Some(Mode::Eval),
            _ => None,
        }
    }
}

/// A driver ready to run, picked from the command line.
pub enum Driver<M> {
    Train(TextClassificationTrainer<M>),
    Test(TextClassificationTest<M>),
    Eval(TextClassificationEvaluator<M>),
}

/// What a driver produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    Trained(RunReport),
    Evaluated(EvalReport),
}

impl<M: TextClassificationModel> Driver<M> {
    pub fn run(self) -> Result<Outcome> {
        match self {
            Driver::Train(mut trainer) => Ok(Outcome::Trained(trainer.train()?)),
            Driver::Test(test) => Ok(Outcome::Evaluated(test.run()?)),
            Driver::Eval(evaluator) => Ok(Outcome::Evaluated(evaluator.run()?)),
        }
    }
}

/// Builds the driver `cli` asks for.
///
/// # Arguments
/// * `cli` - The parsed command line.
/// * `model` - The model to train or evaluate.
/// * `name` - The model's name, suffixed to the log directory.
///
/// # Returns
/// The driver over the split its mode reads, or an error if the configuration or the
/// dataset can't be read.
pub fn dispatch<M: TextClassificationModel>(cli: &Cli, model: M, name: &str) -> Result<Driver<M>> {
    let mut config = match &cli.config {
        Some(path) => TextClassificationConfig::from_file(path)?,
        None => TextClassificationConfig::default(),
    };
    config.logdir = config.logdir_for(name);

    let driver = match cli.mode() {
        None => {
            let dataset = TextClassificationDataset::open(&config.data_dir, Split::Train)?;
            Driver::Train(TextClassificationTrainer::new(dataset, model, config)?)
        }
        Some(Mode::Test) => {
            let dataset = TextClassificationDataset::open(&config.data_dir, Split::Train)?;
            Driver::Test(TextClassificationTest::new(dataset, model, config))
        }
        Some(Mode::Eval) => {
            let dataset = TextClassificationDataset::open(&config.data_dir, Split::Test)?;
            Driver::Eval(TextClassificationEvaluator::new(dataset, model, config))
        }
    };

    Ok(driver)
}

/// Parses the command line and trains, tests or evaluates `model`.
pub fn main<M: TextClassificationModel>(model: M, name: &str) -> anyhow::Result<()> {
    let cli = Cli::parse();

    match dispatch(&cli, model, name)?.run()? {
        Outcome::Trained(report) => info!(
            global_step = report.global_step,
            steps = report.steps;
            "{name} trained"
        ),
        Outcome::Evaluated(report) => info!(
            global_step = report.global_step,
            samples = report.samples;
            "{name} evaluated"
        ),
    }

    Ok(())
}
