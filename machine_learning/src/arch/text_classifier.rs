use ndarray::{Array2, ArrayView1, Axis};
use rand::Rng;

use super::{
    Model, Sequential,
    activations::ActFn,
    layers::{Dense, EmbeddingBag},
};
use crate::{MlErr, Result};

/// The outputs of a text classifier for a batch.
#[derive(Debug, Clone)]
pub struct Outputs {
    /// Unscaled class scores, one row per sequence.
    pub logits: Array2<f32>,
    /// The highest scoring class per sequence.
    pub prediction: Vec<usize>,
}

/// Scores token sequences: a frozen embedding bag feeds a trainable sequential body whose
/// last layer outputs one logit per class.
#[derive(Debug, Clone)]
pub struct TextClassifier {
    embedding: EmbeddingBag,
    body: Sequential,
    classes: usize,
}

impl TextClassifier {
    /// Creates a new `TextClassifier`.
    ///
    /// # Arguments
    /// * `embedding` - The frozen embeddings lookup.
    /// * `body` - The trainable layers, fed with the embedded sequences.
    ///
    /// # Returns
    /// A new classifier or an error if the body's input doesn't match the embeddings' size.
    pub fn new(embedding: EmbeddingBag, body: Sequential) -> Result<Self> {
        let (input, classes) = body.dim().ok_or(MlErr::SizeMismatch {
            what: "classifier layers",
            got: 0,
            expected: 1,
        })?;

        if input != embedding.dim() {
            return Err(MlErr::SizeMismatch {
                what: "classifier input",
                got: input,
                expected: embedding.dim(),
            });
        }

        Ok(Self {
            embedding,
            body,
            classes,
        })
    }

    /// Builds a multilayer perceptron on top of the embeddings.
    ///
    /// # Arguments
    /// * `embedding` - The frozen embeddings lookup.
    /// * `hidden` - The sizes of the hidden layers, each followed by `act_fn`.
    /// * `act_fn` - The hidden layers' activation.
    /// * `classes` - The amount of output classes.
    pub fn mlp(
        embedding: EmbeddingBag,
        hidden: &[usize],
        act_fn: ActFn,
        classes: usize,
    ) -> Result<Self> {
        let mut layers = Vec::with_capacity(hidden.len() + 1);
        let mut input = embedding.dim();

        for &size in hidden {
            layers.push(Dense::new((input, size), Some(act_fn)));
            input = size;
        }
        layers.push(Dense::new((input, classes), None));

        Self::new(embedding, Sequential::new(layers)?)
    }

    pub fn classes(&self) -> usize {
        self.classes
    }

    /// Returns the amount of trainable parameters.
    pub fn size(&self) -> usize {
        self.body.size()
    }

    pub fn init<R: Rng>(&self, rng: &mut R, params: &mut [f32]) -> Result<()> {
        self.body.init(rng, params)
    }

    /// Scores a batch of token sequences.
    pub fn forward(&mut self, params: &[f32], sequences: &[Vec<u32>]) -> Result<Outputs> {
        if sequences.is_empty() {
            return Err(MlErr::EmptyBatch);
        }

        let features = self.embedding.forward(sequences)?;
        let logits = self.body.forward(params, features.view())?;
        let prediction = logits.axis_iter(Axis(0)).map(argmax).collect();

        Ok(Outputs { logits, prediction })
    }

    /// Writes into `grad` the gradient of the loss given its derivative with respect to the
    /// logits of the last `forward` call.
    pub fn backward(&mut self, params: &[f32], grad: &mut [f32], d_logits: Array2<f32>) -> Result<()> {
        self.body.backward(params, grad, d_logits)
    }
}

fn argmax(row: ArrayView1<f32>) -> usize {
    row.iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, &x)| {
            if x > best.1 { (i, x) } else { best }
        })
        .0
}
