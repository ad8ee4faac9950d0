use std::num::NonZeroU64;

use machine_learning::{
    MlErr,
    arch::{
        TextClassifier,
        activations::ActFn,
        layers::EmbeddingBag,
        loss::{LossFn, SoftmaxCrossEntropy},
    },
    optimization::{LearningRate, Optimizer, OptimizerSpec},
};
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::Result;

const DEFAULT_DECAY_STEPS: NonZeroU64 = NonZeroU64::new(1000).unwrap();

/// A loss value and its derivative with respect to the logits.
#[derive(Debug, Clone)]
pub struct Loss {
    pub value: f32,
    pub gradient: Array2<f32>,
}

/// What the text classification trainer asks of a model.
pub trait TextClassificationModel {
    /// Builds the classifier on top of the pretrained embeddings.
    ///
    /// # Arguments
    /// * `output_classes` - The amount of classes to score.
    /// * `embeddings` - The frozen embeddings lookup.
    fn model(&self, output_classes: usize, embeddings: EmbeddingBag) -> Result<TextClassifier>;

    /// Turns labels into the targets the loss compares the logits against, one-hot by
    /// default.
    fn targets(&self, labels: &[usize], output_classes: usize) -> Result<Array2<f32>> {
        one_hot(labels, output_classes)
    }

    /// Softmax cross entropy by default.
    fn loss(&self, targets: ArrayView2<f32>, logits: ArrayView2<f32>) -> Loss {
        let loss_fn = SoftmaxCrossEntropy::new();

        Loss {
            value: loss_fn.loss(logits, targets),
            gradient: loss_fn.loss_prime(logits, targets),
        }
    }

    /// Returns the optimizer for `parameters` trainable parameters and its learning rate
    /// schedule.
    fn optimize(&self, parameters: usize) -> (Box<dyn Optimizer + Send>, LearningRate);
}

/// Encodes `labels` as rows of `classes` zeros with a one at the label.
pub fn one_hot(labels: &[usize], classes: usize) -> Result<Array2<f32>> {
    let mut targets = Array2::zeros((labels.len(), classes));

    for (i, &label) in labels.iter().enumerate() {
        if label >= classes {
            return Err(MlErr::LabelOutOfRange { label, classes }.into());
        }
        targets[[i, label]] = 1.;
    }

    Ok(targets)
}

/// Averages the embeddings of a text and feeds them through a multilayer perceptron.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BagOfEmbeddings {
    pub hidden: Vec<usize>,
    pub act_fn: ActFn,
    pub optimizer: OptimizerSpec,
    pub learning_rate: LearningRate,
}

impl BagOfEmbeddings {
    /// A bag of embeddings with `hidden` relu layers, trained with Adam.
    pub fn new(hidden: Vec<usize>) -> Self {
        Self {
            hidden,
            ..Default::default()
        }
    }
}

impl Default for BagOfEmbeddings {
    fn default() -> Self {
        Self {
            hidden: vec![128],
            act_fn: ActFn::relu(),
            optimizer: OptimizerSpec::default(),
            learning_rate: LearningRate::ExponentialDecay {
                initial: 1e-3,
                decay_rate: 0.96,
                decay_steps: DEFAULT_DECAY_STEPS,
                staircase: true,
            },
        }
    }
}

impl TextClassificationModel for BagOfEmbeddings {
    fn model(&self, output_classes: usize, embeddings: EmbeddingBag) -> Result<TextClassifier> {
        Ok(TextClassifier::mlp(
            embeddings,
            &self.hidden,
            self.act_fn,
            output_classes,
        )?)
    }

    fn optimize(&self, parameters: usize) -> (Box<dyn Optimizer + Send>, LearningRate) {
        (self.optimizer.build(parameters), self.learning_rate)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::TextClassificationErr;

    #[test]
    fn one_hot_marks_the_label() {
        assert_eq!(
            one_hot(&[2, 0], 3).unwrap(),
            array![[0., 0., 1.], [1., 0., 0.]]
        );
        assert!(matches!(
            one_hot(&[3], 3),
            Err(TextClassificationErr::Ml(MlErr::LabelOutOfRange { .. }))
        ));
    }

    #[test]
    fn bag_of_embeddings_builds_from_json() {
        let model: BagOfEmbeddings =
            serde_json::from_str(r#"{"hidden": [4, 4], "optimizer": {"kind": "gradient_descent"}}"#)
                .unwrap();
        let embeddings = EmbeddingBag::from_rows(vec![vec![1., 0.], vec![0., 1.]]).unwrap();

        let classifier = model.model(3, embeddings).unwrap();

        assert_eq!(classifier.classes(), 3);
        assert_eq!(classifier.size(), (2 * 4 + 4) + (4 * 4 + 4) + (4 * 3 + 3));
        assert_eq!(model.act_fn, ActFn::relu());
    }
}
