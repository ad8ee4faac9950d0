use serde::{Deserialize, Serialize};

use super::{Adam, GradientDescent, GradientDescentWithMomentum, Optimizer};

/// The specification for the `Optimizer` trait. The learning rate is given separately by a
/// `LearningRate` schedule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum OptimizerSpec {
    GradientDescent,
    GradientDescentWithMomentum {
        momentum: f32,
    },
    Adam {
        beta1: f32,
        beta2: f32,
        epsilon: f32,
    },
}

impl OptimizerSpec {
    /// Builds the optimizer for a model of `len` parameters.
    pub fn build(self, len: usize) -> Box<dyn Optimizer + Send> {
        match self {
            OptimizerSpec::GradientDescent => Box::new(GradientDescent::new()),
            OptimizerSpec::GradientDescentWithMomentum { momentum } => {
                Box::new(GradientDescentWithMomentum::new(len, momentum))
            }
            OptimizerSpec::Adam {
                beta1,
                beta2,
                epsilon,
            } => Box::new(Adam::new(len, beta1, beta2, epsilon)),
        }
    }
}

impl Default for OptimizerSpec {
    fn default() -> Self {
        OptimizerSpec::Adam {
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
        }
    }
}
