use std::num::NonZeroU64;

use serde::{Deserialize, Serialize};

/// A learning rate schedule, evaluated at the global step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum LearningRate {
    Constant {
        value: f32,
    },
    /// `initial * decay_rate ^ (step / decay_steps)`, with an integer exponent when `staircase`.
    ExponentialDecay {
        initial: f32,
        decay_rate: f32,
        decay_steps: NonZeroU64,
        #[serde(default)]
        staircase: bool,
    },
}

impl LearningRate {
    /// Returns the learning rate to use at `global_step`.
    pub fn value(&self, global_step: u64) -> f32 {
        match *self {
            LearningRate::Constant { value } => value,
            LearningRate::ExponentialDecay {
                initial,
                decay_rate,
                decay_steps,
                staircase,
            } => {
                let mut exponent = global_step as f64 / decay_steps.get() as f64;
                if staircase {
                    exponent = exponent.floor();
                }

                initial * (decay_rate as f64).powf(exponent) as f32
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decay(staircase: bool) -> LearningRate {
        LearningRate::ExponentialDecay {
            initial: 1.,
            decay_rate: 0.5,
            decay_steps: NonZeroU64::new(10).unwrap(),
            staircase,
        }
    }

    #[test]
    fn constant_ignores_the_step() {
        let lr = LearningRate::Constant { value: 0.3 };
        assert_eq!(lr.value(0), 0.3);
        assert_eq!(lr.value(1_000_000), 0.3);
    }

    #[test]
    fn exponential_decay_halves_every_decay_steps() {
        assert_eq!(decay(false).value(0), 1.);
        assert_eq!(decay(false).value(10), 0.5);
        assert!((decay(false).value(5) - 0.5f32.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn staircase_keeps_the_rate_within_an_interval() {
        assert_eq!(decay(true).value(9), 1.);
        assert_eq!(decay(true).value(10), 0.5);
        assert_eq!(decay(true).value(25), 0.25);
    }

    #[test]
    fn deserializes_from_tagged_json() {
        let lr: LearningRate =
            serde_json::from_str(r#"{"kind":"constant","value":0.01}"#).unwrap();
        assert_eq!(lr, LearningRate::Constant { value: 0.01 });
    }
}
