use std::mem;

use ndarray::{Array2, ArrayView2};
use rand::Rng;

use super::{Model, layers::Dense};
use crate::{MlErr, Result};

/// A sequential model: information flows forward when computing an output and backward when
/// computing the *deltas* of its layers.
#[derive(Debug, Clone)]
pub struct Sequential {
    layers: Vec<Dense>,
}

impl Sequential {
    /// Creates a new `Sequential`.
    ///
    /// # Arguments
    /// * `layers` - The layers the sequential is composed of.
    ///
    /// # Returns
    /// A new `Sequential` instance, or an error if adjacent layers have incompatible sizes.
    pub fn new<I>(layers: I) -> Result<Self>
    where
        I: IntoIterator<Item = Dense>,
    {
        let layers: Vec<Dense> = layers.into_iter().collect();

        for pair in layers.windows(2) {
            let (_, out) = pair[0].dim();
            let (input, _) = pair[1].dim();

            if out != input {
                return Err(MlErr::SizeMismatch {
                    what: "adjacent layers",
                    got: input,
                    expected: out,
                });
            }
        }

        Ok(Self { layers })
    }

    /// The input size of the first layer and the output size of the last one.
    pub fn dim(&self) -> Option<(usize, usize)> {
        let first = self.layers.first()?;
        let last = self.layers.last()?;
        Some((first.dim().0, last.dim().1))
    }

    fn check_len(&self, what: &'static str, got: usize) -> Result<()> {
        let expected = self.size();
        if got != expected {
            return Err(MlErr::SizeMismatch {
                what,
                got,
                expected,
            });
        }

        Ok(())
    }
}

impl Model for Sequential {
    fn size(&self) -> usize {
        self.layers.iter().map(|layer| layer.size()).sum()
    }

    fn init<R: Rng>(&self, rng: &mut R, params: &mut [f32]) -> Result<()> {
        self.check_len("params", params.len())?;

        let mut rest = params;
        for layer in &self.layers {
            let (head, tail) = mem::take(&mut rest).split_at_mut(layer.size());
            layer.init(rng, head)?;
            rest = tail;
        }

        Ok(())
    }

    fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.check_len("params", params.len())?;

        let mut a = x.to_owned();
        let mut rest = params;

        for layer in self.layers.iter_mut() {
            let (head, tail) = rest.split_at(layer.size());
            a = layer.forward(head, a.view())?;
            rest = tail;
        }

        Ok(a)
    }

    fn backward(&mut self, params: &[f32], grad: &mut [f32], mut d: Array2<f32>) -> Result<()> {
        self.check_len("params", params.len())?;
        self.check_len("grad", grad.len())?;

        let mut end = params.len();

        for layer in self.layers.iter_mut().rev() {
            let start = end - layer.size();
            d = layer.backward(&params[start..end], &mut grad[start..end], d)?;
            end = start;
        }

        Ok(())
    }
}
