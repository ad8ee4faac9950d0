use ndarray::{Array2, ArrayView2};
use rand::Rng;

use crate::Result;

/// A model whose parameters live in a single flat buffer owned by the caller.
pub trait Model {
    /// Returns the amount of parameters in the model.
    fn size(&self) -> usize;

    /// Initializes the model's parameters.
    ///
    /// # Arguments
    /// * `rng` - A random number generator.
    /// * `params` - The buffer to write the parameters into, of length `size()`.
    fn init<R: Rng>(&self, rng: &mut R, params: &mut [f32]) -> Result<()>;

    /// Makes a forward pass through the model, caching whatever the backward pass needs.
    ///
    /// # Arguments
    /// * `params` - The model's parameters.
    /// * `x` - The input data.
    ///
    /// # Returns
    /// The model's output for the given input.
    fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>>;

    /// Propagates `d`, the derivative of the loss with respect to the last output, back
    /// through the model. Must be called after `forward`.
    ///
    /// # Arguments
    /// * `params` - The model's parameters.
    /// * `grad` - A buffer where the gradient of the loss with respect to `params` is written.
    /// * `d` - The derivative of the loss with respect to the model's output.
    fn backward(&mut self, params: &[f32], grad: &mut [f32], d: Array2<f32>) -> Result<()>;
}
