use super::{Optimizer, optimizer::check_sizes};
use crate::Result;

/// Gradient descent optimization algorithm.
#[derive(Debug, Default, Clone, Copy)]
pub struct GradientDescent;

impl GradientDescent {
    /// Returns a new `GradientDescent`.
    pub fn new() -> Self {
        Self
    }
}

impl Optimizer for GradientDescent {
    /// Makes a step of length `learning_rate` in the opposite direction of the gradient.
    fn update_params(&mut self, learning_rate: f32, grad: &[f32], params: &mut [f32]) -> Result<()> {
        check_sizes(grad, params, None)?;

        for (w, g) in params.iter_mut().zip(grad) {
            *w -= learning_rate * g;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_against_the_gradient() {
        let mut params = [1., 2.];
        GradientDescent.update_params(0.5, &[2., -2.], &mut params).unwrap();
        assert_eq!(params, [0., 3.]);
    }

    #[test]
    fn mismatched_lengths_fail() {
        let mut params = [1., 2.];
        assert!(GradientDescent.update_params(0.5, &[2.], &mut params).is_err());
    }
}
