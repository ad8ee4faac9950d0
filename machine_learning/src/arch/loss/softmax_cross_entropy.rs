use ndarray::{Array2, ArrayView2, Axis};

use super::LossFn;

/// Softmax cross entropy between unscaled logits and one-hot targets, averaged over the batch.
#[derive(Debug, Default, Clone, Copy)]
pub struct SoftmaxCrossEntropy;

impl SoftmaxCrossEntropy {
    /// Returns a new `SoftmaxCrossEntropy`.
    pub fn new() -> Self {
        Self
    }
}

/// Computes the row-wise softmax of `logits`, shifted by each row's maximum for stability.
pub fn softmax(logits: ArrayView2<f32>) -> Array2<f32> {
    let mut probs = logits.to_owned();

    for mut row in probs.axis_iter_mut(Axis(0)) {
        let max = row.fold(f32::NEG_INFINITY, |acc, &x| acc.max(x));
        row.mapv_inplace(|x| (x - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|x| x / sum);
    }

    probs
}

impl LossFn for SoftmaxCrossEntropy {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> f32 {
        let nrows = y_pred.nrows();
        if nrows == 0 {
            return 0.;
        }

        let mut total = 0.;
        for (logits, target) in y_pred.outer_iter().zip(y.outer_iter()) {
            let max = logits.fold(f32::NEG_INFINITY, |acc, &x| acc.max(x));
            let log_sum = logits.mapv(|x| (x - max).exp()).sum().ln() + max;

            total += logits
                .iter()
                .zip(target)
                .map(|(&z, &t)| t * (log_sum - z))
                .sum::<f32>();
        }

        total / nrows as f32
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Array2<f32> {
        let nrows = y_pred.nrows().max(1);
        (softmax(y_pred) - &y) / nrows as f32
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn softmax_rows_sum_to_one() {
        let logits = array![[1., 2., 3.], [1000., 1000., 1000.]];
        let probs = softmax(logits.view());

        for row in probs.outer_iter() {
            assert!((row.sum() - 1.).abs() < 1e-6);
        }
        assert!((probs[[1, 0]] - 1. / 3.).abs() < 1e-6);
    }

    #[test]
    fn uniform_logits_give_log_of_the_classes() {
        let logits = array![[0., 0., 0., 0.]];
        let targets = array![[0., 1., 0., 0.]];
        let loss = SoftmaxCrossEntropy.loss(logits.view(), targets.view());
        assert!((loss - 4f32.ln()).abs() < 1e-6);
    }

    #[test]
    fn gradient_is_softmax_minus_targets_over_batch() {
        let logits = array![[0., 0.], [0., 0.]];
        let targets = array![[1., 0.], [0., 1.]];
        let d = SoftmaxCrossEntropy.loss_prime(logits.view(), targets.view());
        assert_eq!(d, array![[-0.25, 0.25], [0.25, -0.25]]);
    }
}
