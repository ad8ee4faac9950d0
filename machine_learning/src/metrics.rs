use std::fmt;

use crate::{MlErr, Result};

/// A snapshot of the single-label classification metrics.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct MetricValues {
    pub precision: f32,
    pub recall: f32,
    pub accuracy: f32,
}

impl fmt::Display for MetricValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "precision: {:.4}  recall: {:.4}  accuracy: {:.4}",
            self.precision, self.recall, self.accuracy
        )
    }
}

/// Streaming precision, recall and accuracy for single-label classification.
///
/// Counts accumulate across every `update` call. Precision and recall are macro averaged
/// over the classes that have been predicted or seen as targets respectively.
#[derive(Debug, Clone)]
pub struct SingleLabelMetrics {
    true_positives: Vec<u64>,
    false_positives: Vec<u64>,
    false_negatives: Vec<u64>,
    correct: u64,
    total: u64,
}

impl SingleLabelMetrics {
    /// Creates empty counters for `classes` classes.
    pub fn new(classes: usize) -> Self {
        Self {
            true_positives: vec![0; classes],
            false_positives: vec![0; classes],
            false_negatives: vec![0; classes],
            correct: 0,
            total: 0,
        }
    }

    pub fn classes(&self) -> usize {
        self.true_positives.len()
    }

    /// Accumulates a batch of predictions against its targets.
    ///
    /// # Returns
    /// The metrics over everything seen so far.
    pub fn update(&mut self, predictions: &[usize], targets: &[usize]) -> Result<MetricValues> {
        if predictions.len() != targets.len() {
            return Err(MlErr::SizeMismatch {
                what: "predictions",
                got: predictions.len(),
                expected: targets.len(),
            });
        }

        let classes = self.classes();
        if let Some(&label) = predictions.iter().chain(targets).find(|&&l| l >= classes) {
            return Err(MlErr::LabelOutOfRange { label, classes });
        }

        for (&pred, &target) in predictions.iter().zip(targets) {
            self.total += 1;

            if pred == target {
                self.correct += 1;
                self.true_positives[pred] += 1;
            } else {
                self.false_positives[pred] += 1;
                self.false_negatives[target] += 1;
            }
        }

        Ok(self.values())
    }

    /// The metrics over everything seen so far.
    pub fn values(&self) -> MetricValues {
        let precision = macro_average(&self.true_positives, &self.false_positives);
        let recall = macro_average(&self.true_positives, &self.false_negatives);
        let accuracy = ratio(self.correct, self.total);

        MetricValues {
            precision,
            recall,
            accuracy,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.classes());
    }
}

fn macro_average(hits: &[u64], misses: &[u64]) -> f32 {
    let (sum, count) = hits
        .iter()
        .zip(misses)
        .filter(|&(&h, &m)| h + m > 0)
        .fold((0., 0), |(sum, count), (&h, &m)| (sum + ratio(h, h + m), count + 1));

    if count == 0 { 0. } else { sum / count as f32 }
}

fn ratio(num: u64, den: u64) -> f32 {
    if den == 0 { 0. } else { num as f32 / den as f32 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_predictions() {
        let mut metrics = SingleLabelMetrics::new(3);
        let values = metrics.update(&[0, 1, 2], &[0, 1, 2]).unwrap();

        assert_eq!(
            values,
            MetricValues {
                precision: 1.,
                recall: 1.,
                accuracy: 1.
            }
        );
    }

    #[test]
    fn counts_accumulate_across_batches() {
        let mut metrics = SingleLabelMetrics::new(2);
        metrics.update(&[0, 0], &[0, 1]).unwrap();
        let values = metrics.update(&[1, 1], &[1, 1]).unwrap();

        // class 0: tp 1, fp 1 -> p 0.5, r 1.0; class 1: tp 2, fp 0, fn 1 -> p 1.0, r 2/3
        assert!((values.accuracy - 0.75).abs() < 1e-6);
        assert!((values.precision - 0.75).abs() < 1e-6);
        assert!((values.recall - (1. + 2. / 3.) / 2.).abs() < 1e-6);
    }

    #[test]
    fn out_of_range_labels_are_rejected() {
        let mut metrics = SingleLabelMetrics::new(2);
        assert_eq!(
            metrics.update(&[0], &[5]).unwrap_err(),
            MlErr::LabelOutOfRange {
                label: 5,
                classes: 2
            }
        );
    }

    #[test]
    fn reset_clears_the_counters() {
        let mut metrics = SingleLabelMetrics::new(2);
        metrics.update(&[0], &[1]).unwrap();
        metrics.reset();
        assert_eq!(metrics.values(), MetricValues::default());
    }
}
