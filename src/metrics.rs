//! Performance metrics for the classification stages

use std::fmt;

use ndarray::{Array1, Array2, ArrayView1, Axis};

use crate::error::{Error, Result};

/// Fraction of predictions that exactly match the ground truth.
///
/// Panics if the two vectors have different lengths; they always stem from
/// the same feature matrix.
pub fn accuracy(truth: &ArrayView1<usize>, prediction: &ArrayView1<usize>) -> f64 {
    assert_eq!(
        truth.len(),
        prediction.len(),
        "The number of predictions must match the number of ground-truth labels."
    );
    if truth.is_empty() {
        return 0.;
    }
    let hits = truth
        .iter()
        .zip(prediction.iter())
        .filter(|(t, p)| t == p)
        .count();
    hits as f64 / truth.len() as f64
}

/// Confusion matrix for multi-class evaluation
///
/// Rows correspond to the true class, columns to the predicted class; the
/// diagonal entries are correct predictions.
pub struct ConfusionMatrix {
    matrix: Array2<usize>,
}

impl ConfusionMatrix {
    pub fn new(
        truth: &ArrayView1<usize>,
        prediction: &ArrayView1<usize>,
        n_classes: usize,
    ) -> Result<ConfusionMatrix> {
        let mut matrix = Array2::zeros((n_classes, n_classes));
        for (&t, &p) in truth.iter().zip(prediction.iter()) {
            if t >= n_classes || p >= n_classes {
                return Err(Error::InvalidParams(format!(
                    "label ({}, {}) out of range 0..{}",
                    t, p, n_classes
                )));
            }
            matrix[(t, p)] += 1;
        }
        Ok(ConfusionMatrix { matrix })
    }

    /// Mean accuracy
    pub fn accuracy(&self) -> f64 {
        self.matrix.diag().sum() as f64 / self.matrix.sum() as f64
    }

    /// Precision for every class
    pub fn precision(&self) -> Array1<f64> {
        let sum = self.matrix.sum_axis(Axis(0));
        Array1::from_iter(
            self.matrix
                .diag()
                .iter()
                .zip(sum.iter())
                .map(|(&a, &b)| if b == 0 { 0. } else { a as f64 / b as f64 }),
        )
    }

    /// Recall for every class
    pub fn recall(&self) -> Array1<f64> {
        let sum = self.matrix.sum_axis(Axis(1));
        Array1::from_iter(
            self.matrix
                .diag()
                .iter()
                .zip(sum.iter())
                .map(|(&a, &b)| if b == 0 { 0. } else { a as f64 / b as f64 }),
        )
    }
}

impl fmt::Debug for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for row in self.matrix.rows() {
            write!(f, "| ")?;
            for x in row {
                write!(f, "{} | ", x)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn accuracy_counts_exact_matches() {
        let truth = array![0, 1, 2, 2];
        let pred = array![0, 2, 2, 2];
        assert_abs_diff_eq!(accuracy(&truth.view(), &pred.view()), 0.75);
    }

    #[test]
    fn perfect_prediction_scores_one() {
        let truth = array![3, 1, 4];
        assert_abs_diff_eq!(accuracy(&truth.view(), &truth.view()), 1.0);
    }

    #[test]
    fn confusion_matrix_diag_and_rates() {
        let truth = array![0, 0, 1, 1];
        let pred = array![0, 1, 1, 1];
        let cm = ConfusionMatrix::new(&truth.view(), &pred.view(), 2).unwrap();

        assert_abs_diff_eq!(cm.accuracy(), 0.75);
        assert_abs_diff_eq!(cm.precision(), array![1.0, 2. / 3.]);
        assert_abs_diff_eq!(cm.recall(), array![0.5, 1.0]);
    }

    #[test]
    fn out_of_range_labels_are_rejected() {
        let truth = array![0, 5];
        let pred = array![0, 1];
        assert!(ConfusionMatrix::new(&truth.view(), &pred.view(), 2).is_err());
    }
}
