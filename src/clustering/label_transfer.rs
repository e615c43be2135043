//! Majority-vote label transfer
//!
//! Scores unsupervised structure against known ground truth: every cluster
//! adopts the most frequent true label among its members, and each sample
//! inherits the label of its cluster. The agreement rate between these
//! derived labels and the true ones measures how well the clustering aligns
//! with the classes. This is a diagnostic only; it never feeds the
//! classifier.

use ndarray::{Array1, Array2, ArrayView1};

use crate::error::{Error, Result};

/// Compute the majority class per cluster.
///
/// Returns a map from cluster id to the most frequent true label among the
/// samples assigned to it, ties broken toward the lowest label value. A
/// cluster with no members maps to label 0, which never affects any sample.
pub fn majority_vote(
    assignments: &ArrayView1<usize>,
    truth: &ArrayView1<usize>,
    n_clusters: usize,
    n_classes: usize,
) -> Result<Array1<usize>> {
    if assignments.len() != truth.len() {
        return Err(Error::InvalidParams(format!(
            "{} cluster assignments for {} labels",
            assignments.len(),
            truth.len()
        )));
    }

    let mut counts = Array2::<usize>::zeros((n_clusters, n_classes));
    for (&cluster, &label) in assignments.iter().zip(truth.iter()) {
        if cluster >= n_clusters {
            return Err(Error::InvalidParams(format!(
                "cluster id {} out of range 0..{}",
                cluster, n_clusters
            )));
        }
        if label >= n_classes {
            return Err(Error::InvalidParams(format!(
                "class label {} out of range 0..{}",
                label, n_classes
            )));
        }
        counts[(cluster, label)] += 1;
    }

    let vote = counts
        .rows()
        .into_iter()
        .map(|row| {
            let mut best = 0;
            for (label, &count) in row.iter().enumerate() {
                // strict comparison keeps the lowest label on ties
                if count > row[best] {
                    best = label;
                }
            }
            best
        })
        .collect();
    Ok(vote)
}

/// Expand a cluster→label map into per-sample labels.
pub fn apply_vote(assignments: &ArrayView1<usize>, vote: &ArrayView1<usize>) -> Array1<usize> {
    assignments.mapv(|cluster| vote[cluster])
}
