//! Saving and loading the pipeline results
//!
//! The bundle mirrors what a later analysis session needs to pick up where
//! the run left off: the trained classifier, the standardized training
//! matrix it was derived from, the training labels, and the held-out
//! accuracy. Serialized as JSON; an existing file at the target path is
//! overwritten without prompting.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::neural::Mlp;

/// Everything a follow-up session needs from one pipeline run.
#[derive(Debug, Serialize, Deserialize)]
pub struct ResultBundle {
    /// Trained classifier
    pub classifier: Mlp,
    /// Standardized (but not reduced) training matrix
    pub train_features: Array2<f64>,
    /// Training labels as class ids
    pub train_labels: Vec<usize>,
    /// Accuracy of `classifier` on the held-out test split
    pub test_accuracy: f64,
}

/// Write `bundle` to `path`, replacing any existing file.
pub fn save(bundle: &ResultBundle, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer(BufWriter::new(file), bundle)?;
    Ok(())
}

/// Read a bundle written by [`save`].
pub fn load(path: &Path) -> Result<ResultBundle> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}
