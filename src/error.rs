//! Error types for the expression-analysis pipeline
//!
//! Every stage is fatal on failure: the pipeline has no retry policy, so all
//! errors bubble up to the caller and abort the run.

use thiserror::Error;

use ndarray::ShapeError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Input table does not match the expected `emotion,pixels,Usage` schema
    #[error("malformed dataset: {0}")]
    DataFormat(String),
    /// A pixel string does not flatten to the expected image dimensions
    #[error("row {row}: expected {expected} pixels, found {found}")]
    PixelCount {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("invalid parameter: {0}")]
    InvalidParams(String),
    #[error("not enough samples to fit")]
    NotEnoughSamples,
    #[error("k-means did not converge")]
    NotConverged,
    #[error("invalid ndarray shape {0}")]
    NdShape(#[from] ShapeError),
    #[error(transparent)]
    Linalg(#[from] linfa_linalg::LinalgError),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),
}
