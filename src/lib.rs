//! `facexp` — facial-expression recognition on the FER2013 dataset
//!
//! An image-classification pipeline built from small, independently usable
//! stages: a CSV loader that partitions the table by split tag, feature
//! standardization, whitened PCA, K-means clustering with a majority-vote
//! diagnostic, and a one-hidden-layer neural classifier. The [`pipeline`]
//! module wires the stages together in the canonical order; everything else
//! can be used on its own through the [`Fit`](traits::Fit),
//! [`Transformer`](traits::Transformer) and [`Predict`](traits::Predict)
//! traits.

pub mod clustering;
pub mod dataset;
mod error;
pub mod metrics;
pub mod neural;
pub mod persist;
pub mod pipeline;
pub mod preprocessing;
pub mod reduction;
pub mod traits;
pub mod viz;

pub use error::{Error, Result};
pub use pipeline::{run, PipelineConfig, RunReport};
