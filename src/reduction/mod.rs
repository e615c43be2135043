//! Dimensionality reduction

mod pca;

pub use pca::{Pca, PcaParams, PcaValidParams};
