//! K-means clustering and the cluster-quality diagnostic built on top of it

mod k_means;
mod label_transfer;

pub use k_means::{KMeans, KMeansInit, KMeansParams, KMeansValidParams};
pub use label_transfer::{apply_vote, majority_vote};
