//! Feed-forward neural-network classification

mod mlp;

pub use mlp::{Mlp, MlpParams, MlpValidParams};
