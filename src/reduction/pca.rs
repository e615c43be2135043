//! Principal Component Analysis
//!
//! Projects the data onto the subspace of maximal variance, found with the
//! truncated SVD routine in `linfa-linalg` (LOBPCG). With whitening enabled
//! every retained component is rescaled to unit variance, not merely
//! decorrelated. The fitted model also exposes the inverse projection, used
//! by the pipeline to reconstruct images for the visual fidelity check and
//! as input to the cluster analyzer.

use linfa_linalg::{lobpcg::TruncatedSvd, Order};
use ndarray::{Array1, Array2, Axis, Zip};
use rand::{rngs::SmallRng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::traits::{Fit, ParamGuard, Transformer};

/// Principal Component Analysis parameters
#[derive(Debug, Clone, PartialEq)]
pub struct PcaValidParams {
    embedding_size: usize,
    apply_whitening: bool,
}

impl PcaValidParams {
    pub fn embedding_size(&self) -> usize {
        self.embedding_size
    }

    pub fn apply_whitening(&self) -> bool {
        self.apply_whitening
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PcaParams(PcaValidParams);

impl PcaParams {
    /// Apply whitening to the embedding vectors
    ///
    /// Whitening rescales each retained component such that the projected
    /// data has unit diagonal covariance.
    pub fn whiten(mut self, apply: bool) -> Self {
        self.0.apply_whitening = apply;
        self
    }
}

impl ParamGuard for PcaParams {
    type Checked = PcaValidParams;

    fn check_ref(&self) -> Result<&Self::Checked> {
        if self.0.embedding_size == 0 {
            return Err(Error::InvalidParams(
                "embedding size must be at least 1".to_string(),
            ));
        }
        Ok(&self.0)
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}

/// Fit a PCA model to a feature matrix
///
/// The mean and components are derived exclusively from the matrix passed
/// here; applying the fitted model to other data reuses them unchanged.
impl Fit<Array2<f64>, ()> for PcaValidParams {
    type Object = Pca;

    fn fit(&self, records: &Array2<f64>, _targets: &()) -> Result<Pca> {
        if records.nrows() < 2 {
            return Err(Error::NotEnoughSamples);
        }
        if self.embedding_size > records.nrows().min(records.ncols()) {
            return Err(Error::InvalidParams(format!(
                "embedding size {} exceeds the data rank bound {}",
                self.embedding_size,
                records.nrows().min(records.ncols())
            )));
        }

        let mean = records.mean_axis(Axis(0)).unwrap();
        let x = records - &mean;

        let result = TruncatedSvd::new_with_rng(x, Order::Largest, SmallRng::seed_from_u64(42))
            .decompose(self.embedding_size)?;
        let (_, sigma, components) = result.values_vectors();

        // cut singular values to avoid numerical problems
        let sigma = sigma.mapv(|x: f64| x.max(1e-8));

        Ok(Pca {
            components,
            sigma,
            mean,
            whiten: self.apply_whitening,
            cov_scale: (records.nrows() as f64 - 1.).sqrt(),
        })
    }
}

/// Fitted Principal Component Analysis model
///
/// Holds the mean, the orthonormal components and the singular values of the
/// fitting data. The components are kept unscaled so that the whitening
/// factor can be undone by [`Pca::inverse_transform`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pca {
    components: Array2<f64>,
    sigma: Array1<f64>,
    mean: Array1<f64>,
    whiten: bool,
    cov_scale: f64,
}

impl Pca {
    /// Create a default parameter set
    ///
    /// * `embedding_size`: the target dimensionality
    pub fn params(embedding_size: usize) -> PcaParams {
        PcaParams(PcaValidParams {
            embedding_size,
            apply_whitening: false,
        })
    }

    /// The orthonormal components, shape `(embedding_size, nfeatures)`
    pub fn components(&self) -> &Array2<f64> {
        &self.components
    }

    /// The singular values of the centered fitting data
    pub fn singular_values(&self) -> &Array1<f64> {
        &self.sigma
    }

    /// Amount of variance explained by each retained component
    pub fn explained_variance(&self) -> Array1<f64> {
        let scale = self.cov_scale * self.cov_scale;
        self.sigma.mapv(|x| x * x / scale)
    }

    /// Normalized amount of variance explained by each retained component
    pub fn explained_variance_ratio(&self) -> Array1<f64> {
        let ex_var = self.explained_variance();
        let sum = ex_var.sum();
        ex_var / sum
    }

    /// Map a reduced matrix back into the original feature space.
    ///
    /// Reconstruction is lossy whenever fewer components than features were
    /// retained; only the column count is guaranteed to match the fitting
    /// data.
    pub fn inverse_transform(&self, reduced: &Array2<f64>) -> Array2<f64> {
        let mut z = reduced.to_owned();
        if self.whiten {
            Zip::from(z.columns_mut())
                .and(&self.sigma)
                .for_each(|mut col, &sigma| col *= sigma / self.cov_scale);
        }
        z.dot(&self.components) + &self.mean
    }
}

/// Project a matrix to the reduced space
///
/// The projection first centers, then projects, then (with whitening)
/// rescales each component to unit variance.
impl Transformer<&Array2<f64>, Array2<f64>> for Pca {
    fn transform(&self, records: &Array2<f64>) -> Array2<f64> {
        let mut z = (records - &self.mean).dot(&self.components.t());
        if self.whiten {
            Zip::from(z.columns_mut())
                .and(&self.sigma)
                .for_each(|mut col, &sigma| col *= self.cov_scale / sigma);
        }
        z
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use ndarray_rand::{rand_distr::Uniform, RandomExt};

    /// Whitening test
    ///
    /// Rotates 2-dimensional data by 45° and checks that the whitening
    /// transformation produces a unit diagonal covariance matrix.
    #[test]
    fn whitening_yields_unit_covariance() {
        let mut rng = SmallRng::seed_from_u64(42);

        let tmp = Array2::random_using((300, 2), Uniform::new(-1.0f64, 1.), &mut rng);
        let q = array![[1., 1.], [-1., 1.]];
        let data = tmp.dot(&q);

        let model = Pca::params(2).whiten(true).fit(&data, &()).unwrap();
        let proj = model.transform(&data);

        let cov = proj.t().dot(&proj);
        assert_abs_diff_eq!(cov / (300. - 1.), Array2::eye(2), epsilon = 1e-4);
    }

    #[test]
    fn inverse_transform_restores_column_count() {
        let mut rng = SmallRng::seed_from_u64(3);
        let data = Array2::random_using((20, 6), Uniform::new(-1.0f64, 1.), &mut rng);

        let model = Pca::params(2).whiten(true).fit(&data, &()).unwrap();
        let reduced = model.transform(&data);
        assert_eq!(reduced.dim(), (20, 2));

        let restored = model.inverse_transform(&reduced);
        assert_eq!(restored.dim(), data.dim());
    }

    #[test]
    fn full_rank_reconstruction_is_exact() {
        let mut rng = SmallRng::seed_from_u64(7);
        let data = Array2::random_using((30, 3), Uniform::new(-1.0f64, 1.), &mut rng);

        let model = Pca::params(3).whiten(true).fit(&data, &()).unwrap();
        let restored = model.inverse_transform(&model.transform(&data));
        assert_abs_diff_eq!(restored, data, epsilon = 1e-6);
    }

    #[test]
    fn explained_variance_ratio_is_normalized_and_sorted() {
        let mut rng = SmallRng::seed_from_u64(11);
        let data = Array2::random_using((50, 5), Uniform::new(-1.0f64, 1.), &mut rng);

        let model = Pca::params(5).fit(&data, &()).unwrap();
        let ratio = model.explained_variance_ratio();

        assert_abs_diff_eq!(ratio.sum(), 1.0, epsilon = 1e-9);
        for pair in ratio.as_slice().unwrap().windows(2) {
            assert!(pair[0] >= pair[1]);
        }
    }

    #[test]
    fn oversized_embedding_is_rejected() {
        let data = Array2::<f64>::zeros((4, 3));
        assert!(Pca::params(5).fit(&data, &()).is_err());
    }

    #[test]
    fn zero_components_is_rejected() {
        assert!(Pca::params(0).check().is_err());
    }
}
