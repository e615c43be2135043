//! Feature standardization
//!
//! Learns per-column mean and standard deviation from a reference matrix
//! (the training split only) and applies the frozen statistics to any
//! same-width matrix, so the test splits see exactly the transform the
//! training data defined.

use approx::abs_diff_eq;
use ndarray::{Array1, Array2, Axis, Zip};

use crate::error::{Error, Result};
use crate::traits::{Fit, Transformer};

/// Standard scaler parameters. There is nothing to configure: the scaler
/// always centers and scales to unit variance.
#[derive(Debug, Default)]
pub struct StandardScaler;

impl StandardScaler {
    pub fn new() -> Self {
        StandardScaler
    }
}

impl Fit<Array2<f64>, ()> for StandardScaler {
    type Object = FittedStandardScaler;

    /// Learn per-column statistics from `records`. Fails with
    /// [`Error::NotEnoughSamples`] on an empty matrix.
    fn fit(&self, records: &Array2<f64>, _targets: &()) -> Result<FittedStandardScaler> {
        if records.nrows() == 0 {
            return Err(Error::NotEnoughSamples);
        }
        let offsets = records.mean_axis(Axis(0)).unwrap();
        let scales = records.std_axis(Axis(0), 0.).mapv(|s| {
            if abs_diff_eq!(s, 0.) {
                // constant feature, don't scale
                1.
            } else {
                1. / s
            }
        });
        Ok(FittedStandardScaler { offsets, scales })
    }
}

/// The result of fitting a [`StandardScaler`]. Statistics are frozen after
/// fitting; the same instance transforms the training and test matrices.
#[derive(Debug, Clone)]
pub struct FittedStandardScaler {
    offsets: Array1<f64>,
    scales: Array1<f64>,
}

impl FittedStandardScaler {
    /// Per-column means subtracted from each feature
    pub fn offsets(&self) -> &Array1<f64> {
        &self.offsets
    }

    /// Per-column inverse standard deviations applied to each feature
    pub fn scales(&self) -> &Array1<f64> {
        &self.scales
    }
}

impl Transformer<Array2<f64>, Array2<f64>> for FittedStandardScaler {
    /// Standardize a matrix of shape `(nsamples, nfeatures)`.
    ///
    /// Panics if the matrix width differs from the width of the fitting
    /// data.
    fn transform(&self, x: Array2<f64>) -> Array2<f64> {
        let mut x = x;
        Zip::from(x.columns_mut())
            .and(&self.offsets)
            .and(&self.scales)
            .for_each(|mut col, &offset, &scale| {
                col.mapv_inplace(|el| (el - offset) * scale);
            });
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Axis};

    #[test]
    fn own_fitting_data_becomes_zero_mean_unit_std() {
        let data = array![[1., -1., 2.], [2., 0., 0.], [0., 1., -1.]];
        let scaler = StandardScaler::new().fit(&data, &()).unwrap();
        let transformed = scaler.transform(data);

        let means = transformed.mean_axis(Axis(0)).unwrap();
        let std_devs = transformed.std_axis(Axis(0), 0.);
        assert_abs_diff_eq!(means, array![0., 0., 0.], epsilon = 1e-12);
        assert_abs_diff_eq!(std_devs, array![1., 1., 1.], epsilon = 1e-12);
    }

    #[test]
    fn frozen_statistics_apply_to_other_data() {
        let train = array![[0., 0.], [2., 4.]];
        let scaler = StandardScaler::new().fit(&train, &()).unwrap();

        assert_abs_diff_eq!(*scaler.offsets(), array![1., 2.]);
        let test = scaler.transform(array![[1., 2.], [3., 6.]]);
        assert_abs_diff_eq!(test, array![[0., 0.], [2., 2.]]);
    }

    #[test]
    fn constant_feature_is_not_scaled() {
        let data = array![[1., 5.], [2., 5.], [3., 5.]];
        let scaler = StandardScaler::new().fit(&data, &()).unwrap();
        let transformed = scaler.transform(data);

        // constant column centers to zero and stays there
        assert_abs_diff_eq!(
            transformed.column(1).to_owned(),
            array![0., 0., 0.]
        );
    }

    #[test]
    fn empty_input_fails() {
        let data = Array2::<f64>::zeros((0, 3));
        assert!(StandardScaler::new().fit(&data, &()).is_err());
    }
}
