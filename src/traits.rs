//! Capability traits implemented by the numerical components
//!
//! The pipeline only ever talks to its collaborators through these seams, so
//! any compliant implementation can be substituted without touching the
//! orchestration in [`crate::pipeline`].

use crate::error::Result;

/// Fit a model from a feature matrix and (for supervised estimators) targets.
///
/// Unsupervised estimators take `()` as their target type.
pub trait Fit<R, T> {
    type Object;

    fn fit(&self, records: &R, targets: &T) -> Result<Self::Object>;
}

/// Map data through a fitted transformation.
pub trait Transformer<In, Out> {
    fn transform(&self, x: In) -> Out;
}

/// Predict targets for new observations with a fitted model.
pub trait Predict<In, Out> {
    fn predict(&self, x: In) -> Out;
}

/// A set of hyperparameters whose values have not been checked for validity.
/// A reference to the checked set can only be obtained after checking has
/// completed. If `Fit` is implemented on the checked set, it is also
/// implemented on the unchecked set with the checking step done
/// automatically.
pub trait ParamGuard {
    /// The checked hyperparameters
    type Checked;

    /// Checks the hyperparameters and returns a reference to the checked set
    /// if successful
    fn check_ref(&self) -> Result<&Self::Checked>;

    /// Checks the hyperparameters and returns the checked set if successful
    fn check(self) -> Result<Self::Checked>;
}

impl<R, T, P: ParamGuard> Fit<R, T> for P
where
    P::Checked: Fit<R, T>,
{
    type Object = <P::Checked as Fit<R, T>>::Object;

    fn fit(&self, records: &R, targets: &T) -> Result<Self::Object> {
        self.check_ref()?.fit(records, targets)
    }
}
