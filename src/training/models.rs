//! Estimator trait shared by every model the runner drives

use crate::error::{GalaxyError, Result};
use ndarray::Array2;

/// A regressor mapping a feature matrix to a multi-column target
///
/// Every model predicts all target columns at once: `fit` receives an
/// `(n_samples, n_outputs)` matrix and `predict` returns one of the same
/// width.
pub trait Regressor: Send + Sync {
    fn fit(&mut self, x: &Array2<f64>, y: &Array2<f64>) -> Result<()>;

    fn predict(&self, x: &Array2<f64>) -> Result<Array2<f64>>;

    fn is_fitted(&self) -> bool;

    fn name(&self) -> &'static str;
}

/// Reject feature and target matrices with different row counts
pub(crate) fn check_rows(x: &Array2<f64>, y: &Array2<f64>) -> Result<()> {
    if x.nrows() != y.nrows() {
        return Err(GalaxyError::shape(
            format!("{} target rows", x.nrows()),
            format!("{} target rows", y.nrows()),
        ));
    }
    if x.nrows() == 0 {
        return Err(GalaxyError::insufficient("training rows", 1, 0));
    }
    Ok(())
}

/// Reject a prediction matrix whose width differs from the training width
pub(crate) fn check_features(expected: usize, x: &Array2<f64>) -> Result<()> {
    if x.ncols() != expected {
        return Err(GalaxyError::shape(
            format!("{} features", expected),
            format!("{} features", x.ncols()),
        ));
    }
    Ok(())
}

/// Builds a fresh, unfitted regressor
pub type ModelFactory = Box<dyn Fn() -> Result<Box<dyn Regressor>> + Send + Sync>;
