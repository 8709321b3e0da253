//! Evaluation metric shared by every model and benchmark

use crate::error::{GalaxyError, Result};
use ndarray::{Array2, ArrayView2};
use tracing::info;

/// Root-mean-squared error over all elements of two equal-shaped matrices
pub fn rmse(predicted: ArrayView2<f64>, actual: ArrayView2<f64>) -> Result<f64> {
    if predicted.dim() != actual.dim() {
        return Err(GalaxyError::shape(
            format!("{:?}", actual.dim()),
            format!("{:?}", predicted.dim()),
        ));
    }
    if predicted.is_empty() {
        return Err(GalaxyError::InvalidInput("cannot score empty matrices".to_string()));
    }

    let sum_sq: f64 = predicted
        .iter()
        .zip(actual.iter())
        .map(|(p, a)| (p - a).powi(2))
        .sum();
    Ok((sum_sq / predicted.len() as f64).sqrt())
}

/// `rmse` that also logs the score, for experiment scripts
pub fn log_rmse(label: &str, predicted: &Array2<f64>, actual: &Array2<f64>) -> Result<f64> {
    let score = rmse(predicted.view(), actual.view())?;
    info!(rows = predicted.nrows(), "{} RMSE: {:.6}", label, score);
    Ok(score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_rmse_identity_is_zero() {
        let a = array![[0.1, 0.9, 0.3], [0.5, 0.5, 0.0]];
        assert_eq!(rmse(a.view(), a.view()).unwrap(), 0.0);
    }

    #[test]
    fn test_rmse_symmetric() {
        let a = array![[1.0, 0.0], [0.25, 0.75]];
        let b = array![[0.5, 0.5], [0.0, 1.0]];
        let ab = rmse(a.view(), b.view()).unwrap();
        let ba = rmse(b.view(), a.view()).unwrap();
        assert!((ab - ba).abs() < 1e-15);
    }

    #[test]
    fn test_rmse_known_value() {
        let a = array![[1.0, 0.0], [0.0, 1.0]];
        let b = array![[0.5, 0.5], [0.5, 0.5]];
        assert!((rmse(a.view(), b.view()).unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_rmse_shape_mismatch() {
        let a = array![[1.0, 0.0]];
        let b = array![[1.0], [0.0]];
        let err = rmse(a.view(), b.view()).unwrap_err();
        assert!(matches!(err, GalaxyError::ShapeMismatch { .. }));
    }
}
