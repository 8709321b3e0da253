//! ZCA whitening of patch vectors

use crate::error::{GalaxyError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

const MAX_SWEEPS: usize = 100;

/// Eigen-decomposition of a symmetric matrix by cyclic Jacobi rotations
///
/// Returns eigenvalues and the matrix whose columns are the eigenvectors.
pub(crate) fn symmetric_eigen(matrix: &Array2<f64>) -> Result<(Array1<f64>, Array2<f64>)> {
    let n = matrix.nrows();
    if matrix.ncols() != n {
        return Err(GalaxyError::shape(
            format!("square matrix, {} columns", n),
            format!("{} columns", matrix.ncols()),
        ));
    }

    let mut a = matrix.clone();
    let mut v = Array2::<f64>::eye(n);
    let scale: f64 = a.iter().map(|x| x * x).sum::<f64>().max(f64::MIN_POSITIVE);

    for sweep in 0..MAX_SWEEPS {
        let mut off = 0.0;
        for p in 0..n {
            for q in (p + 1)..n {
                off += a[[p, q]] * a[[p, q]];
            }
        }
        if off <= 1e-24 * scale {
            debug!(sweeps = sweep, "Jacobi eigen-decomposition converged");
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[[p, q]];
                if apq == 0.0 {
                    continue;
                }
                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let akp = a[[k, p]];
                    let akq = a[[k, q]];
                    a[[k, p]] = c * akp - s * akq;
                    a[[k, q]] = s * akp + c * akq;
                }
                for k in 0..n {
                    let apk = a[[p, k]];
                    let aqk = a[[q, k]];
                    a[[p, k]] = c * apk - s * aqk;
                    a[[q, k]] = s * apk + c * aqk;
                }
                for k in 0..n {
                    let vkp = v[[k, p]];
                    let vkq = v[[k, q]];
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }

    let values = a.diag().to_owned();
    if values.iter().any(|x| !x.is_finite()) {
        return Err(GalaxyError::Computation("eigen-decomposition diverged".to_string()));
    }
    Ok((values, v))
}

/// Zero-phase component analysis whitening
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZcaWhitening {
    epsilon: f64,
    mean: Option<Array1<f64>>,
    transform: Option<Array2<f64>>,
}

impl Default for ZcaWhitening {
    fn default() -> Self {
        Self::new(0.1)
    }
}

impl ZcaWhitening {
    pub fn new(epsilon: f64) -> Self {
        Self { epsilon, mean: None, transform: None }
    }

    pub fn is_fitted(&self) -> bool {
        self.transform.is_some()
    }

    /// Learn `V diag(1 / sqrt(lambda + eps)) Vᵀ` from the patch covariance
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        if !(self.epsilon > 0.0) {
            return Err(GalaxyError::InvalidParameter {
                name: "epsilon".to_string(),
                value: self.epsilon.to_string(),
                reason: "must be positive".to_string(),
            });
        }
        let n = x.nrows();
        if n < 2 {
            return Err(GalaxyError::insufficient("whitening samples", 2, n));
        }

        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| GalaxyError::Computation("empty whitening input".to_string()))?;
        let centered = x - &mean;
        let cov = centered.t().dot(&centered) / (n - 1) as f64;

        let (values, vectors) = symmetric_eigen(&cov)?;
        let inv_sqrt = values.mapv(|l| 1.0 / (l.max(0.0) + self.epsilon).sqrt());
        let scaled = &vectors * &inv_sqrt;
        self.transform = Some(scaled.dot(&vectors.t()));
        self.mean = Some(mean);
        Ok(self)
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (mean, w) = match (&self.mean, &self.transform) {
            (Some(m), Some(w)) => (m, w),
            _ => return Err(GalaxyError::ModelNotFitted),
        };
        if x.ncols() != mean.len() {
            return Err(GalaxyError::shape(
                format!("{} columns", mean.len()),
                format!("{} columns", x.ncols()),
            ));
        }
        Ok((x - mean).dot(w))
    }
}
