//! Ridge regression over a multi-column target

use super::models::{check_features, check_rows, Regressor};
use crate::error::{GalaxyError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Lower-triangular Cholesky factor of a symmetric positive-definite matrix.
/// Retries once with a small diagonal jitter if the matrix is near-singular.
fn cholesky_factor(a: &Array2<f64>) -> Option<Array2<f64>> {
    cholesky_inner(a).or_else(|| {
        let n = a.nrows();
        let ridge = 1e-8 * a.diag().iter().map(|v| v.abs()).sum::<f64>() / n.max(1) as f64;
        let mut a_reg = a.clone();
        for k in 0..n {
            a_reg[[k, k]] += ridge;
        }
        cholesky_inner(&a_reg)
    })
}

fn cholesky_inner(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    if n != a.ncols() {
        return None;
    }
    let mut l = Array2::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }
    Some(l)
}

/// Solve `L Lᵀ X = B` for every column of `B`
fn cholesky_solve(l: &Array2<f64>, b: &Array2<f64>) -> Array2<f64> {
    let n = l.nrows();
    let mut x = Array2::zeros(b.raw_dim());

    for c in 0..b.ncols() {
        // Forward substitution: L * y = b
        let mut y = Array1::zeros(n);
        for i in 0..n {
            let mut sum = 0.0;
            for j in 0..i {
                sum += l[[i, j]] * y[j];
            }
            y[i] = (b[[i, c]] - sum) / l[[i, i]];
        }

        // Backward substitution: L^T * x = y
        for i in (0..n).rev() {
            let mut sum = 0.0;
            for j in (i + 1)..n {
                sum += l[[j, i]] * x[[j, c]];
            }
            x[[i, c]] = (y[i] - sum) / l[[i, i]];
        }
    }
    x
}

/// Gauss-Jordan inversion (fallback when Cholesky fails)
fn matrix_inverse(m: &Array2<f64>) -> Option<Array2<f64>> {
    let n = m.nrows();
    if n != m.ncols() {
        return None;
    }

    let mut aug = Array2::zeros((n, 2 * n));
    for i in 0..n {
        for j in 0..n {
            aug[[i, j]] = m[[i, j]];
        }
        aug[[i, n + i]] = 1.0;
    }

    for col in 0..n {
        let mut max_row = col;
        for row in col + 1..n {
            if aug[[row, col]].abs() > aug[[max_row, col]].abs() {
                max_row = row;
            }
        }
        if max_row != col {
            for j in 0..2 * n {
                aug.swap([col, j], [max_row, j]);
            }
        }

        if aug[[col, col]].abs() < 1e-10 {
            return None;
        }

        let pivot = aug[[col, col]];
        for j in 0..2 * n {
            aug[[col, j]] /= pivot;
        }

        for row in 0..n {
            if row != col {
                let factor = aug[[row, col]];
                if factor != 0.0 {
                    for j in 0..2 * n {
                        aug[[row, j]] -= factor * aug[[col, j]];
                    }
                }
            }
        }
    }

    Some(aug.slice(ndarray::s![.., n..]).to_owned())
}

/// Ridge Regression (L2-regularized linear regression)
///
/// One coefficient column per output, all sharing a single factorisation
/// of `XᵀX + αI`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RidgeRegression {
    /// `(n_features, n_outputs)`
    pub coefficients: Option<Array2<f64>>,
    pub intercept: Option<Array1<f64>>,
    pub fit_intercept: bool,
    /// L2 regularization strength
    pub alpha: f64,
}

impl Default for RidgeRegression {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl RidgeRegression {
    pub fn new(alpha: f64) -> Self {
        Self {
            coefficients: None,
            intercept: None,
            fit_intercept: true,
            alpha,
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.alpha >= 0.0) || !self.alpha.is_finite() {
            return Err(GalaxyError::InvalidParameter {
                name: "alpha".to_string(),
                value: self.alpha.to_string(),
                reason: "must be a finite non-negative number".to_string(),
            });
        }
        Ok(())
    }
}

impl Regressor for RidgeRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array2<f64>) -> Result<()> {
        self.validate()?;
        check_rows(x, y)?;
        let n_features = x.ncols();

        let (x_c, y_c, x_mean, y_mean) = if self.fit_intercept {
            let xm = x
                .mean_axis(Axis(0))
                .ok_or_else(|| GalaxyError::InvalidInput("empty feature matrix".to_string()))?;
            let ym = y
                .mean_axis(Axis(0))
                .ok_or_else(|| GalaxyError::InvalidInput("empty target matrix".to_string()))?;
            (x - &xm, y - &ym, xm, ym)
        } else {
            (
                x.clone(),
                y.clone(),
                Array1::zeros(n_features),
                Array1::zeros(y.ncols()),
            )
        };

        let mut xtx = x_c.t().dot(&x_c);
        for i in 0..n_features {
            xtx[[i, i]] += self.alpha;
        }
        let xty = x_c.t().dot(&y_c);

        let coefficients = match cholesky_factor(&xtx) {
            Some(l) => cholesky_solve(&l, &xty),
            None => match matrix_inverse(&xtx) {
                Some(inv) => inv.dot(&xty),
                None => return Err(GalaxyError::Computation("Singular matrix".to_string())),
            },
        };

        self.intercept = Some(&y_mean - &x_mean.dot(&coefficients));
        self.coefficients = Some(coefficients);
        debug!(features = n_features, outputs = y.ncols(), alpha = self.alpha, "Fitted ridge");
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (coefficients, intercept) = match (&self.coefficients, &self.intercept) {
            (Some(c), Some(i)) => (c, i),
            _ => return Err(GalaxyError::ModelNotFitted),
        };
        check_features(coefficients.nrows(), x)?;
        Ok(x.dot(coefficients) + intercept)
    }

    fn is_fitted(&self) -> bool {
        self.coefficients.is_some()
    }

    fn name(&self) -> &'static str {
        "Ridge"
    }
}
