//! Support Vector Regression
//!
//! Epsilon-insensitive SVR solved by dual coordinate descent. The bias is
//! folded into the kernel (`K + 1`) so every coordinate update is a closed-form
//! soft-threshold clipped to `[-C, C]`. One kernel matrix is shared by all
//! outputs and each output is solved independently on the rayon pool.

use super::models::{check_features, check_rows, Regressor};
use crate::error::{GalaxyError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Default bound on the rows used to build the eager kernel matrix
const MAX_KERNEL_MATRIX_SAMPLES: usize = 10_000;

fn default_max_samples() -> usize {
    MAX_KERNEL_MATRIX_SAMPLES
}

/// Kernel function type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KernelType {
    /// Linear kernel: K(x, y) = x · y
    Linear,
    /// Polynomial kernel: K(x, y) = (γ * x · y + r)^d
    Polynomial { degree: usize, gamma: f64, coef0: f64 },
    /// Radial Basis Function (Gaussian): K(x, y) = exp(-γ * ||x - y||²).
    /// `None` uses `1 / n_features`.
    RBF { gamma: Option<f64> },
}

impl Default for KernelType {
    fn default() -> Self {
        KernelType::RBF { gamma: None }
    }
}

/// SVR configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SVMConfig {
    /// Regularization parameter (C)
    pub c: f64,
    /// Kernel function
    pub kernel: KernelType,
    /// Stop when no coefficient moves by more than this in a full pass
    pub tol: f64,
    /// Maximum number of passes over the data
    pub max_iter: usize,
    pub random_state: u64,
    /// Epsilon for regression (SVR tube width)
    pub epsilon: f64,
    /// Larger training sets are subsampled to this many rows
    #[serde(default = "default_max_samples")]
    pub max_samples: usize,
}

impl Default for SVMConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            kernel: KernelType::default(),
            tol: 1e-3,
            max_iter: 1000,
            random_state: 42,
            epsilon: 0.1,
            max_samples: MAX_KERNEL_MATRIX_SAMPLES,
        }
    }
}

impl SVMConfig {
    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_kernel(mut self, kernel: KernelType) -> Self {
        self.kernel = kernel;
        self
    }

    pub fn with_max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = max_samples;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |name: &str, value: f64, reason: &str| GalaxyError::InvalidParameter {
            name: name.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        };
        if !(self.c > 0.0) {
            return Err(invalid("c", self.c, "must be positive"));
        }
        if !(self.epsilon >= 0.0) {
            return Err(invalid("epsilon", self.epsilon, "must be non-negative"));
        }
        if self.max_samples == 0 {
            return Err(invalid("max_samples", 0.0, "must be positive"));
        }
        if let KernelType::RBF { gamma: Some(g) } = self.kernel {
            if !(g > 0.0) {
                return Err(invalid("gamma", g, "must be positive"));
            }
        }
        Ok(())
    }
}

/// Multi-output epsilon-SVR
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMRegressor {
    config: SVMConfig,
    support_vectors: Option<Array2<f64>>,
    /// `(n_support, n_outputs)` dual coefficients
    dual_coef: Option<Array2<f64>>,
    /// Resolved kernel parameter
    gamma: f64,
}

impl SVMRegressor {
    pub fn new(config: SVMConfig) -> Self {
        Self {
            config,
            support_vectors: None,
            dual_coef: None,
            gamma: 1.0,
        }
    }

    pub fn config(&self) -> &SVMConfig {
        &self.config
    }

    fn kernel_matrix(&self, a: &Array2<f64>, b: &Array2<f64>) -> Array2<f64> {
        let dots = a.dot(&b.t());
        match &self.config.kernel {
            KernelType::Linear => dots,
            KernelType::Polynomial { degree, gamma, coef0 } => {
                let d = (*degree).min(i32::MAX as usize) as i32;
                dots.mapv(|v| (gamma * v + coef0).powi(d))
            }
            KernelType::RBF { .. } => {
                let a_sq = a.map_axis(Axis(1), |r| r.dot(&r));
                let b_sq = b.map_axis(Axis(1), |r| r.dot(&r));
                let gamma = self.gamma;
                let mut k = dots;
                k.indexed_iter_mut().for_each(|((i, j), v)| {
                    let dist = (a_sq[i] + b_sq[j] - 2.0 * *v).max(0.0);
                    *v = (-gamma * dist).exp();
                });
                k
            }
        }
    }

    /// Coordinate descent on one output column, returning its dual coefficients
    fn solve_output(&self, k: &Array2<f64>, y: ndarray::ArrayView1<f64>, output: usize) -> Array1<f64> {
        let n = y.len();
        let c = self.config.c;
        let eps = self.config.epsilon;
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state.wrapping_add(output as u64));

        let mut beta = Array1::<f64>::zeros(n);
        let mut f = Array1::<f64>::zeros(n);
        let mut order: Vec<usize> = (0..n).collect();

        for _iter in 0..self.config.max_iter {
            order.shuffle(&mut rng);
            let mut max_change: f64 = 0.0;

            for &i in &order {
                let kii = k[[i, i]];
                if kii <= 0.0 {
                    continue;
                }
                let z = beta[i] - (f[i] - y[i]) / kii;
                let shrunk = z.signum() * (z.abs() - eps / kii).max(0.0);
                let new_val = shrunk.clamp(-c, c);
                let delta = new_val - beta[i];
                if delta != 0.0 {
                    beta[i] = new_val;
                    f.scaled_add(delta, &k.row(i));
                    max_change = max_change.max(delta.abs());
                }
            }

            if max_change < self.config.tol {
                break;
            }
        }
        beta
    }

    /// Seeded row subset of size `max_samples`, sorted
    fn capped_rows(&self, n: usize) -> Vec<usize> {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);
        let mut rows = rand::seq::index::sample(&mut rng, n, self.config.max_samples).into_vec();
        rows.sort_unstable();
        rows
    }

    pub fn n_support_vectors(&self) -> usize {
        self.support_vectors.as_ref().map_or(0, |sv| sv.nrows())
    }
}

impl Regressor for SVMRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array2<f64>) -> Result<()> {
        self.config.validate()?;
        check_rows(x, y)?;
        let (x, y) = if x.nrows() > self.config.max_samples {
            warn!(
                samples = x.nrows(),
                max_samples = self.config.max_samples,
                "Subsampling SVR training set to bound the kernel matrix"
            );
            let rows = self.capped_rows(x.nrows());
            (x.select(Axis(0), &rows), y.select(Axis(0), &rows))
        } else {
            (x.to_owned(), y.to_owned())
        };
        let (x, y) = (&x, &y);
        let n = x.nrows();

        self.gamma = match self.config.kernel {
            KernelType::RBF { gamma: Some(g) } => g,
            _ => 1.0 / x.ncols().max(1) as f64,
        };

        // Bias folded into the kernel
        let k = self.kernel_matrix(x, x) + 1.0;

        let betas: Vec<Array1<f64>> = (0..y.ncols())
            .into_par_iter()
            .map(|j| self.solve_output(&k, y.column(j), j))
            .collect();

        let support: Vec<usize> = (0..n)
            .filter(|&i| betas.iter().any(|b| b[i].abs() > 1e-12))
            .collect();

        let mut dual_coef = Array2::zeros((support.len(), y.ncols()));
        for (j, beta) in betas.iter().enumerate() {
            for (row, &i) in support.iter().enumerate() {
                dual_coef[[row, j]] = beta[i];
            }
        }

        debug!(samples = n, support = support.len(), outputs = y.ncols(), "Fitted SVR");
        self.support_vectors = Some(x.select(Axis(0), &support));
        self.dual_coef = Some(dual_coef);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (sv, coef) = match (&self.support_vectors, &self.dual_coef) {
            (Some(sv), Some(coef)) => (sv, coef),
            _ => return Err(GalaxyError::ModelNotFitted),
        };
        check_features(sv.ncols(), x)?;
        if sv.nrows() == 0 {
            return Ok(Array2::zeros((x.nrows(), coef.ncols())));
        }
        let k = self.kernel_matrix(x, sv) + 1.0;
        Ok(k.dot(coef))
    }

    fn is_fitted(&self) -> bool {
        self.dual_coef.is_some()
    }

    fn name(&self) -> &'static str {
        "SVR"
    }
}
