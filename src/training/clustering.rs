//! K-Means clustering
//!
//! Unsupervised: `fit` takes X only. Used to learn the patch codebook for
//! k-means image features and to bucket central-pixel colours.

use crate::error::{GalaxyError, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// K-Means clustering with k-means++ initialization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KMeans {
    pub n_clusters: usize,
    pub max_iter: usize,
    pub tol: f64,
    pub random_state: u64,
    /// Fitted cluster centroids (n_clusters × n_features)
    centroids: Option<Array2<f64>>,
    /// Cluster labels assigned during fit
    pub labels: Option<Vec<usize>>,
    /// Sum of squared distances to nearest centroid (inertia)
    pub inertia: Option<f64>,
    pub n_iter: usize,
}

impl Default for KMeans {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Squared norm of every row
fn row_norms(x: &Array2<f64>) -> Array1<f64> {
    x.map_axis(Axis(1), |r| r.dot(&r))
}

/// Index of and squared distance to the closest centroid
fn nearest(row: ArrayView1<f64>, centroids: &Array2<f64>, c_norms: &Array1<f64>) -> (usize, f64) {
    let r_norm = row.dot(&row);
    let mut best_c = 0;
    let mut best_dist = f64::MAX;
    for (c, centroid) in centroids.rows().into_iter().enumerate() {
        let d = (r_norm - 2.0 * row.dot(&centroid) + c_norms[c]).max(0.0);
        if d < best_dist {
            best_dist = d;
            best_c = c;
        }
    }
    (best_c, best_dist)
}

impl KMeans {
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            max_iter: 300,
            tol: 1e-4,
            random_state: 42,
            centroids: None,
            labels: None,
            inertia: None,
            n_iter: 0,
        }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// K-means++ initialization: pick centroids spread apart
    fn kmeans_pp_init(x: &Array2<f64>, k: usize, rng: &mut ChaCha8Rng) -> Array2<f64> {
        let n_samples = x.nrows();
        let mut centroids = Array2::zeros((k, x.ncols()));

        let first = rng.gen_range(0..n_samples);
        centroids.row_mut(0).assign(&x.row(first));

        // Squared distance of every sample to its closest chosen centroid
        let mut dists: Vec<f64> = (0..n_samples)
            .into_par_iter()
            .map(|i| {
                let diff = &x.row(i) - &centroids.row(0);
                diff.dot(&diff)
            })
            .collect();

        for c in 1..k {
            let total: f64 = dists.iter().sum();
            let chosen = if total <= 0.0 {
                rng.gen_range(0..n_samples)
            } else {
                let r = rng.gen::<f64>() * total;
                let mut cumulative = 0.0;
                dists
                    .iter()
                    .position(|&d| {
                        cumulative += d;
                        cumulative >= r
                    })
                    .unwrap_or(n_samples - 1)
            };
            centroids.row_mut(c).assign(&x.row(chosen));

            let centroid = centroids.row(c);
            dists.par_iter_mut().enumerate().for_each(|(i, d)| {
                let diff = &x.row(i) - &centroid;
                *d = d.min(diff.dot(&diff));
            });
        }

        centroids
    }

    /// Fit the model (unsupervised, no y needed)
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        if self.n_clusters == 0 {
            return Err(GalaxyError::InvalidParameter {
                name: "n_clusters".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        let n_samples = x.nrows();
        if n_samples < self.n_clusters {
            return Err(GalaxyError::insufficient("clustering samples", self.n_clusters, n_samples));
        }

        let k = self.n_clusters;
        let n_features = x.ncols();
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let mut centroids = Self::kmeans_pp_init(x, k, &mut rng);
        let mut labels = vec![usize::MAX; n_samples];
        self.n_iter = 0;

        for _iter in 0..self.max_iter {
            self.n_iter += 1;
            let c_norms = row_norms(&centroids);

            // Assignment step: assign each point to nearest centroid
            let new_labels: Vec<usize> = (0..n_samples)
                .into_par_iter()
                .map(|i| nearest(x.row(i), &centroids, &c_norms).0)
                .collect();

            let changed = new_labels.iter().zip(&labels).filter(|(a, b)| a != b).count();
            labels = new_labels;

            // Update step: recompute centroids
            let (sums, counts) = (0..n_samples)
                .into_par_iter()
                .fold(
                    || (Array2::<f64>::zeros((k, n_features)), vec![0usize; k]),
                    |(mut sums, mut counts), i| {
                        let c = labels[i];
                        counts[c] += 1;
                        sums.row_mut(c).scaled_add(1.0, &x.row(i));
                        (sums, counts)
                    },
                )
                .reduce(
                    || (Array2::<f64>::zeros((k, n_features)), vec![0usize; k]),
                    |(a_sums, a_counts), (b_sums, b_counts)| {
                        let counts = a_counts.iter().zip(&b_counts).map(|(a, b)| a + b).collect();
                        (a_sums + b_sums, counts)
                    },
                );

            let mut new_centroids = sums;
            for c in 0..k {
                if counts[c] > 0 {
                    new_centroids.row_mut(c).mapv_inplace(|v| v / counts[c] as f64);
                } else {
                    // Empty cluster: reinitialize randomly
                    let idx = rng.gen_range(0..n_samples);
                    new_centroids.row_mut(c).assign(&x.row(idx));
                }
            }

            let shift: f64 = centroids
                .iter()
                .zip(new_centroids.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>()
                .sqrt();

            centroids = new_centroids;

            if changed == 0 || shift < self.tol {
                break;
            }
        }

        let c_norms = row_norms(&centroids);
        let inertia: f64 = (0..n_samples)
            .into_par_iter()
            .map(|i| nearest(x.row(i), &centroids, &c_norms).1)
            .sum();

        debug!(clusters = k, samples = n_samples, iterations = self.n_iter, inertia, "Fitted k-means");
        self.centroids = Some(centroids);
        self.labels = Some(labels);
        self.inertia = Some(inertia);
        Ok(self)
    }

    /// Predict cluster labels for new data
    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        let centroids = self.fitted_centroids(x)?;
        let c_norms = row_norms(centroids);
        Ok((0..x.nrows())
            .into_par_iter()
            .map(|i| nearest(x.row(i), centroids, &c_norms).0)
            .collect())
    }

    /// Euclidean distance from every row of `x` to every centroid, `(n, n_clusters)`
    pub fn distances(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let centroids = self.fitted_centroids(x)?;
        let c_norms = row_norms(centroids);
        let x_norms = row_norms(x);
        let mut d = x.dot(&centroids.t());
        d.indexed_iter_mut().for_each(|((i, c), v)| {
            *v = (x_norms[i] - 2.0 * *v + c_norms[c]).max(0.0).sqrt();
        });
        Ok(d)
    }

    fn fitted_centroids(&self, x: &Array2<f64>) -> Result<&Array2<f64>> {
        let centroids = self.centroids.as_ref().ok_or(GalaxyError::ModelNotFitted)?;
        if x.ncols() != centroids.ncols() {
            return Err(GalaxyError::shape(
                format!("{} features", centroids.ncols()),
                format!("{} features", x.ncols()),
            ));
        }
        Ok(centroids)
    }

    /// Get cluster centroids
    pub fn centroids(&self) -> Option<&Array2<f64>> {
        self.centroids.as_ref()
    }

    pub fn is_fitted(&self) -> bool {
        self.centroids.is_some()
    }
}
