//! Baselines with no learned regression model
//!
//! - Training-set average: every test row gets the column mean of the
//!   training solutions.
//! - Central pixel: training galaxies are clustered by the color of their
//!   center pixel and each test galaxy gets the mean solution of its
//!   nearest cluster.

use crate::data::{ImageStore, TrainSolutions};
use crate::error::{GalaxyError, Result};
use crate::features::central_pixels;
use crate::metrics::log_rmse;
use crate::training::KMeans;
use ndarray::{Array1, Array2, Axis};
use tracing::debug;

/// Output of the training-set average benchmark
#[derive(Debug, Clone)]
pub struct AverageBenchmark {
    /// Column mean of the training solutions
    pub mean: Array1<f64>,
    /// `mean` tiled to one row per test galaxy
    pub predictions: Array2<f64>,
    /// RMSE of the tiled mean against the training solutions themselves
    pub train_rmse: f64,
}

fn tile(row: &Array1<f64>, n: usize) -> Array2<f64> {
    let mut out = Array2::zeros((n, row.len()));
    out.rows_mut().into_iter().for_each(|mut r| r.assign(row));
    out
}

/// Column mean of the training solutions, repeated for `n_test` rows
///
/// The reported RMSE is a self-check against the training set, not a test
/// score.
pub fn train_set_average_benchmark(solutions: &TrainSolutions, n_test: usize) -> Result<AverageBenchmark> {
    let data = solutions.data();
    let mean = data
        .mean_axis(Axis(0))
        .ok_or_else(|| GalaxyError::insufficient("solution rows", 1, 0))?;

    let train_rmse = log_rmse("Average benchmark on training set", &tile(&mean, data.nrows()), data)?;

    Ok(AverageBenchmark {
        predictions: tile(&mean, n_test),
        mean,
        train_rmse,
    })
}

/// Central pixel color clustering benchmark
#[derive(Debug, Clone)]
pub struct CentralPixelBenchmark {
    n_clusters: usize,
    max_iter: usize,
    random_state: u64,
}

impl CentralPixelBenchmark {
    pub fn new(n_clusters: usize) -> Self {
        Self { n_clusters, max_iter: 300, random_state: 42 }
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Predictions for every image in `test_store`, in its ID order
    pub fn execute(
        &self,
        train_store: &dyn ImageStore,
        solutions: &TrainSolutions,
        test_store: &dyn ImageStore,
    ) -> Result<Array2<f64>> {
        if solutions.is_empty() {
            return Err(GalaxyError::insufficient("solution rows", 1, 0));
        }
        let train_colors = central_pixels(train_store, solutions.ids())?;

        let mut kmeans = KMeans::new(self.n_clusters)
            .with_max_iter(self.max_iter)
            .with_random_state(self.random_state);
        kmeans.fit(&train_colors)?;
        let labels = kmeans.predict(&train_colors)?;

        let data = solutions.data();
        let fallback = data
            .mean_axis(Axis(0))
            .ok_or_else(|| GalaxyError::insufficient("solution rows", 1, 0))?;
        let mut sums = Array2::<f64>::zeros((self.n_clusters, data.ncols()));
        let mut counts = vec![0usize; self.n_clusters];
        for (row, &label) in data.rows().into_iter().zip(&labels) {
            sums.row_mut(label).scaled_add(1.0, &row);
            counts[label] += 1;
        }
        for (c, mut row) in sums.rows_mut().into_iter().enumerate() {
            if counts[c] == 0 {
                row.assign(&fallback);
            } else {
                row.mapv_inplace(|v| v / counts[c] as f64);
            }
        }
        debug!(clusters = self.n_clusters, sizes = ?counts, "Cluster solution means");

        let test_colors = central_pixels(test_store, test_store.ids())?;
        let test_labels = kmeans.predict(&test_colors)?;
        Ok(sums.select(Axis(0), &test_labels))
    }
}

/// Convenience wrapper around `CentralPixelBenchmark::execute`
pub fn central_pixel_benchmark(
    train_store: &dyn ImageStore,
    solutions: &TrainSolutions,
    test_store: &dyn ImageStore,
    n_clusters: usize,
) -> Result<Array2<f64>> {
    CentralPixelBenchmark::new(n_clusters).execute(train_store, solutions, test_store)
}
