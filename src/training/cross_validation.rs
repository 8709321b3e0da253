//! K-fold splitting, row subsampling and RMSE cross-validation

use super::models::Regressor;
use crate::error::{GalaxyError, Result};
use crate::metrics::rmse;
use ndarray::{Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

/// A single train/test split
#[derive(Debug, Clone)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// K-Fold splitter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KFold {
    pub n_splits: usize,
    pub shuffle: bool,
    pub random_state: u64,
}

impl KFold {
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            shuffle: true,
            random_state: 42,
        }
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Partition `0..n_samples` into `n_splits` disjoint test folds.
    /// The first `n_samples % n_splits` folds hold one extra row.
    pub fn split(&self, n_samples: usize) -> Result<Vec<CVSplit>> {
        let n_splits = self.n_splits;
        if n_splits < 2 {
            return Err(GalaxyError::InvalidParameter {
                name: "cv_folds".to_string(),
                value: n_splits.to_string(),
                reason: "must be at least 2".to_string(),
            });
        }
        if n_samples < n_splits {
            return Err(GalaxyError::insufficient("cross-validation rows", n_splits, n_samples));
        }

        let mut indices: Vec<usize> = (0..n_samples).collect();
        if self.shuffle {
            let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
            indices.shuffle(&mut rng);
        }

        let base = n_samples / n_splits;
        let remainder = n_samples % n_splits;

        let mut splits = Vec::with_capacity(n_splits);
        let mut current = 0;
        for fold_idx in 0..n_splits {
            let fold_size = if fold_idx < remainder { base + 1 } else { base };
            let test_indices = indices[current..current + fold_size].to_vec();
            let train_indices = indices[..current]
                .iter()
                .chain(indices[current + fold_size..].iter())
                .copied()
                .collect();

            splits.push(CVSplit {
                train_indices,
                test_indices,
                fold_idx,
            });
            current += fold_size;
        }
        Ok(splits)
    }
}

/// Cross-validation results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CVResults {
    /// RMSE of each fold
    pub scores: Vec<f64>,
    pub mean_score: f64,
    pub std_score: f64,
    pub n_folds: usize,
}

impl CVResults {
    /// Create CV results from fold scores
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let n_folds = scores.len();
        let mean_score = scores.iter().sum::<f64>() / n_folds.max(1) as f64;
        let variance =
            scores.iter().map(|s| (s - mean_score).powi(2)).sum::<f64>() / n_folds.max(1) as f64;

        Self {
            scores,
            mean_score,
            std_score: variance.sqrt(),
            n_folds,
        }
    }
}

/// Split `0..n_samples` into a random sample of `ceil(fraction * n)` rows and
/// the remaining holdout rows. A fraction of 1 keeps every row, in order.
pub fn sample_split(n_samples: usize, fraction: f64, seed: u64) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(fraction > 0.0 && fraction <= 1.0) {
        return Err(GalaxyError::InvalidParameter {
            name: "sample fraction".to_string(),
            value: fraction.to_string(),
            reason: "must be in (0, 1]".to_string(),
        });
    }
    if fraction >= 1.0 {
        return Ok(((0..n_samples).collect(), Vec::new()));
    }

    let n_keep = ((n_samples as f64) * fraction).ceil() as usize;
    let mut indices: Vec<usize> = (0..n_samples).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);
    let holdout = indices.split_off(n_keep.min(n_samples));
    Ok((indices, holdout))
}

/// Fit a fresh model per fold and score it on the held-out rows
pub fn cross_val_rmse<F>(build: F, x: &Array2<f64>, y: &Array2<f64>, kfold: &KFold) -> Result<CVResults>
where
    F: Fn() -> Result<Box<dyn Regressor>>,
{
    if x.nrows() != y.nrows() {
        return Err(GalaxyError::shape(
            format!("{} target rows", x.nrows()),
            format!("{} target rows", y.nrows()),
        ));
    }

    let splits = kfold.split(x.nrows())?;
    let mut scores = Vec::with_capacity(splits.len());
    for split in &splits {
        let x_train = x.select(Axis(0), &split.train_indices);
        let y_train = y.select(Axis(0), &split.train_indices);
        let x_test = x.select(Axis(0), &split.test_indices);
        let y_test = y.select(Axis(0), &split.test_indices);

        let mut model = build()?;
        model.fit(&x_train, &y_train)?;
        let predicted = model.predict(&x_test)?;
        let score = rmse(predicted.view(), y_test.view())?;
        info!(
            fold = split.fold_idx + 1,
            of = splits.len(),
            model = model.name(),
            "Fold RMSE: {:.6}",
            score
        );
        scores.push(score);
    }
    Ok(CVResults::from_scores(scores))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::linear_models::RidgeRegression;

    #[test]
    fn test_k_fold() {
        let splits = KFold::new(5).with_shuffle(false).split(100).unwrap();
        assert_eq!(splits.len(), 5);
        for split in &splits {
            assert_eq!(split.test_indices.len(), 20);
            assert_eq!(split.train_indices.len(), 80);
        }

        let mut all_test: Vec<usize> = splits.iter().flat_map(|s| s.test_indices.clone()).collect();
        all_test.sort();
        assert_eq!(all_test, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_k_fold_uneven_and_disjoint() {
        let splits = KFold::new(3).split(10).unwrap();
        let sizes: Vec<usize> = splits.iter().map(|s| s.test_indices.len()).collect();
        assert_eq!(sizes, vec![4, 3, 3]);
        for split in &splits {
            assert!(split.test_indices.iter().all(|i| !split.train_indices.contains(i)));
            assert_eq!(split.train_indices.len() + split.test_indices.len(), 10);
        }
    }

    #[test]
    fn test_k_fold_rejects_bad_sizes() {
        assert!(matches!(
            KFold::new(1).split(10).unwrap_err(),
            GalaxyError::InvalidParameter { .. }
        ));
        assert!(matches!(
            KFold::new(3).split(2).unwrap_err(),
            GalaxyError::InsufficientSample { .. }
        ));
    }

    #[test]
    fn test_sample_split() {
        let (sample, holdout) = sample_split(10, 0.5, 1).unwrap();
        assert_eq!(sample.len(), 5);
        assert_eq!(holdout.len(), 5);

        let (all, none) = sample_split(4, 1.0, 1).unwrap();
        assert_eq!(all, vec![0, 1, 2, 3]);
        assert!(none.is_empty());

        assert!(sample_split(4, 0.0, 1).is_err());
        assert!(sample_split(4, 1.5, 1).is_err());
    }

    #[test]
    fn test_cross_val_rmse() {
        let x = Array2::from_shape_fn((30, 2), |(i, j)| if j == 0 { i as f64 } else { (i % 7) as f64 });
        let y = Array2::from_shape_fn((30, 1), |(i, _)| 0.5 * i as f64 + 1.0);

        let results = cross_val_rmse(
            || Ok(Box::new(RidgeRegression::new(1e-8)) as Box<dyn Regressor>),
            &x,
            &y,
            &KFold::new(3),
        )
        .unwrap();

        assert_eq!(results.n_folds, 3);
        assert_eq!(results.scores.len(), 3);
        assert!(results.mean_score < 1e-4);
    }

    #[test]
    fn test_cv_results_stats() {
        let results = CVResults::from_scores(vec![1.0, 3.0]);
        assert_eq!(results.mean_score, 2.0);
        assert_eq!(results.std_score, 1.0);
    }
}
