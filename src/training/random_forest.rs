//! Random Forest implementation

use super::decision_tree::{MaxFeatures, RegressionTree, SplitStrategy};
use super::models::{check_features, check_rows, Regressor};
use crate::error::{GalaxyError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::RngCore;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Tree-growing knobs shared by both forests
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub random_state: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 10,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
            random_state: 42,
        }
    }
}

impl ForestParams {
    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_min_samples_leaf(mut self, n: usize) -> Self {
        self.min_samples_leaf = n;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(GalaxyError::InvalidParameter {
                name: "n_estimators".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if let MaxFeatures::Fraction(f) = self.max_features {
            if !(f > 0.0 && f <= 1.0) {
                return Err(GalaxyError::InvalidParameter {
                    name: "max_features".to_string(),
                    value: f.to_string(),
                    reason: "fraction must be in (0, 1]".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Grow `n_estimators` trees in parallel; tree `i` is seeded with `random_state + i`
pub(crate) fn grow_trees(
    params: &ForestParams,
    strategy: SplitStrategy,
    bootstrap: bool,
    x: &Array2<f64>,
    y: &Array2<f64>,
) -> Result<Vec<RegressionTree>> {
    params.validate()?;
    check_rows(x, y)?;

    let n_samples = x.nrows();
    let max_features = params.max_features.resolve(x.ncols());
    let base_seed = params.random_state;

    (0..params.n_estimators)
        .into_par_iter()
        .map(|tree_idx| {
            let seed = base_seed.wrapping_add(tree_idx as u64);
            let mut rng = ChaCha8Rng::seed_from_u64(seed);

            let mut tree = RegressionTree::new(strategy)
                .with_max_depth(params.max_depth)
                .with_min_samples_split(params.min_samples_split)
                .with_min_samples_leaf(params.min_samples_leaf)
                .with_max_features(max_features)
                .with_random_state(rng.next_u64());

            if bootstrap {
                let sample_indices: Vec<usize> = (0..n_samples)
                    .map(|_| (rng.next_u64() as usize) % n_samples)
                    .collect();
                let x_boot = x.select(Axis(0), &sample_indices);
                let y_boot = y.select(Axis(0), &sample_indices);
                tree.fit(&x_boot, &y_boot)?;
            } else {
                tree.fit(x, y)?;
            }
            Ok(tree)
        })
        .collect()
}

/// Mean of every tree's prediction
pub(crate) fn average_trees(trees: &[RegressionTree], x: &Array2<f64>) -> Result<Array2<f64>> {
    let n_outputs = trees.first().ok_or(GalaxyError::ModelNotFitted)?.n_outputs();

    let sum = trees
        .par_iter()
        .map(|tree| tree.predict(x))
        .try_reduce(
            || Array2::zeros((x.nrows(), n_outputs)),
            |a, b| Ok(a + b),
        )?;
    Ok(sum / trees.len() as f64)
}

/// Normalised mean of per-tree importances
pub(crate) fn forest_importances(trees: &[RegressionTree], n_features: usize) -> Array1<f64> {
    let mut total = Array1::zeros(n_features);
    for imp in trees.iter().filter_map(|t| t.feature_importances()) {
        total += imp;
    }
    let sum = total.sum();
    if sum > 0.0 {
        total /= sum;
    }
    total
}

/// Bagged forest of best-split regression trees
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<RegressionTree>,
    pub params: ForestParams,
    /// Bootstrap sampling
    pub bootstrap: bool,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(ForestParams::default())
    }
}

impl RandomForest {
    pub fn new(params: ForestParams) -> Self {
        Self {
            trees: Vec::new(),
            params,
            bootstrap: true,
            n_features: 0,
            feature_importances: None,
        }
    }

    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Regressor for RandomForest {
    fn fit(&mut self, x: &Array2<f64>, y: &Array2<f64>) -> Result<()> {
        self.trees = grow_trees(&self.params, SplitStrategy::Best, self.bootstrap, x, y)?;
        self.n_features = x.ncols();
        self.feature_importances = Some(forest_importances(&self.trees, self.n_features));
        debug!(trees = self.trees.len(), rows = x.nrows(), "Fitted random forest");
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.trees.is_empty() {
            return Err(GalaxyError::ModelNotFitted);
        }
        check_features(self.n_features, x)?;
        average_trees(&self.trees, x)
    }

    fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    fn name(&self) -> &'static str {
        "RandomForest"
    }
}
