//! Extra Trees (Extremely Randomized Trees) implementation
//!
//! Unlike Random Forest which searches for the best split among a random subset
//! of features, Extra Trees draws one random threshold per candidate feature and
//! keeps the best of those. Trees see the full training set rather than a
//! bootstrap sample.

use super::decision_tree::{RegressionTree, SplitStrategy};
use super::models::{check_features, Regressor};
use super::random_forest::{average_trees, forest_importances, grow_trees, ForestParams};
use crate::error::{GalaxyError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Extra Trees regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtraTrees {
    trees: Vec<RegressionTree>,
    pub params: ForestParams,
    pub bootstrap: bool,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
}

impl Default for ExtraTrees {
    fn default() -> Self {
        Self::new(ForestParams::default())
    }
}

impl ExtraTrees {
    pub fn new(params: ForestParams) -> Self {
        Self {
            trees: Vec::new(),
            params,
            bootstrap: false,
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

impl Regressor for ExtraTrees {
    fn fit(&mut self, x: &Array2<f64>, y: &Array2<f64>) -> Result<()> {
        self.trees = grow_trees(&self.params, SplitStrategy::Random, self.bootstrap, x, y)?;
        self.n_features = x.ncols();
        self.feature_importances = Some(forest_importances(&self.trees, self.n_features));
        debug!(trees = self.trees.len(), rows = x.nrows(), "Fitted extra trees");
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
        "ExtraTrees"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::rmse;
    use ndarray::Array;

    #[test]
    fn test_extra_trees_regression() {
        let x = Array::from_shape_fn((80, 2), |(i, j)| ((i * (j + 1)) % 17) as f64);
        let y = Array::from_shape_fn((80, 3), |(i, k)| x[[i, 0]] / 16.0 * (k as f64 + 1.0) / 3.0);

        let mut et = ExtraTrees::new(ForestParams::default().with_n_estimators(10));
        et.fit(&x, &y).unwrap();

        let pred = et.predict(&x).unwrap();
        assert_eq!(pred.dim(), (80, 3));
        assert!(rmse(pred.view(), y.view()).unwrap() < 0.05);
        assert_eq!(et.n_trees(), 10);
    }

    #[test]
    fn test_extra_trees_deterministic() {
        let x = Array::from_shape_fn((30, 2), |(i, j)| (i + j) as f64);
        let y = Array::from_shape_fn((30, 1), |(i, _)| (i % 5) as f64);

        let mut a = ExtraTrees::new(ForestParams::default().with_n_estimators(3).with_random_state(1));
        let mut b = ExtraTrees::new(ForestParams::default().with_n_estimators(3).with_random_state(1));
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_predict_before_fit() {
        let et = ExtraTrees::default();
        assert!(matches!(
            et.predict(&Array2::zeros((1, 1))).unwrap_err(),
            GalaxyError::ModelNotFitted
        ));
    }
}
