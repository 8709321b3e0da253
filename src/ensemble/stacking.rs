//! Two-stage stacking regressor
//!
//! The first stage is fitted per fold; its out-of-fold predictions become the
//! training features of the second stage. At predict time the fold models'
//! predictions are averaged before being handed to the second stage.

use crate::error::{GalaxyError, Result};
use crate::training::cross_validation::KFold;
use crate::training::models::{check_features, check_rows, ModelFactory, Regressor};
use ndarray::{concatenate, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration for stacking ensemble
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackingConfig {
    /// Number of cross-validation folds for out-of-fold predictions
    pub n_folds: usize,
    /// Whether to append the input features to the second-stage input
    pub passthrough: bool,
    pub seed: u64,
}

impl Default for StackingConfig {
    fn default() -> Self {
        Self {
            n_folds: 3,
            passthrough: false,
            seed: 42,
        }
    }
}

/// First stage → second stage regressor (e.g. ridge → random forest)
pub struct StackedRegressor {
    config: StackingConfig,
    first: ModelFactory,
    second: ModelFactory,
    fitted_first: Vec<Box<dyn Regressor>>,
    fitted_second: Option<Box<dyn Regressor>>,
    n_features: usize,
    name: &'static str,
}

impl StackedRegressor {
    pub fn new(config: StackingConfig, first: ModelFactory, second: ModelFactory) -> Self {
        Self {
            config,
            first,
            second,
            fitted_first: Vec::new(),
            fitted_second: None,
            n_features: 0,
            name: "Stacked",
        }
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    fn meta_features(&self, x: &Array2<f64>, first_stage: Array2<f64>) -> Result<Array2<f64>> {
        if self.config.passthrough {
            Ok(concatenate(Axis(1), &[first_stage.view(), x.view()])?)
        } else {
            Ok(first_stage)
        }
    }
}

impl Regressor for StackedRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array2<f64>) -> Result<()> {
        check_rows(x, y)?;
        let splits = KFold::new(self.config.n_folds)
            .with_random_state(self.config.seed)
            .split(x.nrows())?;

        let mut oof = Array2::zeros(y.raw_dim());
        let mut fitted = Vec::with_capacity(splits.len());

        for split in &splits {
            let x_train = x.select(Axis(0), &split.train_indices);
            let y_train = y.select(Axis(0), &split.train_indices);
            let x_val = x.select(Axis(0), &split.test_indices);

            let mut model = (self.first)()?;
            model.fit(&x_train, &y_train)?;
            let predictions = model.predict(&x_val)?;

            for (local_idx, &global_idx) in split.test_indices.iter().enumerate() {
                oof.row_mut(global_idx).assign(&predictions.row(local_idx));
            }
            fitted.push(model);
        }

        let meta = self.meta_features(x, oof)?;
        let mut second = (self.second)()?;
        second.fit(&meta, y)?;

        debug!(folds = fitted.len(), meta_features = meta.ncols(), "Fitted {}", self.name);
        self.n_features = x.ncols();
        self.fitted_first = fitted;
        self.fitted_second = Some(second);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let second = self.fitted_second.as_ref().ok_or(GalaxyError::ModelNotFitted)?;
        check_features(self.n_features, x)?;

        let mut first_stage: Option<Array2<f64>> = None;
        for model in &self.fitted_first {
            let preds = model.predict(x)?;
            first_stage = Some(match first_stage {
                Some(sum) => sum + preds,
                None => preds,
            });
        }
        let first_stage = first_stage.ok_or(GalaxyError::ModelNotFitted)? / self.fitted_first.len() as f64;

        let meta = self.meta_features(x, first_stage)?;
        second.predict(&meta)
    }

    fn is_fitted(&self) -> bool {
        self.fitted_second.is_some()
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::rmse;
    use crate::training::linear_models::RidgeRegression;
    use crate::training::random_forest::{ForestParams, RandomForest};

    fn ridge_rf(passthrough: bool) -> StackedRegressor {
        StackedRegressor::new(
            StackingConfig { passthrough, ..Default::default() },
            Box::new(|| Ok(Box::new(RidgeRegression::new(1.0)) as Box<dyn Regressor>)),
            Box::new(|| {
                Ok(Box::new(RandomForest::new(ForestParams::default().with_n_estimators(5)))
                    as Box<dyn Regressor>)
            }),
        )
        .with_name("RidgeRF")
    }

    #[test]
    fn test_stacked_fit_predict() {
        let x = Array2::from_shape_fn((60, 3), |(i, j)| ((i + j * 5) % 13) as f64 / 12.0);
        let y = Array2::from_shape_fn((60, 2), |(i, k)| {
            let s = x[[i, 0]] + x[[i, 1]];
            if k == 0 { s / 2.0 } else { 1.0 - s / 2.0 }
        });

        let mut model = ridge_rf(false);
        assert!(!model.is_fitted());
        model.fit(&x, &y).unwrap();
        assert!(model.is_fitted());
        assert_eq!(model.name(), "RidgeRF");

        let pred = model.predict(&x).unwrap();
        assert_eq!(pred.dim(), (60, 2));
        assert!(rmse(pred.view(), y.view()).unwrap() < 0.1);
    }

    #[test]
    fn test_passthrough_widens_meta_features() {
        let x = Array2::from_shape_fn((30, 2), |(i, j)| (i * (j + 1)) as f64 / 30.0);
        let y = Array2::from_shape_fn((30, 1), |(i, _)| i as f64 / 30.0);
        let mut model = ridge_rf(true);
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&x).unwrap().dim(), (30, 1));
    }

    #[test]
    fn test_predict_before_fit() {
        let model = ridge_rf(false);
        let err = model.predict(&Array2::zeros((1, 3))).unwrap_err();
        assert!(matches!(err, GalaxyError::ModelNotFitted));
    }
}
