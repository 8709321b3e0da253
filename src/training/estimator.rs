//! Estimator kinds the runner can build
//!
//! `EstimatorKind` is a plain description of a model and its
//! hyperparameters. `build` turns it into a fresh, unfitted `Regressor`, so
//! cross-validation and grid search can create as many independent copies
//! as they need.

use super::decision_tree::MaxFeatures;
use super::linear_models::RidgeRegression;
use super::models::{ModelFactory, Regressor};
use super::random_forest::{ForestParams, RandomForest};
use super::extra_trees::ExtraTrees;
use super::svm::{SVMConfig, SVMRegressor};
use crate::ensemble::{CascadeRegressor, StackedRegressor, StackingConfig};
use crate::error::{GalaxyError, Result};
use crate::optimizer::{HyperParameter, TrialParams};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EstimatorKind {
    RandomForest(ForestParams),
    ExtraTrees(ForestParams),
    Ridge { alpha: f64 },
    Svr(SVMConfig),
    /// One random forest per question group
    CascadeForest(ForestParams),
    /// Ridge first stage, random forest second stage
    RidgeRf { alpha: f64, forest: ForestParams },
    /// SVR first stage, random forest second stage
    SvrRf { svr: SVMConfig, forest: ForestParams },
}

impl EstimatorKind {
    pub fn name(&self) -> &'static str {
        match self {
            EstimatorKind::RandomForest(_) => "RandomForest",
            EstimatorKind::ExtraTrees(_) => "ExtraTrees",
            EstimatorKind::Ridge { .. } => "Ridge",
            EstimatorKind::Svr(_) => "SVR",
            EstimatorKind::CascadeForest(_) => "RandomForestCascade",
            EstimatorKind::RidgeRf { .. } => "RidgeRF",
            EstimatorKind::SvrRf { .. } => "SVRRF",
        }
    }

    fn forest(&self) -> Option<&ForestParams> {
        match self {
            EstimatorKind::RandomForest(p)
            | EstimatorKind::ExtraTrees(p)
            | EstimatorKind::CascadeForest(p)
            | EstimatorKind::RidgeRf { forest: p, .. }
            | EstimatorKind::SvrRf { forest: p, .. } => Some(p),
            _ => None,
        }
    }

    fn forest_mut(&mut self) -> Option<&mut ForestParams> {
        match self {
            EstimatorKind::RandomForest(p)
            | EstimatorKind::ExtraTrees(p)
            | EstimatorKind::CascadeForest(p)
            | EstimatorKind::RidgeRf { forest: p, .. }
            | EstimatorKind::SvrRf { forest: p, .. } => Some(p),
            _ => None,
        }
    }

    fn alpha_mut(&mut self) -> Option<&mut f64> {
        match self {
            EstimatorKind::Ridge { alpha } | EstimatorKind::RidgeRf { alpha, .. } => Some(alpha),
            _ => None,
        }
    }

    fn svr_mut(&mut self) -> Option<&mut SVMConfig> {
        match self {
            EstimatorKind::Svr(svr) | EstimatorKind::SvrRf { svr, .. } => Some(svr),
            _ => None,
        }
    }

    /// Whether a grid over `param` makes sense for this estimator
    pub fn accepts(&self, param: HyperParameter) -> bool {
        match param {
            HyperParameter::NEstimators | HyperParameter::MaxFeatures | HyperParameter::MinSamplesLeaf => {
                self.forest().is_some()
            }
            HyperParameter::Alpha => {
                matches!(self, EstimatorKind::Ridge { .. } | EstimatorKind::RidgeRf { .. })
            }
            HyperParameter::C | HyperParameter::Epsilon => {
                matches!(self, EstimatorKind::Svr(_) | EstimatorKind::SvrRf { .. })
            }
        }
    }

    /// A copy of this estimator with one grid point applied
    pub fn with_params(&self, params: &TrialParams) -> Result<Self> {
        let mut kind = self.clone();
        for &(param, value) in params.iter() {
            let applied = match param {
                HyperParameter::NEstimators => kind.forest_mut().map(|p| p.n_estimators = value.as_usize()),
                HyperParameter::MaxFeatures => kind
                    .forest_mut()
                    .map(|p| p.max_features = MaxFeatures::Fraction(value.as_float())),
                HyperParameter::MinSamplesLeaf => {
                    kind.forest_mut().map(|p| p.min_samples_leaf = value.as_usize())
                }
                HyperParameter::Alpha => kind.alpha_mut().map(|a| *a = value.as_float()),
                HyperParameter::C => kind.svr_mut().map(|s| s.c = value.as_float()),
                HyperParameter::Epsilon => kind.svr_mut().map(|s| s.epsilon = value.as_float()),
            };
            if applied.is_none() {
                return Err(GalaxyError::InvalidParameter {
                    name: param.name().to_string(),
                    value: value.to_string(),
                    reason: format!("not a parameter of {}", kind.name()),
                });
            }
        }
        Ok(kind)
    }

    /// Reseed every random component
    pub fn with_random_state(mut self, seed: u64) -> Self {
        match &mut self {
            EstimatorKind::RandomForest(p)
            | EstimatorKind::ExtraTrees(p)
            | EstimatorKind::CascadeForest(p)
            | EstimatorKind::RidgeRf { forest: p, .. } => p.random_state = seed,
            EstimatorKind::SvrRf { svr, forest } => {
                svr.random_state = seed;
                forest.random_state = seed;
            }
            EstimatorKind::Svr(svr) => svr.random_state = seed,
            EstimatorKind::Ridge { .. } => {}
        }
        self
    }

    /// Check hyperparameters before any fitting
    pub fn validate(&self) -> Result<()> {
        if let Some(p) = self.forest() {
            p.validate()?;
        }
        match self {
            EstimatorKind::Ridge { alpha } | EstimatorKind::RidgeRf { alpha, .. } => {
                RidgeRegression::new(*alpha).validate()
            }
            EstimatorKind::Svr(svr) | EstimatorKind::SvrRf { svr, .. } => svr.validate(),
            _ => Ok(()),
        }
    }

    /// A fresh, unfitted model
    pub fn build(&self) -> Result<Box<dyn Regressor>> {
        self.validate()?;
        let model: Box<dyn Regressor> = match self {
            EstimatorKind::RandomForest(p) => Box::new(RandomForest::new(*p)),
            EstimatorKind::ExtraTrees(p) => Box::new(ExtraTrees::new(*p)),
            EstimatorKind::Ridge { alpha } => Box::new(RidgeRegression::new(*alpha)),
            EstimatorKind::Svr(config) => Box::new(SVMRegressor::new(config.clone())),
            EstimatorKind::CascadeForest(p) => {
                let p = *p;
                Box::new(CascadeRegressor::new(Box::new(move || {
                    Ok(Box::new(RandomForest::new(p)) as Box<dyn Regressor>)
                })))
            }
            EstimatorKind::RidgeRf { alpha, forest } => {
                let alpha = *alpha;
                Box::new(
                    StackedRegressor::new(
                        StackingConfig { seed: forest.random_state, ..Default::default() },
                        Box::new(move || Ok(Box::new(RidgeRegression::new(alpha)) as Box<dyn Regressor>)),
                        forest_factory(*forest),
                    )
                    .with_name("RidgeRF"),
                )
            }
            EstimatorKind::SvrRf { svr, forest } => {
                let svr = svr.clone();
                Box::new(
                    StackedRegressor::new(
                        StackingConfig { seed: forest.random_state, ..Default::default() },
                        Box::new(move || Ok(Box::new(SVMRegressor::new(svr.clone())) as Box<dyn Regressor>)),
                        forest_factory(*forest),
                    )
                    .with_name("SVRRF"),
                )
            }
        };
        Ok(model)
    }
}

fn forest_factory(params: ForestParams) -> ModelFactory {
    Box::new(move || Ok(Box::new(RandomForest::new(params)) as Box<dyn Regressor>))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::ParameterValue;

    #[test]
    fn test_accepts() {
        let rf = EstimatorKind::RandomForest(ForestParams::default());
        assert!(rf.accepts(HyperParameter::NEstimators));
        assert!(!rf.accepts(HyperParameter::Alpha));

        let ridge_rf = EstimatorKind::RidgeRf { alpha: 1.0, forest: ForestParams::default() };
        assert!(ridge_rf.accepts(HyperParameter::Alpha));
        assert!(ridge_rf.accepts(HyperParameter::MinSamplesLeaf));
        assert!(!ridge_rf.accepts(HyperParameter::C));
    }

    #[test]
    fn test_with_params_updates_nested_fields() {
        let kind = EstimatorKind::RidgeRf { alpha: 1.0, forest: ForestParams::default() };
        let params = TrialParams(vec![
            (HyperParameter::Alpha, ParameterValue::Float(14.0)),
            (HyperParameter::NEstimators, ParameterValue::Int(25)),
        ]);
        match kind.with_params(&params).unwrap() {
            EstimatorKind::RidgeRf { alpha, forest } => {
                assert_eq!(alpha, 14.0);
                assert_eq!(forest.n_estimators, 25);
            }
            other => panic!("unexpected kind {:?}", other),
        }

        let svr = EstimatorKind::Svr(SVMConfig::default());
        let params = TrialParams(vec![(HyperParameter::Epsilon, ParameterValue::Float(0.2))]);
        match svr.with_params(&params).unwrap() {
            EstimatorKind::Svr(config) => assert_eq!(config.epsilon, 0.2),
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn test_with_params_rejects_foreign_parameter() {
        let kind = EstimatorKind::Ridge { alpha: 1.0 };
        let params = TrialParams(vec![(HyperParameter::NEstimators, ParameterValue::Int(5))]);
        assert!(kind.with_params(&params).is_err());
    }

    #[test]
    fn test_build_names() {
        for kind in [
            EstimatorKind::ExtraTrees(ForestParams::default()),
            EstimatorKind::CascadeForest(ForestParams::default()),
            EstimatorKind::SvrRf { svr: SVMConfig::default(), forest: ForestParams::default() },
        ] {
            let model = kind.build().unwrap();
            assert_eq!(model.name(), kind.name());
            assert!(!model.is_fitted());
        }
    }

    #[test]
    fn test_serde_tagged() {
        let kind: EstimatorKind = serde_json::from_str(r#"{"kind": "ridge", "alpha": 14.0}"#).unwrap();
        assert_eq!(kind, EstimatorKind::Ridge { alpha: 14.0 });
    }
}
