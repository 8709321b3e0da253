//! Question-by-question cascade
//!
//! The decision tree behind the solution columns asks its questions in
//! order, so the cascade fits one model per question group. Each stage sees
//! the input features plus the predictions of every earlier stage.

use crate::config::question_groups;
use crate::error::{GalaxyError, Result};
use crate::training::models::{check_features, check_rows, ModelFactory, Regressor};
use ndarray::{concatenate, s, Array2, Axis};
use std::ops::Range;
use tracing::debug;

pub struct CascadeRegressor {
    groups: Vec<Range<usize>>,
    stage: ModelFactory,
    fitted: Vec<Box<dyn Regressor>>,
    n_features: usize,
}

impl CascadeRegressor {
    /// Cascade over the eleven Galaxy Zoo questions
    pub fn new(stage: ModelFactory) -> Self {
        Self::with_groups(question_groups(), stage)
    }

    /// Cascade over arbitrary contiguous column groups
    pub fn with_groups(groups: Vec<Range<usize>>, stage: ModelFactory) -> Self {
        Self {
            groups,
            stage,
            fitted: Vec::new(),
            n_features: 0,
        }
    }

    fn check_groups(&self, n_outputs: usize) -> Result<()> {
        let mut expected_start = 0;
        for group in &self.groups {
            if group.start != expected_start || group.is_empty() {
                return Err(GalaxyError::InvalidParameter {
                    name: "groups".to_string(),
                    value: format!("{:?}", group),
                    reason: "groups must be non-empty and contiguous from column 0".to_string(),
                });
            }
            expected_start = group.end;
        }
        if expected_start != n_outputs {
            return Err(GalaxyError::shape(
                format!("{} target columns", expected_start),
                format!("{} target columns", n_outputs),
            ));
        }
        Ok(())
    }

    pub fn n_stages(&self) -> usize {
        self.groups.len()
    }
}

impl Regressor for CascadeRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array2<f64>) -> Result<()> {
        check_rows(x, y)?;
        self.check_groups(y.ncols())?;

        let mut features = x.clone();
        let mut fitted = Vec::with_capacity(self.groups.len());
        for (stage_idx, group) in self.groups.iter().enumerate() {
            let target = y.slice(s![.., group.clone()]).to_owned();
            let mut model = (self.stage)()?;
            model.fit(&features, &target)?;
            let predictions = model.predict(&features)?;
            features = concatenate(Axis(1), &[features.view(), predictions.view()])?;
            debug!(stage = stage_idx + 1, columns = ?group, "Fitted cascade stage");
            fitted.push(model);
        }

        self.n_features = x.ncols();
        self.fitted = fitted;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.fitted.is_empty() {
            return Err(GalaxyError::ModelNotFitted);
        }
        check_features(self.n_features, x)?;

        let mut features = x.clone();
        for model in &self.fitted {
            let predictions = model.predict(&features)?;
            features = concatenate(Axis(1), &[features.view(), predictions.view()])?;
        }
        Ok(features.slice(s![.., self.n_features..]).to_owned())
    }

    fn is_fitted(&self) -> bool {
        !self.fitted.is_empty()
    }

    fn name(&self) -> &'static str {
        "RandomForestCascade"
    }
}
