//! Model runner
//!
//! Wraps one `EstimatorKind` and its data behind a single `run(RunMode)`
//! entry point: train on the full training set, predict the test set,
//! k-fold cross-validate, or grid-search hyperparameters by mean CV RMSE.

use super::cross_validation::{cross_val_rmse, sample_split, CVResults, KFold};
use super::estimator::EstimatorKind;
use super::models::Regressor;
use crate::error::{GalaxyError, Result};
use crate::metrics::rmse;
use crate::optimizer::{GridSearchParameters, TrialParams};
use crate::utils::{ParallelConfig, Timer};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Training features and solutions, plus optional test features
#[derive(Debug, Clone)]
pub struct Dataset {
    train_x: Array2<f64>,
    train_y: Array2<f64>,
    test_x: Option<Array2<f64>>,
}

impl Dataset {
    pub fn new(train_x: Array2<f64>, train_y: Array2<f64>) -> Result<Self> {
        if train_x.nrows() != train_y.nrows() {
            return Err(GalaxyError::shape(
                format!("{} solution rows", train_x.nrows()),
                format!("{} solution rows", train_y.nrows()),
            ));
        }
        if train_x.nrows() == 0 {
            return Err(GalaxyError::insufficient("training rows", 1, 0));
        }
        Ok(Self { train_x, train_y, test_x: None })
    }

    pub fn with_test(mut self, test_x: Array2<f64>) -> Result<Self> {
        if test_x.ncols() != self.train_x.ncols() {
            return Err(GalaxyError::shape(
                format!("{} test features", self.train_x.ncols()),
                format!("{} test features", test_x.ncols()),
            ));
        }
        self.test_x = Some(test_x);
        Ok(self)
    }

    pub fn n_train(&self) -> usize {
        self.train_x.nrows()
    }

    pub fn train_x(&self) -> &Array2<f64> {
        &self.train_x
    }

    pub fn train_y(&self) -> &Array2<f64> {
        &self.train_y
    }

    pub fn test_x(&self) -> Option<&Array2<f64>> {
        self.test_x.as_ref()
    }
}

/// Runner settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub cv_folds: usize,
    /// Fraction of training rows used by cross-validation
    pub cv_sample: f64,
    pub grid_search_parameters: Option<GridSearchParameters>,
    /// Fraction of training rows used to score grid candidates
    pub grid_search_sample: f64,
    pub n_jobs: Option<usize>,
    pub random_state: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            cv_folds: 3,
            cv_sample: 1.0,
            grid_search_parameters: None,
            grid_search_sample: 1.0,
            n_jobs: None,
            random_state: 42,
        }
    }
}

impl RunnerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    pub fn with_cv_sample(mut self, fraction: f64) -> Self {
        self.cv_sample = fraction;
        self
    }

    pub fn with_grid_search(mut self, parameters: GridSearchParameters, sample: f64) -> Self {
        self.grid_search_parameters = Some(parameters);
        self.grid_search_sample = sample;
        self
    }

    pub fn with_n_jobs(mut self, n_jobs: Option<usize>) -> Self {
        self.n_jobs = n_jobs;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    fn validate(&self) -> Result<()> {
        let invalid = |name: &str, value: String, reason: &str| GalaxyError::InvalidParameter {
            name: name.to_string(),
            value,
            reason: reason.to_string(),
        };
        if self.cv_folds < 2 {
            return Err(invalid("cv_folds", self.cv_folds.to_string(), "must be at least 2"));
        }
        for (name, fraction) in [
            ("cv_sample", self.cv_sample),
            ("grid_search_sample", self.grid_search_sample),
        ] {
            if !(fraction > 0.0 && fraction <= 1.0) {
                return Err(invalid(name, fraction.to_string(), "must be in (0, 1]"));
            }
        }
        if self.n_jobs == Some(0) {
            return Err(invalid("n_jobs", "0".to_string(), "must be at least 1"));
        }
        Ok(())
    }
}

/// What `ModelRunner::run` should do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Train,
    Predict,
    CrossValidate,
    GridSearch { refit: bool },
}

/// One scored grid point
#[derive(Debug, Clone)]
pub struct GridCandidate {
    pub params: TrialParams,
    pub cv: CVResults,
}

#[derive(Debug, Clone)]
pub struct GridSearchReport {
    /// Every evaluated configuration, in grid order
    pub candidates: Vec<GridCandidate>,
    pub best_index: usize,
    /// RMSE of the best configuration on rows left out of the search sample
    pub holdout_rmse: Option<f64>,
    pub refit: bool,
}

impl GridSearchReport {
    pub fn best(&self) -> &GridCandidate {
        &self.candidates[self.best_index]
    }

    pub fn n_evaluated(&self) -> usize {
        self.candidates.len()
    }
}

#[derive(Debug, Clone)]
pub enum RunOutcome {
    Trained { rows: usize },
    Predictions(Array2<f64>),
    CrossValidation(CVResults),
    GridSearch(GridSearchReport),
}

impl RunOutcome {
    pub fn into_predictions(self) -> Result<Array2<f64>> {
        match self {
            RunOutcome::Predictions(p) => Ok(p),
            other => Err(GalaxyError::InvalidInput(format!("expected predictions, got {:?}", other))),
        }
    }

    pub fn into_cv(self) -> Result<CVResults> {
        match self {
            RunOutcome::CrossValidation(cv) => Ok(cv),
            other => Err(GalaxyError::InvalidInput(format!("expected CV results, got {:?}", other))),
        }
    }

    pub fn into_grid_search(self) -> Result<GridSearchReport> {
        match self {
            RunOutcome::GridSearch(report) => Ok(report),
            other => Err(GalaxyError::InvalidInput(format!(
                "expected a grid search report, got {:?}",
                other
            ))),
        }
    }
}

/// Drives one estimator through train / predict / CV / grid search
pub struct ModelRunner {
    kind: EstimatorKind,
    config: RunnerConfig,
    data: Dataset,
    model: Option<Box<dyn Regressor>>,
    parallel: ParallelConfig,
}

impl ModelRunner {
    pub fn new(kind: EstimatorKind, config: RunnerConfig, data: Dataset) -> Result<Self> {
        config.validate()?;
        kind.validate()?;
        if let Some(grid) = &config.grid_search_parameters {
            grid.validate(kind.name(), |p| kind.accepts(p))?;
        }
        let parallel = ParallelConfig::new(config.n_jobs);
        Ok(Self { kind, config, data, model: None, parallel })
    }

    /// The estimator the next `Train` will fit (the grid winner after a refit)
    pub fn estimator(&self) -> &EstimatorKind {
        &self.kind
    }

    pub fn is_trained(&self) -> bool {
        self.model.is_some()
    }

    pub fn run(&mut self, mode: RunMode) -> Result<RunOutcome> {
        let parallel = self.parallel.clone();
        parallel.install(|| match mode {
            RunMode::Train => self.train(),
            RunMode::Predict => self.predict().map(RunOutcome::Predictions),
            RunMode::CrossValidate => self.cross_validate().map(RunOutcome::CrossValidation),
            RunMode::GridSearch { refit } => self.grid_search(refit).map(RunOutcome::GridSearch),
        })
    }

    fn train(&mut self) -> Result<RunOutcome> {
        let timer = Timer::start(format!("Training {}", self.kind.name()));
        let mut model = self.kind.build()?;
        model.fit(&self.data.train_x, &self.data.train_y)?;
        self.model = Some(model);
        timer.stop();
        Ok(RunOutcome::Trained { rows: self.data.n_train() })
    }

    fn predict(&self) -> Result<Array2<f64>> {
        let model = self.model.as_ref().ok_or(GalaxyError::ModelNotFitted)?;
        let test_x = self
            .data
            .test_x
            .as_ref()
            .ok_or_else(|| GalaxyError::InvalidInput("no test features supplied".to_string()))?;

        let timer = Timer::start(format!("Predicting with {}", model.name()));
        let predictions = model.predict(test_x)?;
        timer.stop();
        Ok(predictions)
    }

    fn sample(&self, fraction: f64) -> Result<(Array2<f64>, Array2<f64>, Vec<usize>)> {
        let (sample, holdout) = sample_split(self.data.n_train(), fraction, self.config.random_state)?;
        let x = self.data.train_x.select(Axis(0), &sample);
        let y = self.data.train_y.select(Axis(0), &sample);
        Ok((x, y, holdout))
    }

    fn kfold(&self) -> KFold {
        KFold::new(self.config.cv_folds).with_random_state(self.config.random_state)
    }

    fn cross_validate(&self) -> Result<CVResults> {
        let timer = Timer::start(format!("Cross validating {}", self.kind.name()));
        let (x, y, _) = self.sample(self.config.cv_sample)?;
        info!(rows = x.nrows(), folds = self.config.cv_folds, "Starting cross validation");

        let kind = &self.kind;
        let results = cross_val_rmse(|| kind.build(), &x, &y, &self.kfold())?;
        info!(
            "Cross validation scores: {:?} (mean {:.6}, std {:.6})",
            results.scores, results.mean_score, results.std_score
        );
        timer.stop();
        Ok(results)
    }

    fn grid_search(&mut self, refit: bool) -> Result<GridSearchReport> {
        let grid = self.config.grid_search_parameters.as_ref().ok_or_else(|| {
            GalaxyError::InvalidParameter {
                name: "grid_search_parameters".to_string(),
                value: "None".to_string(),
                reason: "grid search needs candidate values".to_string(),
            }
        })?;
        grid.validate(self.kind.name(), |p| self.kind.accepts(p))?;

        let timer = Timer::start(format!("Grid search over {}", self.kind.name()));
        let (x, y, holdout) = self.sample(self.config.grid_search_sample)?;
        let kfold = self.kfold();

        let mut candidates = Vec::new();
        for params in grid.combinations() {
            let candidate = self.kind.with_params(&params)?;
            let cv = cross_val_rmse(|| candidate.build(), &x, &y, &kfold)?;
            info!("{} mean RMSE {:.6} (std {:.6})", params, cv.mean_score, cv.std_score);
            candidates.push(GridCandidate { params, cv });
        }

        let best_index = candidates
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.cv.mean_score.total_cmp(&b.cv.mean_score))
            .map(|(i, _)| i)
            .ok_or_else(|| GalaxyError::Computation("grid search evaluated nothing".to_string()))?;
        let best_params = candidates[best_index].params.clone();
        let best_kind = self.kind.with_params(&best_params)?;
        info!("Found best parameters: {}", best_params);

        let holdout_rmse = if holdout.is_empty() {
            None
        } else {
            info!(rows = holdout.len(), "Predicting on holdout set");
            let mut model = best_kind.build()?;
            model.fit(&x, &y)?;
            let x_hold = self.data.train_x.select(Axis(0), &holdout);
            let y_hold = self.data.train_y.select(Axis(0), &holdout);
            let score = rmse(model.predict(&x_hold)?.view(), y_hold.view())?;
            info!("RMSE on holdout set: {:.6}", score);
            Some(score)
        };

        if refit {
            let mut model = best_kind.build()?;
            model.fit(&self.data.train_x, &self.data.train_y)?;
            self.model = Some(model);
            info!(rows = self.data.n_train(), "Refit best configuration on the full training set");
        } else if self.model.is_some() {
            warn!("Grid search without refit leaves the previously trained model in place");
        }
        self.kind = best_kind;
        timer.stop();

        Ok(GridSearchReport { candidates, best_index, holdout_rmse, refit })
    }
}
