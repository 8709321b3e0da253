//! Experiment scripts
//!
//! Each experiment builds its features, drives one estimator through the
//! model runner and optionally writes a submission. The training solutions
//! are loaded once into an `ExperimentContext` and shared by reference.

use crate::benchmarks::{self, CentralPixelBenchmark};
use crate::config::{ExperimentOptions, Settings};
use crate::data::{DirectoryImageStore, ImageStore, Submission, TrainSolutions};
use crate::error::{GalaxyError, Result};
use crate::features::{pixel_features, KMeansFeatures};
use crate::optimizer::GridSearchParameters;
use crate::training::{
    cross_val_rmse, Dataset, EstimatorKind, ForestParams, KFold, ModelRunner, RunMode, RunnerConfig, SVMConfig,
};
use crate::utils::{ParallelConfig, Timer};
use clap::ValueEnum;
use ndarray::Array2;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Settings, solutions and image sources shared by every experiment
pub struct ExperimentContext {
    settings: Settings,
    solutions: TrainSolutions,
    train_images: Box<dyn ImageStore>,
    test_images: Option<Box<dyn ImageStore>>,
}

impl ExperimentContext {
    /// Load the solutions and index the image directories named in `settings`
    pub fn load(settings: Settings) -> Result<Self> {
        settings.validate()?;
        let solutions = TrainSolutions::load(&settings.solutions_path())?;

        let train_dir = settings.train_images_path();
        if !train_dir.is_dir() {
            return Err(GalaxyError::DataLoad(format!(
                "training images directory {} does not exist",
                train_dir.display()
            )));
        }
        let train_images = DirectoryImageStore::with_ids(train_dir, solutions.ids().to_vec());

        let test_dir = settings.test_images_path();
        let test_images: Option<Box<dyn ImageStore>> = if test_dir.is_dir() {
            Some(Box::new(DirectoryImageStore::open(test_dir)?))
        } else {
            warn!(dir = %test_dir.display(), "Test images directory not found; submissions unavailable");
            None
        };

        Ok(Self::new(settings, solutions, Box::new(train_images), test_images))
    }

    /// Assemble a context from already loaded parts
    ///
    /// `train_images` must serve every ID of `solutions`.
    pub fn new(
        settings: Settings,
        solutions: TrainSolutions,
        train_images: Box<dyn ImageStore>,
        test_images: Option<Box<dyn ImageStore>>,
    ) -> Self {
        Self { settings, solutions, train_images, test_images }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn options(&self) -> &ExperimentOptions {
        &self.settings.experiment
    }

    pub fn solutions(&self) -> &TrainSolutions {
        &self.solutions
    }

    pub fn train_images(&self) -> &dyn ImageStore {
        self.train_images.as_ref()
    }

    pub fn test_images(&self) -> Result<&dyn ImageStore> {
        self.test_images
            .as_deref()
            .ok_or_else(|| GalaxyError::DataLoad("no test images available".to_string()))
    }

    fn seed(&self) -> u64 {
        self.settings.random_state
    }

    /// Training rows for the full-set experiments, capped by `max_train_rows`
    fn training_rows(&self) -> Result<TrainSolutions> {
        match self.options().max_train_rows {
            Some(n) => self.solutions.head(n.min(self.solutions.len())),
            None => Ok(self.solutions.clone()),
        }
    }

    fn forest(&self) -> ForestParams {
        ForestParams::default()
            .with_n_estimators(self.options().n_estimators)
            .with_random_state(self.seed())
    }

    fn runner_config(&self) -> RunnerConfig {
        RunnerConfig::default()
            .with_n_jobs(self.settings.n_jobs)
            .with_random_state(self.seed())
    }

    fn pixels(&self, store: &dyn ImageStore, ids: &[u64]) -> Result<Array2<f64>> {
        let opts = self.options();
        pixel_features(store, ids, opts.crop_size, opts.scale)
    }

    fn write_submission(&self, predictions: Array2<f64>, outfile: &Path) -> Result<PathBuf> {
        let test = self.test_images()?;
        let submission = Submission::new(test.ids().to_vec(), predictions)?;
        let path = self.settings.output_path(&outfile.to_string_lossy());
        submission.to_file(&path)?;
        Ok(path)
    }
}

/// What an experiment produced
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentReport {
    pub name: &'static str,
    /// Labelled RMSE figures in the order they were computed
    pub scores: Vec<(String, f64)>,
    pub output: Option<PathBuf>,
    pub elapsed_secs: f64,
}

impl ExperimentReport {
    fn new(name: &'static str) -> Self {
        Self { name, scores: Vec::new(), output: None, elapsed_secs: 0.0 }
    }

    fn score(&mut self, label: impl Into<String>, value: f64) {
        self.scores.push((label.into(), value));
    }

    fn finish(mut self, timer: Timer) -> Self {
        self.elapsed_secs = timer.stop().as_secs_f64();
        self
    }
}

/// Mean solution tiled over the test set
pub fn train_set_average_benchmark(ctx: &ExperimentContext, outfile: &Path) -> Result<ExperimentReport> {
    let timer = Timer::start("train_set_average_benchmark");
    let mut report = ExperimentReport::new("train_set_average_benchmark");

    let n_test = ctx.test_images()?.len();
    let bench = benchmarks::train_set_average_benchmark(ctx.solutions(), n_test)?;
    report.score("train", bench.train_rmse);
    report.output = Some(ctx.write_submission(bench.predictions, outfile)?);
    Ok(report.finish(timer))
}

/// Cluster-average solutions by central pixel color
pub fn central_pixel_benchmark(ctx: &ExperimentContext, outfile: &Path) -> Result<ExperimentReport> {
    let timer = Timer::start("central_pixel_benchmark");
    let mut report = ExperimentReport::new("central_pixel_benchmark");

    let predictions = CentralPixelBenchmark::new(ctx.options().central_pixel_clusters)
        .with_random_state(ctx.seed())
        .execute(ctx.train_images(), ctx.solutions(), ctx.test_images()?)?;
    report.output = Some(ctx.write_submission(predictions, outfile)?);
    Ok(report.finish(timer))
}

/// Random forest on cropped, downscaled pixels, trained on the full set
pub fn random_forest_001(ctx: &ExperimentContext, outfile: &Path) -> Result<ExperimentReport> {
    let timer = Timer::start("random_forest_001");
    let mut report = ExperimentReport::new("random_forest_001");

    let train = ctx.training_rows()?;
    let test = ctx.test_images()?;
    let data = Dataset::new(ctx.pixels(ctx.train_images(), train.ids())?, train.data().clone())?
        .with_test(ctx.pixels(test, test.ids())?)?;

    let mut runner = ModelRunner::new(EstimatorKind::RandomForest(ctx.forest()), ctx.runner_config(), data)?;
    runner.run(RunMode::Train)?;
    let predictions = runner.run(RunMode::Predict)?.into_predictions()?;
    report.output = Some(ctx.write_submission(predictions, outfile)?);
    Ok(report.finish(timer))
}

/// Extra trees grid search over the number of trees, refit on the full set
pub fn extra_trees_test(ctx: &ExperimentContext) -> Result<ExperimentReport> {
    let timer = Timer::start("extra_trees_test");
    let mut report = ExperimentReport::new("extra_trees_test");

    let train = ctx.training_rows()?;
    let data = Dataset::new(ctx.pixels(ctx.train_images(), train.ids())?, train.data().clone())?;
    let grid = GridSearchParameters::new().with_n_estimators(ctx.options().grid_n_estimators.clone());
    let config = ctx.runner_config().with_grid_search(grid, 0.5);

    let mut runner = ModelRunner::new(EstimatorKind::ExtraTrees(ctx.forest()), config, data)?;
    let search = runner.run(RunMode::GridSearch { refit: true })?.into_grid_search()?;
    for candidate in &search.candidates {
        report.score(format!("cv {}", candidate.params), candidate.cv.mean_score);
    }
    if let Some(holdout) = search.holdout_rmse {
        report.score(format!("holdout {}", search.best().params), holdout);
    }
    Ok(report.finish(timer))
}

/// Cross-validated random forest cascade over the question groups
///
/// Only the unscaled cascade is run; chained predictions are fed to later
/// groups as they are.
pub fn random_forest_cascade_001(ctx: &ExperimentContext) -> Result<ExperimentReport> {
    let timer = Timer::start("random_forest_cascade_001");
    let mut report = ExperimentReport::new("random_forest_cascade_001");

    let train = ctx.training_rows()?;
    let data = Dataset::new(ctx.pixels(ctx.train_images(), train.ids())?, train.data().clone())?;
    let config = ctx.runner_config().with_cv_sample(0.1);

    let mut runner = ModelRunner::new(EstimatorKind::CascadeForest(ctx.forest()), config, data)?;
    let cv = runner.run(RunMode::CrossValidate)?.into_cv()?;
    for (fold, score) in cv.scores.iter().enumerate() {
        report.score(format!("fold {}", fold), *score);
    }
    Ok(report.finish(timer))
}

/// Ridge then random forest stack: cross-validate, train, predict
pub fn ridge_rf_001(ctx: &ExperimentContext, outfile: &Path) -> Result<ExperimentReport> {
    let timer = Timer::start("ridge_rf_001");
    let mut report = ExperimentReport::new("ridge_rf_001");

    let train = ctx.training_rows()?;
    let test = ctx.test_images()?;
    let data = Dataset::new(ctx.pixels(ctx.train_images(), train.ids())?, train.data().clone())?
        .with_test(ctx.pixels(test, test.ids())?)?;
    let kind = EstimatorKind::RidgeRf { alpha: ctx.options().ridge_alpha, forest: ctx.forest() };
    let config = ctx.runner_config().with_cv_sample(0.5).with_cv_folds(2);

    let mut runner = ModelRunner::new(kind, config, data)?;
    let cv = runner.run(RunMode::CrossValidate)?.into_cv()?;
    report.score("cv mean", cv.mean_score);
    runner.run(RunMode::Train)?;
    let predictions = runner.run(RunMode::Predict)?.into_predictions()?;
    report.output = Some(ctx.write_submission(predictions, outfile)?);
    Ok(report.finish(timer))
}

/// Two-fold SVR then random forest stack on a random sample of galaxies
pub fn svr_rf(ctx: &ExperimentContext) -> Result<ExperimentReport> {
    let timer = Timer::start("svr_rf");
    let mut report = ExperimentReport::new("svr_rf");

    let sample = ctx.solutions().sample(ctx.options().n_samples, ctx.seed())?;
    let x = ctx.pixels(ctx.train_images(), sample.ids())?;
    info!(rows = x.nrows(), features = x.ncols(), "Loaded sampled training images");

    let kind = EstimatorKind::SvrRf { svr: SVMConfig::default(), forest: ctx.forest() }.with_random_state(ctx.seed());
    let kfold = KFold::new(2).with_random_state(ctx.seed());
    let cv = cross_val_rmse(|| kind.build(), &x, sample.data(), &kfold)?;
    for (fold, score) in cv.scores.iter().enumerate() {
        report.score(format!("fold {}", fold), *score);
    }
    Ok(report.finish(timer))
}

/// K-means patch features feeding a two-fold ridge then random forest stack
pub fn kmeans_ridge_rf(ctx: &ExperimentContext) -> Result<ExperimentReport> {
    let timer = Timer::start("kmeans_ridge_rf");
    let mut report = ExperimentReport::new("kmeans_ridge_rf");
    let opts = ctx.options();

    let mut km = KMeansFeatures::new(opts.rf_size, opts.num_centroids, opts.num_patches)
        .with_crop(Some(opts.crop_size), opts.kmeans_scale)
        .with_whitening(opts.whiten)
        .with_random_state(ctx.seed());
    km.fit(ctx.train_images())?;

    let n = opts.n_samples;
    let x = km.transform(ctx.train_images(), n)?;
    let labels = ctx.solutions().head(n)?;

    let kind = EstimatorKind::RidgeRf { alpha: opts.ridge_alpha, forest: ctx.forest() };
    let kfold = KFold::new(2).with_random_state(ctx.seed());
    let cv = cross_val_rmse(|| kind.build(), &x, labels.data(), &kfold)?;
    for (fold, score) in cv.scores.iter().enumerate() {
        report.score(format!("fold {}", fold), *score);
    }
    Ok(report.finish(timer))
}

/// Runnable experiments
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
pub enum Experiment {
    #[value(name = "train_set_average_benchmark")]
    AverageBenchmark,
    #[value(name = "central_pixel_benchmark")]
    CentralPixel,
    #[value(name = "random_forest_001")]
    RandomForest,
    #[value(name = "extra_trees_test")]
    ExtraTrees,
    #[value(name = "random_forest_cascade_001")]
    RandomForestCascade,
    #[value(name = "ridge_rf_001")]
    RidgeRf,
    #[value(name = "svr_rf")]
    SvrRf,
    #[value(name = "kmeans_ridge_rf")]
    KMeansRidgeRf,
}

impl Experiment {
    pub const ALL: [Experiment; 8] = [
        Experiment::AverageBenchmark,
        Experiment::CentralPixel,
        Experiment::RandomForest,
        Experiment::ExtraTrees,
        Experiment::RandomForestCascade,
        Experiment::RidgeRf,
        Experiment::SvrRf,
        Experiment::KMeansRidgeRf,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Experiment::AverageBenchmark => "train_set_average_benchmark",
            Experiment::CentralPixel => "central_pixel_benchmark",
            Experiment::RandomForest => "random_forest_001",
            Experiment::ExtraTrees => "extra_trees_test",
            Experiment::RandomForestCascade => "random_forest_cascade_001",
            Experiment::RidgeRf => "ridge_rf_001",
            Experiment::SvrRf => "svr_rf",
            Experiment::KMeansRidgeRf => "kmeans_ridge_rf",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Experiment::AverageBenchmark => "training-set mean tiled over the test set",
            Experiment::CentralPixel => "central pixel color clustering",
            Experiment::RandomForest => "random forest on downscaled pixels",
            Experiment::ExtraTrees => "extra trees grid search over n_estimators",
            Experiment::RandomForestCascade => "cross-validated forest cascade over question groups",
            Experiment::RidgeRf => "ridge then random forest stack",
            Experiment::SvrRf => "SVR then random forest stack on a sample",
            Experiment::KMeansRidgeRf => "k-means patch features into ridge then random forest",
        }
    }

    /// Submission file written when none is given; None for evaluation-only runs
    pub fn default_outfile(&self) -> Option<&'static str> {
        match self {
            Experiment::AverageBenchmark => Some("sub_average_benchmark_000.csv"),
            Experiment::CentralPixel => Some("sub_central_pixel_001.csv"),
            Experiment::RandomForest => Some("sub_random_forest_001.csv"),
            Experiment::RidgeRf => Some("sub_ridge_rf_001.csv"),
            _ => None,
        }
    }

    /// Run inside a pool bounded by `n_jobs`
    pub fn run(&self, ctx: &ExperimentContext, outfile: Option<&Path>) -> Result<ExperimentReport> {
        let outfile = match (outfile, self.default_outfile()) {
            (Some(path), Some(_)) => Some(path.to_path_buf()),
            (None, Some(default)) => Some(PathBuf::from(default)),
            (Some(path), None) => {
                warn!(experiment = self.name(), outfile = %path.display(), "Experiment writes no submission");
                None
            }
            (None, None) => None,
        };
        info!(experiment = self.name(), "Starting experiment");

        ParallelConfig::new(ctx.settings().n_jobs).install(|| {
            let out = outfile.as_deref().unwrap_or_else(|| Path::new(""));
            match self {
                Experiment::AverageBenchmark => train_set_average_benchmark(ctx, out),
                Experiment::CentralPixel => central_pixel_benchmark(ctx, out),
                Experiment::RandomForest => random_forest_001(ctx, out),
                Experiment::ExtraTrees => extra_trees_test(ctx),
                Experiment::RandomForestCascade => random_forest_cascade_001(ctx),
                Experiment::RidgeRf => ridge_rf_001(ctx, out),
                Experiment::SvrRf => svr_rf(ctx),
                Experiment::KMeansRidgeRf => kmeans_ridge_rf(ctx),
            }
        })
    }
}
