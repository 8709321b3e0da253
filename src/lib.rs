//! Galaxy Zoo - experiment runner for the galaxy morphology competition
//!
//! This crate turns galaxy images into 37 answer probabilities:
//! - Image loading, solution and submission files
//! - Raw pixel and k-means patch features
//! - Multi-output regressors with cross-validation and grid search
//! - Baseline benchmarks and the experiment scripts
//!
//! # Modules
//!
//! ## Data
//! - [`data`] - Images, training solutions, submissions
//! - [`features`] - Pixel and k-means codebook features
//!
//! ## Models
//! - [`training`] - Trees, forests, ridge, SVR, k-means and the model runner
//! - [`ensemble`] - Stacked and cascaded regressors
//! - [`optimizer`] - Grid search parameters
//! - [`metrics`] - RMSE
//!
//! ## Experiments
//! - [`benchmarks`] - Training-set average and central pixel baselines
//! - [`experiments`] - One function per experiment
//! - [`cli`] - Command-line interface

// Core error handling and settings
pub mod config;
pub mod error;

// Data and features
pub mod data;
pub mod features;

// Models
pub mod ensemble;
pub mod metrics;
pub mod optimizer;
pub mod training;

// Experiments
pub mod benchmarks;
pub mod experiments;

// Services
pub mod cli;

// Utilities
pub mod utils;

pub use error::{GalaxyError, Result};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::{ExperimentOptions, Settings, CLASS_NAMES, N_CLASSES};
    pub use crate::data::{DirectoryImageStore, ImageStore, MemoryImageStore, RawImage, Submission, TrainSolutions};
    pub use crate::error::{GalaxyError, Result};
    pub use crate::experiments::{Experiment, ExperimentContext, ExperimentReport};
    pub use crate::features::KMeansFeatures;
    pub use crate::metrics::rmse;
    pub use crate::optimizer::GridSearchParameters;
    pub use crate::training::{
        Dataset, EstimatorKind, ForestParams, ModelRunner, Regressor, RunMode, RunOutcome, RunnerConfig,
    };
}
