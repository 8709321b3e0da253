//! Model training module
//!
//! Provides the multi-output regressors used by the experiments:
//! - Decision trees, Random Forests and Extra Trees
//! - Ridge regression
//! - Support Vector Regression
//! - KMeans clustering (codebook learning for image features)
//!
//! plus the machinery that drives them: k-fold cross-validation, estimator
//! descriptions and the `ModelRunner`.

pub mod clustering;
pub mod cross_validation;
pub mod decision_tree;
pub mod estimator;
pub mod extra_trees;
pub mod linear_models;
pub mod models;
pub mod random_forest;
pub mod runner;
pub mod svm;

pub use clustering::KMeans;
pub use cross_validation::{cross_val_rmse, sample_split, CVResults, CVSplit, KFold};
pub use decision_tree::{MaxFeatures, RegressionTree, SplitStrategy, TreeNode};
pub use estimator::EstimatorKind;
pub use extra_trees::ExtraTrees;
pub use linear_models::RidgeRegression;
pub use models::{ModelFactory, Regressor};
pub use random_forest::{ForestParams, RandomForest};
pub use runner::{Dataset, GridCandidate, GridSearchReport, ModelRunner, RunMode, RunOutcome, RunnerConfig};
pub use svm::{KernelType, SVMConfig, SVMRegressor};
