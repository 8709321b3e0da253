//! Hyperparameter search module
//!
//! Exhaustive grid search: candidate lists per hyperparameter, validated
//! against the estimator up front and expanded into their cartesian product.
//! Candidates are scored by the model runner.

mod search_space;

pub use search_space::{GridSearchParameters, HyperParameter, ParameterValue, TrialParams};
