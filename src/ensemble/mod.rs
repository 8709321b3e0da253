//! Ensemble methods module
//!
//! Provides composite regressors built from the estimators in `training`:
//! - Stacking (first-stage out-of-fold predictions feed a second stage)
//! - Cascades (one model per question group, chained in order)

mod cascade;
mod stacking;

pub use cascade::CascadeRegressor;
pub use stacking::{StackedRegressor, StackingConfig};
