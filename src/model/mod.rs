//! Shared gradient-boosted regression model.

pub mod gbm;
pub mod tree;

pub use gbm::{EvalMetric, EvalSet, GbmParams, GbmRegressor, Objective};
pub use tree::RegressionTree;
