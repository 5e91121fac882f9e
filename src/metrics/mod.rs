//! Regression metrics module.
//!
//! Provides the accuracy measures used for tuning and final evaluation:
//! - RMSE
//! - R-squared
//! - MAE

pub mod calculator;

pub use calculator::{MetricsCalculator, MetricsError, RegressionMetrics, SelectionMetric};
