//! Feature construction module.
//!
//! Turns the cleaned daily panel into lagged feature rows and exposes the
//! three predictor sets compared downstream:
//! - baseline: density and lagged case counts
//! - full: baseline plus same-day mobility
//! - full-lagged: baseline plus lag-7 mobility

pub mod builder;
pub mod sets;

pub use builder::{
    DropReason, FeatureBuildReport, FeatureBuilder, FeatureConfig, FeatureError, FeatureOutput,
    FeatureRow, MissingDensityPolicy, CASE_LAGS, MAX_LAG, MOBILITY_LAG,
};
pub use sets::{targets, FeatureSet};
