//! Pipeline configuration.
//!
//! Loaded from TOML; every section falls back to its defaults when omitted.
//!
//! ```toml
//! seed = 42
//! selection_metric = "rsq"
//! models = ["lasso", "random-forest", "gradient-boosting"]
//! feature_sets = ["baseline", "full", "full-lagged"]
//!
//! [split]
//! test_window_days = 14
//! train_window_days = 60
//! validation_window_days = 14
//! step_days = 14
//!
//! [grids.lasso]
//! points = 30
//! ```

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::features::{FeatureConfig, FeatureSet};
use crate::metrics::SelectionMetric;
use crate::models::ModelFamily;
use crate::walkforward::{GridConfig, GridError, SplitConfig};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid grid: {0}")]
    Grid(#[from] GridError),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Output options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Write per-configuration predicted-vs-actual CSVs.
    pub write_predictions: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            write_predictions: true,
        }
    }
}

/// Full pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Master seed for every stochastic step.
    pub seed: u64,
    pub features: FeatureConfig,
    pub split: SplitConfig,
    pub grids: GridConfig,
    /// Model families to train.
    pub models: Vec<ModelFamily>,
    /// Feature sets to train each family on.
    pub feature_sets: Vec<FeatureSet>,
    /// Metric used to pick hyperparameters.
    pub selection_metric: SelectionMetric,
    /// Fan jobs and grid candidates out over rayon.
    pub parallel: bool,
    pub output: OutputConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            features: FeatureConfig::default(),
            split: SplitConfig::default(),
            grids: GridConfig::default(),
            models: ModelFamily::ALL.to_vec(),
            feature_sets: FeatureSet::ALL.to_vec(),
            selection_metric: SelectionMetric::default(),
            parallel: true,
            output: OutputConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the master seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let split = &self.split;
        for (field, days) in [
            ("split.test_window_days", split.test_window_days),
            ("split.train_window_days", split.train_window_days),
            ("split.validation_window_days", split.validation_window_days),
            ("split.step_days", split.step_days),
        ] {
            if days == 0 {
                return Err(ConfigError::Invalid(format!("{} must be greater than zero", field)));
            }
        }
        if self.models.is_empty() {
            return Err(ConfigError::Invalid("no model families selected".to_string()));
        }
        if self.feature_sets.is_empty() {
            return Err(ConfigError::Invalid("no feature sets selected".to_string()));
        }
        self.grids.validate()?;
        Ok(())
    }

    /// (family, feature set) jobs in a fixed order, without duplicates.
    pub fn jobs(&self) -> Vec<(ModelFamily, FeatureSet)> {
        let mut jobs = Vec::new();
        for &family in &self.models {
            for &feature_set in &self.feature_sets {
                if !jobs.contains(&(family, feature_set)) {
                    jobs.push((family, feature_set));
                }
            }
        }
        jobs
    }
}
