//! Hyperparameter grids as data.
//!
//! Each family's search space expands into an explicit, ordered list of
//! [`HyperParams`] records:
//! - Lasso: log-spaced penalty values
//! - Random forest: regular mtry x min_leaf cross-product
//! - Gradient boosting: Latin hypercube sample over depth, learning rate and
//!   loss reduction

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{HyperParams, ModelFamily};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GridError {
    #[error("{name} must be greater than zero")]
    Empty { name: &'static str },

    #[error("{name} range is invalid: min {min}, max {max}")]
    InvalidRange { name: &'static str, min: f64, max: f64 },
}

/// Log-spaced lasso penalties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LassoGrid {
    pub penalty_min: f64,
    pub penalty_max: f64,
    pub points: usize,
}

impl Default for LassoGrid {
    fn default() -> Self {
        Self {
            penalty_min: 1e-4,
            penalty_max: 1.0,
            points: 30,
        }
    }
}

impl LassoGrid {
    pub fn validate(&self) -> Result<(), GridError> {
        if self.points == 0 {
            return Err(GridError::Empty { name: "lasso.points" });
        }
        check_positive_range("lasso.penalty", self.penalty_min, self.penalty_max)
    }

    pub fn combinations(&self) -> Vec<HyperParams> {
        log_space(self.penalty_min, self.penalty_max, self.points)
            .into_iter()
            .map(|penalty| HyperParams::Lasso { penalty })
            .collect()
    }
}

/// Regular grid for the bagged-tree ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestGrid {
    pub trees: usize,
    /// Number of mtry levels, spread over 1..=n_features.
    pub mtry_levels: usize,
    pub min_leaf_min: usize,
    pub min_leaf_max: usize,
    pub min_leaf_levels: usize,
}

impl Default for ForestGrid {
    fn default() -> Self {
        Self {
            trees: 500,
            mtry_levels: 10,
            min_leaf_min: 2,
            min_leaf_max: 40,
            min_leaf_levels: 10,
        }
    }
}

impl ForestGrid {
    pub fn validate(&self) -> Result<(), GridError> {
        if self.trees == 0 {
            return Err(GridError::Empty { name: "forest.trees" });
        }
        if self.mtry_levels == 0 {
            return Err(GridError::Empty { name: "forest.mtry_levels" });
        }
        if self.min_leaf_levels == 0 {
            return Err(GridError::Empty { name: "forest.min_leaf_levels" });
        }
        if self.min_leaf_min == 0 || self.min_leaf_max < self.min_leaf_min {
            return Err(GridError::InvalidRange {
                name: "forest.min_leaf",
                min: self.min_leaf_min as f64,
                max: self.min_leaf_max as f64,
            });
        }
        Ok(())
    }

    /// Cross-product of mtry and min_leaf levels; mtry never exceeds the
    /// feature-set width.
    pub fn combinations(&self, n_features: usize) -> Vec<HyperParams> {
        let mtry = int_levels(1, n_features.max(1), self.mtry_levels);
        let min_leaf = int_levels(self.min_leaf_min, self.min_leaf_max, self.min_leaf_levels);

        let mut combos = Vec::with_capacity(mtry.len() * min_leaf.len());
        for &m in &mtry {
            for &leaf in &min_leaf {
                combos.push(HyperParams::RandomForest {
                    trees: self.trees,
                    mtry: m,
                    min_leaf: leaf,
                });
            }
        }
        combos
    }
}

/// Space-filling sample for the boosted-tree ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostingGrid {
    pub trees: usize,
    pub candidates: usize,
    pub depth_min: usize,
    pub depth_max: usize,
    pub learning_rate_min: f64,
    pub learning_rate_max: f64,
    pub loss_reduction_min: f64,
    pub loss_reduction_max: f64,
}

impl Default for BoostingGrid {
    fn default() -> Self {
        Self {
            trees: 500,
            candidates: 30,
            depth_min: 1,
            depth_max: 8,
            learning_rate_min: 1e-3,
            learning_rate_max: 0.3,
            loss_reduction_min: 1e-6,
            loss_reduction_max: 10.0,
        }
    }
}

impl BoostingGrid {
    pub fn validate(&self) -> Result<(), GridError> {
        if self.trees == 0 {
            return Err(GridError::Empty { name: "boosting.trees" });
        }
        if self.candidates == 0 {
            return Err(GridError::Empty { name: "boosting.candidates" });
        }
        if self.depth_min == 0 || self.depth_max < self.depth_min {
            return Err(GridError::InvalidRange {
                name: "boosting.depth",
                min: self.depth_min as f64,
                max: self.depth_max as f64,
            });
        }
        check_positive_range(
            "boosting.learning_rate",
            self.learning_rate_min,
            self.learning_rate_max,
        )?;
        if self.learning_rate_max > 1.0 {
            return Err(GridError::InvalidRange {
                name: "boosting.learning_rate",
                min: self.learning_rate_min,
                max: self.learning_rate_max,
            });
        }
        check_positive_range(
            "boosting.loss_reduction",
            self.loss_reduction_min,
            self.loss_reduction_max,
        )
    }

    /// Latin hypercube sample: each dimension is cut into `candidates`
    /// strata and every stratum is used exactly once.
    pub fn combinations(&self, rng: &mut StdRng) -> Vec<HyperParams> {
        let n = self.candidates;
        let depth = lhs_column(n, rng);
        let rate = lhs_column(n, rng);
        let gamma = lhs_column(n, rng);

        let depth_span = (self.depth_max - self.depth_min + 1) as f64;
        (0..n)
            .map(|i| {
                let max_depth =
                    (self.depth_min + (depth[i] * depth_span) as usize).min(self.depth_max);
                HyperParams::GradientBoosting {
                    trees: self.trees,
                    max_depth,
                    learning_rate: log_interp(self.learning_rate_min, self.learning_rate_max, rate[i]),
                    loss_reduction: log_interp(
                        self.loss_reduction_min,
                        self.loss_reduction_max,
                        gamma[i],
                    ),
                }
            })
            .collect()
    }
}

/// Search spaces for all three families.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub lasso: LassoGrid,
    pub forest: ForestGrid,
    pub boosting: BoostingGrid,
}

impl GridConfig {
    pub fn validate(&self) -> Result<(), GridError> {
        self.lasso.validate()?;
        self.forest.validate()?;
        self.boosting.validate()
    }

    /// Expand the grid for one family. Only the boosting sample consumes `rng`.
    pub fn candidates(
        &self,
        family: ModelFamily,
        n_features: usize,
        rng: &mut StdRng,
    ) -> Vec<HyperParams> {
        match family {
            ModelFamily::Lasso => self.lasso.combinations(),
            ModelFamily::RandomForest => self.forest.combinations(n_features),
            ModelFamily::GradientBoosting => self.boosting.combinations(rng),
        }
    }
}

fn check_positive_range(name: &'static str, min: f64, max: f64) -> Result<(), GridError> {
    if min.is_finite() && max.is_finite() && min > 0.0 && max >= min {
        Ok(())
    } else {
        Err(GridError::InvalidRange { name, min, max })
    }
}

/// `points` values evenly spaced in log10 between `min` and `max`.
pub fn log_space(min: f64, max: f64, points: usize) -> Vec<f64> {
    match points {
        0 => Vec::new(),
        1 => vec![min],
        _ => (0..points)
            .map(|i| log_interp(min, max, i as f64 / (points - 1) as f64))
            .collect(),
    }
}

fn log_interp(min: f64, max: f64, t: f64) -> f64 {
    let (lo, hi) = (min.log10(), max.log10());
    10f64.powf(lo + t * (hi - lo))
}

/// Up to `levels` distinct integers spread regularly over `min..=max`.
pub fn int_levels(min: usize, max: usize, levels: usize) -> Vec<usize> {
    if levels <= 1 || max <= min {
        return vec![min];
    }
    let span = (max - min) as f64;
    let mut values: Vec<usize> = (0..levels)
        .map(|i| min + (span * i as f64 / (levels - 1) as f64).round() as usize)
        .collect();
    values.dedup();
    values
}

/// One Latin hypercube column of `n` values in [0, 1).
fn lhs_column(n: usize, rng: &mut StdRng) -> Vec<f64> {
    let mut strata: Vec<usize> = (0..n).collect();
    strata.shuffle(rng);
    strata
        .into_iter()
        .map(|s| (s as f64 + rng.gen::<f64>()) / n as f64)
        .collect()
}
