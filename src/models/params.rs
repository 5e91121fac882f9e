//! Model families and hyperparameter records.

use std::fmt;

use ndarray::{ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use super::boosting::{BoostingParams, GradientBoosting};
use super::forest::{ForestParams, RandomForest};
use super::lasso::Lasso;
use super::traits::{FitError, Regressor};

/// The three compared model families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelFamily {
    Lasso,
    RandomForest,
    GradientBoosting,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 3] = [
        ModelFamily::Lasso,
        ModelFamily::RandomForest,
        ModelFamily::GradientBoosting,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Lasso => "lasso",
            Self::RandomForest => "random-forest",
            Self::GradientBoosting => "gradient-boosting",
        }
    }

    /// Stable identifier used to derive random streams.
    pub fn id(&self) -> u64 {
        match self {
            Self::Lasso => 0,
            Self::RandomForest => 1,
            Self::GradientBoosting => 2,
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One point in a hyperparameter grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "kebab-case")]
pub enum HyperParams {
    Lasso {
        penalty: f64,
    },
    RandomForest {
        trees: usize,
        mtry: usize,
        min_leaf: usize,
    },
    GradientBoosting {
        trees: usize,
        max_depth: usize,
        learning_rate: f64,
        loss_reduction: f64,
    },
}

impl HyperParams {
    pub fn family(&self) -> ModelFamily {
        match self {
            Self::Lasso { .. } => ModelFamily::Lasso,
            Self::RandomForest { .. } => ModelFamily::RandomForest,
            Self::GradientBoosting { .. } => ModelFamily::GradientBoosting,
        }
    }

    /// Create a unique key for this parameter set.
    pub fn key(&self) -> String {
        match self {
            Self::Lasso { penalty } => format!("penalty{:.3e}", penalty),
            Self::RandomForest {
                trees,
                mtry,
                min_leaf,
            } => format!("trees{}_mtry{}_minleaf{}", trees, mtry, min_leaf),
            Self::GradientBoosting {
                trees,
                max_depth,
                learning_rate,
                loss_reduction,
            } => format!(
                "trees{}_depth{}_lr{:.3e}_gamma{:.3e}",
                trees, max_depth, learning_rate, loss_reduction
            ),
        }
    }

    /// Fit this configuration on a standardized design matrix.
    pub fn fit(
        &self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        rng: &mut StdRng,
    ) -> Result<FittedModel, FitError> {
        match *self {
            Self::Lasso { penalty } => Lasso::fit(x, y, penalty).map(FittedModel::Lasso),
            Self::RandomForest {
                trees,
                mtry,
                min_leaf,
            } => RandomForest::fit(
                x,
                y,
                ForestParams {
                    trees,
                    mtry,
                    min_leaf,
                },
                rng,
            )
            .map(FittedModel::RandomForest),
            Self::GradientBoosting {
                trees,
                max_depth,
                learning_rate,
                loss_reduction,
            } => GradientBoosting::fit(
                x,
                y,
                BoostingParams {
                    trees,
                    max_depth,
                    learning_rate,
                    loss_reduction,
                },
                rng,
            )
            .map(FittedModel::GradientBoosting),
        }
    }
}

impl fmt::Display for HyperParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.family(), self.key())
    }
}

/// A fitted model of any family.
#[derive(Debug, Clone)]
pub enum FittedModel {
    Lasso(Lasso),
    RandomForest(RandomForest),
    GradientBoosting(GradientBoosting),
}

impl FittedModel {
    pub fn family(&self) -> ModelFamily {
        match self {
            Self::Lasso(_) => ModelFamily::Lasso,
            Self::RandomForest(_) => ModelFamily::RandomForest,
            Self::GradientBoosting(_) => ModelFamily::GradientBoosting,
        }
    }
}

impl Regressor for FittedModel {
    fn predict_row(&self, x: ArrayView1<'_, f64>) -> f64 {
        match self {
            Self::Lasso(m) => m.predict_row(x),
            Self::RandomForest(m) => m.predict_row(x),
            Self::GradientBoosting(m) => m.predict_row(x),
        }
    }
}
