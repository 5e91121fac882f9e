//! Regression model families.
//!
//! All families sit behind the [`Regressor`] capability and are selected by a
//! [`HyperParams`] record, so tuning and evaluation are written once:
//! - Lasso: L1-penalized least squares
//! - Random forest: bagged CART trees
//! - Gradient boosting: boosted CART trees

pub mod boosting;
pub mod forest;
pub mod lasso;
pub mod params;
pub mod standardize;
pub mod trained;
pub mod traits;
pub mod tree;

pub use boosting::{BoostingParams, GradientBoosting};
pub use forest::{ForestParams, RandomForest};
pub use lasso::Lasso;
pub use params::{FittedModel, HyperParams, ModelFamily};
pub use standardize::Standardizer;
pub use trained::TrainedModel;
pub use traits::{FitError, Regressor};
pub use tree::{RegressionTree, TreeParams};
