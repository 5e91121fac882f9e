//! Walk-forward validation module.
//!
//! Implements rolling-origin cross-validation with a held-out test window:
//! - Test: the last `test_window_days` calendar days
//! - Train: fixed-size sliding window of county-days (hyperparameter fitting)
//! - Validate: the county-days immediately after each training window
//! - Roll: `step_days` worth of county-days

pub mod grid;
pub mod optimizer;
pub mod periods;

pub use grid::{BoostingGrid, ForestGrid, GridConfig, GridError, LassoGrid};
pub use optimizer::{select_best, CandidateScore, GridSearch, SearchError, SearchResult};
pub use periods::{
    rolling_folds, sort_long_form, split_test, Fold, FoldConfigError, FoldWindows, SplitConfig,
    SplitPlan, TemporalSplitter,
};
