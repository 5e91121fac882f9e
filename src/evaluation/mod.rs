//! Final evaluation module.
//!
//! Scores each tuned model on the held-out test window and assembles the
//! comparison table (one row per model family x feature set).

pub mod comparison;

pub use comparison::{
    write_predictions, ComparisonRow, ComparisonTable, Evaluation, Evaluator, JobStatus,
    OutputError, PredictionRecord,
};
