//! Shared model capability and fit errors.

use ndarray::{Array1, ArrayView1, ArrayView2};
use thiserror::Error;

use crate::metrics::MetricsError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    #[error("Training set is empty")]
    EmptyTrainingSet,

    #[error("Design matrix has {rows} rows but the target has {targets}")]
    DimensionMismatch { rows: usize, targets: usize },

    #[error("Coordinate descent did not converge after {iterations} sweeps")]
    NonConvergence { iterations: usize },

    #[error("Fitted parameters are not finite")]
    NonFinite,

    #[error("Predictions have zero variance against a non-constant target")]
    DegeneratePredictions,

    #[error("Invalid hyperparameters: {0}")]
    InvalidHyperParams(String),

    #[error("Scoring failed: {0}")]
    Metrics(#[from] MetricsError),
}

/// A trained predictor over a numeric design matrix.
pub trait Regressor: Send + Sync {
    /// Predict a single row.
    fn predict_row(&self, x: ArrayView1<'_, f64>) -> f64;

    /// Predict every row of a design matrix.
    fn predict(&self, x: ArrayView2<'_, f64>) -> Array1<f64> {
        x.outer_iter().map(|row| self.predict_row(row)).collect()
    }
}

/// Check that the design matrix and target agree and are non-empty.
pub(crate) fn check_dimensions(
    x: &ArrayView2<'_, f64>,
    y: &ArrayView1<'_, f64>,
) -> Result<(), FitError> {
    if x.nrows() == 0 {
        return Err(FitError::EmptyTrainingSet);
    }
    if x.nrows() != y.len() {
        return Err(FitError::DimensionMismatch {
            rows: x.nrows(),
            targets: y.len(),
        });
    }
    Ok(())
}
