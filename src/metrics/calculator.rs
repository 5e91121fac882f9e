//! Regression metrics calculator.
//!
//! Calculates RMSE, R-squared and MAE between observed and predicted values.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricsError {
    #[error("Cannot score an empty set of predictions")]
    Empty,

    #[error("Length mismatch: {actual} actual values, {predicted} predictions")]
    LengthMismatch { actual: usize, predicted: usize },

    #[error("Non-finite prediction at position {0}")]
    NonFinite(usize),
}

/// Accuracy of one set of predictions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    /// Root mean squared error.
    pub rmse: f64,
    /// Coefficient of determination, 1 - SSR / SST.
    pub rsq: f64,
    /// Mean absolute error.
    pub mae: f64,
}

impl RegressionMetrics {
    pub fn get(&self, metric: SelectionMetric) -> f64 {
        match metric {
            SelectionMetric::Rmse => self.rmse,
            SelectionMetric::Rsq => self.rsq,
            SelectionMetric::Mae => self.mae,
        }
    }
}

/// Metric used to rank hyperparameter candidates and table rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMetric {
    Rmse,
    #[default]
    Rsq,
    Mae,
}

impl SelectionMetric {
    pub const ALL: [SelectionMetric; 3] = [SelectionMetric::Rmse, SelectionMetric::Rsq, SelectionMetric::Mae];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Rmse => "rmse",
            Self::Rsq => "rsq",
            Self::Mae => "mae",
        }
    }

    pub fn higher_is_better(&self) -> bool {
        matches!(self, Self::Rsq)
    }

    /// True if `candidate` is strictly better than `incumbent`.
    pub fn is_better(&self, candidate: &RegressionMetrics, incumbent: &RegressionMetrics) -> bool {
        let (c, i) = (candidate.get(*self), incumbent.get(*self));
        match c.partial_cmp(&i) {
            Some(Ordering::Greater) => self.higher_is_better(),
            Some(Ordering::Less) => !self.higher_is_better(),
            _ => false,
        }
    }
}

impl fmt::Display for SelectionMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Metrics calculator.
pub struct MetricsCalculator;

impl MetricsCalculator {
    /// Score predictions against observed values.
    ///
    /// When the observed values are constant, R-squared is 1 for a perfect
    /// fit and 0 otherwise.
    pub fn calculate(actual: &[f64], predicted: &[f64]) -> Result<RegressionMetrics, MetricsError> {
        if actual.is_empty() {
            return Err(MetricsError::Empty);
        }
        if actual.len() != predicted.len() {
            return Err(MetricsError::LengthMismatch {
                actual: actual.len(),
                predicted: predicted.len(),
            });
        }
        if let Some(pos) = predicted.iter().position(|p| !p.is_finite()) {
            return Err(MetricsError::NonFinite(pos));
        }

        let n = actual.len() as f64;
        let mean_actual = actual.iter().sum::<f64>() / n;

        let ss_res: f64 = actual
            .iter()
            .zip(predicted)
            .map(|(a, p)| (a - p).powi(2))
            .sum();
        let ss_tot: f64 = actual.iter().map(|a| (a - mean_actual).powi(2)).sum();
        let abs_err: f64 = actual.iter().zip(predicted).map(|(a, p)| (a - p).abs()).sum();

        let rsq = if ss_tot > 0.0 {
            1.0 - ss_res / ss_tot
        } else if ss_res == 0.0 {
            1.0
        } else {
            0.0
        };

        Ok(RegressionMetrics {
            rmse: (ss_res / n).sqrt(),
            rsq,
            mae: abs_err / n,
        })
    }

    /// Average each metric over a set of evaluations.
    pub fn mean(metrics: &[RegressionMetrics]) -> Option<RegressionMetrics> {
        if metrics.is_empty() {
            return None;
        }
        let n = metrics.len() as f64;
        Some(RegressionMetrics {
            rmse: metrics.iter().map(|m| m.rmse).sum::<f64>() / n,
            rsq: metrics.iter().map(|m| m.rsq).sum::<f64>() / n,
            mae: metrics.iter().map(|m| m.mae).sum::<f64>() / n,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_predictions() {
        let actual = [1.0, 2.0, 3.0, 4.0];
        let m = MetricsCalculator::calculate(&actual, &actual).unwrap();
        assert_eq!(m.rmse, 0.0);
        assert_eq!(m.mae, 0.0);
        assert_eq!(m.rsq, 1.0);
    }

    #[test]
    fn test_known_values() {
        let actual = [1.0, 2.0, 3.0, 4.0];
        let predicted = [2.0, 2.0, 2.0, 6.0];
        let m = MetricsCalculator::calculate(&actual, &predicted).unwrap();

        // Residuals: -1, 0, 1, -2 -> SSR 6, SST 5.
        assert!((m.rmse - (6.0f64 / 4.0).sqrt()).abs() < 1e-12);
        assert!((m.mae - 1.0).abs() < 1e-12);
        assert!((m.rsq - (1.0 - 6.0 / 5.0)).abs() < 1e-12);
        assert!(m.rsq < 0.0);
    }

    #[test]
    fn test_constant_actuals() {
        let m = MetricsCalculator::calculate(&[3.0, 3.0], &[3.0, 3.0]).unwrap();
        assert_eq!(m.rsq, 1.0);
        let m = MetricsCalculator::calculate(&[3.0, 3.0], &[2.0, 4.0]).unwrap();
        assert_eq!(m.rsq, 0.0);
    }

    #[test]
    fn test_input_errors() {
        assert_eq!(MetricsCalculator::calculate(&[], &[]).unwrap_err(), MetricsError::Empty);
        assert!(matches!(
            MetricsCalculator::calculate(&[1.0], &[1.0, 2.0]),
            Err(MetricsError::LengthMismatch { .. })
        ));
        assert_eq!(
            MetricsCalculator::calculate(&[1.0, 2.0], &[1.0, f64::NAN]).unwrap_err(),
            MetricsError::NonFinite(1)
        );
    }

    #[test]
    fn test_mean() {
        let a = RegressionMetrics { rmse: 1.0, rsq: 0.5, mae: 2.0 };
        let b = RegressionMetrics { rmse: 3.0, rsq: 0.7, mae: 4.0 };
        let m = MetricsCalculator::mean(&[a, b]).unwrap();
        assert_eq!(m.rmse, 2.0);
        assert!((m.rsq - 0.6).abs() < 1e-12);
        assert_eq!(m.mae, 3.0);
        assert!(MetricsCalculator::mean(&[]).is_none());
    }

    #[test]
    fn test_selection_direction() {
        let good = RegressionMetrics { rmse: 1.0, rsq: 0.9, mae: 0.5 };
        let bad = RegressionMetrics { rmse: 2.0, rsq: 0.4, mae: 1.5 };
        for metric in SelectionMetric::ALL {
            assert!(metric.is_better(&good, &bad), "{metric}");
            assert!(!metric.is_better(&bad, &good), "{metric}");
            assert!(!metric.is_better(&good, &good), "{metric}");
        }
    }
}
