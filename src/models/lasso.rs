//! L1-penalized least squares fitted by cyclic coordinate descent.
//!
//! Minimizes `1/(2n) * ||y - b - X beta||^2 + penalty * ||beta||_1` with an
//! unpenalized intercept. Columns are centred internally; callers normally
//! pass standardized features so the penalty acts on a common scale.

use ndarray::{Array1, ArrayView1, ArrayView2, Axis};

use super::traits::{check_dimensions, FitError, Regressor};

/// Maximum number of full coordinate sweeps.
pub const MAX_SWEEPS: usize = 10_000;

/// Convergence threshold on the largest scaled coefficient update.
pub const TOLERANCE: f64 = 1e-7;

/// Fitted lasso model.
#[derive(Debug, Clone, PartialEq)]
pub struct Lasso {
    intercept: f64,
    coefficients: Array1<f64>,
    sweeps: usize,
}

impl Lasso {
    pub fn fit(
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        penalty: f64,
    ) -> Result<Self, FitError> {
        check_dimensions(&x, &y)?;
        if !(penalty.is_finite() && penalty >= 0.0) {
            return Err(FitError::InvalidHyperParams(format!(
                "lasso penalty must be finite and non-negative, got {}",
                penalty
            )));
        }

        let (n, p) = x.dim();
        let n_f = n as f64;

        let x_mean = x.mean_axis(Axis(0)).ok_or(FitError::EmptyTrainingSet)?;
        let y_mean = y.mean().ok_or(FitError::EmptyTrainingSet)?;
        let xc = &x - &x_mean;
        let mut residual = &y - y_mean;

        let col_sq: Vec<f64> = xc
            .axis_iter(Axis(1))
            .map(|col| col.dot(&col) / n_f)
            .collect();

        let mut beta: Array1<f64> = Array1::zeros(p);
        let mut sweeps = 0;
        let mut converged = false;

        while sweeps < MAX_SWEEPS {
            sweeps += 1;
            let mut max_delta: f64 = 0.0;

            for j in 0..p {
                if col_sq[j] <= f64::EPSILON {
                    continue;
                }
                let col = xc.column(j);
                let rho = col.dot(&residual) / n_f + col_sq[j] * beta[j];
                let updated = soft_threshold(rho, penalty) / col_sq[j];
                let delta = updated - beta[j];

                if delta != 0.0 {
                    residual.scaled_add(-delta, &col);
                    beta[j] = updated;
                    max_delta = max_delta.max(delta.abs() * col_sq[j].sqrt());
                }
            }

            if max_delta < TOLERANCE {
                converged = true;
                break;
            }
        }

        if !converged {
            return Err(FitError::NonConvergence { iterations: sweeps });
        }

        let intercept = y_mean - beta.dot(&x_mean);
        if !intercept.is_finite() || beta.iter().any(|b| !b.is_finite()) {
            return Err(FitError::NonFinite);
        }

        Ok(Self {
            intercept,
            coefficients: beta,
            sweeps,
        })
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn coefficients(&self) -> &Array1<f64> {
        &self.coefficients
    }

    /// Number of non-zero coefficients.
    pub fn active_features(&self) -> usize {
        self.coefficients.iter().filter(|b| **b != 0.0).count()
    }

    pub fn sweeps(&self) -> usize {
        self.sweeps
    }
}

impl Regressor for Lasso {
    fn predict_row(&self, x: ArrayView1<'_, f64>) -> f64 {
        self.intercept + self.coefficients.dot(&x)
    }
}

fn soft_threshold(value: f64, threshold: f64) -> f64 {
    if value > threshold {
        value - threshold
    } else if value < -threshold {
        value + threshold
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    fn linear_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((40, 3), |(i, j)| {
            let t = i as f64;
            match j {
                0 => (t * 0.7).sin(),
                1 => (t * 1.3).cos(),
                _ => ((t * 0.37) % 1.0) - 0.5,
            }
        });
        let y = x.outer_iter().map(|r| 2.0 + 3.0 * r[0] - 1.5 * r[1]).collect();
        (x, y)
    }

    #[test]
    fn test_soft_threshold() {
        assert_eq!(soft_threshold(3.0, 1.0), 2.0);
        assert_eq!(soft_threshold(-3.0, 1.0), -2.0);
        assert_eq!(soft_threshold(0.5, 1.0), 0.0);
    }

    #[test]
    fn test_small_penalty_recovers_coefficients() {
        let (x, y) = linear_data();
        let model = Lasso::fit(x.view(), y.view(), 1e-6).unwrap();

        assert!((model.coefficients()[0] - 3.0).abs() < 1e-3);
        assert!((model.coefficients()[1] + 1.5).abs() < 1e-3);
        assert!(model.coefficients()[2].abs() < 1e-3);
        assert!((model.intercept() - 2.0).abs() < 1e-3);

        let pred = model.predict(x.view());
        let max_err = pred
            .iter()
            .zip(y.iter())
            .map(|(p, a)| (p - a).abs())
            .fold(0.0, f64::max);
        assert!(max_err < 1e-2);
    }

    #[test]
    fn test_large_penalty_zeroes_coefficients() {
        let (x, y) = linear_data();
        let model = Lasso::fit(x.view(), y.view(), 100.0).unwrap();
        assert_eq!(model.active_features(), 0);

        let mean = y.mean().unwrap();
        assert!((model.intercept() - mean).abs() < 1e-12);
    }

    #[test]
    fn test_constant_column_ignored() {
        let x = array![[1.0, 7.0], [2.0, 7.0], [3.0, 7.0], [4.0, 7.0]];
        let y = array![2.0, 4.0, 6.0, 8.0];
        let model = Lasso::fit(x.view(), y.view(), 1e-8).unwrap();
        assert_eq!(model.coefficients()[1], 0.0);
        assert!((model.coefficients()[0] - 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_invalid_inputs() {
        let x = array![[1.0], [2.0]];
        let y = array![1.0, 2.0];
        assert!(matches!(
            Lasso::fit(x.view(), y.view(), -1.0),
            Err(FitError::InvalidHyperParams(_))
        ));
        let short = array![1.0];
        assert!(matches!(
            Lasso::fit(x.view(), short.view(), 0.1),
            Err(FitError::DimensionMismatch { rows: 2, targets: 1 })
        ));
    }
}
