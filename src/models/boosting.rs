//! Gradient-boosted regression trees under squared loss.
//!
//! Starts from the training mean and adds `trees` shallow trees, each fitted
//! to the current residuals and shrunk by the learning rate. Splits must
//! reduce the loss by more than `loss_reduction`.

use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use tracing::debug;

use super::traits::{check_dimensions, FitError, Regressor};
use super::tree::{RegressionTree, TreeParams};

/// Gradient boosting hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoostingParams {
    pub trees: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    pub loss_reduction: f64,
}

/// Fitted boosted ensemble.
#[derive(Debug, Clone)]
pub struct GradientBoosting {
    base: f64,
    learning_rate: f64,
    trees: Vec<RegressionTree>,
}

impl GradientBoosting {
    pub fn fit(
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        params: BoostingParams,
        rng: &mut StdRng,
    ) -> Result<Self, FitError> {
        check_dimensions(&x, &y)?;

        if params.trees == 0 || params.max_depth == 0 {
            return Err(FitError::InvalidHyperParams(
                "boosting needs at least one tree of depth >= 1".to_string(),
            ));
        }
        if !(params.learning_rate > 0.0 && params.learning_rate <= 1.0) {
            return Err(FitError::InvalidHyperParams(format!(
                "learning rate must be in (0, 1], got {}",
                params.learning_rate
            )));
        }
        if !(params.loss_reduction.is_finite() && params.loss_reduction >= 0.0) {
            return Err(FitError::InvalidHyperParams(format!(
                "loss reduction must be non-negative, got {}",
                params.loss_reduction
            )));
        }

        let n = x.nrows();
        let rows: Vec<usize> = (0..n).collect();
        let base = y.mean().ok_or(FitError::EmptyTrainingSet)?;
        let mut fitted = Array1::from_elem(n, base);

        let tree_params = TreeParams {
            max_depth: Some(params.max_depth),
            min_leaf: 1,
            max_features: None,
            min_loss_reduction: params.loss_reduction,
        };

        let mut trees = Vec::with_capacity(params.trees);
        for round in 0..params.trees {
            let residual = &y - &fitted;
            let tree = RegressionTree::fit(x, residual.view(), &rows, &tree_params, rng);

            if tree.n_leaves() == 1 {
                debug!("Boosting stopped after {} rounds: no split reduces the loss", round);
                break;
            }

            let update = tree.predict(x);
            fitted.scaled_add(params.learning_rate, &update);
            trees.push(tree);
        }

        if fitted.iter().any(|v| !v.is_finite()) {
            return Err(FitError::NonFinite);
        }

        Ok(Self {
            base,
            learning_rate: params.learning_rate,
            trees,
        })
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Regressor for GradientBoosting {
    fn predict_row(&self, x: ArrayView1<'_, f64>) -> f64 {
        self.base
            + self.learning_rate * self.trees.iter().map(|t| t.predict_row(x)).sum::<f64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use rand::SeedableRng;

    fn params() -> BoostingParams {
        BoostingParams {
            trees: 100,
            max_depth: 3,
            learning_rate: 0.3,
            loss_reduction: 0.0,
        }
    }

    #[test]
    fn test_boosting_reduces_training_error() {
        let x = Array2::from_shape_fn((50, 2), |(i, j)| (i as f64) * (j as f64 + 1.0));
        let y: Array1<f64> = x.outer_iter().map(|r| (r[0] / 5.0).sin() * 10.0).collect();
        let mut rng = StdRng::seed_from_u64(5);
        let model = GradientBoosting::fit(x.view(), y.view(), params(), &mut rng).unwrap();

        let pred = model.predict(x.view());
        let mse = pred
            .iter()
            .zip(y.iter())
            .map(|(p, a)| (p - a).powi(2))
            .sum::<f64>()
            / 50.0;
        assert!(mse < 0.05 * y.var(0.0), "mse {mse}");
    }

    #[test]
    fn test_constant_target_stops_early() {
        let x = Array2::from_shape_fn((10, 1), |(i, _)| i as f64);
        let y = Array1::from_elem(10, 4.0);
        let mut rng = StdRng::seed_from_u64(5);
        let model = GradientBoosting::fit(x.view(), y.view(), params(), &mut rng).unwrap();
        assert_eq!(model.n_trees(), 0);
        assert_eq!(model.predict_row(x.row(3)), 4.0);
    }

    #[test]
    fn test_large_loss_reduction_blocks_all_splits() {
        let x = Array2::from_shape_fn((10, 1), |(i, _)| i as f64);
        let y: Array1<f64> = (0..10).map(|i| i as f64).collect();
        let mut rng = StdRng::seed_from_u64(5);
        let strict = BoostingParams {
            loss_reduction: 1e6,
            ..params()
        };
        let model = GradientBoosting::fit(x.view(), y.view(), strict, &mut rng).unwrap();
        assert_eq!(model.n_trees(), 0);
        assert!((model.predict_row(x.row(0)) - 4.5).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_learning_rate() {
        let x = Array2::from_shape_fn((4, 1), |(i, _)| i as f64);
        let y = Array1::from_elem(4, 1.0);
        let mut rng = StdRng::seed_from_u64(5);
        let bad = BoostingParams {
            learning_rate: 0.0,
            ..params()
        };
        assert!(matches!(
            GradientBoosting::fit(x.view(), y.view(), bad, &mut rng),
            Err(FitError::InvalidHyperParams(_))
        ));
    }
}
