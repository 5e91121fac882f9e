//! Bagged regression-tree ensemble (random forest).
//!
//! Each tree is grown to full depth on a bootstrap sample, considering
//! `mtry` randomly chosen features per split. Per-tree seeds are drawn up
//! front from the caller's generator so trees can be grown in parallel
//! without changing the result.

use ndarray::{ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use super::traits::{check_dimensions, FitError, Regressor};
use super::tree::{RegressionTree, TreeParams};

/// Random forest hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForestParams {
    pub trees: usize,
    pub mtry: usize,
    pub min_leaf: usize,
}

/// Fitted random forest.
#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<RegressionTree>,
}

impl RandomForest {
    pub fn fit(
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        params: ForestParams,
        rng: &mut StdRng,
    ) -> Result<Self, FitError> {
        check_dimensions(&x, &y)?;
        let (n, p) = x.dim();

        if params.trees == 0 {
            return Err(FitError::InvalidHyperParams("forest needs at least one tree".to_string()));
        }
        if params.mtry == 0 || params.mtry > p {
            return Err(FitError::InvalidHyperParams(format!(
                "mtry must be in 1..={}, got {}",
                p, params.mtry
            )));
        }
        if params.min_leaf == 0 {
            return Err(FitError::InvalidHyperParams("min_leaf must be positive".to_string()));
        }

        let tree_params = TreeParams {
            max_depth: None,
            min_leaf: params.min_leaf,
            max_features: Some(params.mtry),
            min_loss_reduction: 0.0,
        };

        let seeds: Vec<u64> = (0..params.trees).map(|_| rng.gen()).collect();
        let trees = seeds
            .par_iter()
            .map(|&seed| {
                let mut tree_rng = StdRng::seed_from_u64(seed);
                let bootstrap: Vec<usize> = (0..n).map(|_| tree_rng.gen_range(0..n)).collect();
                RegressionTree::fit(x, y, &bootstrap, &tree_params, &mut tree_rng)
            })
            .collect();

        Ok(Self { trees })
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Regressor for RandomForest {
    fn predict_row(&self, x: ArrayView1<'_, f64>) -> f64 {
        let total: f64 = self.trees.iter().map(|t| t.predict_row(x)).sum();
        total / self.trees.len() as f64
    }
}
