//! A model bound to its feature set and training-row scaling.

use rand::rngs::StdRng;

use crate::features::{targets, FeatureRow, FeatureSet};

use super::params::{FittedModel, HyperParams};
use super::standardize::Standardizer;
use super::traits::{FitError, Regressor};

/// A fitted (feature set, family, hyperparameters) combination.
///
/// Never mutated after fitting; predictions standardize incoming rows
/// with the statistics learned from the training rows.
#[derive(Debug, Clone)]
pub struct TrainedModel {
    feature_set: FeatureSet,
    params: HyperParams,
    standardizer: Standardizer,
    model: FittedModel,
}

impl TrainedModel {
    pub fn fit(
        feature_set: FeatureSet,
        params: &HyperParams,
        rows: &[FeatureRow],
        rng: &mut StdRng,
    ) -> Result<Self, FitError> {
        if rows.is_empty() {
            return Err(FitError::EmptyTrainingSet);
        }
        let x = feature_set.design_matrix(rows);
        let y = targets(rows);

        let standardizer = Standardizer::fit(x.view());
        let scaled = standardizer.transform(x.view());
        let model = params.fit(scaled.view(), y.view(), rng)?;

        Ok(Self {
            feature_set,
            params: params.clone(),
            standardizer,
            model,
        })
    }

    pub fn predict(&self, rows: &[FeatureRow]) -> Vec<f64> {
        let x = self.feature_set.design_matrix(rows);
        let scaled = self.standardizer.transform(x.view());
        self.model.predict(scaled.view()).to_vec()
    }

    pub fn feature_set(&self) -> FeatureSet {
        self.feature_set
    }

    pub fn params(&self) -> &HyperParams {
        &self.params
    }

    pub fn model(&self) -> &FittedModel {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rand::SeedableRng;

    fn rows(n: usize) -> Vec<FeatureRow> {
        let start = NaiveDate::from_ymd_opt(2020, 4, 1).unwrap();
        (0..n)
            .map(|i| {
                let lag = i as f64;
                FeatureRow {
                    county: "A".to_string(),
                    date: start + chrono::Duration::days(i as i64),
                    cases: 3.0 * lag + 1.0,
                    pop_density: 120.0,
                    case_lags: [lag, lag * 0.5, 1.0],
                    mobility: [0.0; 4],
                    mobility_lagged: [0.0; 4],
                }
            })
            .collect()
    }

    #[test]
    fn test_fit_and_predict_lasso() {
        let data = rows(30);
        let mut rng = StdRng::seed_from_u64(0);
        let model = TrainedModel::fit(
            FeatureSet::Baseline,
            &HyperParams::Lasso { penalty: 1e-6 },
            &data,
            &mut rng,
        )
        .unwrap();

        assert_eq!(model.feature_set(), FeatureSet::Baseline);
        let pred = model.predict(&data[..3]);
        for (p, row) in pred.iter().zip(&data[..3]) {
            assert!((p - row.cases).abs() < 1e-3, "{p} vs {}", row.cases);
        }
    }

    #[test]
    fn test_empty_rows_rejected() {
        let mut rng = StdRng::seed_from_u64(0);
        let result = TrainedModel::fit(
            FeatureSet::Full,
            &HyperParams::Lasso { penalty: 0.1 },
            &[],
            &mut rng,
        );
        assert!(matches!(result, Err(FitError::EmptyTrainingSet)));
    }
}
