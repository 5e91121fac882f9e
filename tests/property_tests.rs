//! Property-based tests for metrics and fold generation.
//!
//! These tests verify invariants that should hold for all valid inputs,
//! using randomly generated predictions and panel shapes.

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;

use mobility_forecast::features::FeatureRow;
use mobility_forecast::metrics::MetricsCalculator;
use mobility_forecast::walkforward::{SplitConfig, TemporalSplitter};

/// Long-form feature rows for `counties` counties over `days` days.
fn rows(counties: usize, days: usize) -> Vec<FeatureRow> {
    let start = NaiveDate::from_ymd_opt(2020, 4, 1).unwrap();
    (0..counties)
        .flat_map(|c| {
            (0..days).map(move |d| FeatureRow {
                county: format!("county-{:02}", c),
                date: start + Duration::days(d as i64),
                cases: (c * 3 + d) as f64,
                pop_density: 10.0 + c as f64,
                case_lags: [0.0; 3],
                mobility: [0.0; 4],
                mobility_lagged: [0.0; 4],
            })
        })
        .collect()
}

/// Strategy for paired actual/predicted vectors of equal length.
fn paired_values() -> impl Strategy<Value = (Vec<f64>, Vec<f64>)> {
    (1usize..60).prop_flat_map(|len| {
        (
            prop::collection::vec(-1000.0..1000.0_f64, len),
            prop::collection::vec(-1000.0..1000.0_f64, len),
        )
    })
}

proptest! {
    #[test]
    fn test_metric_bounds((actual, predicted) in paired_values()) {
        let m = MetricsCalculator::calculate(&actual, &predicted).unwrap();
        prop_assert!(m.rmse >= 0.0);
        prop_assert!(m.mae >= 0.0);
        prop_assert!(m.rsq <= 1.0);
        prop_assert!(m.mae <= m.rmse + 1e-9);
    }

    #[test]
    fn test_perfect_predictions_score_perfectly(actual in prop::collection::vec(-50.0..50.0_f64, 1..40)) {
        let m = MetricsCalculator::calculate(&actual, &actual).unwrap();
        prop_assert_eq!(m.rmse, 0.0);
        prop_assert_eq!(m.mae, 0.0);
        prop_assert_eq!(m.rsq, 1.0);
    }

    #[test]
    fn test_folds_never_leak(
        counties in 1usize..5,
        days in 30usize..90,
        test_days in 1u32..10,
        train_days in 2u32..15,
        validation_days in 1u32..6,
        step_days in 1u32..6,
    ) {
        let config = SplitConfig {
            test_window_days: test_days,
            train_window_days: train_days,
            validation_window_days: validation_days,
            step_days,
        };
        let plan = TemporalSplitter::new(config).split(&rows(counties, days)).unwrap();

        prop_assert!(plan.training_end().unwrap() < plan.test_start);
        prop_assert_eq!(plan.training.len() + plan.test.len(), counties * days);

        for fold in &plan.folds {
            let (train, validation) = plan.fold_rows(fold);
            let max_train = train.iter().map(|r| r.date).max().unwrap();
            let min_validation = validation.iter().map(|r| r.date).min().unwrap();
            prop_assert!(max_train < min_validation);
            prop_assert!(validation.iter().all(|r| r.date < plan.test_start));
        }
    }

    #[test]
    fn test_fold_training_size_is_fixed(
        counties in 1usize..5,
        days in 60usize..120,
        train_days in 5u32..20,
        validation_days in 1u32..5,
        step_days in 1u32..7,
    ) {
        let config = SplitConfig {
            test_window_days: 7,
            train_window_days: train_days,
            validation_window_days: validation_days,
            step_days,
        };
        let plan = TemporalSplitter::new(config).split(&rows(counties, days)).unwrap();

        // Aligned day windows never split a date, so every fold survives.
        prop_assert!(plan.folds.len() >= 2);
        let expected = train_days as usize * counties;
        for fold in &plan.folds {
            prop_assert_eq!(fold.train_len(), expected);
            prop_assert_eq!(fold.validation_len(), validation_days as usize * counties);
        }
    }

    #[test]
    fn test_splitter_is_replayable(counties in 1usize..4, days in 40usize..80) {
        let config = SplitConfig {
            test_window_days: 5,
            train_window_days: 10,
            validation_window_days: 3,
            step_days: 4,
        };
        let a = TemporalSplitter::new(config.clone()).split(&rows(counties, days)).unwrap();
        let b = TemporalSplitter::new(config).split(&rows(counties, days)).unwrap();
        prop_assert_eq!(a.folds, b.folds);
    }
}
