//! Temporal splitting and rolling-origin fold generation.
//!
//! The last `test_window_days` calendar days are held out as the test
//! window. The remaining training region is stacked in long form, sorted by
//! (date, county), and cut into fixed-size sliding folds measured in
//! county-days:
//! - Train: `train_window_days x counties` rows
//! - Validate: the `validation_window_days x counties` rows that follow
//! - Roll: `step_days x counties` rows

use std::collections::BTreeSet;
use std::ops::Range;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::features::FeatureRow;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FoldConfigError {
    #[error("{field} must be greater than zero")]
    ZeroSize { field: &'static str },

    #[error("No feature rows to split")]
    NoData,

    #[error("Test window of {test_days} days leaves no training data")]
    EmptyTrainingRegion { test_days: u32 },

    #[error("Fold needs {required} county-days but the training region has {available}")]
    WindowExceedsHistory { required: usize, available: usize },

    #[error("No fold keeps every training date before its validation dates")]
    NoValidFold,
}

/// Configuration for the test split and fold windows, in days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Calendar days held out at the end of the panel.
    pub test_window_days: u32,
    /// Training window length per fold.
    pub train_window_days: u32,
    /// Validation window length per fold.
    pub validation_window_days: u32,
    /// Advance between consecutive folds.
    pub step_days: u32,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_window_days: 14,
            train_window_days: 60,
            validation_window_days: 14,
            step_days: 14,
        }
    }
}

impl SplitConfig {
    /// Convert day-based windows into county-day row counts.
    pub fn windows(&self, n_counties: usize) -> FoldWindows {
        FoldWindows {
            train_rows: self.train_window_days as usize * n_counties,
            validation_rows: self.validation_window_days as usize * n_counties,
            step_rows: self.step_days as usize * n_counties,
        }
    }
}

/// Fold window sizes in county-days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoldWindows {
    pub train_rows: usize,
    pub validation_rows: usize,
    pub step_rows: usize,
}

impl FoldWindows {
    /// Number of folds that fit in `n_rows`, before date-boundary checks.
    pub fn expected_folds(&self, n_rows: usize) -> usize {
        let required = self.train_rows + self.validation_rows;
        if self.step_rows == 0 || n_rows < required {
            return 0;
        }
        (n_rows - required) / self.step_rows + 1
    }
}

/// One train/validation pair over the long-form training region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fold {
    /// Fold number (1-indexed).
    pub fold_num: usize,
    /// Row range of the training slice.
    pub train: Range<usize>,
    /// Row range of the validation slice.
    pub validation: Range<usize>,
    pub train_start: NaiveDate,
    pub train_end: NaiveDate,
    pub validate_start: NaiveDate,
    pub validate_end: NaiveDate,
}

impl Fold {
    pub fn train_len(&self) -> usize {
        self.train.len()
    }

    pub fn validation_len(&self) -> usize {
        self.validation.len()
    }

    /// Training period length in days.
    pub fn train_days(&self) -> i64 {
        (self.train_end - self.train_start).num_days() + 1
    }
}

/// The held-out test window, the training region and its folds.
#[derive(Debug, Clone)]
pub struct SplitPlan {
    /// Training-region rows sorted by (date, county).
    pub training: Vec<FeatureRow>,
    /// Test-window rows sorted by (date, county).
    pub test: Vec<FeatureRow>,
    pub folds: Vec<Fold>,
    pub windows: FoldWindows,
    pub n_counties: usize,
    pub test_start: NaiveDate,
    pub test_end: NaiveDate,
}

impl SplitPlan {
    /// Borrow the training and validation rows of a fold.
    pub fn fold_rows(&self, fold: &Fold) -> (&[FeatureRow], &[FeatureRow]) {
        (
            &self.training[fold.train.clone()],
            &self.training[fold.validation.clone()],
        )
    }

    /// Last date of the training region.
    pub fn training_end(&self) -> Option<NaiveDate> {
        self.training.last().map(|r| r.date)
    }

    pub fn summary(&self) -> String {
        let mut out = format!(
            "Training region: {} rows ({} counties), test window: {} rows ({} to {})\n\
             Fold windows: train {} / validate {} / step {} county-days, {} folds\n",
            self.training.len(),
            self.n_counties,
            self.test.len(),
            self.test_start,
            self.test_end,
            self.windows.train_rows,
            self.windows.validation_rows,
            self.windows.step_rows,
            self.folds.len()
        );
        for fold in &self.folds {
            out.push_str(&format!(
                "  Fold {:>3}: train {} to {} ({} rows), validate {} to {} ({} rows)\n",
                fold.fold_num,
                fold.train_start,
                fold.train_end,
                fold.train_len(),
                fold.validate_start,
                fold.validate_end,
                fold.validation_len()
            ));
        }
        out
    }
}

/// Deterministic splitter for a panel snapshot.
pub struct TemporalSplitter {
    config: SplitConfig,
}

impl TemporalSplitter {
    pub fn new(config: SplitConfig) -> Self {
        Self { config }
    }

    /// Hold out the test window and generate folds over the remainder.
    pub fn split(&self, rows: &[FeatureRow]) -> Result<SplitPlan, FoldConfigError> {
        if self.config.test_window_days == 0 {
            return Err(FoldConfigError::ZeroSize {
                field: "test_window_days",
            });
        }

        let mut rows = rows.to_vec();
        sort_long_form(&mut rows);

        let (training, test) = split_test(rows, self.config.test_window_days)?;
        let n_counties = training
            .iter()
            .map(|r| r.county.as_str())
            .collect::<BTreeSet<_>>()
            .len();

        let windows = self.config.windows(n_counties);
        let folds = rolling_folds(&training, &windows)?;

        let test_start = test.first().map(|r| r.date).ok_or(FoldConfigError::NoData)?;
        let test_end = test.last().map(|r| r.date).ok_or(FoldConfigError::NoData)?;

        info!(
            "Split {} training rows into {} folds, {} test rows from {} to {}",
            training.len(),
            folds.len(),
            test.len(),
            test_start,
            test_end
        );

        Ok(SplitPlan {
            training,
            test,
            folds,
            windows,
            n_counties,
            test_start,
            test_end,
        })
    }
}

/// Sort rows into long form: by date, then county.
pub fn sort_long_form(rows: &mut [FeatureRow]) {
    rows.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.county.cmp(&b.county)));
}

/// Split long-form rows into (training region, test window).
///
/// The test window covers the last `test_window_days` calendar days of the
/// overall date range.
pub fn split_test(
    rows: Vec<FeatureRow>,
    test_window_days: u32,
) -> Result<(Vec<FeatureRow>, Vec<FeatureRow>), FoldConfigError> {
    if test_window_days == 0 {
        return Err(FoldConfigError::ZeroSize {
            field: "test_window_days",
        });
    }
    let max_date = rows.iter().map(|r| r.date).max().ok_or(FoldConfigError::NoData)?;
    let cutoff = max_date - Duration::days(i64::from(test_window_days) - 1);

    let (test, training): (Vec<_>, Vec<_>) = rows.into_iter().partition(|r| r.date >= cutoff);

    if training.is_empty() {
        return Err(FoldConfigError::EmptyTrainingRegion {
            test_days: test_window_days,
        });
    }
    Ok((training, test))
}

/// Generate non-cumulative rolling-origin folds over long-form rows.
///
/// Every fold trains on exactly `train_rows` rows. When a date straddles
/// the train/validation boundary, the validation slice starts at the first
/// strictly later date; folds left with no validation rows are skipped.
pub fn rolling_folds(
    rows: &[FeatureRow],
    windows: &FoldWindows,
) -> Result<Vec<Fold>, FoldConfigError> {
    for (field, size) in [
        ("train_window", windows.train_rows),
        ("validation_window", windows.validation_rows),
        ("step", windows.step_rows),
    ] {
        if size == 0 {
            return Err(FoldConfigError::ZeroSize { field });
        }
    }

    let required = windows.train_rows + windows.validation_rows;
    if required > rows.len() {
        return Err(FoldConfigError::WindowExceedsHistory {
            required,
            available: rows.len(),
        });
    }

    let mut folds = Vec::with_capacity(windows.expected_folds(rows.len()));
    let mut start = 0;

    while start + required <= rows.len() {
        let train_end = start + windows.train_rows;
        let validation_end = train_end + windows.validation_rows;
        let last_train_date = rows[train_end - 1].date;

        let mut validation_start = train_end;
        while validation_start < validation_end && rows[validation_start].date <= last_train_date {
            validation_start += 1;
        }

        if validation_start < validation_end {
            folds.push(Fold {
                fold_num: folds.len() + 1,
                train: start..train_end,
                validation: validation_start..validation_end,
                train_start: rows[start].date,
                train_end: last_train_date,
                validate_start: rows[validation_start].date,
                validate_end: rows[validation_end - 1].date,
            });
        } else {
            debug!("Skipping fold at row {}: validation shares the last training date", start);
        }

        start += windows.step_rows;
    }

    if folds.is_empty() {
        return Err(FoldConfigError::NoValidFold);
    }
    Ok(folds)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(counties: &[&str], days: usize) -> Vec<FeatureRow> {
        let start = NaiveDate::from_ymd_opt(2020, 4, 1).unwrap();
        let mut out = Vec::new();
        for county in counties {
            for d in 0..days {
                out.push(FeatureRow {
                    county: county.to_string(),
                    date: start + Duration::days(d as i64),
                    cases: d as f64,
                    pop_density: 1.0,
                    case_lags: [0.0; 3],
                    mobility: [0.0; 4],
                    mobility_lagged: [0.0; 4],
                });
            }
        }
        out
    }

    #[test]
    fn test_default_config() {
        let config = SplitConfig::default();
        assert_eq!(config.test_window_days, 14);
        assert_eq!(config.train_window_days, 60);
        assert_eq!(config.validation_window_days, 14);
        assert_eq!(config.step_days, 14);
    }

    #[test]
    fn test_windows_scale_by_counties() {
        let config = SplitConfig {
            test_window_days: 5,
            train_window_days: 10,
            validation_window_days: 3,
            step_days: 2,
        };
        let windows = config.windows(4);
        assert_eq!(windows.train_rows, 40);
        assert_eq!(windows.validation_rows, 12);
        assert_eq!(windows.step_rows, 8);
    }

    #[test]
    fn test_test_split_holds_out_last_days() {
        let mut all = rows(&["a", "b"], 30);
        sort_long_form(&mut all);
        let (training, test) = split_test(all, 5).unwrap();

        assert_eq!(test.len(), 10);
        assert_eq!(training.len(), 50);
        let max_train = training.iter().map(|r| r.date).max().unwrap();
        let min_test = test.iter().map(|r| r.date).min().unwrap();
        assert!(max_train < min_test);
        assert_eq!((min_test - max_train).num_days(), 1);
    }

    #[test]
    fn test_folds_are_fixed_size_and_ordered() {
        let mut all = rows(&["a", "b", "c"], 100);
        sort_long_form(&mut all);
        let windows = FoldWindows {
            train_rows: 60,
            validation_rows: 15,
            step_rows: 30,
        };
        let folds = rolling_folds(&all, &windows).unwrap();

        assert_eq!(folds.len(), windows.expected_folds(all.len()));
        assert!(folds.len() >= 2);
        for (i, fold) in folds.iter().enumerate() {
            assert_eq!(fold.fold_num, i + 1);
            assert_eq!(fold.train_len(), 60);
            assert_eq!(fold.validation_len(), 15);
            assert_eq!(fold.train_days(), 20);
            assert!(fold.train_end < fold.validate_start);
            assert_eq!(fold.train.end, fold.validation.start);
        }
        for pair in folds.windows(2) {
            assert_eq!(pair[1].train.start - pair[0].train.start, 30);
        }
    }

    #[test]
    fn test_window_larger_than_history_fails() {
        let mut all = rows(&["a"], 50);
        sort_long_form(&mut all);
        let windows = FoldWindows {
            train_rows: 120,
            validation_rows: 10,
            step_rows: 10,
        };
        let err = rolling_folds(&all, &windows).unwrap_err();
        assert_eq!(
            err,
            FoldConfigError::WindowExceedsHistory {
                required: 130,
                available: 50
            }
        );
    }

    #[test]
    fn test_zero_step_rejected() {
        let all = rows(&["a"], 20);
        let windows = FoldWindows {
            train_rows: 5,
            validation_rows: 5,
            step_rows: 0,
        };
        assert_eq!(
            rolling_folds(&all, &windows).unwrap_err(),
            FoldConfigError::ZeroSize { field: "step" }
        );
    }

    #[test]
    fn test_unaligned_boundary_is_snapped() {
        let mut all = rows(&["a", "b"], 20);
        sort_long_form(&mut all);
        // 5 rows = two full days plus half of the third.
        let windows = FoldWindows {
            train_rows: 5,
            validation_rows: 4,
            step_rows: 2,
        };
        let folds = rolling_folds(&all, &windows).unwrap();
        for fold in &folds {
            let (train, validation) = (&all[fold.train.clone()], &all[fold.validation.clone()]);
            let max_train = train.iter().map(|r| r.date).max().unwrap();
            let min_validation = validation.iter().map(|r| r.date).min().unwrap();
            assert!(max_train < min_validation);
            assert_eq!(train.len(), 5);
        }
        assert_eq!(folds[0].validation_len(), 3);
    }

    #[test]
    fn test_every_fold_sharing_a_date_is_rejected() {
        let mut all = rows(&["a", "b"], 5);
        sort_long_form(&mut all);
        // Each fold trains on county a and validates on county b of the same day.
        let windows = FoldWindows {
            train_rows: 1,
            validation_rows: 1,
            step_rows: 2,
        };
        assert_eq!(
            rolling_folds(&all, &windows).unwrap_err(),
            FoldConfigError::NoValidFold
        );
    }

    #[test]
    fn test_splitter_is_deterministic() {
        let config = SplitConfig {
            test_window_days: 7,
            train_window_days: 14,
            validation_window_days: 7,
            step_days: 7,
        };
        let data = rows(&["x", "y"], 60);
        let first = TemporalSplitter::new(config.clone()).split(&data).unwrap();
        let second = TemporalSplitter::new(config).split(&data).unwrap();

        assert_eq!(first.folds, second.folds);
        assert_eq!(first.n_counties, 2);
        assert_eq!(first.test.len(), 14);
        assert!(first.training_end().unwrap() < first.test_start);
        assert!(first.summary().contains("Fold   1"));
    }

    #[test]
    fn test_test_window_consuming_everything_fails() {
        let splitter = TemporalSplitter::new(SplitConfig {
            test_window_days: 30,
            ..Default::default()
        });
        let err = splitter.split(&rows(&["a"], 20)).unwrap_err();
        assert_eq!(err, FoldConfigError::EmptyTrainingRegion { test_days: 30 });
    }
}
