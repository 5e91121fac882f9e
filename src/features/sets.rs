//! Named feature sets and design-matrix extraction.

use std::fmt;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::data::MobilityIndicator;

use super::builder::FeatureRow;

const BASELINE_COLUMNS: [&str; 4] = ["pop_density", "cases_lag1", "cases_lag7", "cases_lag14"];

/// Predictor combinations compared by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeatureSet {
    /// Population density and lagged case counts.
    Baseline,
    /// Baseline plus same-day mobility.
    Full,
    /// Baseline plus lag-7 mobility.
    FullLagged,
}

impl FeatureSet {
    pub const ALL: [FeatureSet; 3] = [FeatureSet::Baseline, FeatureSet::Full, FeatureSet::FullLagged];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Baseline => "baseline",
            Self::Full => "full",
            Self::FullLagged => "full-lagged",
        }
    }

    /// Stable identifier used to derive random streams.
    pub fn id(&self) -> u64 {
        match self {
            Self::Baseline => 0,
            Self::Full => 1,
            Self::FullLagged => 2,
        }
    }

    /// Column names in design-matrix order.
    pub fn columns(&self) -> Vec<&'static str> {
        let mut columns = BASELINE_COLUMNS.to_vec();
        match self {
            Self::Baseline => {}
            Self::Full => columns.extend(MobilityIndicator::ALL.iter().map(|m| m.column())),
            Self::FullLagged => {
                columns.extend(MobilityIndicator::ALL.iter().map(|m| m.lagged_column()))
            }
        }
        columns
    }

    pub fn n_features(&self) -> usize {
        match self {
            Self::Baseline => BASELINE_COLUMNS.len(),
            Self::Full | Self::FullLagged => BASELINE_COLUMNS.len() + MobilityIndicator::ALL.len(),
        }
    }

    /// Append this set's predictor values for one row.
    pub fn extend_values(&self, row: &FeatureRow, out: &mut Vec<f64>) {
        out.push(row.pop_density);
        out.extend_from_slice(&row.case_lags);
        match self {
            Self::Baseline => {}
            Self::Full => out.extend_from_slice(&row.mobility),
            Self::FullLagged => out.extend_from_slice(&row.mobility_lagged),
        }
    }

    /// Build the row-major design matrix for a slice of rows.
    pub fn design_matrix(&self, rows: &[FeatureRow]) -> Array2<f64> {
        let n_features = self.n_features();
        let mut values = Vec::with_capacity(rows.len() * n_features);
        for row in rows {
            self.extend_values(row, &mut values);
        }
        Array2::from_shape_vec((rows.len(), n_features), values)
            .unwrap_or_else(|_| Array2::zeros((0, n_features)))
    }
}

impl fmt::Display for FeatureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Target vector (same-day case counts).
pub fn targets(rows: &[FeatureRow]) -> Array1<f64> {
    rows.iter().map(|r| r.cases).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row() -> FeatureRow {
        FeatureRow {
            county: "a".to_string(),
            date: NaiveDate::from_ymd_opt(2020, 4, 1).unwrap(),
            cases: 12.0,
            pop_density: 300.0,
            case_lags: [11.0, 7.0, 3.0],
            mobility: [-10.0, -5.0, -30.0, 12.0],
            mobility_lagged: [-8.0, -4.0, -25.0, 10.0],
        }
    }

    #[test]
    fn test_columns_match_feature_counts() {
        for set in FeatureSet::ALL {
            assert_eq!(set.columns().len(), set.n_features());
        }
        assert_eq!(FeatureSet::Baseline.n_features(), 4);
        assert_eq!(FeatureSet::FullLagged.n_features(), 8);
    }

    #[test]
    fn test_full_uses_same_day_mobility() {
        let x = FeatureSet::Full.design_matrix(&[row()]);
        assert_eq!(x.shape(), &[1, 8]);
        assert_eq!(x[[0, 4]], -10.0);
        assert_eq!(x[[0, 7]], 12.0);
    }

    #[test]
    fn test_full_lagged_uses_lagged_mobility() {
        let x = FeatureSet::FullLagged.design_matrix(&[row(), row()]);
        assert_eq!(x.shape(), &[2, 8]);
        assert_eq!(x[[1, 4]], -8.0);
        assert_eq!(x[[1, 0]], 300.0);
        assert_eq!(x[[1, 3]], 3.0);
    }

    #[test]
    fn test_targets() {
        assert_eq!(targets(&[row()]).to_vec(), vec![12.0]);
    }

    #[test]
    fn test_labels_serialize_kebab_case() {
        let json = serde_json::to_string(&FeatureSet::FullLagged).unwrap();
        assert_eq!(json, "\"full-lagged\"");
        assert_eq!(FeatureSet::FullLagged.to_string(), "full-lagged");
    }
}
