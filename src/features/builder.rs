//! Lag feature construction.
//!
//! Lags are computed per county over the date-ordered sequence and are
//! strictly causal: the lag-k value of row t is the raw value observed
//! exactly k days earlier in the same county. Rows whose lags cannot be
//! filled are dropped and counted, never imputed.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::data::{Panel, PanelRecord};

/// Case-count lags attached to every feature row.
pub const CASE_LAGS: [usize; 3] = [1, 7, 14];

/// Lag applied to the mobility indicators.
pub const MOBILITY_LAG: usize = 7;

/// Number of prior same-county days a row needs to be usable.
pub const MAX_LAG: usize = 14;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeatureError {
    #[error("Population density missing for county {county} in {year}")]
    MissingDensity { county: String, year: i32 },
}

/// What to do with rows whose population density is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingDensityPolicy {
    /// Drop the row and record the (county, year).
    #[default]
    Drop,
    /// Abort feature construction.
    Fail,
}

/// Feature builder configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    #[serde(default)]
    pub missing_density: MissingDensityPolicy,
}

/// Why a panel record did not become a feature row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Fewer than [`MAX_LAG`] prior same-county rows.
    InsufficientHistory,
    /// A lag source row is not exactly k days earlier.
    DateGap,
    /// Population density missing for the county-year.
    MissingDensity,
    /// Same-day or lagged mobility value missing.
    MissingMobility,
}

/// A panel record enriched with its lag features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub county: String,
    pub date: NaiveDate,

    /// Same-day case count (prediction target).
    pub cases: f64,

    pub pop_density: f64,

    /// Case counts at lags 1, 7 and 14.
    pub case_lags: [f64; 3],

    /// Same-day mobility indicators.
    pub mobility: [f64; 4],

    /// Mobility indicators at lag 7.
    pub mobility_lagged: [f64; 4],
}

/// Accounting of rows dropped during feature construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureBuildReport {
    pub input_rows: usize,
    pub output_rows: usize,
    pub dropped: BTreeMap<DropReason, usize>,
    pub dropped_by_county: BTreeMap<String, usize>,
    /// (county, year) pairs lacking population density.
    pub missing_density: BTreeSet<(String, i32)>,
}

impl FeatureBuildReport {
    pub fn total_dropped(&self) -> usize {
        self.dropped.values().sum()
    }

    pub fn dropped_for(&self, reason: DropReason) -> usize {
        self.dropped.get(&reason).copied().unwrap_or(0)
    }

    pub fn dropped_in(&self, county: &str) -> usize {
        self.dropped_by_county.get(county).copied().unwrap_or(0)
    }

    fn record_drop(&mut self, county: &str, reason: DropReason) {
        *self.dropped.entry(reason).or_insert(0) += 1;
        *self.dropped_by_county.entry(county.to_string()).or_insert(0) += 1;
    }

    pub fn summary(&self) -> String {
        let reasons: Vec<String> = self
            .dropped
            .iter()
            .map(|(reason, count)| format!("{:?}={}", reason, count))
            .collect();
        format!(
            "{} input rows -> {} feature rows ({} dropped: {})",
            self.input_rows,
            self.output_rows,
            self.total_dropped(),
            reasons.join(", ")
        )
    }
}

/// Output of a feature build.
#[derive(Debug, Clone)]
pub struct FeatureOutput {
    pub rows: Vec<FeatureRow>,
    pub report: FeatureBuildReport,
}

/// Derives lag features from a validated panel.
pub struct FeatureBuilder {
    config: FeatureConfig,
}

impl FeatureBuilder {
    pub fn new(config: FeatureConfig) -> Self {
        Self { config }
    }

    /// Build feature rows, sorted by (county, date).
    pub fn build(&self, panel: &Panel) -> Result<FeatureOutput, FeatureError> {
        let mut report = FeatureBuildReport {
            input_rows: panel.len(),
            ..Default::default()
        };
        let mut rows = Vec::with_capacity(panel.len());

        for county in panel.by_county() {
            for t in 0..county.len() {
                match self.row_at(county, t)? {
                    Ok(row) => rows.push(row),
                    Err(reason) => {
                        let record = &county[t];
                        if reason == DropReason::MissingDensity {
                            report
                                .missing_density
                                .insert((record.county.clone(), record.date.year()));
                        }
                        report.record_drop(&record.county, reason);
                    }
                }
            }
        }

        report.output_rows = rows.len();

        for (county, year) in &report.missing_density {
            warn!("Population density missing for {} in {}, rows dropped", county, year);
        }
        let short: Vec<&String> = report
            .dropped_by_county
            .iter()
            .filter(|(county, dropped)| **dropped == panel.county_records(county).len())
            .map(|(county, _)| county)
            .collect();
        if !short.is_empty() {
            warn!("Counties with no usable rows: {:?}", short);
        }
        info!("Feature build: {}", report.summary());

        Ok(FeatureOutput { rows, report })
    }

    /// Build the feature row at position `t`, or the reason it is unusable.
    fn row_at(
        &self,
        county: &[PanelRecord],
        t: usize,
    ) -> Result<Result<FeatureRow, DropReason>, FeatureError> {
        let record = &county[t];

        let pop_density = match record.pop_density {
            Some(density) => density,
            None => {
                if self.config.missing_density == MissingDensityPolicy::Fail {
                    return Err(FeatureError::MissingDensity {
                        county: record.county.clone(),
                        year: record.date.year(),
                    });
                }
                return Ok(Err(DropReason::MissingDensity));
            }
        };

        if t < MAX_LAG {
            return Ok(Err(DropReason::InsufficientHistory));
        }

        let lagged = |k: usize| {
            let source = &county[t - k];
            (record.date - source.date == Duration::days(k as i64)).then_some(source)
        };

        let mut case_lags = [0.0; 3];
        for (slot, &k) in case_lags.iter_mut().zip(CASE_LAGS.iter()) {
            match lagged(k) {
                Some(source) => *slot = f64::from(source.cases),
                None => return Ok(Err(DropReason::DateGap)),
            }
        }
        let Some(mobility_source) = lagged(MOBILITY_LAG) else {
            return Ok(Err(DropReason::DateGap));
        };

        let (Some(mobility), Some(mobility_lagged)) = (
            complete(&record.mobility),
            complete(&mobility_source.mobility),
        ) else {
            debug!("Missing mobility for {} on {}", record.county, record.date);
            return Ok(Err(DropReason::MissingMobility));
        };

        Ok(Ok(FeatureRow {
            county: record.county.clone(),
            date: record.date,
            cases: f64::from(record.cases),
            pop_density,
            case_lags,
            mobility,
            mobility_lagged,
        }))
    }
}

fn complete(values: &[Option<f64>; 4]) -> Option<[f64; 4]> {
    Some([values[0]?, values[1]?, values[2]?, values[3]?])
}
