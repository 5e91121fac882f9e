//! Data integrity validation for county panel files.
//!
//! Validates:
//! - Schema consistency (8 columns, expected types)
//! - Record conversion (no nulls in keys, cases >= 0, density > 0, unique (county, date))
//! - Date continuity per county (gaps are reported, not repaired)
//! - History length (enough days for the 14-day lag)
//! - Density and mobility coverage

use std::path::Path;

use chrono::NaiveDate;
use polars::prelude::*;
use thiserror::Error;
use tracing::info;

use crate::data::{check_schema, LoaderError, MobilityIndicator, Panel, PanelLoader, EXPECTED_COLUMNS};
use crate::features::MAX_LAG;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Loader error: {0}")]
    Loader(#[from] LoaderError),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
}

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Result of a single validation check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub message: String,
    pub details: Option<String>,
}

impl CheckResult {
    pub fn pass(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            message: message.to_string(),
            details: None,
        }
    }

    pub fn fail(name: &str, message: &str, details: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            message: message.to_string(),
            details,
        }
    }
}

/// Complete data integrity report for one panel file.
#[derive(Debug)]
pub struct DataIntegrityReport {
    pub source: String,
    pub row_count: usize,
    pub counties: usize,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    pub checks: Vec<CheckResult>,
}

impl DataIntegrityReport {
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failed_checks(&self) -> Vec<&CheckResult> {
        self.checks.iter().filter(|c| !c.passed).collect()
    }

    pub fn summary(&self) -> String {
        let passed = self.checks.iter().filter(|c| c.passed).count();
        let range = match self.date_range {
            Some((first, last)) => format!("{} to {}", first, last),
            None => "no dates".to_string(),
        };
        let mut out = format!(
            "{} ({} rows, {} counties, {}): {}/{} checks passed\n",
            self.source,
            self.row_count,
            self.counties,
            range,
            passed,
            self.checks.len()
        );
        for check in &self.checks {
            out.push_str(&format!(
                "  [{}] {}: {}\n",
                if check.passed { "PASS" } else { "FAIL" },
                check.name,
                check.message
            ));
            if let Some(details) = &check.details {
                out.push_str(&format!("         {}\n", details));
            }
        }
        out
    }
}

/// Validator for panel integrity.
pub struct DataIntegrityValidator {
    /// Largest tolerated share of missing values per mobility indicator.
    max_missing_mobility: f64,
}

impl Default for DataIntegrityValidator {
    fn default() -> Self {
        Self {
            max_missing_mobility: 0.2,
        }
    }
}

impl DataIntegrityValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tolerated share of missing mobility values.
    pub fn with_max_missing_mobility(mut self, share: f64) -> Self {
        self.max_missing_mobility = share;
        self
    }

    /// Run all validation checks on a panel file.
    pub fn validate_path(&self, path: impl AsRef<Path>) -> ValidationResult<DataIntegrityReport> {
        let path = path.as_ref();
        let df = PanelLoader::load_dataframe(path)?;
        let mut report = self.validate_dataframe(&df)?;
        report.source = path.display().to_string();
        Ok(report)
    }

    /// Run all validation checks on an in-memory frame.
    pub fn validate_dataframe(&self, df: &DataFrame) -> ValidationResult<DataIntegrityReport> {
        let mut report = DataIntegrityReport {
            source: "<dataframe>".to_string(),
            row_count: df.height(),
            counties: 0,
            date_range: None,
            checks: Vec::new(),
        };

        // 1. Schema consistency
        let schema = self.check_schema(df);
        let schema_ok = schema.passed;
        report.checks.push(schema);
        if !schema_ok {
            return Ok(report);
        }

        // 2. Value ranges on the raw columns
        report.checks.push(self.check_value_ranges(df)?);

        // 3. Conversion into a panel, then panel-level checks
        match PanelLoader::from_dataframe(df) {
            Ok(panel) => {
                report.checks.push(CheckResult::pass(
                    "record_conversion",
                    &format!("{} unique (county, date) records", panel.len()),
                ));
                report.counties = panel.counties().len();
                report.date_range = panel.date_range();
                report.checks.extend(self.validate_panel(&panel));
            }
            Err(e) => report.checks.push(CheckResult::fail(
                "record_conversion",
                "Rows cannot be converted into panel records",
                Some(e.to_string()),
            )),
        }

        info!(
            "Integrity checks: {}/{} passed",
            report.checks.iter().filter(|c| c.passed).count(),
            report.checks.len()
        );
        Ok(report)
    }

    /// Checks that only need converted records.
    pub fn validate_panel(&self, panel: &Panel) -> Vec<CheckResult> {
        vec![
            self.check_date_continuity(panel),
            self.check_history_length(panel),
            self.check_density_coverage(panel),
            self.check_mobility_coverage(panel),
        ]
    }

    fn check_schema(&self, df: &DataFrame) -> CheckResult {
        match check_schema(df) {
            Ok(()) => CheckResult::pass(
                "schema_consistency",
                &format!("All {} expected columns present", EXPECTED_COLUMNS.len()),
            ),
            Err(e) => CheckResult::fail("schema_consistency", "Schema mismatch", Some(e.to_string())),
        }
    }

    /// Check cases >= 0 and pop_density > 0 where present.
    fn check_value_ranges(&self, df: &DataFrame) -> ValidationResult<CheckResult> {
        let cases = df.column("cases")?.cast(&DataType::Float64)?;
        let density = df.column("pop_density")?.cast(&DataType::Float64)?;

        let mut issues = Vec::new();

        let negative_cases = cases
            .f64()?
            .into_iter()
            .filter(|v| v.map_or(false, |c| c < 0.0))
            .count();
        if negative_cases > 0 {
            issues.push(format!("{} rows with negative cases", negative_cases));
        }

        let bad_density = density
            .f64()?
            .into_iter()
            .filter(|v| v.map_or(false, |d| !(d > 0.0) || !d.is_finite()))
            .count();
        if bad_density > 0 {
            issues.push(format!("{} rows with non-positive density", bad_density));
        }

        if issues.is_empty() {
            Ok(CheckResult::pass("value_ranges", "Cases and densities within valid ranges"))
        } else {
            Ok(CheckResult::fail(
                "value_ranges",
                &format!("{} issues found", issues.len()),
                Some(issues.join("; ")),
            ))
        }
    }

    /// Check that each county's dates are consecutive days.
    fn check_date_continuity(&self, panel: &Panel) -> CheckResult {
        let mut gaps = Vec::new();
        for records in panel.by_county() {
            for pair in records.windows(2) {
                let gap_days = (pair[1].date - pair[0].date).num_days();
                if gap_days > 1 {
                    gaps.push(format!(
                        "{}: {} to {} ({} days)",
                        pair[0].county, pair[0].date, pair[1].date, gap_days
                    ));
                }
            }
        }

        if gaps.is_empty() {
            CheckResult::pass("date_continuity", "No gaps in any county's daily series")
        } else {
            CheckResult::fail(
                "date_continuity",
                &format!("{} gaps found", gaps.len()),
                Some(gaps.join(", ")),
            )
        }
    }

    /// Check that every county has more days than the longest lag.
    fn check_history_length(&self, panel: &Panel) -> CheckResult {
        let short: Vec<String> = panel
            .by_county()
            .filter(|records| records.len() <= MAX_LAG)
            .map(|records| format!("{} ({} days)", records[0].county, records.len()))
            .collect();

        if short.is_empty() {
            CheckResult::pass(
                "history_length",
                &format!("Every county has more than {} days", MAX_LAG),
            )
        } else {
            CheckResult::fail(
                "history_length",
                &format!("{} counties too short for lag-{} features", short.len(), MAX_LAG),
                Some(short.join(", ")),
            )
        }
    }

    fn check_density_coverage(&self, panel: &Panel) -> CheckResult {
        let missing = panel
            .records()
            .iter()
            .filter(|r| r.pop_density.is_none())
            .count();

        if missing == 0 {
            CheckResult::pass("density_coverage", "Population density present for every record")
        } else {
            CheckResult::fail(
                "density_coverage",
                &format!("{} records without population density", missing),
                None,
            )
        }
    }

    fn check_mobility_coverage(&self, panel: &Panel) -> CheckResult {
        let total = panel.len().max(1) as f64;
        let mut issues = Vec::new();

        for indicator in MobilityIndicator::ALL {
            let missing = panel
                .records()
                .iter()
                .filter(|r| r.mobility(indicator).is_none())
                .count();
            let share = missing as f64 / total;
            if share > self.max_missing_mobility {
                issues.push(format!(
                    "{}: {} ({:.1}%) missing",
                    indicator.column(),
                    missing,
                    share * 100.0
                ));
            }
        }

        if issues.is_empty() {
            CheckResult::pass(
                "mobility_coverage",
                &format!(
                    "Missing mobility within {:.0}% per indicator",
                    self.max_missing_mobility * 100.0
                ),
            )
        } else {
            CheckResult::fail(
                "mobility_coverage",
                "Mobility indicators with heavy missingness",
                Some(issues.join("; ")),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(counties: &[&str], days: usize) -> DataFrame {
        let mut county = Vec::new();
        let mut date = Vec::new();
        let mut cases = Vec::new();
        for c in counties {
            for d in 0..days {
                county.push(c.to_string());
                date.push(format!("2020-04-{:02}", d + 1));
                cases.push(d as i64);
            }
        }
        let n = county.len();
        df!(
            "county" => county,
            "date" => date,
            "cases" => cases,
            "pop_density" => vec![150.0; n],
            "retail_recreation" => vec![-10.0; n],
            "grocery_pharmacy" => vec![2.0; n],
            "workplaces" => vec![-30.0; n],
            "residential" => vec![8.0; n]
        )
        .unwrap()
    }

    #[test]
    fn test_clean_panel_passes() {
        let df = frame(&["A", "B"], 20);
        let report = DataIntegrityValidator::new().validate_dataframe(&df).unwrap();
        assert!(report.all_passed(), "{}", report.summary());
        assert_eq!(report.counties, 2);
        assert_eq!(report.row_count, 40);
    }

    #[test]
    fn test_schema_failure_stops_early() {
        let df = frame(&["A"], 20).drop("workplaces").unwrap();
        let report = DataIntegrityValidator::new().validate_dataframe(&df).unwrap();
        assert_eq!(report.checks.len(), 1);
        assert!(!report.all_passed());
    }

    #[test]
    fn test_short_history_and_gap_reported() {
        let df = frame(&["A"], 10);
        let mask = df
            .column("date")
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .map(|d| d != Some("2020-04-05"))
            .collect::<BooleanChunked>();
        let df = df.filter(&mask).unwrap();

        let report = DataIntegrityValidator::new().validate_dataframe(&df).unwrap();
        let failed: Vec<&str> = report.failed_checks().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(failed, vec!["date_continuity", "history_length"]);
    }

    #[test]
    fn test_mobility_coverage_threshold() {
        let mut df = frame(&["A"], 20);
        let residential: Vec<Option<f64>> =
            (0..20).map(|d| if d % 4 == 0 { None } else { Some(8.0) }).collect();
        df.with_column(Series::new("residential".into(), residential)).unwrap();

        let strict = DataIntegrityValidator::new().validate_dataframe(&df).unwrap();
        let failed: Vec<&str> = strict.failed_checks().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(failed, vec!["mobility_coverage"]);

        let lenient = DataIntegrityValidator::new()
            .with_max_missing_mobility(0.3)
            .validate_dataframe(&df)
            .unwrap();
        assert!(lenient.all_passed(), "{}", lenient.summary());
    }

    #[test]
    fn test_negative_cases_flagged() {
        let mut df = frame(&["A"], 20);
        let cases: Vec<i64> = (0..20).map(|d| if d == 3 { -1 } else { d }).collect();
        df.with_column(Series::new("cases".into(), cases)).unwrap();

        let report = DataIntegrityValidator::new().validate_dataframe(&df).unwrap();
        let failed: Vec<&str> = report.failed_checks().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(failed, vec!["value_ranges", "record_conversion"]);
    }
}
