//! Core data types for the county panel.
//!
//! A panel is the cleaned long-form table handed over by the data-preparation
//! step: one row per (county, date) carrying the daily case count, the
//! population density for that county-year and the mobility indicators.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Mobility percent-change categories carried by every panel record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MobilityIndicator {
    RetailRecreation,
    GroceryPharmacy,
    Workplaces,
    Residential,
}

impl MobilityIndicator {
    /// All indicators in column order.
    pub const ALL: [MobilityIndicator; 4] = [
        MobilityIndicator::RetailRecreation,
        MobilityIndicator::GroceryPharmacy,
        MobilityIndicator::Workplaces,
        MobilityIndicator::Residential,
    ];

    /// Position of the indicator inside per-record mobility arrays.
    pub fn index(&self) -> usize {
        match self {
            Self::RetailRecreation => 0,
            Self::GroceryPharmacy => 1,
            Self::Workplaces => 2,
            Self::Residential => 3,
        }
    }

    /// Input column name.
    pub fn column(&self) -> &'static str {
        match self {
            Self::RetailRecreation => "retail_recreation",
            Self::GroceryPharmacy => "grocery_pharmacy",
            Self::Workplaces => "workplaces",
            Self::Residential => "residential",
        }
    }

    /// Name of the derived lag-7 feature.
    pub fn lagged_column(&self) -> &'static str {
        match self {
            Self::RetailRecreation => "retail_recreation_lag7",
            Self::GroceryPharmacy => "grocery_pharmacy_lag7",
            Self::Workplaces => "workplaces_lag7",
            Self::Residential => "residential_lag7",
        }
    }
}

/// Errors raised when the input does not conform to the panel schema.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("Missing required columns: {0:?}")]
    MissingColumns(Vec<String>),

    #[error("Column {column} has type {found}, expected {expected}")]
    WrongType {
        column: String,
        expected: String,
        found: String,
    },

    #[error("Column {column} contains {count} null values")]
    NullValues { column: String, count: usize },

    #[error("Invalid value in column {column} at row {row}: {reason}")]
    InvalidValue {
        column: String,
        row: usize,
        reason: String,
    },

    #[error("Duplicate record for county {county} on {date}")]
    DuplicateRecord { county: String, date: NaiveDate },
}

/// A single (county, date) observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelRecord {
    /// County identifier.
    pub county: String,

    /// Observation date.
    pub date: NaiveDate,

    /// Raw daily case count.
    pub cases: u32,

    /// Population density for the county in this record's year.
    pub pop_density: Option<f64>,

    /// Mobility percent changes, indexed by [`MobilityIndicator::index`].
    pub mobility: [Option<f64>; 4],
}

impl PanelRecord {
    pub fn new(
        county: impl Into<String>,
        date: NaiveDate,
        cases: u32,
        pop_density: Option<f64>,
        mobility: [Option<f64>; 4],
    ) -> Self {
        Self {
            county: county.into(),
            date,
            cases,
            pop_density,
            mobility,
        }
    }

    /// Get the value of one mobility indicator.
    pub fn mobility(&self, indicator: MobilityIndicator) -> Option<f64> {
        self.mobility[indicator.index()]
    }
}

/// Validated panel, sorted by (county, date) with unique keys.
#[derive(Debug, Clone, Default)]
pub struct Panel {
    records: Vec<PanelRecord>,
}

impl Panel {
    /// Sort records by (county, date) and reject duplicate keys.
    pub fn new(mut records: Vec<PanelRecord>) -> Result<Self, SchemaError> {
        records.sort_by(|a, b| a.county.cmp(&b.county).then(a.date.cmp(&b.date)));

        for pair in records.windows(2) {
            if pair[0].county == pair[1].county && pair[0].date == pair[1].date {
                return Err(SchemaError::DuplicateRecord {
                    county: pair[1].county.clone(),
                    date: pair[1].date,
                });
            }
        }

        Ok(Self { records })
    }

    pub fn records(&self) -> &[PanelRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct county identifiers in sorted order.
    pub fn counties(&self) -> Vec<&str> {
        let set: BTreeSet<&str> = self.records.iter().map(|r| r.county.as_str()).collect();
        set.into_iter().collect()
    }

    /// Records belonging to one county, in date order.
    pub fn county_records(&self, county: &str) -> &[PanelRecord] {
        let start = self.records.partition_point(|r| r.county.as_str() < county);
        let end = self.records.partition_point(|r| r.county.as_str() <= county);
        &self.records[start..end]
    }

    /// Iterate over contiguous per-county slices.
    pub fn by_county(&self) -> impl Iterator<Item = &[PanelRecord]> {
        self.records
            .chunk_by(|a, b| a.county == b.county)
    }

    /// Earliest and latest date across all counties.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let min = self.records.iter().map(|r| r.date).min()?;
        let max = self.records.iter().map(|r| r.date).max()?;
        Some((min, max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(county: &str, day: u32) -> PanelRecord {
        PanelRecord::new(
            county,
            NaiveDate::from_ymd_opt(2020, 3, day).unwrap(),
            day,
            Some(100.0),
            [Some(-10.0), Some(0.0), Some(-20.0), Some(5.0)],
        )
    }

    #[test]
    fn test_panel_sorts_by_county_then_date() {
        let panel = Panel::new(vec![record("b", 2), record("a", 3), record("a", 1)]).unwrap();
        let keys: Vec<_> = panel
            .records()
            .iter()
            .map(|r| (r.county.as_str(), r.cases))
            .collect();
        assert_eq!(keys, vec![("a", 1), ("a", 3), ("b", 2)]);
        assert_eq!(panel.counties(), vec!["a", "b"]);
    }

    #[test]
    fn test_panel_rejects_duplicates() {
        let err = Panel::new(vec![record("a", 1), record("a", 1)]).unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateRecord { .. }));
    }

    #[test]
    fn test_county_records_and_grouping() {
        let panel = Panel::new(vec![
            record("a", 1),
            record("b", 1),
            record("a", 2),
            record("c", 5),
        ])
        .unwrap();

        assert_eq!(panel.county_records("a").len(), 2);
        assert_eq!(panel.county_records("c").len(), 1);
        assert!(panel.county_records("zz").is_empty());
        assert_eq!(panel.by_county().count(), 3);
    }

    #[test]
    fn test_date_range() {
        let panel = Panel::new(vec![record("a", 4), record("b", 2), record("a", 9)]).unwrap();
        let (start, end) = panel.date_range().unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2020, 3, 2).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2020, 3, 9).unwrap());
        assert!(Panel::default().date_range().is_none());
    }

    #[test]
    fn test_mobility_indicator_lookup() {
        let r = record("a", 1);
        assert_eq!(r.mobility(MobilityIndicator::Workplaces), Some(-20.0));
        assert_eq!(MobilityIndicator::Residential.column(), "residential");
        assert_eq!(
            MobilityIndicator::RetailRecreation.lagged_column(),
            "retail_recreation_lag7"
        );
    }
}
