//! Panel loader for CSV and parquet files.
//!
//! Reads the cleaned county panel produced by the data-preparation step and
//! converts it into a [`Panel`]. The input is expected to carry one row per
//! (county, date) with the following schema:
//! - county (string), date (`YYYY-MM-DD` string or date)
//! - cases (integer >= 0), pop_density (float > 0, nullable)
//! - retail_recreation, grocery_pharmacy, workplaces, residential (float, nullable)

use std::collections::HashSet;
use std::path::Path;

use chrono::NaiveDate;
use polars::prelude::*;
use thiserror::Error;
use tracing::{debug, info};

use super::types::{MobilityIndicator, Panel, PanelRecord, SchemaError};

/// Expected columns in the panel file.
pub const EXPECTED_COLUMNS: &[&str] = &[
    "county",
    "date",
    "cases",
    "pop_density",
    "retail_recreation",
    "grocery_pharmacy",
    "workplaces",
    "residential",
];

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Unsupported file extension: {0}")]
    UnsupportedFormat(String),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Loader for the cleaned county panel.
pub struct PanelLoader;

impl PanelLoader {
    /// Load a panel from a `.csv` or `.parquet` file.
    pub fn load(path: impl AsRef<Path>) -> Result<Panel, LoaderError> {
        let df = Self::load_dataframe(path)?;
        Self::from_dataframe(&df)
    }

    /// Read the raw file into a DataFrame without schema conversion.
    pub fn load_dataframe(path: impl AsRef<Path>) -> Result<DataFrame, LoaderError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(LoaderError::FileNotFound(path.display().to_string()));
        }

        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let df = match extension.as_str() {
            "csv" => CsvReadOptions::default()
                .with_has_header(true)
                .try_into_reader_with_file_path(Some(path.to_path_buf()))?
                .finish()?,
            "parquet" => LazyFrame::scan_parquet(path, ScanArgsParquet::default())?.collect()?,
            other => return Err(LoaderError::UnsupportedFormat(other.to_string())),
        };

        info!(
            "Loaded {} rows x {} columns from {}",
            df.height(),
            df.width(),
            path.display()
        );
        Ok(df)
    }

    /// Validate the schema of an in-memory DataFrame and convert it to a panel.
    pub fn from_dataframe(df: &DataFrame) -> Result<Panel, LoaderError> {
        check_schema(df)?;

        let counties = string_values(df, "county")?;
        let dates = date_values(df, "date")?;
        let cases = case_values(df, "cases")?;
        let densities = float_values(df, "pop_density")?;

        let mut mobility: Vec<Vec<Option<f64>>> = Vec::with_capacity(4);
        for indicator in MobilityIndicator::ALL {
            mobility.push(float_values(df, indicator.column())?);
        }

        let mut records = Vec::with_capacity(df.height());
        for idx in 0..df.height() {
            if let Some(density) = densities[idx] {
                if !(density.is_finite() && density > 0.0) {
                    return Err(SchemaError::InvalidValue {
                        column: "pop_density".to_string(),
                        row: idx,
                        reason: format!("density must be positive, got {}", density),
                    }
                    .into());
                }
            }

            records.push(PanelRecord {
                county: counties[idx].clone(),
                date: dates[idx],
                cases: cases[idx],
                pop_density: densities[idx],
                mobility: [
                    mobility[0][idx],
                    mobility[1][idx],
                    mobility[2][idx],
                    mobility[3][idx],
                ],
            });
        }

        let panel = Panel::new(records)?;
        debug!(
            "Panel has {} records across {} counties",
            panel.len(),
            panel.counties().len()
        );
        Ok(panel)
    }
}

/// Check that all expected columns are present with compatible types.
pub fn check_schema(df: &DataFrame) -> Result<(), SchemaError> {
    let columns: HashSet<String> = df
        .get_column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect();

    let missing: Vec<String> = EXPECTED_COLUMNS
        .iter()
        .filter(|c| !columns.contains(**c))
        .map(|c| c.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(SchemaError::MissingColumns(missing));
    }

    for name in EXPECTED_COLUMNS {
        let dtype = df
            .column(name)
            .map_err(|_| SchemaError::MissingColumns(vec![name.to_string()]))?
            .dtype()
            .clone();

        let (ok, expected) = match *name {
            "county" => (dtype == DataType::String, "string"),
            "date" => (
                dtype == DataType::String || dtype == DataType::Date,
                "date or string",
            ),
            "cases" => (dtype.is_integer(), "integer"),
            _ => (dtype.is_float() || dtype.is_integer(), "float"),
        };

        if !ok {
            return Err(SchemaError::WrongType {
                column: name.to_string(),
                expected: expected.to_string(),
                found: dtype.to_string(),
            });
        }
    }

    for name in ["county", "date", "cases"] {
        let nulls = df
            .column(name)
            .map(|c| c.null_count())
            .unwrap_or_default();
        if nulls > 0 {
            return Err(SchemaError::NullValues {
                column: name.to_string(),
                count: nulls,
            });
        }
    }

    Ok(())
}

fn string_values(df: &DataFrame, name: &str) -> Result<Vec<String>, LoaderError> {
    let column = df.column(name)?;
    column
        .str()?
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            value
                .map(|s| s.trim().to_string())
                .ok_or_else(|| invalid(name, row, "null value".to_string()))
        })
        .collect()
}

fn date_values(df: &DataFrame, name: &str) -> Result<Vec<NaiveDate>, LoaderError> {
    let column = df.column(name)?;

    if column.dtype() == &DataType::Date {
        let days = column.cast(&DataType::Int32)?;
        return days
            .i32()?
            .into_iter()
            .enumerate()
            .map(|(row, value)| {
                value.and_then(date_from_days).ok_or_else(|| {
                    invalid(name, row, "null or out-of-range date".to_string())
                })
            })
            .collect();
    }

    column
        .str()?
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            let raw = value.unwrap_or_default();
            NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                .map_err(|e| invalid(name, row, format!("cannot parse '{}': {}", raw, e)))
        })
        .collect()
}

fn case_values(df: &DataFrame, name: &str) -> Result<Vec<u32>, LoaderError> {
    let column = df.column(name)?.cast(&DataType::Int64)?;
    column
        .i64()?
        .into_iter()
        .enumerate()
        .map(|(row, value)| match value {
            Some(v) if v >= 0 && v <= u32::MAX as i64 => Ok(v as u32),
            Some(v) => Err(invalid(name, row, format!("case count {} out of range", v))),
            None => Err(invalid(name, row, "null case count".to_string())),
        })
        .collect()
}

fn float_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>, LoaderError> {
    let column = df.column(name)?.cast(&DataType::Float64)?;
    Ok(column
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect())
}

fn invalid(column: &str, row: usize, reason: String) -> LoaderError {
    SchemaError::InvalidValue {
        column: column.to_string(),
        row,
        reason,
    }
    .into()
}

/// Convert days since Unix epoch to NaiveDate.
fn date_from_days(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days + 719_163)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> DataFrame {
        df!(
            "county" => &["b", "a", "a"],
            "date" => &["2020-03-02", "2020-03-01", "2020-03-02"],
            "cases" => &[5i64, 3, 4],
            "pop_density" => &[Some(120.5), Some(80.0), None],
            "retail_recreation" => &[Some(-10.0), None, Some(-12.0)],
            "grocery_pharmacy" => &[1.0, 2.0, 3.0],
            "workplaces" => &[-30.0, -31.0, -32.0],
            "residential" => &[8.0, 9.0, 10.0]
        )
        .unwrap()
    }

    #[test]
    fn test_date_from_days() {
        let date = date_from_days(18262).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
    }

    #[test]
    fn test_expected_columns() {
        assert_eq!(EXPECTED_COLUMNS.len(), 8);
        assert!(EXPECTED_COLUMNS.contains(&"county"));
        assert!(EXPECTED_COLUMNS.contains(&"residential"));
    }

    #[test]
    fn test_from_dataframe_converts_and_sorts() {
        let panel = PanelLoader::from_dataframe(&sample_frame()).unwrap();
        assert_eq!(panel.len(), 3);

        let first = &panel.records()[0];
        assert_eq!(first.county, "a");
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2020, 3, 1).unwrap());
        assert_eq!(first.cases, 3);
        assert_eq!(first.pop_density, Some(80.0));
        assert_eq!(first.mobility(MobilityIndicator::RetailRecreation), None);

        assert_eq!(panel.records()[1].pop_density, None);
    }

    #[test]
    fn test_missing_column_is_schema_error() {
        let df = sample_frame().drop("workplaces").unwrap();
        let err = PanelLoader::from_dataframe(&df).unwrap_err();
        match err {
            LoaderError::Schema(SchemaError::MissingColumns(cols)) => {
                assert_eq!(cols, vec!["workplaces".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_wrong_type_is_schema_error() {
        let mut df = sample_frame();
        df.with_column(Column::new("cases".into(), &["x", "y", "z"]))
            .unwrap();
        let err = PanelLoader::from_dataframe(&df).unwrap_err();
        assert!(matches!(
            err,
            LoaderError::Schema(SchemaError::WrongType { .. })
        ));
    }

    #[test]
    fn test_negative_cases_rejected() {
        let mut df = sample_frame();
        df.with_column(Column::new("cases".into(), &[1i64, -2, 3]))
            .unwrap();
        let err = PanelLoader::from_dataframe(&df).unwrap_err();
        assert!(matches!(
            err,
            LoaderError::Schema(SchemaError::InvalidValue { row: 1, .. })
        ));
    }

    #[test]
    fn test_csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("panel.csv");
        let mut df = sample_frame();
        let mut file = std::fs::File::create(&path).unwrap();
        CsvWriter::new(&mut file).finish(&mut df).unwrap();

        let panel = PanelLoader::load(&path).unwrap();
        assert_eq!(panel.len(), 3);
        assert_eq!(panel.counties(), vec!["a", "b"]);
    }

    #[test]
    fn test_missing_file() {
        let err = PanelLoader::load("does/not/exist.csv").unwrap_err();
        assert!(matches!(err, LoaderError::FileNotFound(_)));
    }
}
