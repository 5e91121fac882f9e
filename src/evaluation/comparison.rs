//! Held-out evaluation and the model comparison table.
//!
//! Every (family, feature set) job contributes exactly one row, whether it
//! completed or failed, so failures are visible rather than silently omitted.

use std::fs::{self, File};
use std::io;
use std::path::Path;

use chrono::NaiveDate;
use polars::prelude::*;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::info;

use crate::features::{targets, FeatureRow, FeatureSet};
use crate::metrics::{MetricsCalculator, MetricsError, RegressionMetrics, SelectionMetric};
use crate::models::{HyperParams, ModelFamily, TrainedModel};

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One predicted-vs-actual pair on the test window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRecord {
    pub county: String,
    pub date: NaiveDate,
    pub actual: f64,
    pub predicted: f64,
}

/// Test-window scores and predictions of one final model.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub metrics: RegressionMetrics,
    pub predictions: Vec<PredictionRecord>,
}

/// Scores finalized models on the held-out test rows.
pub struct Evaluator;

impl Evaluator {
    pub fn evaluate(model: &TrainedModel, test: &[FeatureRow]) -> Result<Evaluation, MetricsError> {
        let predicted = model.predict(test);
        let actual = targets(test).to_vec();
        let metrics = MetricsCalculator::calculate(&actual, &predicted)?;

        let predictions = test
            .iter()
            .zip(predicted)
            .map(|(row, predicted)| PredictionRecord {
                county: row.county.clone(),
                date: row.date,
                actual: row.cases,
                predicted,
            })
            .collect();

        Ok(Evaluation {
            metrics,
            predictions,
        })
    }
}

/// Outcome of one (family, feature set) job.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum JobStatus {
    Completed {
        params: HyperParams,
        cv_metrics: RegressionMetrics,
        test_metrics: RegressionMetrics,
    },
    Failed {
        reason: String,
    },
}

/// One row of the comparison table.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonRow {
    pub family: ModelFamily,
    pub feature_set: FeatureSet,
    #[serde(flatten)]
    pub status: JobStatus,
}

impl ComparisonRow {
    pub fn label(&self) -> String {
        format!("{} ({})", self.family, self.feature_set)
    }

    pub fn test_metrics(&self) -> Option<&RegressionMetrics> {
        match &self.status {
            JobStatus::Completed { test_metrics, .. } => Some(test_metrics),
            JobStatus::Failed { .. } => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, JobStatus::Failed { .. })
    }
}

/// Comparison of every configured job on the same test rows.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonTable {
    pub rows: Vec<ComparisonRow>,
}

impl ComparisonTable {
    /// Build the table in (family, feature set) order.
    pub fn new(mut rows: Vec<ComparisonRow>) -> Self {
        rows.sort_by_key(|r| (r.family, r.feature_set.id()));
        Self { rows }
    }

    pub fn completed(&self) -> impl Iterator<Item = &ComparisonRow> {
        self.rows.iter().filter(|r| !r.is_failed())
    }

    pub fn failed(&self) -> impl Iterator<Item = &ComparisonRow> {
        self.rows.iter().filter(|r| r.is_failed())
    }

    /// Best completed row for a metric; ties keep the earlier row.
    pub fn best_by(&self, metric: SelectionMetric) -> Option<&ComparisonRow> {
        let mut best: Option<(&ComparisonRow, &RegressionMetrics)> = None;
        for row in &self.rows {
            let Some(metrics) = row.test_metrics() else {
                continue;
            };
            match best {
                Some((_, incumbent)) if !metric.is_better(metrics, incumbent) => {}
                _ => best = Some((row, metrics)),
            }
        }
        best.map(|(row, _)| row)
    }

    pub fn best_per_metric(&self) -> Vec<(SelectionMetric, &ComparisonRow)> {
        SelectionMetric::ALL
            .iter()
            .filter_map(|&m| self.best_by(m).map(|row| (m, row)))
            .collect()
    }

    /// Tabular form: label, model, feature_set, status, rmse, rsq, mae, params, error.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let label: Vec<String> = self.rows.iter().map(|r| r.label()).collect();
        let model: Vec<&str> = self.rows.iter().map(|r| r.family.label()).collect();
        let feature_set: Vec<&str> = self.rows.iter().map(|r| r.feature_set.label()).collect();
        let status: Vec<&str> = self
            .rows
            .iter()
            .map(|r| if r.is_failed() { "failed" } else { "completed" })
            .collect();
        let metric = |f: fn(&RegressionMetrics) -> f64| -> Vec<Option<f64>> {
            self.rows.iter().map(|r| r.test_metrics().map(f)).collect()
        };
        let params: Vec<Option<String>> = self
            .rows
            .iter()
            .map(|r| match &r.status {
                JobStatus::Completed { params, .. } => Some(params.key()),
                JobStatus::Failed { .. } => None,
            })
            .collect();
        let error: Vec<Option<String>> = self
            .rows
            .iter()
            .map(|r| match &r.status {
                JobStatus::Failed { reason } => Some(reason.clone()),
                JobStatus::Completed { .. } => None,
            })
            .collect();

        df!(
            "label" => label,
            "model" => model,
            "feature_set" => feature_set,
            "status" => status,
            "rmse" => metric(|m| m.rmse),
            "rsq" => metric(|m| m.rsq),
            "mae" => metric(|m| m.mae),
            "params" => params,
            "error" => error
        )
    }

    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<(), OutputError> {
        let mut df = self.to_dataframe()?;
        let mut file = File::create(path.as_ref())?;
        CsvWriter::new(&mut file).finish(&mut df)?;
        info!("Wrote comparison table to {}", path.as_ref().display());
        Ok(())
    }

    /// Rows plus the best row label per metric.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), OutputError> {
        let best: serde_json::Map<String, serde_json::Value> = self
            .best_per_metric()
            .into_iter()
            .map(|(metric, row)| (metric.label().to_string(), json!(row.label())))
            .collect();
        let rows = serde_json::to_value(&self.rows)?;
        let doc = json!({ "rows": rows, "best": best });

        let file = File::create(path.as_ref())?;
        serde_json::to_writer_pretty(file, &doc)?;
        info!("Wrote comparison JSON to {}", path.as_ref().display());
        Ok(())
    }

    pub fn summary(&self) -> String {
        let mut out = String::from("=== MODEL COMPARISON (held-out test window) ===\n\n");
        out.push_str(&format!(
            "| {:<36} | {:>10} | {:>8} | {:>10} | {:<40} |\n",
            "Model", "RMSE", "R2", "MAE", "Params"
        ));
        out.push_str(&format!("|{}|\n", "-".repeat(118)));

        for row in &self.rows {
            match &row.status {
                JobStatus::Completed {
                    params,
                    test_metrics,
                    ..
                } => out.push_str(&format!(
                    "| {:<36} | {:>10.4} | {:>8.4} | {:>10.4} | {:<40} |\n",
                    row.label(),
                    test_metrics.rmse,
                    test_metrics.rsq,
                    test_metrics.mae,
                    params.key()
                )),
                JobStatus::Failed { reason } => out.push_str(&format!(
                    "| {:<36} | {:>10} | {:>8} | {:>10} | FAILED: {:<32} |\n",
                    row.label(),
                    "-",
                    "-",
                    "-",
                    reason
                )),
            }
        }

        out.push('\n');
        for (metric, row) in self.best_per_metric() {
            out.push_str(&format!("Best by {}: {}\n", metric, row.label()));
        }
        let failed = self.failed().count();
        if failed > 0 {
            out.push_str(&format!("{} of {} configurations failed\n", failed, self.rows.len()));
        }
        out
    }
}

/// Write one configuration's test predictions as CSV.
pub fn write_predictions(
    path: impl AsRef<Path>,
    predictions: &[PredictionRecord],
) -> Result<(), OutputError> {
    if let Some(parent) = path.as_ref().parent() {
        fs::create_dir_all(parent)?;
    }

    let mut df = df!(
        "county" => predictions.iter().map(|p| p.county.as_str()).collect::<Vec<_>>(),
        "date" => predictions.iter().map(|p| p.date.to_string()).collect::<Vec<_>>(),
        "actual" => predictions.iter().map(|p| p.actual).collect::<Vec<_>>(),
        "predicted" => predictions.iter().map(|p| p.predicted).collect::<Vec<_>>()
    )?;

    let mut file = File::create(path.as_ref())?;
    CsvWriter::new(&mut file).finish(&mut df)?;
    Ok(())
}
