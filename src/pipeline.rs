//! End-to-end forecasting pipeline.
//!
//! Feature Builder -> Temporal Splitter -> Grid Search -> Evaluator.
//! Feature and fold errors are fatal and raised before any model is fit.
//! Errors inside one (family, feature set) job become a failed row in the
//! comparison table and never abort sibling jobs.

use std::fs;
use std::path::Path;

use rayon::prelude::*;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{ConfigError, PipelineConfig};
use crate::data::{LoaderError, Panel, PanelLoader};
use crate::evaluation::{
    write_predictions, ComparisonRow, ComparisonTable, Evaluation, Evaluator, JobStatus,
    OutputError, PredictionRecord,
};
use crate::features::{FeatureBuildReport, FeatureBuilder, FeatureError, FeatureSet};
use crate::metrics::MetricsError;
use crate::models::ModelFamily;
use crate::seed::SeedSequence;
use crate::walkforward::{FoldConfigError, GridSearch, SearchError, SplitPlan, TemporalSplitter};

/// Stream id for grid sampling, shared by every feature set of a family.
const GRID_STREAM: u64 = u64::MAX;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Loader error: {0}")]
    Loader(#[from] LoaderError),

    #[error("Feature error: {0}")]
    Feature(#[from] FeatureError),

    #[error("Fold configuration error: {0}")]
    FoldConfig(#[from] FoldConfigError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Output error: {0}")]
    Output(#[from] OutputError),
}

/// Failure local to one job.
#[derive(Error, Debug)]
pub enum JobError {
    #[error(transparent)]
    Search(#[from] SearchError),

    #[error("Test evaluation failed: {0}")]
    Evaluate(#[from] MetricsError),
}

/// Test-window predictions of one job.
#[derive(Debug, Clone)]
pub struct JobPredictions {
    pub family: ModelFamily,
    pub feature_set: FeatureSet,
    pub records: Vec<PredictionRecord>,
}

impl JobPredictions {
    pub fn file_name(&self) -> String {
        format!("{}_{}.csv", self.family.label(), self.feature_set.label())
    }
}

/// Everything a run produces.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub feature_report: FeatureBuildReport,
    pub plan: SplitPlan,
    pub table: ComparisonTable,
    pub predictions: Vec<JobPredictions>,
}

/// Pipeline bound to one validated configuration.
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Load a panel file and run every job.
    pub fn run_path(&self, path: impl AsRef<Path>) -> Result<PipelineResult, PipelineError> {
        let panel = PanelLoader::load(path)?;
        self.run(&panel)
    }

    /// Build features and folds without fitting anything.
    pub fn prepare(&self, panel: &Panel) -> Result<(FeatureBuildReport, SplitPlan), PipelineError> {
        info!("Building features for {} panel records", panel.len());
        let features = FeatureBuilder::new(self.config.features.clone()).build(panel)?;
        let report = features.report;
        if report.total_dropped() > 0 {
            warn!(
                "{} of {} panel records dropped during feature construction",
                report.total_dropped(),
                report.input_rows
            );
        }

        let plan = TemporalSplitter::new(self.config.split.clone()).split(&features.rows)?;
        Ok((report, plan))
    }

    pub fn run(&self, panel: &Panel) -> Result<PipelineResult, PipelineError> {
        let (feature_report, plan) = self.prepare(panel)?;
        let seeds = SeedSequence::new(self.config.seed);
        let jobs = self.config.jobs();

        info!(
            "Running {} jobs over {} folds (selection metric: {})",
            jobs.len(),
            plan.folds.len(),
            self.config.selection_metric
        );

        let run_one = |&(family, feature_set): &(ModelFamily, FeatureSet)| {
            let outcome = self.run_job(&plan, &seeds, family, feature_set);
            (family, feature_set, outcome)
        };
        let outcomes: Vec<_> = if self.config.parallel {
            jobs.par_iter().map(run_one).collect()
        } else {
            jobs.iter().map(run_one).collect()
        };

        let mut rows = Vec::with_capacity(outcomes.len());
        let mut predictions = Vec::new();
        for (family, feature_set, outcome) in outcomes {
            match outcome {
                Ok((status, evaluation)) => {
                    rows.push(ComparisonRow {
                        family,
                        feature_set,
                        status,
                    });
                    predictions.push(JobPredictions {
                        family,
                        feature_set,
                        records: evaluation.predictions,
                    });
                }
                Err(e) => {
                    warn!("Job {} / {} failed: {}", family, feature_set, e);
                    rows.push(ComparisonRow {
                        family,
                        feature_set,
                        status: JobStatus::Failed {
                            reason: e.to_string(),
                        },
                    });
                }
            }
        }

        let table = ComparisonTable::new(rows);
        info!(
            "Completed {} of {} jobs",
            table.completed().count(),
            table.rows.len()
        );

        Ok(PipelineResult {
            feature_report,
            plan,
            table,
            predictions,
        })
    }

    fn run_job(
        &self,
        plan: &SplitPlan,
        seeds: &SeedSequence,
        family: ModelFamily,
        feature_set: FeatureSet,
    ) -> Result<(JobStatus, Evaluation), JobError> {
        let mut grid_rng = seeds.derive(&[family.id(), GRID_STREAM]).rng();
        let candidates = self
            .config
            .grids
            .candidates(family, feature_set.n_features(), &mut grid_rng);

        let search = GridSearch::new(plan, *seeds)
            .with_metric(self.config.selection_metric)
            .with_parallel(self.config.parallel)
            .run(feature_set, &candidates)?;

        let evaluation = Evaluator::evaluate(&search.model, &plan.test)?;
        info!(
            "{} / {} test: RMSE {:.4}, R2 {:.4}, MAE {:.4}",
            family,
            feature_set,
            evaluation.metrics.rmse,
            evaluation.metrics.rsq,
            evaluation.metrics.mae
        );

        let status = JobStatus::Completed {
            params: search.best_params,
            cv_metrics: search.cv_metrics,
            test_metrics: evaluation.metrics,
        };
        Ok((status, evaluation))
    }

    /// Write comparison.csv, comparison.json and optional prediction files.
    pub fn write_outputs(
        &self,
        result: &PipelineResult,
        dir: impl AsRef<Path>,
    ) -> Result<(), PipelineError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(OutputError::from)?;

        result.table.write_csv(dir.join("comparison.csv"))?;
        result.table.write_json(dir.join("comparison.json"))?;

        if self.config.output.write_predictions {
            for job in &result.predictions {
                write_predictions(dir.join("predictions").join(job.file_name()), &job.records)?;
            }
            info!(
                "Wrote {} prediction files to {}",
                result.predictions.len(),
                dir.join("predictions").display()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::walkforward::SplitConfig;

    #[test]
    fn test_invalid_config_rejected() {
        let config = PipelineConfig {
            models: Vec::new(),
            ..Default::default()
        };
        assert!(matches!(
            Pipeline::new(config),
            Err(PipelineError::Config(ConfigError::Invalid(_)))
        ));
    }

    #[test]
    fn test_prediction_file_name() {
        let job = JobPredictions {
            family: ModelFamily::GradientBoosting,
            feature_set: FeatureSet::FullLagged,
            records: Vec::new(),
        };
        assert_eq!(job.file_name(), "gradient-boosting_full-lagged.csv");
    }

    #[test]
    fn test_empty_panel_fails_before_fitting() {
        let pipeline = Pipeline::new(PipelineConfig {
            split: SplitConfig {
                test_window_days: 2,
                ..Default::default()
            },
            ..Default::default()
        })
        .unwrap();
        let panel = Panel::new(Vec::new()).unwrap();
        assert!(matches!(
            pipeline.run(&panel),
            Err(PipelineError::FoldConfig(FoldConfigError::NoData))
        ));
    }
}
