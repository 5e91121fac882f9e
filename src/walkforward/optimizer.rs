//! Walk-forward hyperparameter search.
//!
//! Scores every grid candidate on every fold's validation slice, averages
//! each metric across folds and keeps the best candidate under the
//! configured selection metric. The winner is then refit once on the whole
//! training region.

use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::features::{targets, FeatureSet};
use crate::metrics::{MetricsCalculator, RegressionMetrics, SelectionMetric};
use crate::models::{FitError, HyperParams, ModelFamily, TrainedModel};
use crate::seed::SeedSequence;

use super::periods::{Fold, SplitPlan};

/// Stream id reserved for the final refit of a job.
const REFIT_STREAM: u64 = u64::MAX;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchError {
    #[error("Empty hyperparameter grid for {feature_set}")]
    EmptyGrid { feature_set: FeatureSet },

    #[error("No valid candidate for {family} on {feature_set}: all {failures} candidates failed")]
    NoValidCandidate {
        family: ModelFamily,
        feature_set: FeatureSet,
        failures: usize,
    },

    #[error("Final refit failed: {0}")]
    Fit(#[from] FitError),
}

/// Cross-validated outcome of one grid candidate.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateScore {
    /// Position in grid order.
    pub index: usize,
    pub params: HyperParams,
    /// Metrics averaged over folds; `None` when any fold failed.
    pub cv_metrics: Option<RegressionMetrics>,
    pub failure: Option<String>,
}

impl CandidateScore {
    pub fn is_valid(&self) -> bool {
        self.cv_metrics.is_some()
    }
}

/// Selected configuration and its final model.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub family: ModelFamily,
    pub feature_set: FeatureSet,
    pub metric: SelectionMetric,
    pub best_index: usize,
    pub best_params: HyperParams,
    /// Fold-averaged metrics of the winner.
    pub cv_metrics: RegressionMetrics,
    pub candidates: Vec<CandidateScore>,
    /// Winner refit on the entire training region.
    pub model: TrainedModel,
}

impl SearchResult {
    pub fn failed_candidates(&self) -> usize {
        self.candidates.iter().filter(|c| !c.is_valid()).count()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} / {}: best {} (candidate {} of {}, {} failed)\n\
             CV RMSE: {:.4}  CV R2: {:.4}  CV MAE: {:.4}",
            self.family,
            self.feature_set,
            self.best_params.key(),
            self.best_index + 1,
            self.candidates.len(),
            self.failed_candidates(),
            self.cv_metrics.rmse,
            self.cv_metrics.rsq,
            self.cv_metrics.mae
        )
    }
}

/// Grid search over the folds of one split plan.
pub struct GridSearch<'a> {
    plan: &'a SplitPlan,
    seeds: SeedSequence,
    metric: SelectionMetric,
    parallel: bool,
}

impl<'a> GridSearch<'a> {
    pub fn new(plan: &'a SplitPlan, seeds: SeedSequence) -> Self {
        Self {
            plan,
            seeds,
            metric: SelectionMetric::default(),
            parallel: true,
        }
    }

    /// Set the selection metric.
    pub fn with_metric(mut self, metric: SelectionMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Enable or disable parallel candidate evaluation.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Tune one (family, feature set) job over `candidates`.
    ///
    /// All candidates must belong to the same family. Ties keep the
    /// candidate that comes first in grid order.
    pub fn run(
        &self,
        feature_set: FeatureSet,
        candidates: &[HyperParams],
    ) -> Result<SearchResult, SearchError> {
        let family = candidates
            .first()
            .map(HyperParams::family)
            .ok_or(SearchError::EmptyGrid { feature_set })?;
        let job_seeds = self.seeds.derive(&[family.id(), feature_set.id()]);

        info!(
            "Tuning {} on {}: {} candidates x {} folds",
            family,
            feature_set,
            candidates.len(),
            self.plan.folds.len()
        );

        let progress = AtomicUsize::new(0);
        let total = candidates.len();
        let evaluate = |(index, params): (usize, &HyperParams)| {
            let score = self.score_candidate(feature_set, index, params, &job_seeds);

            let done = progress.fetch_add(1, Ordering::Relaxed) + 1;
            if done % (total / 10).max(1) == 0 || done == total {
                let pct = done as f64 / total as f64 * 100.0;
                info!(
                    "  {} / {}: {:.0}% ({}/{} candidates)",
                    family, feature_set, pct, done, total
                );
            }
            score
        };

        let scores: Vec<CandidateScore> = if self.parallel {
            candidates.par_iter().enumerate().map(evaluate).collect()
        } else {
            candidates.iter().enumerate().map(evaluate).collect()
        };

        let failures = scores.iter().filter(|s| !s.is_valid()).count();
        if failures > 0 {
            warn!(
                "{} / {}: {} of {} candidates failed",
                family,
                feature_set,
                failures,
                scores.len()
            );
        }

        let (best_index, cv_metrics) = select_best(&scores, self.metric).ok_or(
            SearchError::NoValidCandidate {
                family,
                feature_set,
                failures,
            },
        )?;
        let best_params = scores[best_index].params.clone();

        info!(
            "{} / {} selected {} (CV {} = {:.4}), refitting on {} training rows",
            family,
            feature_set,
            best_params.key(),
            self.metric,
            cv_metrics.get(self.metric),
            self.plan.training.len()
        );

        let mut rng = job_seeds.child(REFIT_STREAM).rng();
        let model = TrainedModel::fit(feature_set, &best_params, &self.plan.training, &mut rng)?;

        Ok(SearchResult {
            family,
            feature_set,
            metric: self.metric,
            best_index,
            best_params,
            cv_metrics,
            candidates: scores,
            model,
        })
    }

    fn score_candidate(
        &self,
        feature_set: FeatureSet,
        index: usize,
        params: &HyperParams,
        job_seeds: &SeedSequence,
    ) -> CandidateScore {
        let per_fold: Result<Vec<RegressionMetrics>, FitError> = self
            .plan
            .folds
            .iter()
            .map(|fold| self.score_fold(feature_set, index, params, fold, job_seeds))
            .collect();

        match per_fold {
            Ok(metrics) => {
                let cv_metrics = MetricsCalculator::mean(&metrics);
                debug!("Candidate {} ({}): {:?}", index + 1, params.key(), cv_metrics);
                CandidateScore {
                    index,
                    params: params.clone(),
                    cv_metrics,
                    failure: cv_metrics.is_none().then(|| "no folds".to_string()),
                }
            }
            Err(e) => {
                debug!("Candidate {} ({}) failed: {}", index + 1, params.key(), e);
                CandidateScore {
                    index,
                    params: params.clone(),
                    cv_metrics: None,
                    failure: Some(e.to_string()),
                }
            }
        }
    }

    fn score_fold(
        &self,
        feature_set: FeatureSet,
        index: usize,
        params: &HyperParams,
        fold: &Fold,
        job_seeds: &SeedSequence,
    ) -> Result<RegressionMetrics, FitError> {
        let (train, validation) = self.plan.fold_rows(fold);
        let mut rng = job_seeds.derive(&[index as u64, fold.fold_num as u64]).rng();

        let model = TrainedModel::fit(feature_set, params, train, &mut rng)?;
        let predicted = model.predict(validation);
        let actual = targets(validation).to_vec();

        if is_constant(&predicted) && !is_constant(&actual) {
            return Err(FitError::DegeneratePredictions);
        }
        Ok(MetricsCalculator::calculate(&actual, &predicted)?)
    }
}

/// Best valid candidate under `metric`; ties keep the earliest.
pub fn select_best(
    scores: &[CandidateScore],
    metric: SelectionMetric,
) -> Option<(usize, RegressionMetrics)> {
    let mut best: Option<(usize, RegressionMetrics)> = None;
    for score in scores {
        let Some(metrics) = score.cv_metrics else {
            continue;
        };
        match best {
            Some((_, incumbent)) if !metric.is_better(&metrics, &incumbent) => {}
            _ => best = Some((score.index, metrics)),
        }
    }
    best
}

fn is_constant(values: &[f64]) -> bool {
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    max - min <= 1e-12 * (1.0 + max.abs().max(min.abs()))
}
