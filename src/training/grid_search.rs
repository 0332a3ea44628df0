//! Exhaustive hyperparameter search with stratified k-fold cross-validation

use super::config::{apply_params, EstimatorSpec, ParamGrid, ParamSet};
use super::cross_validation::{CVSplit, StratifiedKFold};
use crate::error::{PipelineError, Result};
use crate::evaluation::macro_f1_score;
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Cross-validated score of one grid point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateResult {
    pub params: serde_json::Value,
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
    pub std_score: f64,
    /// 1 for the best mean score
    pub rank: usize,
}

/// Outcome of a full search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSearchResult {
    pub best_index: usize,
    pub best_params: serde_json::Value,
    pub best_score: f64,
    pub cv_folds: usize,
    pub scoring: String,
    pub candidates: Vec<CandidateResult>,
}

/// Grid point as a JSON object keyed by parameter name
pub fn params_to_json(params: &ParamSet) -> serde_json::Value {
    let map: serde_json::Map<String, serde_json::Value> = params
        .iter()
        .map(|(name, value)| {
            let v = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
            (name.clone(), v)
        })
        .collect();
    serde_json::Value::Object(map)
}

/// Grid search over one base estimator, scored by macro-F1
#[derive(Debug, Clone)]
pub struct GridSearch {
    estimator: EstimatorSpec,
    grid: ParamGrid,
    cv: StratifiedKFold,
    random_state: u64,
}

impl GridSearch {
    pub fn new(estimator: EstimatorSpec, grid: ParamGrid, cv_folds: usize) -> Self {
        Self {
            estimator,
            grid,
            cv: StratifiedKFold::new(cv_folds),
            random_state: 42,
        }
    }

    /// Seed for fold assignment and every fitted model
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self.cv = self.cv.with_random_state(seed);
        self
    }

    fn score_candidate(
        &self,
        spec: &EstimatorSpec,
        folds: &[CVSplit],
        x: &Array2<f64>,
        y: &Array1<usize>,
        n_classes: usize,
    ) -> Result<Vec<f64>> {
        folds
            .iter()
            .map(|fold| {
                let x_train = x.select(Axis(0), &fold.train_indices);
                let y_train = y.select(Axis(0), &fold.train_indices);
                let x_val = x.select(Axis(0), &fold.test_indices);
                let y_val = y.select(Axis(0), &fold.test_indices);

                let mut model = spec.build(self.random_state);
                model.fit(&x_train, &y_train, n_classes)?;
                let pred = model.predict(&x_val)?;
                let score = macro_f1_score(&y_val, &pred, n_classes)?;
                debug!(fold = fold.fold_idx, score, "fold scored");
                Ok(score)
            })
            .collect()
    }

    /// Score every grid point and select the best mean macro-F1.
    ///
    /// Ties keep the earliest grid point. Returns the search table and the
    /// winning estimator spec (unfitted).
    pub fn run(
        &self,
        x: &Array2<f64>,
        y: &Array1<usize>,
        n_classes: usize,
    ) -> Result<(GridSearchResult, EstimatorSpec)> {
        let candidates = self.grid.candidates();
        let specs: Vec<EstimatorSpec> = candidates
            .iter()
            .map(|c| apply_params(&self.estimator, c))
            .collect::<Result<_>>()?;

        let labels = y.to_vec();
        let folds = self.cv.split(&labels)?;

        info!(
            candidates = specs.len(),
            folds = folds.len(),
            estimator = self.estimator.name(),
            "grid search started"
        );

        let scores: Vec<Vec<f64>> = specs
            .par_iter()
            .map(|spec| self.score_candidate(spec, &folds, x, y, n_classes))
            .collect::<Result<_>>()?;

        let mut results: Vec<CandidateResult> = candidates
            .iter()
            .zip(scores)
            .map(|(params, fold_scores)| {
                let n = fold_scores.len() as f64;
                let mean = fold_scores.iter().sum::<f64>() / n;
                let var = fold_scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
                CandidateResult {
                    params: params_to_json(params),
                    fold_scores,
                    mean_score: mean,
                    std_score: var.sqrt(),
                    rank: 0,
                }
            })
            .collect();

        let mut best_index = 0;
        for (i, r) in results.iter().enumerate() {
            if r.mean_score > results[best_index].mean_score {
                best_index = i;
            }
        }

        // Competition ranking on mean score
        let means: Vec<f64> = results.iter().map(|r| r.mean_score).collect();
        for r in results.iter_mut() {
            r.rank = 1 + means.iter().filter(|&&m| m > r.mean_score).count();
        }

        let best_spec = specs.into_iter().nth(best_index).ok_or_else(|| {
            PipelineError::TrainingError("parameter grid produced no candidates".to_string())
        })?;
        let best = &results[best_index];
        info!(
            best_score = best.mean_score,
            best_params = %best.params,
            "grid search finished"
        );

        Ok((
            GridSearchResult {
                best_index,
                best_params: best.params.clone(),
                best_score: best.mean_score,
                cv_folds: self.cv.n_splits(),
                scoring: "f1_macro".to_string(),
                candidates: results,
            },
            best_spec,
        ))
    }
}
