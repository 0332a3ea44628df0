//! Training engine: turns a [`ModelSpec`] into a fitted classifier

use super::config::{EstimatorSpec, ModelSpec};
use super::grid_search::{GridSearch, GridSearchResult};
use super::models::{validate_fit_input, Classifier};
use crate::ensemble::SoftVotingClassifier;
use crate::error::Result;
use ndarray::{Array1, Array2};
use std::time::Instant;
use tracing::info;

/// A fitted model plus what it took to get there
pub struct TrainedModel {
    model: Box<dyn Classifier>,
    /// Estimators actually fitted on the full training set
    estimators: Vec<EstimatorSpec>,
    search: Option<GridSearchResult>,
    training_time_secs: f64,
}

impl TrainedModel {
    pub fn model(&self) -> &dyn Classifier {
        self.model.as_ref()
    }

    pub fn estimators(&self) -> &[EstimatorSpec] {
        &self.estimators
    }

    /// Grid search table, when the model spec asked for one
    pub fn search(&self) -> Option<&GridSearchResult> {
        self.search.as_ref()
    }

    /// Wall-clock seconds spent in `Trainer::fit`, search included
    pub fn training_time_secs(&self) -> f64 {
        self.training_time_secs
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<usize>> {
        self.model.predict(x)
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.model.predict_proba(x)
    }

    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        self.model.feature_importances()
    }
}

impl std::fmt::Debug for TrainedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrainedModel")
            .field("model", &self.model.name())
            .field("estimators", &self.estimators)
            .field("training_time_secs", &self.training_time_secs)
            .finish()
    }
}

/// Fits model specs with a fixed random state
#[derive(Debug, Clone)]
pub struct Trainer {
    random_state: u64,
}

impl Default for Trainer {
    fn default() -> Self {
        Self { random_state: 42 }
    }
}

impl Trainer {
    pub fn new(random_state: u64) -> Self {
        Self { random_state }
    }

    pub fn random_state(&self) -> u64 {
        self.random_state
    }

    /// Fit `spec` on the training matrix
    pub fn fit(
        &self,
        spec: &ModelSpec,
        x: &Array2<f64>,
        y: &Array1<usize>,
        n_classes: usize,
    ) -> Result<TrainedModel> {
        spec.validate()?;
        validate_fit_input(x, y, n_classes)?;

        let start = Instant::now();
        info!(
            model = %spec.describe(),
            n_samples = x.nrows(),
            n_features = x.ncols(),
            n_classes,
            "training started"
        );

        let (model, estimators, search): (Box<dyn Classifier>, Vec<EstimatorSpec>, _) = match spec {
            ModelSpec::Single { estimator } => {
                let mut model = estimator.build(self.random_state);
                model.fit(x, y, n_classes)?;
                (model, vec![estimator.clone()], None)
            }
            ModelSpec::SoftVoting {
                estimators,
                weights,
            } => {
                let members: Vec<Box<dyn Classifier>> = estimators
                    .iter()
                    .map(|e| e.build(self.random_state))
                    .collect();
                let mut voting = SoftVotingClassifier::new(members);
                if let Some(w) = weights {
                    voting = voting.with_weights(w.clone())?;
                }
                voting.fit(x, y, n_classes)?;
                (Box::new(voting) as Box<dyn Classifier>, estimators.clone(), None)
            }
            ModelSpec::GridSearch {
                estimator,
                grid,
                cv_folds,
            } => {
                let search = GridSearch::new(estimator.clone(), grid.clone(), *cv_folds)
                    .with_random_state(self.random_state);
                let (result, best) = search.run(x, y, n_classes)?;

                // Refit the winner on the whole training set
                let mut model = best.build(self.random_state);
                model.fit(x, y, n_classes)?;
                (model, vec![best], Some(result))
            }
        };

        let training_time_secs = start.elapsed().as_secs_f64();
        info!(
            model = %model.name(),
            seconds = training_time_secs,
            "training finished"
        );

        Ok(TrainedModel {
            model,
            estimators,
            search,
            training_time_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::config::{ParamGrid, ParamValue};
    use crate::training::gradient_boosting::GradientBoostingParams;
    use crate::training::random_forest::{MaxFeatures, RandomForestParams};

    fn data() -> (Array2<f64>, Array1<usize>) {
        let n = 24;
        let x = Array2::from_shape_fn((n, 2), |(i, j)| (i % 3) as f64 * 3.0 + j as f64 * 0.1 + (i / 3) as f64 * 0.01);
        let y = Array1::from_shape_fn(n, |i| i % 3);
        (x, y)
    }

    fn small_rf() -> EstimatorSpec {
        EstimatorSpec::RandomForest(RandomForestParams {
            n_estimators: 10,
            max_features: MaxFeatures::All,
            ..Default::default()
        })
    }

    #[test]
    fn test_single() {
        let (x, y) = data();
        let spec = ModelSpec::Single { estimator: small_rf() };
        let trained = Trainer::new(7).fit(&spec, &x, &y, 3).unwrap();

        assert_eq!(trained.predict(&x).unwrap(), y);
        assert!(trained.search().is_none());
        assert_eq!(trained.estimators().len(), 1);
        assert!(trained.training_time_secs() >= 0.0);
    }

    #[test]
    fn test_soft_voting() {
        let (x, y) = data();
        let spec = ModelSpec::SoftVoting {
            estimators: vec![
                small_rf(),
                EstimatorSpec::GradientBoosting(GradientBoostingParams {
                    n_estimators: 10,
                    ..Default::default()
                }),
            ],
            weights: None,
        };
        let trained = Trainer::default().fit(&spec, &x, &y, 3).unwrap();
        let proba = trained.predict_proba(&x).unwrap();

        assert_eq!(proba.dim(), (24, 3));
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
        assert!(trained.model().name().starts_with("SoftVoting"));
    }

    #[test]
    fn test_grid_search_refits_best() {
        let (x, y) = data();
        let spec = ModelSpec::GridSearch {
            estimator: small_rf(),
            grid: ParamGrid::new().add("max_depth", vec![ParamValue::Int(1), ParamValue::None]),
            cv_folds: 3,
        };
        let trained = Trainer::new(42).fit(&spec, &x, &y, 3).unwrap();
        let search = trained.search().unwrap();

        assert_eq!(search.candidates.len(), 2);
        assert_eq!(trained.estimators().len(), 1);
        assert!(trained.model().n_classes() == 3);
    }

    #[test]
    fn test_invalid_spec_rejected() {
        let (x, y) = data();
        let spec = ModelSpec::SoftVoting {
            estimators: vec![small_rf()],
            weights: None,
        };
        assert!(Trainer::default().fit(&spec, &x, &y, 3).is_err());
    }
}
