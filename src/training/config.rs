//! Model specifications: what to train, expressed as data

use super::gradient_boosting::{GradientBoostingClassifier, GradientBoostingParams};
use super::models::Classifier;
use super::random_forest::{RandomForest, RandomForestParams};
use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One base estimator with fixed hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EstimatorSpec {
    RandomForest(RandomForestParams),
    GradientBoosting(GradientBoostingParams),
}

impl EstimatorSpec {
    /// Display name of the estimator family
    pub fn name(&self) -> &'static str {
        match self {
            EstimatorSpec::RandomForest(_) => "RandomForest",
            EstimatorSpec::GradientBoosting(_) => "GradientBoosting",
        }
    }

    /// Construct an unfitted classifier
    pub fn build(&self, random_state: u64) -> Box<dyn Classifier> {
        match self {
            EstimatorSpec::RandomForest(p) => {
                Box::new(RandomForest::new(p.clone()).with_random_state(random_state))
            }
            EstimatorSpec::GradientBoosting(p) => {
                Box::new(GradientBoostingClassifier::new(p.clone()).with_random_state(random_state))
            }
        }
    }

    /// Hyperparameters as JSON, without the type tag
    pub fn hyperparameters(&self) -> serde_json::Value {
        let value = match self {
            EstimatorSpec::RandomForest(p) => serde_json::to_value(p),
            EstimatorSpec::GradientBoosting(p) => serde_json::to_value(p),
        };
        value.unwrap_or(serde_json::Value::Null)
    }

    /// Copy of this spec with one hyperparameter overridden
    pub fn with_param(&self, name: &str, value: &ParamValue) -> Result<Self> {
        let mut spec = self.clone();
        match &mut spec {
            EstimatorSpec::RandomForest(p) => match name {
                "n_estimators" => p.n_estimators = value.as_count(name)?,
                "max_depth" => p.max_depth = value.as_optional_count(name)?,
                "min_samples_split" => p.min_samples_split = value.as_count(name)?,
                "min_samples_leaf" => p.min_samples_leaf = value.as_count(name)?,
                _ => return Err(unknown_param(name, self.name())),
            },
            EstimatorSpec::GradientBoosting(p) => match name {
                "n_estimators" => p.n_estimators = value.as_count(name)?,
                "max_depth" => p.max_depth = value.as_optional_count(name)?,
                "min_samples_split" => p.min_samples_split = value.as_count(name)?,
                "min_samples_leaf" => p.min_samples_leaf = value.as_count(name)?,
                "learning_rate" => p.learning_rate = value.as_float(name)?,
                _ => return Err(unknown_param(name, self.name())),
            },
        }
        Ok(spec)
    }
}

fn unknown_param(name: &str, estimator: &str) -> PipelineError {
    PipelineError::InvalidParameter {
        name: name.to_string(),
        value: String::new(),
        reason: format!("not a tunable parameter of {}", estimator),
    }
}

/// A grid value: integer, float, or `null` for "unbounded"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(usize),
    Float(f64),
    None,
}

impl ParamValue {
    fn invalid(&self, name: &str, reason: &str) -> PipelineError {
        PipelineError::InvalidParameter {
            name: name.to_string(),
            value: self.to_string(),
            reason: reason.to_string(),
        }
    }

    fn as_count(&self, name: &str) -> Result<usize> {
        match self {
            ParamValue::Int(v) => Ok(*v),
            _ => Err(self.invalid(name, "expected an integer")),
        }
    }

    fn as_optional_count(&self, name: &str) -> Result<Option<usize>> {
        match self {
            ParamValue::Int(v) => Ok(Some(*v)),
            ParamValue::None => Ok(None),
            ParamValue::Float(_) => Err(self.invalid(name, "expected an integer or null")),
        }
    }

    fn as_float(&self, name: &str) -> Result<f64> {
        match self {
            ParamValue::Int(v) => Ok(*v as f64),
            ParamValue::Float(v) => Ok(*v),
            ParamValue::None => Err(self.invalid(name, "expected a number")),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::None => write!(f, "None"),
        }
    }
}

/// One searched hyperparameter and its candidate values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamAxis {
    pub name: String,
    pub values: Vec<ParamValue>,
}

/// Ordered hyperparameter grid
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamGrid {
    axes: Vec<ParamAxis>,
}

/// One grid point: parameter name and value, in grid order
pub type ParamSet = Vec<(String, ParamValue)>;

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parameter axis
    pub fn add(mut self, name: &str, values: Vec<ParamValue>) -> Self {
        self.axes.push(ParamAxis {
            name: name.to_string(),
            values,
        });
        self
    }

    pub fn axes(&self) -> &[ParamAxis] {
        &self.axes
    }

    /// Cartesian product in declaration order; the last axis varies fastest
    pub fn candidates(&self) -> Vec<ParamSet> {
        Self::cartesian_product(&self.axes)
    }

    fn cartesian_product(axes: &[ParamAxis]) -> Vec<ParamSet> {
        let Some((first, rest)) = axes.split_first() else {
            return vec![Vec::new()];
        };
        let rest_sets = Self::cartesian_product(rest);

        first
            .values
            .iter()
            .flat_map(|v| {
                rest_sets.iter().map(move |tail| {
                    let mut set = Vec::with_capacity(tail.len() + 1);
                    set.push((first.name.clone(), v.clone()));
                    set.extend(tail.iter().cloned());
                    set
                })
            })
            .collect()
    }

    pub fn n_candidates(&self) -> usize {
        self.axes.iter().map(|a| a.values.len()).product()
    }
}

/// Apply every value of a grid point to a base estimator
pub fn apply_params(base: &EstimatorSpec, params: &ParamSet) -> Result<EstimatorSpec> {
    params
        .iter()
        .try_fold(base.clone(), |spec, (name, value)| spec.with_param(name, value))
}

/// What the trainer fits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSpec {
    /// One estimator with fixed hyperparameters
    Single { estimator: EstimatorSpec },
    /// Weighted mean of member class probabilities
    SoftVoting {
        estimators: Vec<EstimatorSpec>,
        #[serde(default)]
        weights: Option<Vec<f64>>,
    },
    /// Exhaustive search with stratified k-fold CV on macro-F1
    GridSearch {
        estimator: EstimatorSpec,
        grid: ParamGrid,
        #[serde(default = "default_cv_folds")]
        cv_folds: usize,
    },
}

fn default_cv_folds() -> usize {
    3
}

impl ModelSpec {
    /// Check structural constraints
    pub fn validate(&self) -> Result<()> {
        match self {
            ModelSpec::Single { .. } => Ok(()),
            ModelSpec::SoftVoting { estimators, weights } => {
                if estimators.len() < 2 {
                    return Err(PipelineError::ConfigError(
                        "soft voting needs at least two estimators".to_string(),
                    ));
                }
                if let Some(w) = weights {
                    if w.len() != estimators.len() {
                        return Err(PipelineError::ConfigError(format!(
                            "{} voting weights for {} estimators",
                            w.len(),
                            estimators.len()
                        )));
                    }
                    if w.iter().any(|v| !v.is_finite() || *v < 0.0) || w.iter().sum::<f64>() <= 0.0 {
                        return Err(PipelineError::ConfigError(
                            "voting weights must be non-negative with a positive sum".to_string(),
                        ));
                    }
                }
                Ok(())
            }
            ModelSpec::GridSearch { estimator, grid, cv_folds } => {
                if *cv_folds < 2 {
                    return Err(PipelineError::ConfigError(format!(
                        "cv_folds must be at least 2, got {}",
                        cv_folds
                    )));
                }
                if grid.n_candidates() == 0 {
                    return Err(PipelineError::ConfigError(
                        "parameter grid has an empty axis".to_string(),
                    ));
                }
                // Every grid point must map onto the estimator
                for candidate in grid.candidates() {
                    apply_params(estimator, &candidate)?;
                }
                Ok(())
            }
        }
    }

    /// Human-readable model type
    pub fn describe(&self) -> String {
        match self {
            ModelSpec::Single { estimator } => estimator.name().to_string(),
            ModelSpec::SoftVoting { estimators, .. } => {
                let names: Vec<&str> = estimators.iter().map(EstimatorSpec::name).collect();
                format!("Voting Ensemble ({})", names.join(" + "))
            }
            ModelSpec::GridSearch { estimator, .. } => {
                format!("{} (GridSearchCV tuned)", estimator.name())
            }
        }
    }
}
