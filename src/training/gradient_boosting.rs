//! Gradient Boosting implementation
//!
//! Multi-class gradient boosting with the softmax (multinomial deviance)
//! loss. Each round fits one regression tree per class on the residuals
//! `onehot(y) - p`, then replaces every leaf value with a single Newton step.

use super::decision_tree::DecisionTree;
use super::models::{validate_fit_input, ClassWeight, Classifier};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Gradient Boosting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradientBoostingParams {
    /// Number of boosting rounds
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Maximum tree depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    /// Sample weighting by class
    pub class_weight: ClassWeight,
}

impl Default for GradientBoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: Some(3),
            min_samples_split: 2,
            min_samples_leaf: 1,
            class_weight: ClassWeight::None,
        }
    }
}

/// Gradient Boosting Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    pub params: GradientBoostingParams,
    pub random_state: u64,
    /// One tree per class per round
    trees: Vec<Vec<DecisionTree>>,
    /// Log class priors
    init_scores: Vec<f64>,
    feature_importances: Option<Array1<f64>>,
    n_features: usize,
    n_classes: usize,
}

impl Default for GradientBoostingClassifier {
    fn default() -> Self {
        Self::new(GradientBoostingParams::default())
    }
}

/// Row-wise softmax of raw scores
fn softmax_rows(raw: &Array2<f64>) -> Array2<f64> {
    let mut proba = raw.clone();
    for mut row in proba.rows_mut() {
        let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
    proba
}

impl GradientBoostingClassifier {
    pub fn new(params: GradientBoostingParams) -> Self {
        Self {
            params,
            random_state: 42,
            trees: Vec::new(),
            init_scores: Vec::new(),
            feature_importances: None,
            n_features: 0,
            n_classes: 0,
        }
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    fn validate_params(&self) -> Result<()> {
        if self.params.n_estimators == 0 {
            return Err(PipelineError::InvalidParameter {
                name: "n_estimators".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if !(self.params.learning_rate > 0.0) {
            return Err(PipelineError::InvalidParameter {
                name: "learning_rate".to_string(),
                value: self.params.learning_rate.to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Fit the gradient boosting model
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>, n_classes: usize) -> Result<&mut Self> {
        validate_fit_input(x, y, n_classes)?;
        self.validate_params()?;

        let n_samples = x.nrows();
        let k = n_classes;
        self.n_features = x.ncols();
        self.n_classes = k;

        let weights = self.params.class_weight.sample_weights(y, k);
        let total_weight: f64 = weights.iter().sum();

        // Initialize with log priors
        let mut prior = vec![0.0; k];
        for (&c, &w) in y.iter().zip(&weights) {
            prior[c] += w;
        }
        self.init_scores = prior
            .iter()
            .map(|&p| (p / total_weight).max(f64::EPSILON).ln())
            .collect();

        let mut raw = Array2::from_shape_fn((n_samples, k), |(_, j)| self.init_scores[j]);
        let indices: Vec<usize> = (0..n_samples).collect();
        let scale = (k as f64 - 1.0) / k as f64;
        let params = &self.params;
        let mut rounds = Vec::with_capacity(params.n_estimators);
        let mut importances = vec![0.0; self.n_features];

        for round in 0..params.n_estimators {
            let proba = softmax_rows(&raw);

            // One tree per class, fitted independently
            let fitted: Vec<DecisionTree> = (0..k)
                .into_par_iter()
                .map(|class| -> Result<DecisionTree> {
                    let residual: Vec<f64> = (0..n_samples)
                        .map(|i| (y[i] == class) as u8 as f64 - proba[[i, class]])
                        .collect();

                    let seed = self.random_state.wrapping_add((round * k + class) as u64);
                    let mut rng = ChaCha8Rng::seed_from_u64(seed);
                    let mut tree = DecisionTree::new_regressor()
                        .with_max_depth(params.max_depth)
                        .with_min_samples_split(params.min_samples_split)
                        .with_min_samples_leaf(params.min_samples_leaf);
                    tree.fit_regressor(x, &residual, &weights, &indices, &mut rng)?;

                    // Newton step per leaf
                    let leaves = tree.apply(x)?;
                    let mut numerator = vec![0.0; tree.n_leaves()];
                    let mut denominator = vec![0.0; tree.n_leaves()];
                    for (i, &leaf) in leaves.iter().enumerate() {
                        let p = proba[[i, class]];
                        numerator[leaf] += weights[i] * residual[i];
                        denominator[leaf] += weights[i] * p * (1.0 - p);
                    }
                    for leaf in 0..tree.n_leaves() {
                        let value = if denominator[leaf].abs() < 1e-150 {
                            0.0
                        } else {
                            scale * numerator[leaf] / denominator[leaf]
                        };
                        tree.set_leaf_value(leaf, value);
                    }
                    Ok(tree)
                })
                .collect::<Result<Vec<_>>>()?;

            let mut class_trees = Vec::with_capacity(k);
            for (class, tree) in fitted.into_iter().enumerate() {
                let values = tree.predict_values(x)?;
                raw.column_mut(class).scaled_add(params.learning_rate, &values);
                if let Some(imp) = tree.feature_importances() {
                    for (acc, v) in importances.iter_mut().zip(imp.iter()) {
                        *acc += v;
                    }
                }
                class_trees.push(tree);
            }
            rounds.push(class_trees);
        }

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }

        self.trees = rounds;
        self.feature_importances = Some(Array1::from_vec(importances));
        debug!(rounds = self.trees.len(), classes = k, "gradient boosting fitted");
        Ok(self)
    }

    /// Raw additive scores before the softmax
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.trees.is_empty() {
            return Err(PipelineError::ModelNotFitted);
        }

        let mut raw = Array2::from_shape_fn((x.nrows(), self.n_classes), |(_, j)| self.init_scores[j]);
        for class_trees in &self.trees {
            for (class, tree) in class_trees.iter().enumerate() {
                let values = tree.predict_values(x)?;
                raw.column_mut(class).scaled_add(self.params.learning_rate, &values);
            }
        }
        Ok(raw)
    }

    /// Softmax of the raw scores
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        Ok(softmax_rows(&self.decision_function(x)?))
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Number of boosting rounds fitted
    pub fn n_rounds(&self) -> usize {
        self.trees.len()
    }

    /// Log-prior starting scores
    pub fn init_scores(&self) -> &[f64] {
        &self.init_scores
    }
}

impl Classifier for GradientBoostingClassifier {
    fn name(&self) -> String {
        "GradientBoosting".to_string()
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>, n_classes: usize) -> Result<()> {
        GradientBoostingClassifier::fit(self, x, y, n_classes).map(|_| ())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        GradientBoostingClassifier::predict_proba(self, x)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.feature_importances.clone()
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }
}
