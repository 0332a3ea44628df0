//! Soft voting ensemble

use crate::error::{PipelineError, Result};
use crate::training::Classifier;
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use tracing::debug;

/// Soft voting classifier: weighted mean of member class probabilities
pub struct SoftVotingClassifier {
    /// Member models
    estimators: Vec<Box<dyn Classifier>>,
    /// Normalized member weights
    weights: Vec<f64>,
    n_classes: usize,
}

impl SoftVotingClassifier {
    /// Create a new voting classifier with equal weights
    pub fn new(estimators: Vec<Box<dyn Classifier>>) -> Self {
        let n = estimators.len().max(1);
        Self {
            weights: vec![1.0 / n as f64; estimators.len()],
            estimators,
            n_classes: 0,
        }
    }

    /// Set model weights; normalized to sum to one
    pub fn with_weights(mut self, weights: Vec<f64>) -> Result<Self> {
        if weights.len() != self.estimators.len() {
            return Err(PipelineError::ValidationError(format!(
                "{} weights for {} estimators",
                weights.len(),
                self.estimators.len()
            )));
        }
        let sum: f64 = weights.iter().sum();
        if !(sum > 0.0) || weights.iter().any(|w| *w < 0.0) {
            return Err(PipelineError::ValidationError(
                "weights must be non-negative with a positive sum".to_string(),
            ));
        }
        self.weights = weights.iter().map(|w| w / sum).collect();
        Ok(self)
    }

    /// Normalized member weights
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn estimators(&self) -> &[Box<dyn Classifier>] {
        &self.estimators
    }

    /// Weighted mean of probability rows from already computed member outputs
    pub fn combine(probas: &[Array2<f64>], weights: &[f64]) -> Result<Array2<f64>> {
        let first = probas.first().ok_or_else(|| {
            PipelineError::ValidationError("No predictions provided".to_string())
        })?;
        let mut result = Array2::zeros(first.dim());
        for (p, &w) in probas.iter().zip(weights) {
            if p.dim() != first.dim() {
                return Err(PipelineError::ShapeError {
                    expected: format!("{:?}", first.dim()),
                    actual: format!("{:?}", p.dim()),
                });
            }
            result.scaled_add(w, p);
        }
        Ok(result)
    }
}

impl Classifier for SoftVotingClassifier {
    fn name(&self) -> String {
        let names: Vec<String> = self.estimators.iter().map(|e| e.name()).collect();
        format!("SoftVoting({})", names.join(" + "))
    }

    /// Each member fits on the identical training set
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>, n_classes: usize) -> Result<()> {
        if self.estimators.is_empty() {
            return Err(PipelineError::ValidationError(
                "No models provided".to_string(),
            ));
        }

        self.estimators
            .par_iter_mut()
            .map(|est| -> Result<()> {
                est.fit(x, y, n_classes)?;
                debug!(estimator = %est.name(), "ensemble member fitted");
                Ok(())
            })
            .collect::<Result<Vec<()>>>()?;

        self.n_classes = n_classes;
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.n_classes == 0 {
            return Err(PipelineError::ModelNotFitted);
        }
        let probas = self
            .estimators
            .par_iter()
            .map(|est| est.predict_proba(x))
            .collect::<Result<Vec<_>>>()?;
        Self::combine(&probas, &self.weights)
    }

    /// Weighted mean of member importances, where every member has them
    fn feature_importances(&self) -> Option<Array1<f64>> {
        let mut total: Option<Array1<f64>> = None;
        for (est, &w) in self.estimators.iter().zip(&self.weights) {
            let imp = est.feature_importances()?;
            match total.as_mut() {
                Some(t) if t.len() == imp.len() => t.scaled_add(w, &imp),
                Some(_) => return None,
                None => total = Some(imp * w),
            }
        }
        total
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::{GradientBoostingClassifier, GradientBoostingParams, RandomForest, RandomForestParams};
    use ndarray::array;

    /// Fixed-output model for checking the combination rule
    struct Constant(Vec<f64>);

    impl Classifier for Constant {
        fn name(&self) -> String {
            "Constant".to_string()
        }
        fn fit(&mut self, _x: &Array2<f64>, _y: &Array1<usize>, _n: usize) -> Result<()> {
            Ok(())
        }
        fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
            let row = Array1::from_vec(self.0.clone());
            Ok(Array2::from_shape_fn((x.nrows(), row.len()), |(_, j)| row[j]))
        }
        fn n_classes(&self) -> usize {
            self.0.len()
        }
    }

    #[test]
    fn test_soft_vote_weighted_mean() {
        let mut vc = SoftVotingClassifier::new(vec![
            Box::new(Constant(vec![0.6, 0.4, 0.0])) as Box<dyn Classifier>,
            Box::new(Constant(vec![0.0, 0.5, 0.5])) as Box<dyn Classifier>,
        ])
        .with_weights(vec![3.0, 1.0])
        .unwrap();

        let x = array![[0.0]];
        vc.fit(&x, &array![0], 3).unwrap();
        let proba = vc.predict_proba(&x).unwrap();

        assert!((proba[[0, 0]] - 0.45).abs() < 1e-12);
        assert!((proba[[0, 1]] - 0.425).abs() < 1e-12);
        assert!((proba[[0, 2]] - 0.125).abs() < 1e-12);
        assert_eq!(vc.predict(&x).unwrap()[0], 0);
    }

    #[test]
    fn test_equal_weights_default() {
        let vc = SoftVotingClassifier::new(vec![
            Box::new(Constant(vec![1.0, 0.0])) as Box<dyn Classifier>,
            Box::new(Constant(vec![0.0, 1.0])) as Box<dyn Classifier>,
        ]);
        assert_eq!(vc.weights(), &[0.5, 0.5]);
    }

    #[test]
    fn test_predict_before_fit() {
        let vc = SoftVotingClassifier::new(vec![Box::new(Constant(vec![1.0])) as Box<dyn Classifier>]);
        assert!(matches!(vc.predict_proba(&array![[0.0]]), Err(PipelineError::ModelNotFitted)));
    }

    #[test]
    fn test_forest_and_boosting_members() {
        let x = array![[0.0], [0.1], [0.2], [1.0], [1.1], [1.2]];
        let y = array![0, 0, 0, 1, 1, 1];
        let mut vc = SoftVotingClassifier::new(vec![
            Box::new(RandomForest::new(RandomForestParams {
                n_estimators: 10,
                ..Default::default()
            })) as Box<dyn Classifier>,
            Box::new(GradientBoostingClassifier::new(GradientBoostingParams {
                n_estimators: 10,
                ..Default::default()
            })),
        ]);
        vc.fit(&x, &y, 2).unwrap();

        assert_eq!(vc.predict(&x).unwrap(), y);
        assert!(vc.name().contains("RandomForest"));
        assert!(vc.feature_importances().is_some());
    }

    #[test]
    fn test_bad_weights() {
        let vc = SoftVotingClassifier::new(vec![Box::new(Constant(vec![1.0])) as Box<dyn Classifier>]);
        assert!(vc.with_weights(vec![1.0, 2.0]).is_err());
    }
}
