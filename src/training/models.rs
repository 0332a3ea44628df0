//! Classifier trait and shared helpers

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Per-class weighting applied as sample weights during fit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassWeight {
    /// Every row weighs 1
    #[default]
    None,
    /// `n / (k * count_c)` over the classes present in the labels
    Balanced,
}

impl ClassWeight {
    /// Weight per class index
    pub fn class_weights(&self, y: &Array1<usize>, n_classes: usize) -> Vec<f64> {
        match self {
            ClassWeight::None => vec![1.0; n_classes],
            ClassWeight::Balanced => {
                let counts = class_counts(y, n_classes);
                let present = counts.iter().filter(|&&c| c > 0).count().max(1);
                let n = y.len() as f64;
                counts
                    .iter()
                    .map(|&c| if c > 0 { n / (present as f64 * c as f64) } else { 0.0 })
                    .collect()
            }
        }
    }

    /// Weight per row
    pub fn sample_weights(&self, y: &Array1<usize>, n_classes: usize) -> Vec<f64> {
        let per_class = self.class_weights(y, n_classes);
        y.iter().map(|&c| per_class[c]).collect()
    }
}

/// Rows per class index
pub fn class_counts(y: &Array1<usize>, n_classes: usize) -> Vec<usize> {
    let mut counts = vec![0usize; n_classes];
    for &c in y {
        if c < n_classes {
            counts[c] += 1;
        }
    }
    counts
}

/// Index of the largest value in each row, first index on ties
pub fn argmax_rows(proba: &Array2<f64>) -> Array1<usize> {
    proba
        .rows()
        .into_iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0usize, f64::NEG_INFINITY), |(bi, bv), (i, &v)| {
                    if v > bv {
                        (i, v)
                    } else {
                        (bi, bv)
                    }
                })
                .0
        })
        .collect()
}

/// Common checks before fitting a classifier
pub fn validate_fit_input(x: &Array2<f64>, y: &Array1<usize>, n_classes: usize) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(PipelineError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if x.nrows() == 0 {
        return Err(PipelineError::TrainingError("no training rows".to_string()));
    }
    if n_classes < 2 {
        return Err(PipelineError::TrainingError(format!(
            "need at least 2 classes, got {}",
            n_classes
        )));
    }
    if let Some(&bad) = y.iter().find(|&&c| c >= n_classes) {
        return Err(PipelineError::TrainingError(format!(
            "class index {} out of range for {} classes",
            bad, n_classes
        )));
    }
    Ok(())
}

/// A probabilistic multi-class classifier over dense features.
///
/// Fit once on `(x, y)` with labels in `0..n_classes`, then read-only.
pub trait Classifier: Send + Sync {
    /// Short model name used in logs and reports
    fn name(&self) -> String;

    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>, n_classes: usize) -> Result<()>;

    /// Class probabilities, one row per sample, `n_classes` columns
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>>;

    /// Most probable class per sample
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<usize>> {
        Ok(argmax_rows(&self.predict_proba(x)?))
    }

    /// Get feature importances (if available)
    fn feature_importances(&self) -> Option<Array1<f64>> {
        None
    }

    /// Number of classes seen at fit, 0 before
    fn n_classes(&self) -> usize;
}
