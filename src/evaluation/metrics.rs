//! Multi-class classification metrics

use crate::error::{PipelineError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Precision, recall, F1 and support for one class
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

/// Evaluation of one set of predictions against the truth
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Class labels in index order
    pub labels: Vec<String>,
    /// `confusion_matrix[i][j]` counts rows with truth `i` predicted as `j`
    pub confusion_matrix: Vec<Vec<usize>>,
    /// Per-class metrics in index order
    pub per_class: Vec<ClassMetrics>,
    pub macro_f1: f64,
    pub weighted_f1: f64,
    pub balanced_accuracy: f64,
    pub accuracy: f64,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

fn check_inputs(y_true: &Array1<usize>, y_pred: &Array1<usize>, n_classes: usize) -> Result<()> {
    if y_true.len() != y_pred.len() {
        return Err(PipelineError::ShapeError {
            expected: format!("{} predictions", y_true.len()),
            actual: format!("{} predictions", y_pred.len()),
        });
    }
    if y_true.is_empty() {
        return Err(PipelineError::ValidationError(
            "cannot evaluate zero predictions".to_string(),
        ));
    }
    if let Some(&bad) = y_true.iter().chain(y_pred.iter()).find(|&&c| c >= n_classes) {
        return Err(PipelineError::ValidationError(format!(
            "class index {} out of range for {} classes",
            bad, n_classes
        )));
    }
    Ok(())
}

/// k x k confusion matrix, rows are true classes
pub fn confusion_matrix(
    y_true: &Array1<usize>,
    y_pred: &Array1<usize>,
    n_classes: usize,
) -> Result<Vec<Vec<usize>>> {
    check_inputs(y_true, y_pred, n_classes)?;
    let mut matrix = vec![vec![0usize; n_classes]; n_classes];
    for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
        matrix[t][p] += 1;
    }
    Ok(matrix)
}

/// Per-class metrics from a confusion matrix; zero denominators give 0
pub fn per_class_metrics(matrix: &[Vec<usize>]) -> Vec<ClassMetrics> {
    let k = matrix.len();
    (0..k)
        .map(|i| {
            let tp = matrix[i][i];
            let support: usize = matrix[i].iter().sum();
            let predicted: usize = matrix.iter().map(|row| row[i]).sum();
            let precision = ratio(tp, predicted);
            let recall = ratio(tp, support);
            let f1_score = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };
            ClassMetrics {
                precision,
                recall,
                f1_score,
                support,
            }
        })
        .collect()
}

/// Unweighted mean of per-class F1 over all `n_classes`
pub fn macro_f1_score(y_true: &Array1<usize>, y_pred: &Array1<usize>, n_classes: usize) -> Result<f64> {
    let matrix = confusion_matrix(y_true, y_pred, n_classes)?;
    let per_class = per_class_metrics(&matrix);
    Ok(per_class.iter().map(|m| m.f1_score).sum::<f64>() / n_classes as f64)
}

impl EvaluationReport {
    /// Compute every metric from true and predicted class indices
    pub fn from_predictions(
        y_true: &Array1<usize>,
        y_pred: &Array1<usize>,
        labels: &[String],
    ) -> Result<Self> {
        let k = labels.len();
        if k == 0 {
            return Err(PipelineError::ValidationError("no class labels".to_string()));
        }

        let matrix = confusion_matrix(y_true, y_pred, k)?;
        let per_class = per_class_metrics(&matrix);
        let n = y_true.len();

        for (label, m) in labels.iter().zip(&per_class) {
            if m.support == 0 {
                warn!(class = %label, "class absent from evaluation rows");
            }
        }

        let correct: usize = (0..k).map(|i| matrix[i][i]).sum();
        let macro_f1 = per_class.iter().map(|m| m.f1_score).sum::<f64>() / k as f64;
        let weighted_f1 = per_class
            .iter()
            .map(|m| m.f1_score * m.support as f64)
            .sum::<f64>()
            / n as f64;
        let balanced_accuracy = per_class.iter().map(|m| m.recall).sum::<f64>() / k as f64;

        Ok(Self {
            labels: labels.to_vec(),
            confusion_matrix: matrix,
            per_class,
            macro_f1,
            weighted_f1,
            balanced_accuracy,
            accuracy: ratio(correct, n),
        })
    }
}
