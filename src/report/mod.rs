//! JSON result report
//!
//! Metrics are rounded to 4 decimals and training time to 2 when the report
//! is built; the file is overwritten on every run.

mod documentation;

pub use documentation::{
    CvSummary, DocumentationContext, FeatureNotes, ImbalanceNotes, ModelNotes,
    PipelineDocumentation, PreprocessingNotes,
};

use crate::error::{PipelineError, Result};
use crate::evaluation::{ClassMetrics, EvaluationReport};
use crate::utils::round_to;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub macro_f1_score: f64,
    pub weighted_f1_score: f64,
    pub balanced_accuracy: f64,
    pub accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMatrixBlock {
    pub matrix: Vec<Vec<usize>>,
    /// Class label of each row and column, in index order
    pub labels: Vec<String>,
}

/// Complete result document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub evaluation_metrics: EvaluationMetrics,
    pub confusion_matrix: ConfusionMatrixBlock,
    pub per_class_metrics: BTreeMap<String, ClassMetrics>,
    pub training_time_seconds: f64,
    pub pipeline_documentation: PipelineDocumentation,
}

impl PipelineReport {
    pub fn new(
        evaluation: &EvaluationReport,
        training_time_secs: f64,
        documentation: PipelineDocumentation,
    ) -> Self {
        let per_class_metrics = evaluation
            .labels
            .iter()
            .zip(&evaluation.per_class)
            .map(|(label, m)| {
                (
                    label.clone(),
                    ClassMetrics {
                        precision: round_to(m.precision, 4),
                        recall: round_to(m.recall, 4),
                        f1_score: round_to(m.f1_score, 4),
                        support: m.support,
                    },
                )
            })
            .collect();

        Self {
            evaluation_metrics: EvaluationMetrics {
                macro_f1_score: round_to(evaluation.macro_f1, 4),
                weighted_f1_score: round_to(evaluation.weighted_f1, 4),
                balanced_accuracy: round_to(evaluation.balanced_accuracy, 4),
                accuracy: round_to(evaluation.accuracy, 4),
            },
            confusion_matrix: ConfusionMatrixBlock {
                matrix: evaluation.confusion_matrix.clone(),
                labels: evaluation.labels.clone(),
            },
            per_class_metrics,
            training_time_seconds: round_to(training_time_secs, 2),
            pipeline_documentation: documentation,
        }
    }

    /// Parse a previously written report
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Write the report as pretty JSON, replacing any existing file.
///
/// Parent directories are not created.
pub fn write_report(path: &Path, report: &PipelineReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json).map_err(|e| {
        PipelineError::IoError(std::io::Error::new(
            e.kind(),
            format!("cannot write report to {}: {}", path.display(), e),
        ))
    })?;
    info!(path = %path.display(), "report written");
    Ok(())
}
