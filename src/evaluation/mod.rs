//! Model evaluation
//!
//! Confusion matrix, per-class precision/recall/F1 and the macro, weighted
//! and balanced aggregates.

mod metrics;

pub use metrics::{confusion_matrix, macro_f1_score, per_class_metrics, ClassMetrics, EvaluationReport};
