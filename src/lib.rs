//! Student outcome classification pipeline
//!
//! Loads a table of student records, derives academic and financial
//! indicators, trains a Dropout / Enrolled / Graduate classifier and writes a
//! JSON evaluation report.
//!
//! # Modules
//!
//! ## Data
//! - [`utils`] - CSV loading, column access, dataset summary
//! - [`feature_engineering`] - Derived approval rates, grades, financial stress
//! - [`preprocessing`] - Target encoding, standardization, one-hot encoding
//!
//! ## Models
//! - [`training`] - Stratified splits, decision trees, random forest,
//!   gradient boosting, grid search and the training engine
//! - [`ensemble`] - Soft voting
//! - [`evaluation`] - Confusion matrix and classification metrics
//!
//! ## Orchestration
//! - [`pipeline`] - Configuration, presets and the end-to-end run
//! - [`report`] - JSON report and generated documentation
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Data
pub mod feature_engineering;
pub mod preprocessing;
pub mod utils;

// Models
pub mod ensemble;
pub mod evaluation;
pub mod training;

// Orchestration
pub mod cli;
pub mod pipeline;
pub mod report;

pub use error::{PipelineError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{PipelineError, Result};
    pub use crate::evaluation::EvaluationReport;
    pub use crate::feature_engineering::{FeatureEngineer, SourceColumns};
    pub use crate::pipeline::{Pipeline, PipelineConfig, RunOutcome, Variant};
    pub use crate::preprocessing::{FittedTransform, LabelEncoder, Preprocessor};
    pub use crate::report::PipelineReport;
    pub use crate::training::{
        Classifier, EstimatorSpec, GradientBoostingParams, ModelSpec, ParamGrid, ParamValue,
        RandomForestParams, Trainer,
    };
    pub use crate::utils::{DataLoader, DatasetSummary};
}
