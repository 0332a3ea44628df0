//! Pipeline orchestration
//!
//! Strictly sequential: load → engineer → split → preprocess → train →
//! evaluate → report.

mod config;
mod runner;

pub use config::{PipelineConfig, Variant};
pub use runner::{Pipeline, RunOutcome};
