//! Feature engineering module
//!
//! Derives per-student ratios and indicators from the semester, financial
//! and enrollment columns of the source table.

mod derived;

pub use derived::{safe_ratio, FeatureEngineer, SourceColumns, DERIVED_FEATURES};
