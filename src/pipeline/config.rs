//! Pipeline configuration

use crate::error::{PipelineError, Result};
use crate::feature_engineering::SourceColumns;
use crate::training::{
    ClassWeight, EstimatorSpec, GradientBoostingParams, ModelSpec, ParamGrid, ParamValue,
    RandomForestParams,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Built-in model setups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Variant {
    /// Soft voting of a balanced random forest and gradient boosting
    Ensemble,
    /// Random forest tuned by 3-fold grid search on macro F1
    GridSearch,
    /// Balanced random forest with default hyperparameters
    Baseline,
}

impl Variant {
    pub fn model_spec(&self) -> ModelSpec {
        match self {
            Variant::Ensemble => ModelSpec::SoftVoting {
                estimators: vec![
                    EstimatorSpec::RandomForest(RandomForestParams {
                        n_estimators: 200,
                        max_depth: Some(15),
                        min_samples_split: 5,
                        min_samples_leaf: 2,
                        class_weight: ClassWeight::Balanced,
                        ..Default::default()
                    }),
                    EstimatorSpec::GradientBoosting(GradientBoostingParams {
                        n_estimators: 150,
                        max_depth: Some(6),
                        learning_rate: 0.1,
                        min_samples_split: 5,
                        min_samples_leaf: 2,
                        ..Default::default()
                    }),
                ],
                weights: None,
            },
            Variant::GridSearch => ModelSpec::GridSearch {
                estimator: EstimatorSpec::RandomForest(RandomForestParams::default()),
                grid: ParamGrid::new()
                    .add("n_estimators", vec![ParamValue::Int(100), ParamValue::Int(200)])
                    .add(
                        "max_depth",
                        vec![ParamValue::Int(10), ParamValue::Int(20), ParamValue::None],
                    )
                    .add("min_samples_split", vec![ParamValue::Int(2), ParamValue::Int(5)]),
                cv_folds: 3,
            },
            Variant::Baseline => ModelSpec::Single {
                estimator: EstimatorSpec::RandomForest(RandomForestParams {
                    class_weight: ClassWeight::Balanced,
                    ..Default::default()
                }),
            },
        }
    }
}

/// Configuration for one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Input table
    pub data_path: PathBuf,

    /// Report destination, overwritten on every run
    pub output_path: PathBuf,

    /// Field separator of the input table
    pub separator: char,

    /// Name of the outcome column
    pub target_column: String,

    /// Share of rows held out for evaluation
    pub test_fraction: f64,

    /// Seed for the split, folds and every model
    pub random_state: u64,

    /// Append the derived academic and financial columns
    pub feature_engineering: bool,

    /// Typical age at enrollment used by `age_deviation`
    pub reference_age: f64,

    pub source_columns: SourceColumns,

    pub model: ModelSpec,

    /// Columns never used as features
    pub excluded_columns: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("data.csv"),
            output_path: PathBuf::from("result.json"),
            separator: ';',
            target_column: "Target".to_string(),
            test_fraction: 0.2,
            random_state: 42,
            feature_engineering: true,
            reference_age: 19.0,
            source_columns: SourceColumns::default(),
            model: Variant::Ensemble.model_spec(),
            excluded_columns: Vec::new(),
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON file; absent fields take their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            PipelineError::ConfigError(format!("invalid config {}: {}", path.display(), e))
        })
    }

    pub fn with_data_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_path = path.into();
        self
    }

    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = path.into();
        self
    }

    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    pub fn with_target_column(mut self, name: &str) -> Self {
        self.target_column = name.to_string();
        self
    }

    pub fn with_test_fraction(mut self, fraction: f64) -> Self {
        self.test_fraction = fraction;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_feature_engineering(mut self, enabled: bool) -> Self {
        self.feature_engineering = enabled;
        self
    }

    pub fn with_reference_age(mut self, age: f64) -> Self {
        self.reference_age = age;
        self
    }

    pub fn with_source_columns(mut self, columns: SourceColumns) -> Self {
        self.source_columns = columns;
        self
    }

    pub fn with_model(mut self, model: ModelSpec) -> Self {
        self.model = model;
        self
    }

    /// Use one of the built-in model setups
    pub fn with_variant(mut self, variant: Variant) -> Self {
        self.model = variant.model_spec();
        self
    }

    pub fn with_excluded_columns(mut self, columns: Vec<String>) -> Self {
        self.excluded_columns = columns;
        self
    }

    /// Separator as the single byte the CSV reader expects
    pub fn separator_byte(&self) -> Result<u8> {
        u8::try_from(self.separator)
            .ok()
            .filter(|b| b.is_ascii())
            .ok_or_else(|| {
                PipelineError::ConfigError(format!(
                    "separator {:?} is not a single ASCII character",
                    self.separator
                ))
            })
    }

    /// Check the configuration before any data is read
    pub fn validate(&self) -> Result<()> {
        self.separator_byte()?;
        if self.target_column.trim().is_empty() {
            return Err(PipelineError::ConfigError(
                "target_column must be named".to_string(),
            ));
        }
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(PipelineError::ConfigError(format!(
                "test_fraction must be in (0, 1), got {}",
                self.test_fraction
            )));
        }
        if !self.reference_age.is_finite() {
            return Err(PipelineError::ConfigError(
                "reference_age must be finite".to_string(),
            ));
        }
        if self.excluded_columns.contains(&self.target_column) {
            return Err(PipelineError::ConfigError(format!(
                "target column '{}' cannot be excluded",
                self.target_column
            )));
        }
        self.model.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.separator, ';');
        assert_eq!(config.target_column, "Target");
        assert_eq!(config.test_fraction, 0.2);
        assert_eq!(config.random_state, 42);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = PipelineConfig::new()
            .with_separator(',')
            .with_random_state(7)
            .with_variant(Variant::Baseline)
            .with_feature_engineering(false);

        assert_eq!(config.separator_byte().unwrap(), b',');
        assert_eq!(config.random_state, 7);
        assert!(matches!(config.model, ModelSpec::Single { .. }));
        assert!(!config.feature_engineering);
    }

    #[test]
    fn test_invalid_values() {
        assert!(PipelineConfig::new().with_test_fraction(1.0).validate().is_err());
        assert!(PipelineConfig::new().with_test_fraction(0.0).validate().is_err());
        assert!(PipelineConfig::new().with_separator('é').validate().is_err());
        assert!(PipelineConfig::new().with_target_column(" ").validate().is_err());
        assert!(PipelineConfig::new()
            .with_excluded_columns(vec!["Target".to_string()])
            .validate()
            .is_err());
    }

    #[test]
    fn test_presets_validate() {
        for variant in [Variant::Ensemble, Variant::GridSearch, Variant::Baseline] {
            assert!(variant.model_spec().validate().is_ok(), "{:?}", variant);
        }
        match Variant::GridSearch.model_spec() {
            ModelSpec::GridSearch { grid, cv_folds, .. } => {
                assert_eq!(grid.n_candidates(), 12);
                assert_eq!(cv_folds, 3);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_partial_json() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(
            file.path(),
            r#"{"separator": ",", "random_state": 3, "model": {"kind": "single", "estimator": {"type": "random_forest", "n_estimators": 10}}}"#,
        )
        .unwrap();

        let config = PipelineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.separator, ',');
        assert_eq!(config.random_state, 3);
        assert_eq!(config.target_column, "Target");
        match config.model {
            ModelSpec::Single {
                estimator: EstimatorSpec::RandomForest(p),
            } => assert_eq!(p.n_estimators, 10),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_missing_file() {
        let result = PipelineConfig::from_json_file(Path::new("/nonexistent/config.json"));
        assert!(matches!(result, Err(PipelineError::ConfigError(_))));
    }
}
