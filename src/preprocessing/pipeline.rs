//! Column-type aware preprocessing: standardize numerics, one-hot categoricals

use super::encoder::OneHotEncoder;
use super::scaler::StandardScaler;
use super::ColumnType;
use crate::error::{PipelineError, Result};
use ndarray::{concatenate, Array2, Axis};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// Unfitted preprocessor. Decides column roles from dtypes at fit time.
#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
    excluded_columns: Vec<String>,
}

impl Preprocessor {
    /// Create a new preprocessor
    pub fn new() -> Self {
        Self::default()
    }

    /// Leave these columns out of the feature matrix
    pub fn with_excluded_columns(mut self, columns: Vec<String>) -> Self {
        self.excluded_columns = columns;
        self
    }

    /// Detect the role of a column from its dtype
    pub fn column_type(dtype: &DataType) -> ColumnType {
        match dtype {
            DataType::String => ColumnType::Categorical,
            _ => ColumnType::Numeric,
        }
    }

    /// Fit scaling and vocabularies on the given rows only
    pub fn fit(&self, df: &DataFrame) -> Result<FittedTransform> {
        let start = Instant::now();

        let mut numeric_columns = Vec::new();
        let mut categorical_columns = Vec::new();
        for column in df.get_columns() {
            let name = column.name().to_string();
            if self.excluded_columns.contains(&name) {
                continue;
            }
            match Self::column_type(column.dtype()) {
                ColumnType::Numeric => numeric_columns.push(name),
                ColumnType::Categorical => categorical_columns.push(name),
            }
        }

        if numeric_columns.is_empty() && categorical_columns.is_empty() {
            return Err(PipelineError::PreprocessingError(
                "no feature columns to fit".to_string(),
            ));
        }

        let mut scaler = StandardScaler::new();
        scaler.fit(df, &numeric_columns)?;

        let mut encoder = OneHotEncoder::new();
        encoder.fit(df, &categorical_columns)?;

        let mut feature_names = numeric_columns.clone();
        feature_names.extend(encoder.feature_names());

        info!(
            numeric = numeric_columns.len(),
            categorical = categorical_columns.len(),
            features = feature_names.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "preprocessor fitted"
        );

        Ok(FittedTransform {
            numeric_columns,
            categorical_columns,
            scaler,
            encoder,
            feature_names,
        })
    }
}

/// Parameters learned from the training rows, applied unchanged to any row set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedTransform {
    numeric_columns: Vec<String>,
    categorical_columns: Vec<String>,
    scaler: StandardScaler,
    encoder: OneHotEncoder,
    feature_names: Vec<String>,
}

impl FittedTransform {
    /// Build the feature matrix: scaled numerics, then indicator blocks
    pub fn apply(&self, df: &DataFrame) -> Result<Array2<f64>> {
        let numeric = self.scaler.transform(df)?;
        let indicators = self.encoder.transform(df)?;

        let out = concatenate(Axis(1), &[numeric.view(), indicators.view()])?;
        debug!(rows = out.nrows(), cols = out.ncols(), "transform applied");
        Ok(out)
    }

    /// Output column names in matrix order
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn numeric_columns(&self) -> &[String] {
        &self.numeric_columns
    }

    pub fn categorical_columns(&self) -> &[String] {
        &self.categorical_columns
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn encoder(&self) -> &OneHotEncoder {
        &self.encoder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> DataFrame {
        df!(
            "age" => &[18.0, 20.0, 22.0, 24.0],
            "course" => &["b", "a", "b", "c"],
            "units" => &[1i64, 2, 3, 4]
        )
        .unwrap()
    }

    #[test]
    fn test_layout_numeric_then_indicators() {
        let fitted = Preprocessor::new().fit(&frame()).unwrap();

        assert_eq!(
            fitted.feature_names(),
            &["age", "units", "course_a", "course_b", "course_c"]
        );
        let x = fitted.apply(&frame()).unwrap();
        assert_eq!(x.dim(), (4, 5));
        assert_eq!(x.row(1).slice(ndarray::s![2..]).to_vec(), vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_excluded_columns() {
        let fitted = Preprocessor::new()
            .with_excluded_columns(vec!["course".to_string()])
            .fit(&frame())
            .unwrap();
        assert_eq!(fitted.feature_names(), &["age", "units"]);
        assert!(fitted.categorical_columns().is_empty());
    }

    #[test]
    fn test_apply_missing_column() {
        let fitted = Preprocessor::new().fit(&frame()).unwrap();
        let other = df!("age" => &[1.0]).unwrap();
        assert!(matches!(
            fitted.apply(&other),
            Err(PipelineError::FeatureNotFound(_))
        ));
    }

    #[test]
    fn test_no_columns_is_error() {
        let result = Preprocessor::new()
            .with_excluded_columns(vec!["a".to_string()])
            .fit(&df!("a" => &[1.0]).unwrap());
        assert!(matches!(result, Err(PipelineError::PreprocessingError(_))));
    }
}
