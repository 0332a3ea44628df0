//! Data loading utilities

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

/// Loader for delimited text tables with a header row.
///
/// The separator is fixed per deployment and never sniffed from the file.
#[derive(Debug, Clone)]
pub struct DataLoader {
    /// Field separator
    separator: u8,
    /// Rows used for schema inference
    infer_schema_length: usize,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new(b';')
    }
}

impl DataLoader {
    /// Create a new loader for the given separator
    pub fn new(separator: u8) -> Self {
        Self {
            separator,
            infer_schema_length: 10_000,
        }
    }

    /// Set the number of rows scanned for schema inference
    pub fn with_infer_schema_length(mut self, rows: usize) -> Self {
        self.infer_schema_length = rows.max(1);
        self
    }

    /// Field separator in use
    pub fn separator(&self) -> u8 {
        self.separator
    }

    /// Load a delimited file into a frame
    pub fn load_csv(&self, path: &Path) -> Result<DataFrame> {
        let file = File::open(path)
            .map_err(|e| PipelineError::DataError(format!("{}: {}", path.display(), e)))?;

        let parse_opts = CsvParseOptions::default().with_separator(self.separator);

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| PipelineError::DataError(format!("{}: {}", path.display(), e)))?;

        if df.height() == 0 {
            return Err(PipelineError::DataError(format!(
                "{}: table has no data rows",
                path.display()
            )));
        }

        Ok(df)
    }
}

/// Shape and class balance of a loaded table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub n_rows: usize,
    /// Columns other than the target
    pub n_features: usize,
    pub target_column: String,
    /// Rows per target value, sorted by value
    pub class_counts: BTreeMap<String, usize>,
    /// Null cells across the whole table
    pub missing_values: usize,
}

impl DatasetSummary {
    /// Summarize a frame around its target column
    pub fn from_frame(df: &DataFrame, target_column: &str) -> Result<Self> {
        let values = string_column(df, target_column)?;
        let mut class_counts = BTreeMap::new();
        for value in values.into_iter().flatten() {
            *class_counts.entry(value).or_insert(0usize) += 1;
        }

        let missing_values = df.get_columns().iter().map(|c| c.null_count()).sum();

        Ok(Self {
            n_rows: df.height(),
            n_features: df.width().saturating_sub(1),
            target_column: target_column.to_string(),
            class_counts,
            missing_values,
        })
    }

    /// Class share in percent, in class order
    pub fn class_percentages(&self) -> Vec<(String, f64)> {
        let total = self.n_rows.max(1) as f64;
        self.class_counts
            .iter()
            .map(|(name, &count)| (name.clone(), count as f64 * 100.0 / total))
            .collect()
    }
}

/// Read a column as `f64`, casting integer and boolean types.
///
/// Nulls come back as `None`.
pub fn numeric_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df
        .column(name)
        .map_err(|_| PipelineError::FeatureNotFound(name.to_string()))?;
    let casted = column
        .cast(&DataType::Float64)
        .map_err(|e| PipelineError::DataError(format!("column '{}': {}", name, e)))?;
    let values = casted
        .as_materialized_series()
        .f64()
        .map_err(|e| PipelineError::DataError(e.to_string()))?
        .into_iter()
        .collect();
    Ok(values)
}

/// Read a column as strings, casting non-string types
pub fn string_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df
        .column(name)
        .map_err(|_| PipelineError::FeatureNotFound(name.to_string()))?;
    let casted = column
        .cast(&DataType::String)
        .map_err(|e| PipelineError::DataError(format!("column '{}': {}", name, e)))?;
    let values = casted
        .as_materialized_series()
        .str()
        .map_err(|e| PipelineError::DataError(e.to_string()))?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect();
    Ok(values)
}

/// Select rows by position, in the given order
pub fn take_rows(df: &DataFrame, indices: &[usize]) -> Result<DataFrame> {
    let idx: Vec<IdxSize> = indices.iter().map(|&i| i as IdxSize).collect();
    let idx = IdxCa::from_vec("idx".into(), idx);
    df.take(&idx)
        .map_err(|e| PipelineError::DataError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_csv(separator: char) -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".csv")
            .tempfile()
            .unwrap();
        let s = separator;
        writeln!(file, "Age{s}Grade{s}Target").unwrap();
        writeln!(file, "19{s}12.5{s}Graduate").unwrap();
        writeln!(file, "23{s}{s}Dropout").unwrap();
        writeln!(file, "20{s}14.0{s}Enrolled").unwrap();
        writeln!(file, "18{s}13.1{s}Graduate").unwrap();
        file
    }

    #[test]
    fn test_load_semicolon_csv() {
        let file = create_test_csv(';');
        let df = DataLoader::new(b';').load_csv(file.path()).unwrap();

        assert_eq!(df.height(), 4);
        assert_eq!(df.width(), 3);
    }

    #[test]
    fn test_wrong_separator_yields_single_column() {
        let file = create_test_csv(';');
        let df = DataLoader::new(b',').load_csv(file.path()).unwrap();
        assert_eq!(df.width(), 1);
    }

    #[test]
    fn test_missing_file_is_error() {
        let result = DataLoader::default().load_csv(Path::new("/nonexistent/data.csv"));
        assert!(matches!(result, Err(PipelineError::DataError(_))));
    }

    #[test]
    fn test_dataset_summary() {
        let file = create_test_csv(';');
        let df = DataLoader::new(b';').load_csv(file.path()).unwrap();
        let summary = DatasetSummary::from_frame(&df, "Target").unwrap();

        assert_eq!(summary.n_rows, 4);
        assert_eq!(summary.n_features, 2);
        assert_eq!(summary.missing_values, 1);
        assert_eq!(summary.class_counts["Graduate"], 2);

        let pct = summary.class_percentages();
        assert_eq!(pct[0].0, "Dropout");
        assert!((pct[0].1 - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_summary_missing_target() {
        let df = df!("a" => &[1.0, 2.0]).unwrap();
        let result = DatasetSummary::from_frame(&df, "Target");
        assert!(matches!(result, Err(PipelineError::FeatureNotFound(_))));
    }

    #[test]
    fn test_numeric_column_casts_integers() {
        let df = df!("n" => &[1i64, 2, 3]).unwrap();
        let values = numeric_column(&df, "n").unwrap();
        assert_eq!(values, vec![Some(1.0), Some(2.0), Some(3.0)]);
    }

    #[test]
    fn test_take_rows_preserves_order() {
        let df = df!("a" => &[10i32, 20, 30, 40]).unwrap();
        let taken = take_rows(&df, &[3, 1]).unwrap();
        let values = numeric_column(&taken, "a").unwrap();
        assert_eq!(values, vec![Some(40.0), Some(20.0)]);
    }
}
