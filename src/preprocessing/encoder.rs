//! Categorical encoding: target labels and one-hot indicators

use crate::error::{PipelineError, Result};
use crate::utils::data_loader::string_column;
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::warn;

/// Maps class label strings to dense indices `0..k` in ascending label order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Create an unfitted encoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Learn the sorted distinct labels. A null label is an error.
    pub fn fit(&mut self, values: &[Option<String>]) -> Result<&mut Self> {
        let mut distinct = BTreeSet::new();
        for (row, value) in values.iter().enumerate() {
            match value {
                Some(v) => {
                    distinct.insert(v.clone());
                }
                None => {
                    return Err(PipelineError::DataError(format!(
                        "missing target label at row {}",
                        row
                    )))
                }
            }
        }

        if distinct.is_empty() {
            return Err(PipelineError::DataError("target column is empty".to_string()));
        }

        self.classes = distinct.into_iter().collect();
        Ok(self)
    }

    /// Encode labels to class indices
    pub fn transform(&self, values: &[Option<String>]) -> Result<Array1<usize>> {
        if self.classes.is_empty() {
            return Err(PipelineError::ModelNotFitted);
        }

        let lookup: HashMap<&str, usize> = self
            .classes
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();

        values
            .iter()
            .enumerate()
            .map(|(row, v)| {
                v.as_deref()
                    .and_then(|label| lookup.get(label).copied())
                    .ok_or_else(|| {
                        PipelineError::DataError(format!(
                            "unknown or missing target label {:?} at row {}",
                            v, row
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()
            .map(Array1::from_vec)
    }

    /// Fit and encode in one step
    pub fn fit_transform(&mut self, values: &[Option<String>]) -> Result<Array1<usize>> {
        self.fit(values)?;
        self.transform(values)
    }

    /// Label for a class index
    pub fn inverse_transform(&self, index: usize) -> Option<&str> {
        self.classes.get(index).map(String::as_str)
    }

    /// Labels in index order
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }
}

/// One-hot encoder with a sorted vocabulary per column.
///
/// Values outside the vocabulary, and nulls, encode to all-zero indicators.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OneHotEncoder {
    vocabularies: Vec<(String, Vec<String>)>,
    is_fitted: bool,
}

impl OneHotEncoder {
    /// Create a new encoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit the encoder to the given columns
    pub fn fit(&mut self, df: &DataFrame, columns: &[String]) -> Result<&mut Self> {
        let mut vocabularies = Vec::with_capacity(columns.len());
        for name in columns {
            let values = string_column(df, name)?;
            let vocab: BTreeSet<String> = values.into_iter().flatten().collect();
            vocabularies.push((name.clone(), vocab.into_iter().collect()));
        }

        self.vocabularies = vocabularies;
        self.is_fitted = true;
        Ok(self)
    }

    /// Emit indicator columns, grouped by source column in fit order
    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(PipelineError::ModelNotFitted);
        }

        let mut out = Array2::zeros((df.height(), self.n_outputs()));
        let mut offset = 0;
        for (name, vocab) in &self.vocabularies {
            let values = string_column(df, name)?;
            let mut unseen = 0usize;
            for (i, value) in values.iter().enumerate() {
                let Some(value) = value else { continue };
                match vocab.binary_search(value) {
                    Ok(pos) => out[[i, offset + pos]] = 1.0,
                    Err(_) => unseen += 1,
                }
            }
            if unseen > 0 {
                warn!(column = %name, rows = unseen, "unseen categories encoded as all-zero");
            }
            offset += vocab.len();
        }
        Ok(out)
    }

    /// Total number of indicator columns
    pub fn n_outputs(&self) -> usize {
        self.vocabularies.iter().map(|(_, v)| v.len()).sum()
    }

    /// Indicator names as `<column>_<value>`
    pub fn feature_names(&self) -> Vec<String> {
        self.vocabularies
            .iter()
            .flat_map(|(name, vocab)| vocab.iter().map(move |v| format!("{}_{}", name, v)))
            .collect()
    }

    /// Vocabulary for a column
    pub fn vocabulary(&self, column: &str) -> Option<&[String]> {
        self.vocabularies
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, v)| v.as_slice())
    }

    /// Fitted column names
    pub fn columns(&self) -> Vec<String> {
        self.vocabularies.iter().map(|(name, _)| name.clone()).collect()
    }
}
