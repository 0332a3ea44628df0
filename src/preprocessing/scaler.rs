//! Standard scaling of numeric columns

use crate::error::{PipelineError, Result};
use crate::utils::data_loader::numeric_column;
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Parameters for one fitted column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    /// Column mean over the fit rows
    pub center: f64,
    /// Population standard deviation, 1.0 when the column is constant
    pub scale: f64,
}

impl ScalerParams {
    /// Estimate mean and population std, skipping nulls and non-finite values
    pub fn estimate(values: &[Option<f64>]) -> Self {
        let observed: Vec<f64> = values
            .iter()
            .filter_map(|v| *v)
            .filter(|v| v.is_finite())
            .collect();

        if observed.is_empty() {
            return Self { center: 0.0, scale: 1.0 };
        }

        let n = observed.len() as f64;
        let mean = observed.iter().sum::<f64>() / n;
        let var = observed.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = var.sqrt();

        Self {
            center: mean,
            scale: if std == 0.0 { 1.0 } else { std },
        }
    }

    /// Scale one value; missing values land on the mean
    #[inline]
    pub fn apply(&self, value: Option<f64>) -> f64 {
        match value {
            Some(v) if v.is_finite() => (v - self.center) / self.scale,
            _ => 0.0,
        }
    }
}

/// Z-score scaler over a fixed list of columns
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StandardScaler {
    params: Vec<(String, ScalerParams)>,
    is_fitted: bool,
}

impl StandardScaler {
    /// Create a new scaler
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit the scaler to the given columns
    pub fn fit(&mut self, df: &DataFrame, columns: &[String]) -> Result<&mut Self> {
        let mut params = Vec::with_capacity(columns.len());
        for name in columns {
            let values = numeric_column(df, name)?;
            let fitted = ScalerParams::estimate(&values);
            if fitted.scale == 1.0 && values.iter().flatten().all(|v| *v == fitted.center) {
                warn!(column = %name, "constant column, scale set to 1");
            }
            params.push((name.clone(), fitted));
        }

        self.params = params;
        self.is_fitted = true;
        Ok(self)
    }

    /// Scale the fitted columns of `df`, one output column per fitted column
    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(PipelineError::ModelNotFitted);
        }

        let mut out = Array2::zeros((df.height(), self.params.len()));
        for (j, (name, params)) in self.params.iter().enumerate() {
            let values = numeric_column(df, name)?;
            for (i, v) in values.into_iter().enumerate() {
                out[[i, j]] = params.apply(v);
            }
        }
        Ok(out)
    }

    /// Fitted parameters for a column
    pub fn params(&self, column: &str) -> Option<&ScalerParams> {
        self.params
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, p)| p)
    }

    /// Fitted column names in output order
    pub fn columns(&self) -> Vec<String> {
        self.params.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }
}
