//! Data preprocessing module
//!
//! Provides the train-only fitted transforms used before model fitting:
//! - Standard scaling of numeric columns
//! - One-hot encoding of string columns (unseen categories ignored)
//! - Label encoding of the target column

mod encoder;
mod pipeline;
mod scaler;

pub use encoder::{LabelEncoder, OneHotEncoder};
pub use pipeline::{FittedTransform, Preprocessor};
pub use scaler::{ScalerParams, StandardScaler};

use serde::{Deserialize, Serialize};

/// Column role for preprocessing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Numeric,
    Categorical,
}
