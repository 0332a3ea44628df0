//! Utility functions and types

pub mod data_loader;

pub use data_loader::{numeric_column, string_column, take_rows, DataLoader, DatasetSummary};

/// Round to a fixed number of decimals
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
