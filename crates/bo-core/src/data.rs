//! Core data structures for BayesOxide
//!
//! This module provides the tabular data layer that model fitting is built
//! on: typed columns, insertion-ordered frames and the dtype coercions
//! needed when scoring new data against a fitted design.

mod builder;
mod dataframe;
mod series;


// Re-exports
pub use builder::DataFrameBuilder;
pub use dataframe::DataFrame;
pub(crate) use series::encode_codes;
pub use series::{Series, SeriesValue};

// Type aliases for common use cases
pub type FloatArray = ndarray::Array1<f64>;
pub type IntArray = ndarray::Array1<i64>;
pub type BoolArray = ndarray::Array1<bool>;
pub type StringArray = Vec<String>;
pub type Matrix = ndarray::Array2<f64>;

/// Error types specific to data operations
#[derive(thiserror::Error, Debug)]
pub enum DataError {
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: String, actual: String },

    #[error("Column '{0}' not found")]
    ColumnNotFound(String),

    #[error("Index out of bounds: index {index}, length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("Invalid column type: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Duplicate column name: {0}")]
    DuplicateColumn(String),

    #[error("Operation requires numeric data, got {0}")]
    NonNumericData(&'static str),

    #[error("Unknown category '{0}'")]
    UnknownCategory(String),
}

/// Result type for data operations
pub type Result<T> = std::result::Result<T, DataError>;
