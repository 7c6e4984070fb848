//! Model specification and design-matrix assembly
//!
//! This module turns a model specification (one or more formulas, optionally
//! a grouping structure) and a DataFrame into the design matrices and the
//! engine payload: outcome and predictor matrices with stable column names,
//! plus the data-derived prior-scale hyperparameters.

use crate::data::DataError;

mod assembler;
mod formula;
mod matrix;
mod payload;
mod spec;

#[cfg(test)]
mod tests;

// Re-exports
pub use assembler::{Design, GroupDesign, NewPredictors};
pub use formula::{AdditiveFormula, ModelMatrices};
pub use matrix::{INTERCEPT, NamedMatrix};
pub use payload::{FitPayload, PayloadValue};
pub use spec::{ModelKind, ModelSpec};

/// Errors raised while assembling a design
#[derive(thiserror::Error, Debug)]
pub enum DesignError {
    /// The formula string could not be understood
    #[error("Malformed formula '{formula}': {message}")]
    Malformed { formula: String, message: String },

    /// Variable not found in the DataFrame
    #[error("Variable '{variable}' not found in data. Available columns: {available:?}")]
    VariableNotFound {
        variable: String,
        available: Vec<String>,
    },

    /// Variable type mismatch
    #[error("Variable '{variable}' has type {actual}, but {expected} was expected")]
    TypeMismatch {
        variable: String,
        expected: &'static str,
        actual: String,
    },

    /// The specification itself is inconsistent
    #[error("Invalid model specification: {0}")]
    InvalidSpec(String),

    /// New data produced a different predictor layout than the fit
    #[error("New data produced predictor columns {actual:?}, expected {expected:?}")]
    PredictorMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    /// Matrix construction failed
    #[error("Failed to assemble design matrix: {0}")]
    Assembly(String),

    /// Data-related errors that bubble up from the data layer
    #[error("Data error in design assembly: {0}")]
    Data(#[from] DataError),
}

impl DesignError {
    /// Create a malformed-formula error
    pub fn malformed(formula: &str, message: impl Into<String>) -> Self {
        DesignError::Malformed {
            formula: formula.to_string(),
            message: message.into(),
        }
    }

    /// Create a variable-not-found error
    pub fn variable_not_found(variable: &str, available: &[&str]) -> Self {
        DesignError::VariableNotFound {
            variable: variable.to_string(),
            available: available.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Result type alias for design operations
pub type Result<T> = std::result::Result<T, DesignError>;
