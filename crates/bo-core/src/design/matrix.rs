//! Named design matrices

use super::*;
use crate::data::Matrix;

use serde::{Deserialize, Serialize};

/// Name of the implicit intercept column in predictor matrices
pub const INTERCEPT: &str = "Intercept";

/// A matrix with a stable, ordered name per column
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NamedMatrix {
    names: Vec<String>,
    values: Matrix,
}

impl NamedMatrix {
    /// Create a named matrix; names must match the column count
    pub fn new(names: Vec<String>, values: Matrix) -> Result<Self> {
        if names.len() != values.ncols() {
            return Err(DesignError::Assembly(format!(
                "{} column names for a {}-column matrix",
                names.len(),
                values.ncols()
            )));
        }
        Ok(Self { names, values })
    }

    /// Number of rows
    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    /// Number of columns
    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }

    /// Ordered column names
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// The values as a dense matrix
    pub fn values(&self) -> &Matrix {
        &self.values
    }

    /// One column by position
    pub fn column(&self, idx: usize) -> ndarray::ArrayView1<'_, f64> {
        self.values.column(idx)
    }

    /// Columns that are coefficients rather than intercepts, with positions.
    ///
    /// Intercept columns are recognized by prefix, so a centered intercept
    /// stays excluded as well.
    pub fn coefficient_columns(&self) -> impl Iterator<Item = (usize, &str)> {
        self.names
            .iter()
            .enumerate()
            .filter(|(_, name)| !name.starts_with(INTERCEPT))
            .map(|(idx, name)| (idx, name.as_str()))
    }
}
