//! DataFrame implementation for tabular data
//!
//! A DataFrame is a 2-dimensional labeled data structure with columns of
//! potentially different types. Column order is insertion order and is
//! load-bearing: design matrices inherit it.

use super::*;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Main DataFrame structure
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataFrame {
    pub(crate) columns: IndexMap<String, Series>,
    pub(crate) nrows: usize,
}

impl DataFrame {
    /// Create DataFrame from columns
    pub fn from_columns<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Series)>,
        S: Into<String>,
    {
        let mut builder = DataFrameBuilder::new();

        for (name, series) in columns.into_iter() {
            builder = builder.with_column(name, series)?;
        }

        builder.build()
    }

    /// Get the shape of the DataFrame (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.columns.len())
    }

    /// Get the number of rows
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// Get the number of columns
    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    /// Get column names
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.keys().map(|k| k.as_str()).collect()
    }

    /// Get a reference to a column
    pub fn get_column(&self, name: &str) -> Option<&Series> {
        self.columns.get(name)
    }

    /// Check if column exists
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Add a new column
    pub fn with_column<S: Into<String>>(mut self, name: S, series: Series) -> Result<Self> {
        let name = name.into();

        if self.columns.contains_key(&name) {
            return Err(DataError::DuplicateColumn(name));
        }

        if !self.columns.is_empty() && series.len() != self.nrows {
            return Err(DataError::DimensionMismatch {
                expected: format!("{} rows", self.nrows),
                actual: format!("{} rows", series.len()),
            });
        }

        if self.columns.is_empty() {
            self.nrows = series.len();
        }

        self.columns.insert(name, series);

        Ok(self)
    }

    /// Rebuild the DataFrame from row indices, in the given order
    pub fn reorder_rows(&self, indices: &[usize]) -> Result<Self> {
        for &idx in indices {
            if idx >= self.nrows {
                return Err(DataError::IndexOutOfBounds {
                    index: idx,
                    len: self.nrows,
                });
            }
        }

        let mut builder = DataFrameBuilder::new();

        for (name, series) in &self.columns {
            let reordered = series.reorder(indices)?;
            builder = builder.with_column(name.clone(), reordered)?;
        }

        builder.build()
    }

    /// Coerce columns shared with a template frame to the template's dtypes.
    ///
    /// Columns the template does not have are kept unchanged; columns the
    /// template has but this frame lacks are not required here (the design
    /// layer reports them when a formula references one).
    pub fn cast_like(&self, template: &DataFrame) -> Result<Self> {
        let mut builder = DataFrameBuilder::new();

        for (name, series) in &self.columns {
            let cast = match template.get_column(name) {
                Some(target) => series.cast_like(target)?,
                None => series.clone(),
            };
            builder = builder.with_column(name.clone(), cast)?;
        }

        builder.build()
    }
}

impl std::fmt::Display for DataFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DataFrame({} rows × {} cols)", self.nrows, self.ncols())
    }
}
