//! Series data structure for holding homogeneous data
//!
//! A Series is a one-dimensional array that can hold data of a specific type.
//! It's the building block of DataFrames.

use super::*;

use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// A Series is a typed, one-dimensional array of data
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Series {
    /// Floating point numbers (f64)
    Float(FloatArray),
    /// Integer numbers (i64)
    Int(IntArray),
    /// Boolean values
    Bool(BoolArray),
    /// String values
    String(StringArray),
    /// Categorical data (encoded as u32)
    Categorical(Array1<u32>, Vec<String>), // values, categories
}

impl Series {
    /// Create a new Float series
    pub fn float(data: impl Into<FloatArray>) -> Self {
        Series::Float(data.into())
    }

    /// Create a new Int series
    pub fn int(data: impl Into<IntArray>) -> Self {
        Series::Int(data.into())
    }

    /// Create a new Bool series
    pub fn bool(data: impl Into<BoolArray>) -> Self {
        Series::Bool(data.into())
    }

    /// Create a new String series
    pub fn string(data: impl Into<StringArray>) -> Self {
        Series::String(data.into())
    }

    /// Create a new Categorical series with lexically sorted categories
    pub fn categorical<T: AsRef<str>>(data: &[T]) -> Self {
        let categories: Vec<String> = data
            .iter()
            .map(|s| s.as_ref().to_string())
            .collect::<std::collections::HashSet<_>>()
            .into_iter()
            .collect();

        // Sort categories for consistent encoding
        let mut categories = categories;
        categories.sort();

        // Create mapping from category to code
        let category_map: std::collections::HashMap<String, u32> = categories
            .iter()
            .enumerate()
            .map(|(i, cat)| (cat.clone(), i as u32))
            .collect();

        // Encode data
        let encoded: Array1<u32> = data
            .iter()
            .map(|s| *category_map.get(s.as_ref()).unwrap())
            .collect();

        Series::Categorical(encoded, categories)
    }

    /// Encode string data against a fixed category list
    pub fn categorical_with<T: AsRef<str>>(data: &[T], categories: &[String]) -> Result<Self> {
        let encoded = encode_codes(data, categories)?;
        Ok(Series::Categorical(
            Array1::from(encoded),
            categories.to_vec(),
        ))
    }

    /// Get the length of the series
    pub fn len(&self) -> usize {
        match self {
            Series::Float(arr) => arr.len(),
            Series::Int(arr) => arr.len(),
            Series::Bool(arr) => arr.len(),
            Series::String(arr) => arr.len(),
            Series::Categorical(arr, _) => arr.len(),
        }
    }

    /// Check if the series is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the type name of the series
    pub fn dtype(&self) -> &'static str {
        match self {
            Series::Float(_) => "float64",
            Series::Int(_) => "int64",
            Series::Bool(_) => "bool",
            Series::String(_) => "string",
            Series::Categorical(_, _) => "categorical",
        }
    }

    /// Get a value at index
    pub fn get(&self, idx: usize) -> Option<SeriesValue> {
        if idx >= self.len() {
            return None;
        }

        match self {
            Series::Float(arr) => arr.get(idx).map(|&v| SeriesValue::Float(v)),
            Series::Int(arr) => arr.get(idx).map(|&v| SeriesValue::Int(v)),
            Series::Bool(arr) => arr.get(idx).map(|&v| SeriesValue::Bool(v)),
            Series::String(arr) => arr.get(idx).map(|v| SeriesValue::String(v.clone())),
            Series::Categorical(arr, cats) => arr
                .get(idx)
                .and_then(|&code| cats.get(code as usize))
                .map(|cat| SeriesValue::String(cat.clone())),
        }
    }

    /// Extract the float values of a numeric series
    pub fn float_values(&self) -> Result<FloatArray> {
        match self {
            Series::Float(arr) => Ok(arr.clone()),
            Series::Int(arr) => Ok(arr.iter().map(|&v| v as f64).collect()),
            Series::Bool(arr) => Ok(arr.iter().map(|&v| if v { 1.0 } else { 0.0 }).collect()),
            Series::Categorical(arr, _) => Ok(arr.iter().map(|&v| v as f64).collect()),
            Series::String(_) => Err(DataError::NonNumericData("string")),
        }
    }

    /// Convert to float series if possible
    pub fn to_float(&self) -> Result<Series> {
        Ok(Series::Float(self.float_values()?))
    }

    /// Compute mean of numeric series
    pub fn mean(&self) -> Result<f64> {
        match self {
            Series::Float(arr) => Ok(arr.mean().unwrap_or(f64::NAN)),
            Series::Int(arr) => Ok(arr.iter().map(|&v| v as f64).sum::<f64>() / arr.len() as f64),
            Series::Bool(arr) => {
                let sum: f64 = arr.iter().map(|&v| if v { 1.0 } else { 0.0 }).sum();
                Ok(sum / arr.len() as f64)
            }
            Series::Categorical(arr, _) => {
                let sum: f64 = arr.iter().map(|&v| v as f64).sum();
                Ok(sum / arr.len() as f64)
            }
            Series::String(_) => Err(DataError::NonNumericData("string")),
        }
    }

    /// Compute standard deviation
    pub fn std(&self, ddof: usize) -> Result<f64> {
        match self {
            Series::Float(arr) => Ok(arr.std(ddof as f64)),
            Series::Int(arr) => {
                let float_arr: FloatArray = arr.iter().map(|&v| v as f64).collect();
                Ok(float_arr.std(ddof as f64))
            }
            Series::Bool(arr) => {
                let float_arr: FloatArray =
                    arr.iter().map(|&v| if v { 1.0 } else { 0.0 }).collect();
                Ok(float_arr.std(ddof as f64))
            }
            Series::Categorical(arr, _) => {
                let float_arr: FloatArray = arr.iter().map(|&v| v as f64).collect();
                Ok(float_arr.std(ddof as f64))
            }
            Series::String(_) => Err(DataError::NonNumericData("string")),
        }
    }

    /// Coerce this series to the dtype of a template series.
    ///
    /// Int and Bool widen to Float; String data encodes against a
    /// categorical template's category list (unknown values are an error);
    /// categorical data re-encodes so codes always refer to the template's
    /// categories. Narrowing conversions are rejected.
    pub fn cast_like(&self, template: &Series) -> Result<Series> {
        match template {
            Series::Float(_) => match self {
                Series::Float(_) | Series::Int(_) | Series::Bool(_) => self.to_float(),
                other => Err(DataError::TypeMismatch {
                    expected: "float64",
                    actual: other.dtype(),
                }),
            },
            Series::Int(_) => match self {
                Series::Int(_) => Ok(self.clone()),
                other => Err(DataError::TypeMismatch {
                    expected: "int64",
                    actual: other.dtype(),
                }),
            },
            Series::Bool(_) => match self {
                Series::Bool(_) => Ok(self.clone()),
                other => Err(DataError::TypeMismatch {
                    expected: "bool",
                    actual: other.dtype(),
                }),
            },
            Series::String(_) => match self {
                Series::String(_) => Ok(self.clone()),
                Series::Categorical(_, _) => Ok(Series::String(self.to_strings()?)),
                other => Err(DataError::TypeMismatch {
                    expected: "string",
                    actual: other.dtype(),
                }),
            },
            Series::Categorical(_, categories) => match self {
                Series::String(_) | Series::Categorical(_, _) => {
                    Series::categorical_with(&self.to_strings()?, categories)
                }
                other => Err(DataError::TypeMismatch {
                    expected: "categorical",
                    actual: other.dtype(),
                }),
            },
        }
    }

    /// Decode a string-valued series into plain strings
    pub(crate) fn to_strings(&self) -> Result<Vec<String>> {
        match self {
            Series::String(arr) => Ok(arr.clone()),
            Series::Categorical(arr, cats) => arr
                .iter()
                .map(|&code| {
                    cats.get(code as usize)
                        .cloned()
                        .ok_or_else(|| DataError::UnknownCategory(code.to_string()))
                })
                .collect(),
            other => Err(DataError::TypeMismatch {
                expected: "string",
                actual: other.dtype(),
            }),
        }
    }

    /// Rebuild the series from row indices
    pub fn reorder(&self, indices: &[usize]) -> Result<Self> {
        if let Some(&bad) = indices.iter().find(|&&idx| idx >= self.len()) {
            return Err(DataError::IndexOutOfBounds {
                index: bad,
                len: self.len(),
            });
        }

        match self {
            Series::Float(arr) => Ok(Series::Float(indices.iter().map(|&i| arr[i]).collect())),
            Series::Int(arr) => Ok(Series::Int(indices.iter().map(|&i| arr[i]).collect())),
            Series::Bool(arr) => Ok(Series::Bool(indices.iter().map(|&i| arr[i]).collect())),
            Series::String(vec) => Ok(Series::String(
                indices.iter().map(|&i| vec[i].clone()).collect(),
            )),
            Series::Categorical(arr, cats) => Ok(Series::Categorical(
                indices.iter().map(|&i| arr[i]).collect(),
                cats.clone(),
            )),
        }
    }
}

/// Encode values against a fixed category list
pub(crate) fn encode_codes<T: AsRef<str>>(data: &[T], categories: &[String]) -> Result<Vec<u32>> {
    let category_map: std::collections::HashMap<&str, u32> = categories
        .iter()
        .enumerate()
        .map(|(i, cat)| (cat.as_str(), i as u32))
        .collect();

    data.iter()
        .map(|s| {
            category_map
                .get(s.as_ref())
                .copied()
                .ok_or_else(|| DataError::UnknownCategory(s.as_ref().to_string()))
        })
        .collect()
}

/// Enum for type-safe value access
#[derive(Debug, Clone, PartialEq)]
pub enum SeriesValue {
    Float(f64),
    Int(i64),
    Bool(bool),
    String(String),
}
