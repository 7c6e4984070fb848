//! Engine payload values
//!
//! The payload is the ordered bag of scalars, vectors and matrices handed to
//! the sampling engine. Serialization writes plain nested lists, which is
//! what engine data files expect.

use crate::data::{FloatArray, Matrix};

use indexmap::IndexMap;
use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};

/// Ordered payload handed to the sampling engine
pub type FitPayload = IndexMap<String, PayloadValue>;

/// A single payload entry
#[derive(Clone, Debug, PartialEq)]
pub enum PayloadValue {
    Int(i64),
    Real(f64),
    IntVec(Vec<i64>),
    RealVec(FloatArray),
    RealMat(Matrix),
}

impl PayloadValue {
    /// The scalar integer, if this is one
    pub fn as_int(&self) -> Option<i64> {
        match self {
            PayloadValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The scalar real, if this is one
    pub fn as_real(&self) -> Option<f64> {
        match self {
            PayloadValue::Real(v) => Some(*v),
            _ => None,
        }
    }

    /// The integer vector, if this is one
    pub fn as_int_vec(&self) -> Option<&[i64]> {
        match self {
            PayloadValue::IntVec(v) => Some(v),
            _ => None,
        }
    }

    /// The real vector, if this is one
    pub fn as_real_vec(&self) -> Option<&FloatArray> {
        match self {
            PayloadValue::RealVec(v) => Some(v),
            _ => None,
        }
    }

    /// The real matrix, if this is one
    pub fn as_real_mat(&self) -> Option<&Matrix> {
        match self {
            PayloadValue::RealMat(v) => Some(v),
            _ => None,
        }
    }
}

impl Serialize for PayloadValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            PayloadValue::Int(v) => serializer.serialize_i64(*v),
            PayloadValue::Real(v) => serializer.serialize_f64(*v),
            PayloadValue::IntVec(v) => v.serialize(serializer),
            PayloadValue::RealVec(v) => {
                let mut seq = serializer.serialize_seq(Some(v.len()))?;
                for value in v.iter() {
                    seq.serialize_element(value)?;
                }
                seq.end()
            }
            PayloadValue::RealMat(m) => {
                let mut seq = serializer.serialize_seq(Some(m.nrows()))?;
                for row in m.outer_iter() {
                    let row: Vec<f64> = row.to_vec();
                    seq.serialize_element(&row)?;
                }
                seq.end()
            }
        }
    }
}
