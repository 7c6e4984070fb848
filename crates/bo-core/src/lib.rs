//! # bo-core
//!
//! Tabular data and design-matrix assembly for Bayesian linear models.
//!
//! This crate provides the two layers everything else is built on: a typed
//! column/frame data layer (`data`) and the design layer (`design`) that
//! turns a model specification plus a data frame into the matrices and
//! prior-scale hyperparameters a sampling engine consumes.

pub mod data;
pub mod design;

pub use data::{DataFrame, DataFrameBuilder, Series};
pub use design::{
    AdditiveFormula, Design, FitPayload, GroupDesign, ModelKind, ModelMatrices, ModelSpec,
    NamedMatrix, PayloadValue,
};
