//! Persisted model state
//!
//! A fitted model serializes to the inputs that produced it plus the
//! raw engine output: specification, data, sampler configuration, one
//! full-precision text table per chain, and whatever derived quantities
//! had been computed. The design itself is not stored; decoding
//! re-derives it from the specification and data, so a state written by
//! one version stays readable as long as the design assembly agrees.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use bo_core::data::DataFrame;
use bo_core::design::ModelSpec;

use crate::draws::Draws;
use crate::engine::SamplerConfig;
use crate::error::Result;
use crate::model::DerivedKind;

/// Everything needed to rebuild a [`crate::model::Model`] without
/// rerunning the engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FittedState {
    /// Model specification the design was assembled from
    pub spec: ModelSpec,
    /// Data the model was fitted to
    pub data: DataFrame,
    /// Sampler configuration used for the fit
    pub config: SamplerConfig,
    /// One comma-separated draw table per chain, empty when the model
    /// was never sampled
    pub chains: Vec<String>,
    /// Engine-declared indices of the sampled parameter columns
    pub parameter_columns: Vec<usize>,
    /// Derived quantities computed before encoding
    pub generated: BTreeMap<DerivedKind, Draws>,
}

impl FittedState {
    /// Render the state as JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a state previously written by [`FittedState::to_json`].
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
