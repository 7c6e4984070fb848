//! # bo-models
//!
//! Bayesian linear models around an external MCMC engine.
//!
//! The sampler itself lives behind the [`engine::Engine`] trait; this crate
//! owns everything around it: assembling the engine payload from a model
//! specification, mapping the engine's flat parameter names back onto
//! structured coefficient names, partitioning draws from diagnostics,
//! memoizing derived posterior quantities, and persisting fitted models.

pub mod draws;
pub mod engine;
pub mod error;
pub mod model;

pub use draws::{ChainDiagnostics, Draws, FitSummary, ParameterIndex, ParameterSummary, SampleSet};
pub use engine::{
    Engine, EngineError, EngineResult, GenerateMode, GenerateOutput, SampleOutput, SamplerConfig,
};
pub use error::{ModelError, Result};
pub use model::{DerivedKind, FittedState, Model, fit};
