//! Sampling engine interface
//!
//! Everything this crate knows about the MCMC engine passes through the
//! [`Engine`] trait: one blocking call produces posterior draws, a second
//! re-scores existing draws through a generated-quantities program. The
//! engine declares its own column naming; downstream code treats names
//! ending in `__` as sampler diagnostics and everything else as model
//! output.

use std::fmt;
use std::path::{Path, PathBuf};

use ndarray::{Array3, ArrayView3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use bo_core::design::{FitPayload, ModelKind};

/// Errors reported by a sampling engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine ran but did not produce usable output
    #[error("Engine failed: {message}")]
    Failed {
        /// Engine-reported reason
        message: String,
    },

    /// The engine binary or its scratch space was unusable
    #[error("Engine I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for engine operations
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Configuration forwarded to the engine's sampling pass
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// RNG seed; `None` lets the engine pick one
    pub seed: Option<u64>,
    /// Number of independent chains
    pub chains: usize,
    /// Warmup iterations per chain, discarded
    pub warmup: usize,
    /// Post-warmup iterations kept per chain
    pub samples: usize,
    /// Maximum trajectory tree depth
    pub max_depth: usize,
    /// Target acceptance statistic for step size adaptation
    pub adapt_delta: f64,
    /// Engine installation to use; `None` relies on the engine's default
    pub engine_path: Option<PathBuf>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            seed: None,
            chains: 4,
            warmup: 1000,
            samples: 1000,
            max_depth: 10,
            adapt_delta: 0.8,
            engine_path: None,
        }
    }
}

/// Which generated-quantities program a [`Engine::generate`] call runs
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GenerateMode {
    /// Draw outcomes from the prior predictive distribution
    PredictPrior,
    /// Compute posterior expected values and posterior-predictive outcomes
    PredictPosterior,
    /// Compute the pointwise log-likelihood of the fitted data
    LogLikelihood,
}

impl fmt::Display for GenerateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GenerateMode::PredictPrior => "predict_prior",
            GenerateMode::PredictPosterior => "predict_posterior",
            GenerateMode::LogLikelihood => "log_likelihood",
        };
        write!(f, "{name}")
    }
}

/// Raw product of a sampling pass
#[derive(Clone, Debug)]
pub struct SampleOutput {
    /// Flat column names in engine order, diagnostics included
    pub names: Vec<String>,
    /// Draws shaped `[column][chain][draw]`
    pub values: Array3<f64>,
    /// Indices of the columns holding sampled model parameters, in the
    /// order a generated-quantities program expects them back
    pub parameter_columns: Vec<usize>,
}

/// Raw product of a generated-quantities pass
#[derive(Clone, Debug)]
pub struct GenerateOutput {
    /// Flat column names in engine order
    pub names: Vec<String>,
    /// Values shaped `[column][chain][draw]`
    pub values: Array3<f64>,
}

/// A Markov chain Monte Carlo engine.
///
/// Implementations run outside this crate (a subprocess, a linked
/// sampler, a test double). Both calls are blocking; `sample` may use
/// `scratch` for intermediate files and must not rely on it afterwards.
pub trait Engine {
    /// Run the sampling pass for a model of the given kind.
    fn sample(
        &mut self,
        kind: ModelKind,
        payload: &FitPayload,
        config: &SamplerConfig,
        scratch: &Path,
    ) -> EngineResult<SampleOutput>;

    /// Re-score existing parameter draws through a generated-quantities
    /// program. `draws` is shaped `[parameter][chain][draw]` with the
    /// parameters ordered as declared by [`SampleOutput::parameter_columns`].
    fn generate(
        &mut self,
        kind: ModelKind,
        mode: GenerateMode,
        payload: &FitPayload,
        draws: ArrayView3<'_, f64>,
        config: &SamplerConfig,
    ) -> EngineResult<GenerateOutput>;
}
