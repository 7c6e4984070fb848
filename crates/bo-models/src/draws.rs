//! Posterior draw bookkeeping
//!
//! The engine hands back a flat table of draws whose columns carry
//! engine-internal names (`alpha_c`, `beta.2`, `Beta.1.3`, `lp__`).
//! This module partitions those columns into sampler diagnostics and
//! model parameters, resolves the internal names back onto the names
//! the model was specified with, and computes per-parameter summary
//! statistics.

mod mapper;
mod samples;
mod stats;

#[cfg(test)]
mod tests;

pub use mapper::ParameterIndex;
pub use samples::{Draws, SampleSet};
pub use stats::{ChainDiagnostics, FitSummary, ParameterSummary};

pub(crate) use stats::{hmc_diagnostics, r_squared, summarize};
