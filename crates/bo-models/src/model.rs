//! Model facade
//!
//! [`Model`] ties the pieces together: it assembles the design when
//! constructed, drives the engine's sampling pass, partitions and
//! renames the returned draws, memoizes derived quantities, and
//! persists the whole fit as a [`FittedState`].

mod quantities;
mod state;


pub use quantities::DerivedKind;
pub use state::FittedState;

use std::fmt;

use tempfile::TempDir;

use bo_core::data::{DataFrame, FloatArray};
use bo_core::design::{AdditiveFormula, Design, ModelKind, ModelMatrices, ModelSpec};

use crate::draws::{
    ChainDiagnostics, Draws, FitSummary, ParameterIndex, SampleSet, hmc_diagnostics, r_squared,
    summarize,
};
use crate::engine::{Engine, EngineError, GenerateMode, SamplerConfig};
use crate::error::{ModelError, Result};
use crate::model::quantities::QuantityCache;

/// Percentiles reported by [`Model::summary`].
const DEFAULT_PERCENTILES: [f64; 3] = [5.0, 50.0, 95.0];

/// Fit a model with the default sampler configuration.
pub fn fit(spec: ModelSpec, data: DataFrame, engine: Box<dyn Engine>) -> Result<Model> {
    let mut model = Model::new(spec, data, SamplerConfig::default(), engine)?;
    model.sample()?;
    Ok(model)
}

/// A Bayesian linear model bound to its data and an engine.
///
/// The design is assembled up front, so specification and data errors
/// surface at construction. Draws only exist after a successful
/// [`Model::sample`]; a failed resampling keeps the previous draws.
pub struct Model {
    spec: ModelSpec,
    data: DataFrame,
    config: SamplerConfig,
    matrices: Box<dyn ModelMatrices>,
    engine: Box<dyn Engine>,
    design: Design,
    index: ParameterIndex,
    samples: Option<SampleSet>,
    generated: QuantityCache,
}

impl fmt::Debug for Model {
    // Engine and formula evaluator are trait objects; report the model
    // structure and fit state instead.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("spec", &self.spec)
            .field("kind", &self.design.kind())
            .field("config", &self.config)
            .field("sampled", &self.samples.is_some())
            .field("cached", &self.generated.entries().keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Model {
    /// Build a model over the default additive formula evaluator.
    pub fn new(
        spec: ModelSpec,
        data: DataFrame,
        config: SamplerConfig,
        engine: Box<dyn Engine>,
    ) -> Result<Self> {
        Self::with_matrices(spec, data, config, engine, Box::new(AdditiveFormula))
    }

    /// Build a model with a caller-supplied formula evaluator.
    pub fn with_matrices(
        spec: ModelSpec,
        data: DataFrame,
        config: SamplerConfig,
        engine: Box<dyn Engine>,
        matrices: Box<dyn ModelMatrices>,
    ) -> Result<Self> {
        let design = Design::from_spec(&spec, &data, matrices.as_ref())?;
        let index = ParameterIndex::new(&design);
        Ok(Self {
            spec,
            data,
            config,
            matrices,
            engine,
            design,
            index,
            samples: None,
            generated: QuantityCache::default(),
        })
    }

    /// Rebuild a model from a persisted state without rerunning the
    /// engine.
    pub fn decode(state: FittedState, engine: Box<dyn Engine>) -> Result<Self> {
        Self::decode_with_matrices(state, engine, Box::new(AdditiveFormula))
    }

    /// Rebuild a persisted model with a caller-supplied formula
    /// evaluator.
    pub fn decode_with_matrices(
        state: FittedState,
        engine: Box<dyn Engine>,
        matrices: Box<dyn ModelMatrices>,
    ) -> Result<Self> {
        let design = Design::from_spec(&state.spec, &state.data, matrices.as_ref())?;
        let index = ParameterIndex::new(&design);
        let samples = if state.chains.is_empty() {
            None
        } else {
            Some(SampleSet::from_chain_tables(
                &state.chains,
                state.parameter_columns,
                &index,
            )?)
        };
        log::debug!(
            "decoded {} model state ({} chains, {} derived quantities)",
            design.kind(),
            samples.as_ref().map_or(0, SampleSet::chains),
            state.generated.len()
        );
        Ok(Self {
            spec: state.spec,
            data: state.data,
            config: state.config,
            matrices,
            engine,
            design,
            index,
            samples,
            generated: QuantityCache::restore(state.generated),
        })
    }

    /// The model specification.
    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    /// The data the model is bound to.
    pub fn data(&self) -> &DataFrame {
        &self.data
    }

    /// The sampler configuration.
    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// The assembled design.
    pub fn design(&self) -> &Design {
        &self.design
    }

    /// The draws of the last successful sampling pass, if any.
    pub fn samples(&self) -> Option<&SampleSet> {
        self.samples.as_ref()
    }

    fn sampled(&self) -> Result<&SampleSet> {
        self.samples.as_ref().ok_or(ModelError::NotSampled)
    }

    /// Run the engine's sampling pass.
    ///
    /// On success the previous draws and every cached derived quantity
    /// are replaced; on failure both are left as they were.
    pub fn sample(&mut self) -> Result<()> {
        let scratch = TempDir::with_prefix("bo-engine-").map_err(EngineError::from)?;
        log::debug!(
            "sampling {} model: {} chains x {} draws",
            self.design.kind(),
            self.config.chains,
            self.config.samples
        );
        let output = self.engine.sample(
            self.design.kind(),
            self.design.payload(),
            &self.config,
            scratch.path(),
        )?;
        let samples = SampleSet::from_output(output, &self.index, Some(scratch))?;
        self.samples = Some(samples);
        self.generated.clear();
        Ok(())
    }

    /// Model parameter draws under their resolved names.
    pub fn draws(&self) -> Result<&Draws> {
        Ok(self.sampled()?.draws())
    }

    /// Sampler diagnostic draws under their engine names.
    pub fn diagnostics(&self) -> Result<&Draws> {
        Ok(self.sampled()?.diagnostics())
    }

    /// Per-parameter summary at the default percentiles.
    pub fn summary(&self) -> Result<FitSummary> {
        self.summary_percentiles(&DEFAULT_PERCENTILES)
    }

    /// Per-parameter summary at caller-chosen percentiles.
    pub fn summary_percentiles(&self, percentiles: &[f64]) -> Result<FitSummary> {
        let samples = self.sampled()?;
        Ok(summarize(samples.draws(), samples.chains(), percentiles))
    }

    /// Per-chain sampler health counters.
    pub fn hmc_diagnostics(&self) -> Result<Vec<ChainDiagnostics>> {
        let samples = self.sampled()?;
        Ok(hmc_diagnostics(
            samples.diagnostics(),
            samples.chains(),
            self.config.max_depth,
        ))
    }

    /// Outcomes drawn from the prior predictive distribution.
    pub fn prior_predict(&mut self) -> Result<&Draws> {
        self.ensure(DerivedKind::PriorPredict)
    }

    /// Posterior expected value of the outcome per observation.
    pub fn posterior_epred(&mut self) -> Result<&Draws> {
        self.ensure(DerivedKind::PosteriorEpred)
    }

    /// Outcomes drawn from the posterior predictive distribution.
    pub fn posterior_predict(&mut self) -> Result<&Draws> {
        self.ensure(DerivedKind::PosteriorPredict)
    }

    /// Pointwise log-likelihood of the fitted observations.
    pub fn log_likelihood(&mut self) -> Result<&Draws> {
        self.ensure(DerivedKind::LogLikelihood)
    }

    fn ensure(&mut self, kind: DerivedKind) -> Result<&Draws> {
        if !self.generated.contains(kind) {
            for (computed_kind, draws) in self.compute(kind)? {
                self.generated.insert(computed_kind, draws);
            }
        }
        self.generated.get(kind).ok_or_else(|| ModelError::State {
            message: format!("no {kind} table after generation"),
        })
    }

    /// Run the generated-quantities pass that produces `kind`.
    ///
    /// A posterior-predictive pass yields the expected values and the
    /// predicted outcomes together, so one engine call fills both
    /// cache entries.
    fn compute(&mut self, kind: DerivedKind) -> Result<Vec<(DerivedKind, Draws)>> {
        let samples = self.samples.as_ref().ok_or(ModelError::NotSampled)?;
        let parameter_draws = samples.parameter_draws();

        let (mode, fills): (GenerateMode, &[(DerivedKind, &str)]) = match kind {
            DerivedKind::PriorPredict => (
                GenerateMode::PredictPrior,
                &[(DerivedKind::PriorPredict, "y")],
            ),
            DerivedKind::PosteriorEpred | DerivedKind::PosteriorPredict => (
                GenerateMode::PredictPosterior,
                &[
                    (DerivedKind::PosteriorEpred, "mu"),
                    (DerivedKind::PosteriorPredict, "y"),
                ],
            ),
            DerivedKind::LogLikelihood => (
                GenerateMode::LogLikelihood,
                &[(DerivedKind::LogLikelihood, "log_likelihood")],
            ),
        };

        let payload = self.design.generate_payload(None);
        log::debug!("generating {mode} quantities for {} model", self.design.kind());
        let output = self.engine.generate(
            self.design.kind(),
            mode,
            &payload,
            parameter_draws.view(),
            &self.config,
        )?;
        let table = Draws::from_engine(output.names, &output.values)?;

        let mut computed = Vec::with_capacity(fills.len());
        for &(computed_kind, column_kind) in fills {
            let filtered = table.filter_kind(column_kind);
            if filtered.ncols() == 0 {
                return Err(ModelError::State {
                    message: format!("engine output has no '{column_kind}' columns"),
                });
            }
            computed.push((computed_kind, filtered));
        }
        Ok(computed)
    }

    /// Score new observations against the posterior.
    ///
    /// Returns the expected values and the predicted outcomes, one
    /// column per new row. Results are not cached; the data passed here
    /// is coerced column by column to the fitted data's types.
    pub fn predict(&mut self, new_data: &DataFrame) -> Result<(Draws, Draws)> {
        let samples = self.samples.as_ref().ok_or(ModelError::NotSampled)?;
        let parameter_draws = samples.parameter_draws();

        let coerced = new_data.cast_like(&self.data)?;
        let new = self.design.new_predictors(&coerced, self.matrices.as_ref())?;
        let payload = self.design.generate_payload(Some(&new));
        log::debug!("scoring {} new rows", new.n_rows());
        let output = self.engine.generate(
            self.design.kind(),
            GenerateMode::PredictPosterior,
            &payload,
            parameter_draws.view(),
            &self.config,
        )?;
        let table = Draws::from_engine(output.names, &output.values)?;
        Ok((table.filter_kind("mu"), table.filter_kind("y")))
    }

    /// Bayesian R-squared, one value per draw.
    pub fn r_squared(&mut self) -> Result<FloatArray> {
        if self.design.kind() != ModelKind::Univariate {
            return Err(ModelError::Unsupported {
                message: format!(
                    "Bayesian R-squared is defined for univariate models, not {}",
                    self.design.kind()
                ),
            });
        }
        let epred = self.ensure(DerivedKind::PosteriorEpred)?.clone();
        let samples = self.sampled()?;
        let sigma = samples
            .draws()
            .column("sigma")
            .ok_or_else(|| ModelError::State {
                message: "draws carry no sigma column".to_string(),
            })?;
        if epred.nrows() != sigma.len() {
            return Err(ModelError::State {
                message: format!(
                    "{} expected-value draws against {} sigma draws",
                    epred.nrows(),
                    sigma.len()
                ),
            });
        }
        Ok(r_squared(&epred, sigma))
    }

    /// Capture the model as a persistable state.
    pub fn encode(&self) -> FittedState {
        FittedState {
            spec: self.spec.clone(),
            data: self.data.clone(),
            config: self.config.clone(),
            chains: self
                .samples
                .as_ref()
                .map(SampleSet::chain_tables)
                .unwrap_or_default(),
            parameter_columns: self
                .samples
                .as_ref()
                .map(|samples| samples.parameter_columns().to_vec())
                .unwrap_or_default(),
            generated: self.generated.entries().clone(),
        }
    }
}
