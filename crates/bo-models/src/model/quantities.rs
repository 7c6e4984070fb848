//! Derived posterior quantities

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::draws::Draws;

/// A quantity derived from the posterior draws by a second engine pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivedKind {
    /// Outcomes drawn from the prior predictive distribution
    PriorPredict,
    /// Posterior expected value of the outcome, per observation
    PosteriorEpred,
    /// Outcomes drawn from the posterior predictive distribution
    PosteriorPredict,
    /// Pointwise log-likelihood of the fitted observations
    LogLikelihood,
}

impl fmt::Display for DerivedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DerivedKind::PriorPredict => "prior_predict",
            DerivedKind::PosteriorEpred => "posterior_epred",
            DerivedKind::PosteriorPredict => "posterior_predict",
            DerivedKind::LogLikelihood => "log_likelihood",
        };
        write!(f, "{name}")
    }
}

/// Memoized derived quantities for one sampling pass.
///
/// Entries accumulate as quantities are requested and are wiped as a
/// whole whenever the model is resampled.
#[derive(Clone, Debug, Default)]
pub(crate) struct QuantityCache {
    entries: BTreeMap<DerivedKind, Draws>,
}

impl QuantityCache {
    pub(crate) fn restore(entries: BTreeMap<DerivedKind, Draws>) -> Self {
        Self { entries }
    }

    pub(crate) fn get(&self, kind: DerivedKind) -> Option<&Draws> {
        self.entries.get(&kind)
    }

    pub(crate) fn contains(&self, kind: DerivedKind) -> bool {
        self.entries.contains_key(&kind)
    }

    pub(crate) fn insert(&mut self, kind: DerivedKind, draws: Draws) {
        self.entries.insert(kind, draws);
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn entries(&self) -> &BTreeMap<DerivedKind, Draws> {
        &self.entries
    }
}
