//! Model specifications
//!
//! A model is specified by one formula (univariate), a list of formulas
//! (multivariate, one independent equation per outcome), or a formula plus a
//! grouping structure (two-level hierarchical model).

use serde::{Deserialize, Serialize};

/// The structural shape of a model, as the sampling engine sees it
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Univariate,
    Multivariate,
    Multilevel,
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ModelKind::Univariate => "univariate",
            ModelKind::Multivariate => "multivariate",
            ModelKind::Multilevel => "multilevel",
        };
        write!(f, "{}", name)
    }
}

/// A full model specification, immutable once a model is constructed
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSpec {
    /// One outcome, one formula
    Univariate { formula: String },
    /// Several outcomes, one independent equation each
    Multivariate { formulas: Vec<String> },
    /// One outcome with per-group intercept/slope structure
    Multilevel {
        formula: String,
        group_column: String,
        group_formula: String,
    },
}

impl ModelSpec {
    /// Specify a single-outcome model
    pub fn univariate(formula: impl Into<String>) -> Self {
        ModelSpec::Univariate {
            formula: formula.into(),
        }
    }

    /// Specify a multi-outcome model, one formula per outcome
    pub fn multivariate<I, S>(formulas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ModelSpec::Multivariate {
            formulas: formulas.into_iter().map(|f| f.into()).collect(),
        }
    }

    /// Specify a hierarchical model grouped by a categorical column
    pub fn multilevel(
        formula: impl Into<String>,
        group_column: impl Into<String>,
        group_formula: impl Into<String>,
    ) -> Self {
        ModelSpec::Multilevel {
            formula: formula.into(),
            group_column: group_column.into(),
            group_formula: group_formula.into(),
        }
    }

    /// The structural shape of this specification
    pub fn kind(&self) -> ModelKind {
        match self {
            ModelSpec::Univariate { .. } => ModelKind::Univariate,
            ModelSpec::Multivariate { .. } => ModelKind::Multivariate,
            ModelSpec::Multilevel { .. } => ModelKind::Multilevel,
        }
    }

    /// The observation-level formulas, one per outcome
    pub fn outcome_formulas(&self) -> Vec<&str> {
        match self {
            ModelSpec::Univariate { formula } => vec![formula.as_str()],
            ModelSpec::Multivariate { formulas } => {
                formulas.iter().map(|f| f.as_str()).collect()
            }
            ModelSpec::Multilevel { formula, .. } => vec![formula.as_str()],
        }
    }
}

impl std::fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelSpec::Univariate { formula } => write!(f, "{}", formula),
            ModelSpec::Multivariate { formulas } => write!(f, "{}", formulas.join("; ")),
            ModelSpec::Multilevel {
                formula,
                group_column,
                group_formula,
            } => write!(f, "{} | {}: {}", formula, group_column, group_formula),
        }
    }
}
