//! Resolution of engine parameter names
//!
//! The engine names sampled quantities after its own model code: the
//! intercept is `alpha`, coefficients are a flat 1-based `beta` vector,
//! group-level coefficients are a `Beta` matrix. A [`ParameterIndex`]
//! built from the fitted [`Design`] maps those names back onto the
//! column and level names of the user's data. Resolution is total:
//! a name that matches no rule is returned unchanged.

use bo_core::design::Design;

/// Display names for the handful of scalar parameters shared by every
/// model kind.
fn common_name(kind: &str) -> Option<&'static str> {
    match kind {
        "alpha" => Some("Intercept"),
        "alpha_c" => Some("Intercept_c"),
        "sigma" => Some("sigma"),
        _ => None,
    }
}

/// The kind portion of a flat column name (`beta.2` -> `beta`,
/// `Sigma[1,1]` -> `Sigma`, `lp__` -> `lp__`).
pub(crate) fn kind_of(name: &str) -> &str {
    name.split(['.', '[']).next().unwrap_or(name)
}

/// Splits a flat name into its kind and 1-based indices.
///
/// Accepts the dotted form the engine writes to disk (`beta.2`,
/// `Beta.1.3`) and the bracketed form it prints (`beta[2]`,
/// `Sigma[1,3]`). Returns `None` when the name fits neither shape.
fn parse_identifier(name: &str) -> Option<(&str, Vec<usize>)> {
    if let Some(stripped) = name.strip_suffix(']') {
        let (kind, inner) = stripped.split_once('[')?;
        if kind.is_empty() {
            return None;
        }
        let indices = inner
            .split(',')
            .map(|part| part.trim().parse().ok())
            .collect::<Option<Vec<usize>>>()?;
        if indices.is_empty() || indices.len() > 2 {
            return None;
        }
        return Some((kind, indices));
    }

    let mut parts = name.split('.');
    let kind = parts.next().filter(|kind| !kind.is_empty())?;
    let indices = parts
        .map(|part| part.parse().ok())
        .collect::<Option<Vec<usize>>>()?;
    if indices.len() > 2 {
        return None;
    }
    Some((kind, indices))
}

fn one_based<T>(items: &[T], index: usize) -> Option<&T> {
    index.checked_sub(1).and_then(|i| items.get(i))
}

/// Group-level naming material for multilevel models.
#[derive(Clone, Debug)]
struct GroupNames {
    column: String,
    levels: Vec<String>,
    predictors: Vec<String>,
}

/// Maps engine parameter names onto design column names.
#[derive(Clone, Debug)]
pub struct ParameterIndex {
    outcomes: Vec<String>,
    beta: Vec<String>,
    group: Option<GroupNames>,
}

impl ParameterIndex {
    /// Build the index for a fitted design.
    pub fn new(design: &Design) -> Self {
        let outcomes: Vec<String> = design.outcomes().names().to_vec();
        let multiple = outcomes.len() > 1;

        // The engine's beta vector runs outcome-major over the
        // non-intercept predictor columns.
        let mut beta = Vec::new();
        for (outcome, predictors) in outcomes.iter().zip(design.predictors()) {
            for (_, name) in predictors.coefficient_columns() {
                if multiple {
                    beta.push(format!("{outcome}/{name}"));
                } else {
                    beta.push(name.to_string());
                }
            }
        }

        let group = design.group().map(|group| GroupNames {
            column: group.column().to_string(),
            levels: group.levels().to_vec(),
            predictors: group.predictors().names().to_vec(),
        });

        Self {
            outcomes,
            beta,
            group,
        }
    }

    /// Resolve a single flat name.
    ///
    /// Names that match no rule, carry out-of-range indices, or refer to
    /// structure this design does not have come back unchanged.
    pub fn resolve(&self, name: &str) -> String {
        let Some((kind, indices)) = parse_identifier(name) else {
            return name.to_string();
        };

        if let Some(display) = common_name(kind) {
            if self.outcomes.len() > 1 {
                let outcome = indices
                    .first()
                    .and_then(|&index| one_based(&self.outcomes, index));
                if let Some(outcome) = outcome {
                    return format!("{outcome}/{display}");
                }
                return name.to_string();
            }
            return display.to_string();
        }

        if kind == "beta" {
            if let Some(resolved) = indices
                .first()
                .and_then(|&index| one_based(&self.beta, index))
            {
                return resolved.clone();
            }
            return name.to_string();
        }

        if kind == "Beta" {
            if let (Some(group), [level_index, predictor_index]) =
                (&self.group, indices.as_slice())
            {
                let level = one_based(&group.levels, *level_index);
                let predictor = one_based(&group.predictors, *predictor_index);
                if let (Some(level), Some(predictor)) = (level, predictor) {
                    return format!("{}[{}]/{}", group.column, level, predictor);
                }
            }
            return name.to_string();
        }

        // An engine-internal vector named with a trailing underscore
        // (`u_.3`) displays as an indexed base name (`u[3]`). Double
        // underscores mark diagnostics and stay as they are.
        if kind.ends_with('_') && !kind.ends_with("__") {
            if let Some(index) = indices.last() {
                return format!("{}[{}]", &kind[..kind.len() - 1], index);
            }
        }

        name.to_string()
    }

    /// Resolve a whole header in order.
    pub fn resolve_all<'a, I>(&self, names: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        names.into_iter().map(|name| self.resolve(name)).collect()
    }
}
