//! The formula seam and its default additive implementation
//!
//! `ModelMatrices` is the boundary to formula evaluation: anything that can
//! turn a formula string and a DataFrame into named outcome/predictor
//! matrices can drive the assembler. `AdditiveFormula` is the built-in
//! implementation covering `outcome ~ 1 + a + b` style formulas.

use super::*;
use crate::data::{DataFrame, FloatArray, Matrix, Series};

use ndarray::{Array1, Axis, stack};

/// Boundary to formula evaluation
pub trait ModelMatrices {
    /// Evaluate a full formula, returning (outcomes, predictors)
    fn model_matrix(&self, formula: &str, data: &DataFrame)
    -> Result<(NamedMatrix, NamedMatrix)>;

    /// Evaluate only the right-hand side, for data without outcomes
    fn predictor_matrix(&self, formula: &str, data: &DataFrame) -> Result<NamedMatrix>;
}

/// Additive formulas: `outcome ~ 1 + a + b`, `0`/`-1` to drop the intercept.
///
/// Numeric columns enter as-is, booleans as 0/1 indicators, categorical and
/// string columns expand to `column[level]` indicator columns in lexical
/// level order (first level dropped when an intercept is present). The
/// intercept is implied unless suppressed. Interactions and transforms are
/// not handled here; plug a richer `ModelMatrices` into the model for those.
#[derive(Clone, Copy, Debug, Default)]
pub struct AdditiveFormula;

impl ModelMatrices for AdditiveFormula {
    fn model_matrix(
        &self,
        formula: &str,
        data: &DataFrame,
    ) -> Result<(NamedMatrix, NamedMatrix)> {
        let parsed = parse_formula(formula)?;

        let outcome_name = parsed
            .outcome
            .as_deref()
            .ok_or_else(|| DesignError::malformed(formula, "an outcome variable is required"))?;

        let series = data
            .get_column(outcome_name)
            .ok_or_else(|| DesignError::variable_not_found(outcome_name, &data.column_names()))?;
        let outcome = match series {
            Series::Float(_) | Series::Int(_) | Series::Bool(_) => series.float_values()?,
            other => {
                return Err(DesignError::TypeMismatch {
                    variable: outcome_name.to_string(),
                    expected: "numeric",
                    actual: other.dtype().to_string(),
                });
            }
        };
        let nrows = outcome.len();
        let outcome = outcome
            .to_shape((nrows, 1))
            .map(|m| m.into_owned())
            .map_err(|e| {
                DesignError::Assembly(format!("outcome column '{}': {}", outcome_name, e))
            })?;
        let outcomes = NamedMatrix::new(vec![outcome_name.to_string()], outcome)?;

        let predictors = build_predictors(&parsed, formula, data)?;
        Ok((outcomes, predictors))
    }

    fn predictor_matrix(&self, formula: &str, data: &DataFrame) -> Result<NamedMatrix> {
        let parsed = parse_formula(formula)?;
        build_predictors(&parsed, formula, data)
    }
}

/// A formula split into outcome, intercept flag and additive terms
struct ParsedFormula {
    outcome: Option<String>,
    intercept: bool,
    terms: Vec<String>,
}

fn parse_formula(formula: &str) -> Result<ParsedFormula> {
    let (lhs, rhs) = match formula.split_once('~') {
        Some((lhs, rhs)) => {
            if rhs.contains('~') {
                return Err(DesignError::malformed(formula, "more than one '~'"));
            }
            (Some(lhs.trim()), rhs)
        }
        None => (None, formula),
    };

    let outcome = match lhs {
        Some("") => return Err(DesignError::malformed(formula, "empty left-hand side")),
        Some(name) => Some(name.to_string()),
        None => None,
    };

    let mut intercept = true;
    let mut terms = Vec::new();
    for token in rhs.split('+').map(str::trim) {
        match token {
            "" => return Err(DesignError::malformed(formula, "empty term")),
            "1" => intercept = true,
            "0" | "-1" => intercept = false,
            name if name.contains([':', '*', '(', ')']) => {
                return Err(DesignError::malformed(
                    formula,
                    format!("unsupported term '{}'", name),
                ));
            }
            name => {
                if terms.iter().any(|t| t == name) {
                    return Err(DesignError::malformed(
                        formula,
                        format!("duplicate term '{}'", name),
                    ));
                }
                terms.push(name.to_string());
            }
        }
    }

    Ok(ParsedFormula {
        outcome,
        intercept,
        terms,
    })
}

/// Expand the parsed right-hand side into named columns over the data
fn build_predictors(
    parsed: &ParsedFormula,
    formula: &str,
    data: &DataFrame,
) -> Result<NamedMatrix> {
    let nrows = data.nrows();
    let mut columns: Vec<(String, FloatArray)> = Vec::new();

    if parsed.intercept {
        columns.push((INTERCEPT.to_string(), Array1::ones(nrows)));
    }

    for term in &parsed.terms {
        let series = data
            .get_column(term)
            .ok_or_else(|| DesignError::variable_not_found(term, &data.column_names()))?;

        match series {
            Series::Float(_) | Series::Int(_) | Series::Bool(_) => {
                columns.push((term.clone(), series.float_values()?));
            }
            Series::Categorical(codes, categories) => {
                expand_dummies(
                    term,
                    codes.iter().map(|&c| c as usize),
                    categories,
                    parsed.intercept,
                    &mut columns,
                );
            }
            Series::String(values) => {
                // Strings behave like a categorical with lexical levels
                let encoded = Series::categorical(values);
                if let Series::Categorical(codes, categories) = &encoded {
                    expand_dummies(
                        term,
                        codes.iter().map(|&c| c as usize),
                        categories,
                        parsed.intercept,
                        &mut columns,
                    );
                }
            }
        }
    }

    if columns.is_empty() {
        return NamedMatrix::new(Vec::new(), Matrix::zeros((nrows, 0)));
    }

    let names = columns.iter().map(|(name, _)| name.clone()).collect();
    let views: Vec<ndarray::ArrayView1<f64>> = columns.iter().map(|(_, col)| col.view()).collect();
    let values = stack(Axis(1), &views)
        .map_err(|e| DesignError::Assembly(format!("formula '{}': {}", formula, e)))?;

    NamedMatrix::new(names, values)
}

/// Append one 0/1 indicator column per level, named `column[level]`
fn expand_dummies(
    column: &str,
    codes: impl Iterator<Item = usize>,
    categories: &[String],
    drop_first: bool,
    columns: &mut Vec<(String, FloatArray)>,
) {
    let codes: Vec<usize> = codes.collect();
    let first_kept = if drop_first { 1 } else { 0 };

    for (level_idx, level) in categories.iter().enumerate().skip(first_kept) {
        let indicator: FloatArray = codes
            .iter()
            .map(|&c| if c == level_idx { 1.0 } else { 0.0 })
            .collect();
        columns.push((format!("{}[{}]", column, level), indicator));
    }
}
