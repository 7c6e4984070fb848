//! Design assembly
//!
//! `Design` is the bridge between a model specification and the sampling
//! engine: outcome and predictor matrices with stable column names, the
//! grouping structure for hierarchical models, and the payload of
//! data-derived prior-scale hyperparameters. Assembly is pure; the same
//! specification and data always produce the same design.

use super::*;
use crate::data::{DataError, DataFrame, FloatArray, Series, encode_codes};

use ndarray::{Axis, stack};

/// Scale substituted when a column has zero empirical variance
const SCALE_FLOOR: f64 = 1e-20;

/// Widening factor applied to data-derived prior scales
const PRIOR_SCALE_FACTOR: f64 = 2.5;

/// Fixed LKJ shape parameter for correlation priors
const ETA_L: f64 = 1.0;

/// Grouping structure of a hierarchical design
#[derive(Clone, Debug)]
pub struct GroupDesign {
    column: String,
    levels: Vec<String>,
    codes: Vec<usize>,
    predictors: NamedMatrix,
}

impl GroupDesign {
    /// The grouping column's name
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Observed group levels, in lexical order
    pub fn levels(&self) -> &[String] {
        &self.levels
    }

    /// Zero-based level code per observation row
    pub fn codes(&self) -> &[usize] {
        &self.codes
    }

    /// Modeled-predictor matrix, one row per level
    pub fn predictors(&self) -> &NamedMatrix {
        &self.predictors
    }
}

/// Predictor matrices rebuilt from new data, for scoring
#[derive(Clone, Debug)]
pub struct NewPredictors {
    predictors: Vec<NamedMatrix>,
    group_codes: Option<Vec<usize>>,
}

impl NewPredictors {
    /// Number of rows being scored
    pub fn n_rows(&self) -> usize {
        self.predictors.first().map_or(0, |m| m.nrows())
    }
}

/// A fully assembled design: matrices plus engine payload
#[derive(Clone, Debug)]
pub struct Design {
    spec: ModelSpec,
    outcomes: NamedMatrix,
    predictors: Vec<NamedMatrix>,
    group: Option<GroupDesign>,
    payload: FitPayload,
}

impl Design {
    /// Assemble the design for a specification over a data frame
    pub fn from_spec(
        spec: &ModelSpec,
        data: &DataFrame,
        matrices: &dyn ModelMatrices,
    ) -> Result<Self> {
        match spec {
            ModelSpec::Univariate { formula } => {
                let (outcomes, predictors) = matrices.model_matrix(formula, data)?;
                let payload = univariate_payload(&outcomes, &predictors);
                Ok(Self {
                    spec: spec.clone(),
                    outcomes,
                    predictors: vec![predictors],
                    group: None,
                    payload,
                })
            }
            ModelSpec::Multivariate { formulas } => {
                if formulas.is_empty() {
                    return Err(DesignError::InvalidSpec(
                        "a multivariate model needs at least one formula".to_string(),
                    ));
                }

                let mut per_outcome = Vec::with_capacity(formulas.len());
                for formula in formulas {
                    per_outcome.push(matrices.model_matrix(formula, data)?);
                }

                let outcomes = concat_outcomes(&per_outcome)?;
                let predictors: Vec<NamedMatrix> =
                    per_outcome.into_iter().map(|(_, x)| x).collect();
                let payload = multivariate_payload(&outcomes, &predictors);
                Ok(Self {
                    spec: spec.clone(),
                    outcomes,
                    predictors,
                    group: None,
                    payload,
                })
            }
            ModelSpec::Multilevel {
                formula,
                group_column,
                group_formula,
            } => {
                let (outcomes, predictors) = matrices.model_matrix(formula, data)?;
                let group = group_design(group_column, group_formula, data, matrices)?;

                let mut payload = univariate_payload(&outcomes, &predictors);
                payload.insert(
                    "J".to_string(),
                    PayloadValue::Int(group.levels.len() as i64),
                );
                payload.insert(
                    "L".to_string(),
                    PayloadValue::Int(group.predictors.ncols() as i64),
                );
                payload.insert(
                    "group".to_string(),
                    PayloadValue::IntVec(group.codes.iter().map(|&c| c as i64 + 1).collect()),
                );
                payload.insert(
                    "Z".to_string(),
                    PayloadValue::RealMat(group.predictors.values().clone()),
                );
                payload.insert("eta_L".to_string(), PayloadValue::Real(ETA_L));

                Ok(Self {
                    spec: spec.clone(),
                    outcomes,
                    predictors: vec![predictors],
                    group: Some(group),
                    payload,
                })
            }
        }
    }

    /// The specification this design was assembled from
    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    /// The structural shape of the model
    pub fn kind(&self) -> ModelKind {
        self.spec.kind()
    }

    /// Outcome matrix, one column per outcome
    pub fn outcomes(&self) -> &NamedMatrix {
        &self.outcomes
    }

    /// Predictor matrices, one per outcome
    pub fn predictors(&self) -> &[NamedMatrix] {
        &self.predictors
    }

    /// Grouping structure, for hierarchical designs
    pub fn group(&self) -> Option<&GroupDesign> {
        self.group.as_ref()
    }

    /// The payload for the engine's primary sampling pass
    pub fn payload(&self) -> &FitPayload {
        &self.payload
    }

    /// Rebuild predictor matrices from new data, validating the layout.
    ///
    /// The new data must produce exactly the fitted predictor columns; for
    /// hierarchical designs its grouping column is re-encoded against the
    /// fitted level list, and unseen levels are rejected.
    pub fn new_predictors(
        &self,
        data: &DataFrame,
        matrices: &dyn ModelMatrices,
    ) -> Result<NewPredictors> {
        let mut predictors = Vec::with_capacity(self.predictors.len());
        for (formula, fitted) in self.spec.outcome_formulas().iter().zip(&self.predictors) {
            let matrix = matrices.predictor_matrix(formula, data)?;
            if matrix.names() != fitted.names() {
                return Err(DesignError::PredictorMismatch {
                    expected: fitted.names().to_vec(),
                    actual: matrix.names().to_vec(),
                });
            }
            predictors.push(matrix);
        }

        let group_codes = match &self.group {
            Some(group) => {
                let series = data.get_column(&group.column).ok_or_else(|| {
                    DesignError::variable_not_found(&group.column, &data.column_names())
                })?;
                let values = match series {
                    Series::String(_) | Series::Categorical(_, _) => series.to_strings()?,
                    other => {
                        return Err(DesignError::TypeMismatch {
                            variable: group.column.clone(),
                            expected: "categorical",
                            actual: other.dtype().to_string(),
                        });
                    }
                };
                let codes = encode_codes(&values, &group.levels)?;
                Some(codes.into_iter().map(|c| c as usize).collect())
            }
            None => None,
        };

        Ok(NewPredictors {
            predictors,
            group_codes,
        })
    }

    /// Payload for the engine's generate-quantities pass.
    ///
    /// With no new predictors the design's own rows are scored, which is
    /// what the in-sample posterior quantities use.
    pub fn generate_payload(&self, new: Option<&NewPredictors>) -> FitPayload {
        let (predictors, group_codes): (&[NamedMatrix], Option<&[usize]>) = match new {
            Some(new) => (&new.predictors, new.group_codes.as_deref()),
            None => (
                &self.predictors,
                self.group.as_ref().map(|g| g.codes.as_slice()),
            ),
        };

        let mut payload = self.payload.clone();
        let n_new = predictors.first().map_or(0, |m| m.nrows());
        payload.insert("N_new".to_string(), PayloadValue::Int(n_new as i64));
        if let [single] = predictors {
            payload.insert(
                "X_new".to_string(),
                PayloadValue::RealMat(single.values().clone()),
            );
        } else {
            for (o, matrix) in predictors.iter().enumerate() {
                payload.insert(
                    format!("X_new.{}", o + 1),
                    PayloadValue::RealMat(matrix.values().clone()),
                );
            }
        }
        if let Some(codes) = group_codes {
            payload.insert(
                "group_new".to_string(),
                PayloadValue::IntVec(codes.iter().map(|&c| c as i64 + 1).collect()),
            );
        }

        payload
    }
}

/// Substitute the floor for exactly-zero scales
fn floored(scale: f64) -> f64 {
    if scale == 0.0 { SCALE_FLOOR } else { scale }
}

/// Hyperparameters shared by all shapes, per outcome
struct OutcomeScales {
    mu_alpha: f64,
    sigma_alpha: f64,
    sigma_beta: FloatArray,
    lambda_sigma: f64,
}

fn outcome_scales(outcome: ndarray::ArrayView1<'_, f64>, predictors: &NamedMatrix) -> OutcomeScales {
    let sd_y = floored(outcome.std(0.0));

    let sigma_beta: FloatArray = predictors
        .coefficient_columns()
        .map(|(idx, _)| PRIOR_SCALE_FACTOR * sd_y / floored(predictors.column(idx).std(0.0)))
        .collect();

    OutcomeScales {
        mu_alpha: outcome.mean().unwrap_or(f64::NAN),
        sigma_alpha: PRIOR_SCALE_FACTOR * sd_y,
        sigma_beta,
        lambda_sigma: 1.0 / sd_y,
    }
}

fn univariate_payload(outcomes: &NamedMatrix, predictors: &NamedMatrix) -> FitPayload {
    let outcome = outcomes.column(0);
    let scales = outcome_scales(outcome, predictors);

    let mut payload = FitPayload::new();
    payload.insert(
        "N".to_string(),
        PayloadValue::Int(predictors.nrows() as i64),
    );
    payload.insert(
        "K".to_string(),
        PayloadValue::Int(predictors.ncols() as i64),
    );
    payload.insert("y".to_string(), PayloadValue::RealVec(outcome.to_owned()));
    payload.insert(
        "X".to_string(),
        PayloadValue::RealMat(predictors.values().clone()),
    );
    payload.insert("mu_alpha".to_string(), PayloadValue::Real(scales.mu_alpha));
    payload.insert(
        "sigma_alpha".to_string(),
        PayloadValue::Real(scales.sigma_alpha),
    );
    payload.insert(
        "sigma_beta".to_string(),
        PayloadValue::RealVec(scales.sigma_beta),
    );
    payload.insert(
        "lambda_sigma".to_string(),
        PayloadValue::Real(scales.lambda_sigma),
    );

    payload
}

fn multivariate_payload(outcomes: &NamedMatrix, predictors: &[NamedMatrix]) -> FitPayload {
    let per_outcome: Vec<OutcomeScales> = predictors
        .iter()
        .enumerate()
        .map(|(o, x)| outcome_scales(outcomes.column(o), x))
        .collect();

    let mut payload = FitPayload::new();
    payload.insert(
        "N".to_string(),
        PayloadValue::Int(outcomes.nrows() as i64),
    );
    payload.insert(
        "O".to_string(),
        PayloadValue::Int(outcomes.ncols() as i64),
    );
    payload.insert(
        "y".to_string(),
        PayloadValue::RealMat(outcomes.values().clone()),
    );
    payload.insert(
        "K".to_string(),
        PayloadValue::IntVec(predictors.iter().map(|x| x.ncols() as i64).collect()),
    );
    for (o, x) in predictors.iter().enumerate() {
        payload.insert(
            format!("X.{}", o + 1),
            PayloadValue::RealMat(x.values().clone()),
        );
    }
    payload.insert(
        "mu_alpha".to_string(),
        PayloadValue::RealVec(per_outcome.iter().map(|s| s.mu_alpha).collect()),
    );
    payload.insert(
        "sigma_alpha".to_string(),
        PayloadValue::RealVec(per_outcome.iter().map(|s| s.sigma_alpha).collect()),
    );
    for (o, scales) in per_outcome.iter().enumerate() {
        payload.insert(
            format!("sigma_beta.{}", o + 1),
            PayloadValue::RealVec(scales.sigma_beta.clone()),
        );
    }
    payload.insert(
        "lambda_sigma".to_string(),
        PayloadValue::RealVec(per_outcome.iter().map(|s| s.lambda_sigma).collect()),
    );
    payload.insert("eta_L".to_string(), PayloadValue::Real(ETA_L));

    payload
}

/// Concatenate per-formula outcome columns into one matrix
fn concat_outcomes(per_outcome: &[(NamedMatrix, NamedMatrix)]) -> Result<NamedMatrix> {
    let mut names = Vec::with_capacity(per_outcome.len());
    for (outcome, _) in per_outcome {
        let name = outcome.names()[0].clone();
        if names.contains(&name) {
            return Err(DesignError::InvalidSpec(format!(
                "outcome '{}' appears in more than one formula",
                name
            )));
        }
        names.push(name);
    }

    let views: Vec<ndarray::ArrayView1<f64>> = per_outcome
        .iter()
        .map(|(outcome, _)| outcome.column(0))
        .collect();
    let values = stack(Axis(1), &views)
        .map_err(|e| DesignError::Assembly(format!("outcome columns: {}", e)))?;

    NamedMatrix::new(names, values)
}

/// Group levels, per-row codes and the level-indexed predictor matrix
fn group_design(
    column: &str,
    group_formula: &str,
    data: &DataFrame,
    matrices: &dyn ModelMatrices,
) -> Result<GroupDesign> {
    let series = data
        .get_column(column)
        .ok_or_else(|| DesignError::variable_not_found(column, &data.column_names()))?;

    let (codes, levels) = match level_codes(series) {
        Some(encoded) => encoded,
        None => {
            return Err(DesignError::TypeMismatch {
                variable: column.to_string(),
                expected: "categorical",
                actual: series.dtype().to_string(),
            });
        }
    };

    // One representative row per level, in level order
    let mut firsts: Vec<Option<usize>> = vec![None; levels.len()];
    for (row, &code) in codes.iter().enumerate() {
        let slot = firsts
            .get_mut(code)
            .ok_or_else(|| DataError::UnknownCategory(code.to_string()))?;
        if slot.is_none() {
            *slot = Some(row);
        }
    }
    let firsts: Vec<usize> = firsts
        .iter()
        .zip(&levels)
        .map(|(first, level)| {
            first.ok_or_else(|| {
                DesignError::InvalidSpec(format!("group level '{}' has no rows", level))
            })
        })
        .collect::<Result<_>>()?;

    let level_rows = data.reorder_rows(&firsts)?;
    let predictors = matrices.predictor_matrix(group_formula, &level_rows)?;

    Ok(GroupDesign {
        column: column.to_string(),
        levels,
        codes,
        predictors,
    })
}

/// Zero-based codes and lexical levels of a grouping column
fn level_codes(series: &Series) -> Option<(Vec<usize>, Vec<String>)> {
    match series {
        Series::Categorical(codes, categories) => Some((
            codes.iter().map(|&c| c as usize).collect(),
            categories.clone(),
        )),
        Series::String(values) => {
            if let Series::Categorical(codes, categories) = Series::categorical(values) {
                Some((codes.iter().map(|&c| c as usize).collect(), categories))
            } else {
                None
            }
        }
        _ => None,
    }
}
