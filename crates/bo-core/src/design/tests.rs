//! Tests for the design module

use super::*;
use crate::data::{DataError, DataFrame, Series};

use approx::assert_abs_diff_eq;

// ==================== Fixtures ====================

fn linear_data() -> DataFrame {
    DataFrame::from_columns(vec![
        ("x", Series::float(vec![0.0, 1.0, 2.0, 3.0])),
        ("y", Series::float(vec![1.0, 2.0, 3.0, 6.0])),
    ])
    .unwrap()
}

fn two_outcome_data() -> DataFrame {
    DataFrame::from_columns(vec![
        ("x", Series::float(vec![0.0, 1.0, 2.0, 3.0])),
        ("z1", Series::float(vec![1.0, 2.0, 3.0, 6.0])),
        ("z2", Series::float(vec![2.0, 1.0, 0.5, 0.0])),
    ])
    .unwrap()
}

fn grouped_data() -> DataFrame {
    DataFrame::from_columns(vec![
        ("y", Series::float(vec![1.0, 2.0, 3.0, 4.0])),
        ("x", Series::float(vec![0.5, 1.5, 2.5, 3.5])),
        ("w", Series::float(vec![10.0, 20.0, 30.0, 40.0])),
        ("site", Series::categorical(&["west", "east", "west", "east"])),
    ])
    .unwrap()
}

// ==================== Formula evaluation ====================

#[test]
fn test_model_matrix_with_explicit_intercept() {
    let (outcomes, predictors) = AdditiveFormula
        .model_matrix("y ~ 1 + x", &linear_data())
        .unwrap();

    assert_eq!(outcomes.names(), ["y"]);
    assert_eq!(predictors.names(), [INTERCEPT, "x"]);
    assert_eq!(predictors.column(0).to_vec(), vec![1.0, 1.0, 1.0, 1.0]);
    assert_eq!(predictors.column(1).to_vec(), vec![0.0, 1.0, 2.0, 3.0]);
}

#[test]
fn test_intercept_is_implied() {
    let (_, predictors) = AdditiveFormula.model_matrix("y ~ x", &linear_data()).unwrap();
    assert_eq!(predictors.names(), [INTERCEPT, "x"]);
}

#[test]
fn test_intercept_suppression() {
    let (_, predictors) = AdditiveFormula
        .model_matrix("y ~ 0 + x", &linear_data())
        .unwrap();
    assert_eq!(predictors.names(), ["x"]);

    let (_, predictors) = AdditiveFormula
        .model_matrix("y ~ -1 + x", &linear_data())
        .unwrap();
    assert_eq!(predictors.names(), ["x"]);
}

#[test]
fn test_categorical_dummy_expansion() {
    let data = grouped_data();

    // First level is dropped when an intercept is present
    let (_, predictors) = AdditiveFormula.model_matrix("y ~ 1 + site", &data).unwrap();
    assert_eq!(predictors.names(), [INTERCEPT, "site[west]"]);
    assert_eq!(predictors.column(1).to_vec(), vec![1.0, 0.0, 1.0, 0.0]);

    // Without an intercept every level gets a column
    let (_, predictors) = AdditiveFormula.model_matrix("y ~ 0 + site", &data).unwrap();
    assert_eq!(predictors.names(), ["site[east]", "site[west]"]);
}

#[test]
fn test_predictor_matrix_ignores_outcome() {
    let data = DataFrame::from_columns(vec![("x", Series::float(vec![1.0, 2.0]))]).unwrap();

    // The outcome column does not have to exist for right-hand-side evaluation
    let predictors = AdditiveFormula.predictor_matrix("y ~ 1 + x", &data).unwrap();
    assert_eq!(predictors.names(), [INTERCEPT, "x"]);

    let bare = AdditiveFormula.predictor_matrix("1 + x", &data).unwrap();
    assert_eq!(bare.names(), predictors.names());
}

#[test]
fn test_formula_errors() {
    let data = linear_data();

    let err = AdditiveFormula.model_matrix("y ~ 1 + z", &data).unwrap_err();
    assert!(matches!(err, DesignError::VariableNotFound { variable, .. } if variable == "z"));

    let err = AdditiveFormula.model_matrix("x + y", &data).unwrap_err();
    assert!(matches!(err, DesignError::Malformed { .. }));

    let err = AdditiveFormula.model_matrix("y ~ x * x", &data).unwrap_err();
    assert!(matches!(err, DesignError::Malformed { .. }));

    let err = AdditiveFormula.model_matrix("y ~ x + x", &data).unwrap_err();
    assert!(matches!(err, DesignError::Malformed { .. }));

    let err = AdditiveFormula.model_matrix("y ~ x ~ 1", &data).unwrap_err();
    assert!(matches!(err, DesignError::Malformed { .. }));

    let data = DataFrame::from_columns(vec![
        ("x", Series::float(vec![1.0])),
        ("label", Series::string(vec!["a".to_string()])),
    ])
    .unwrap();
    let err = AdditiveFormula.model_matrix("label ~ x", &data).unwrap_err();
    assert!(matches!(err, DesignError::TypeMismatch { .. }));
}

// ==================== Payload ====================

#[test]
fn test_univariate_payload_values() {
    let spec = ModelSpec::univariate("y ~ 1 + x");
    let design = Design::from_spec(&spec, &linear_data(), &AdditiveFormula).unwrap();
    let payload = design.payload();

    assert_eq!(payload["N"].as_int(), Some(4));
    assert_eq!(payload["K"].as_int(), Some(2));
    assert_eq!(
        payload["y"].as_real_vec().unwrap().to_vec(),
        vec![1.0, 2.0, 3.0, 6.0]
    );
    assert_eq!(payload["X"].as_real_mat().unwrap().dim(), (4, 2));

    // Population standard deviations: sd(y) = sqrt(3.5), sd(x) = sqrt(1.25)
    let sd_y = 3.5_f64.sqrt();
    assert_abs_diff_eq!(payload["mu_alpha"].as_real().unwrap(), 3.0, epsilon = 1e-12);
    assert_abs_diff_eq!(
        payload["sigma_alpha"].as_real().unwrap(),
        2.5 * sd_y,
        epsilon = 1e-12
    );
    assert_abs_diff_eq!(
        payload["lambda_sigma"].as_real().unwrap(),
        1.0 / sd_y,
        epsilon = 1e-12
    );

    let sigma_beta = payload["sigma_beta"].as_real_vec().unwrap();
    assert_eq!(sigma_beta.len(), 1);
    assert_abs_diff_eq!(
        sigma_beta[0],
        2.5 * sd_y / 1.25_f64.sqrt(),
        epsilon = 1e-12
    );
}

#[test]
fn test_zero_variance_columns_get_floored_scales() {
    let data = DataFrame::from_columns(vec![
        ("x", Series::float(vec![7.0, 7.0, 7.0])),
        ("y", Series::float(vec![1.0, 2.0, 3.0])),
    ])
    .unwrap();

    let spec = ModelSpec::univariate("y ~ 1 + x");
    let design = Design::from_spec(&spec, &data, &AdditiveFormula).unwrap();

    let sigma_beta = design.payload()["sigma_beta"].as_real_vec().unwrap();
    assert!(sigma_beta[0].is_finite());
    assert!(sigma_beta[0] > 1e10);

    // A constant outcome floors the residual-scale rate instead of dividing by zero
    let data = DataFrame::from_columns(vec![
        ("x", Series::float(vec![1.0, 2.0, 3.0])),
        ("y", Series::float(vec![4.0, 4.0, 4.0])),
    ])
    .unwrap();
    let design = Design::from_spec(&spec, &data, &AdditiveFormula).unwrap();
    assert!(design.payload()["lambda_sigma"].as_real().unwrap().is_finite());
}

#[test]
fn test_assembly_is_deterministic() {
    let spec = ModelSpec::multilevel("y ~ 1 + x", "site", "1 + w");
    let data = grouped_data();

    let first = Design::from_spec(&spec, &data, &AdditiveFormula).unwrap();
    let second = Design::from_spec(&spec, &data, &AdditiveFormula).unwrap();

    assert_eq!(first.predictors()[0].names(), second.predictors()[0].names());
    assert_eq!(first.payload(), second.payload());
}

#[test]
fn test_multivariate_payload() {
    let spec = ModelSpec::multivariate(["z1 ~ 1 + x", "z2 ~ 1 + x"]);
    let design = Design::from_spec(&spec, &two_outcome_data(), &AdditiveFormula).unwrap();
    let payload = design.payload();

    assert_eq!(design.outcomes().names(), ["z1", "z2"]);
    assert_eq!(payload["O"].as_int(), Some(2));
    assert_eq!(payload["K"].as_int_vec(), Some(&[2i64, 2][..]));
    assert_eq!(payload["y"].as_real_mat().unwrap().dim(), (4, 2));
    assert!(payload.contains_key("X.1"));
    assert!(payload.contains_key("X.2"));
    assert!(payload.contains_key("sigma_beta.1"));
    assert!(payload.contains_key("sigma_beta.2"));
    assert_eq!(payload["mu_alpha"].as_real_vec().unwrap().len(), 2);
    assert_eq!(payload["eta_L"].as_real(), Some(1.0));
}

#[test]
fn test_multivariate_spec_errors() {
    let err = Design::from_spec(
        &ModelSpec::multivariate(Vec::<String>::new()),
        &two_outcome_data(),
        &AdditiveFormula,
    )
    .unwrap_err();
    assert!(matches!(err, DesignError::InvalidSpec(_)));

    let err = Design::from_spec(
        &ModelSpec::multivariate(["z1 ~ x", "z1 ~ 1 + x"]),
        &two_outcome_data(),
        &AdditiveFormula,
    )
    .unwrap_err();
    assert!(matches!(err, DesignError::InvalidSpec(_)));
}

// ==================== Hierarchical designs ====================

#[test]
fn test_multilevel_design() {
    let spec = ModelSpec::multilevel("y ~ 1 + x", "site", "1 + w");
    let design = Design::from_spec(&spec, &grouped_data(), &AdditiveFormula).unwrap();

    let group = design.group().unwrap();
    assert_eq!(group.column(), "site");
    // Levels are lexical, codes refer to that ordering
    assert_eq!(group.levels(), ["east", "west"]);
    assert_eq!(group.codes(), [1, 0, 1, 0]);

    // One row per level, taken from each level's first occurrence
    assert_eq!(group.predictors().names(), [INTERCEPT, "w"]);
    assert_eq!(group.predictors().column(1).to_vec(), vec![20.0, 10.0]);

    let payload = design.payload();
    assert_eq!(payload["J"].as_int(), Some(2));
    assert_eq!(payload["L"].as_int(), Some(2));
    assert_eq!(payload["group"].as_int_vec(), Some(&[2i64, 1, 2, 1][..]));
    assert_eq!(payload["Z"].as_real_mat().unwrap().dim(), (2, 2));
    assert_eq!(payload["eta_L"].as_real(), Some(1.0));
}

#[test]
fn test_multilevel_group_errors() {
    let spec = ModelSpec::multilevel("y ~ 1 + x", "region", "1");
    let err = Design::from_spec(&spec, &grouped_data(), &AdditiveFormula).unwrap_err();
    assert!(matches!(err, DesignError::VariableNotFound { variable, .. } if variable == "region"));

    let spec = ModelSpec::multilevel("y ~ 1 + x", "w", "1");
    let err = Design::from_spec(&spec, &grouped_data(), &AdditiveFormula).unwrap_err();
    assert!(matches!(err, DesignError::TypeMismatch { variable, .. } if variable == "w"));
}

// ==================== New data ====================

#[test]
fn test_generate_payload_in_sample() {
    let spec = ModelSpec::univariate("y ~ 1 + x");
    let design = Design::from_spec(&spec, &linear_data(), &AdditiveFormula).unwrap();

    let payload = design.generate_payload(None);
    assert_eq!(payload["N_new"].as_int(), Some(4));
    assert_eq!(payload["X_new"], payload["X"]);
    // The base payload is still all there
    assert!(payload.contains_key("sigma_beta"));
}

#[test]
fn test_generate_payload_for_new_rows() {
    let spec = ModelSpec::univariate("y ~ 1 + x");
    let design = Design::from_spec(&spec, &linear_data(), &AdditiveFormula).unwrap();

    let new_data = DataFrame::from_columns(vec![("x", Series::float(vec![5.0, 6.0]))]).unwrap();
    let new = design.new_predictors(&new_data, &AdditiveFormula).unwrap();
    assert_eq!(new.n_rows(), 2);

    let payload = design.generate_payload(Some(&new));
    assert_eq!(payload["N_new"].as_int(), Some(2));
    let x_new = payload["X_new"].as_real_mat().unwrap();
    assert_eq!(x_new.dim(), (2, 2));
    assert_eq!(x_new[[0, 1]], 5.0);
}

#[test]
fn test_new_predictors_layout_mismatch() {
    let data = grouped_data();
    let spec = ModelSpec::univariate("y ~ 1 + site");
    let design = Design::from_spec(&spec, &data, &AdditiveFormula).unwrap();

    // New data whose categorical levels differ produces different columns
    let new_data =
        DataFrame::from_columns(vec![("site", Series::categorical(&["east", "north"]))]).unwrap();
    let err = design.new_predictors(&new_data, &AdditiveFormula).unwrap_err();
    assert!(matches!(err, DesignError::PredictorMismatch { .. }));
}

#[test]
fn test_new_predictors_with_groups() {
    let spec = ModelSpec::multilevel("y ~ 1 + x", "site", "1 + w");
    let design = Design::from_spec(&spec, &grouped_data(), &AdditiveFormula).unwrap();

    let new_data = DataFrame::from_columns(vec![
        ("x", Series::float(vec![1.0, 2.0])),
        ("site", Series::categorical(&["west", "east"])),
    ])
    .unwrap();
    // "west" encodes against the fitted level list even though the new
    // column's own encoding differs
    let new = design.new_predictors(&new_data, &AdditiveFormula).unwrap();
    let payload = design.generate_payload(Some(&new));
    assert_eq!(payload["group_new"].as_int_vec(), Some(&[2i64, 1][..]));

    // Unseen levels are rejected
    let bad = DataFrame::from_columns(vec![
        ("x", Series::float(vec![1.0])),
        ("site", Series::string(vec!["north".to_string()])),
    ])
    .unwrap();
    let err = design.new_predictors(&bad, &AdditiveFormula).unwrap_err();
    assert!(matches!(
        err,
        DesignError::Data(DataError::UnknownCategory(level)) if level == "north"
    ));
}

#[test]
fn test_payload_serializes_to_plain_lists() {
    let spec = ModelSpec::univariate("y ~ 1 + x");
    let design = Design::from_spec(&spec, &linear_data(), &AdditiveFormula).unwrap();

    let json = serde_json::to_value(design.payload()).unwrap();
    assert_eq!(json["N"], serde_json::json!(4));
    assert_eq!(json["y"], serde_json::json!([1.0, 2.0, 3.0, 6.0]));
    assert_eq!(json["X"][0], serde_json::json!([1.0, 0.0]));
}

#[test]
fn test_spec_serde_round_trip() {
    let spec = ModelSpec::multilevel("y ~ 1 + x", "site", "1 + w");
    let json = serde_json::to_string(&spec).unwrap();
    let back: ModelSpec = serde_json::from_str(&json).unwrap();
    assert_eq!(back, spec);
    assert_eq!(back.kind(), ModelKind::Multilevel);
}
