//! Tests for draw bookkeeping

use super::*;
use super::stats;

use approx::assert_abs_diff_eq;
use ndarray::{Array3, arr2};

use bo_core::{AdditiveFormula, DataFrame, Design, ModelSpec, Series};

use crate::engine::SampleOutput;
use crate::error::ModelError;

// ==================== Fixtures ====================

fn univariate_design() -> Design {
    let data = DataFrame::from_columns(vec![
        ("x", Series::float(vec![0.0, 1.0, 2.0, 3.0])),
        ("y", Series::float(vec![1.0, 2.0, 3.0, 6.0])),
    ])
    .unwrap();
    let spec = ModelSpec::univariate("y ~ 1 + x");
    Design::from_spec(&spec, &data, &AdditiveFormula).unwrap()
}

fn multivariate_design() -> Design {
    let data = DataFrame::from_columns(vec![
        ("x", Series::float(vec![0.0, 1.0, 2.0, 3.0])),
        ("z1", Series::float(vec![1.0, 2.0, 3.0, 6.0])),
        ("z2", Series::float(vec![2.0, 1.0, 0.5, 0.0])),
    ])
    .unwrap();
    let spec = ModelSpec::multivariate(["z1 ~ 1 + x", "z2 ~ 1 + x"]);
    Design::from_spec(&spec, &data, &AdditiveFormula).unwrap()
}

fn multilevel_design() -> Design {
    let data = DataFrame::from_columns(vec![
        ("y", Series::float(vec![1.0, 2.0, 3.0, 4.0])),
        ("x", Series::float(vec![0.5, 1.5, 2.5, 3.5])),
        ("w", Series::float(vec![10.0, 20.0, 30.0, 40.0])),
        ("site", Series::categorical(&["west", "east", "west", "east"])),
    ])
    .unwrap();
    let spec = ModelSpec::multilevel("y ~ 1 + x", "site", "1 + w");
    Design::from_spec(&spec, &data, &AdditiveFormula).unwrap()
}

/// Engine output with two chains of three draws where every value is
/// `column * 100 + chain * 10 + draw`.
fn sample_output() -> SampleOutput {
    let names = vec![
        "lp__".to_string(),
        "divergent__".to_string(),
        "alpha_c".to_string(),
        "beta.1".to_string(),
        "sigma".to_string(),
        "alpha".to_string(),
    ];
    let values = Array3::from_shape_fn((6, 2, 3), |(column, chain, draw)| {
        (column * 100 + chain * 10 + draw) as f64
    });
    SampleOutput {
        names,
        values,
        parameter_columns: vec![2, 3, 4],
    }
}

// ==================== Name resolution ====================

#[test]
fn test_resolve_common_names() {
    let index = ParameterIndex::new(&univariate_design());

    assert_eq!(index.resolve("alpha"), "Intercept");
    assert_eq!(index.resolve("alpha_c"), "Intercept_c");
    assert_eq!(index.resolve("sigma"), "sigma");
}

#[test]
fn test_resolve_beta_by_position() {
    let index = ParameterIndex::new(&univariate_design());

    assert_eq!(index.resolve("beta.1"), "x");
    assert_eq!(index.resolve("beta[1]"), "x");
}

#[test]
fn test_resolve_trailing_underscore_vectors() {
    let index = ParameterIndex::new(&univariate_design());

    assert_eq!(index.resolve("u_.3"), "u[3]");
    assert_eq!(index.resolve("u_.2.3"), "u[3]");
}

#[test]
fn test_resolve_passes_unknown_names_through() {
    let index = ParameterIndex::new(&univariate_design());

    assert_eq!(index.resolve("lp__"), "lp__");
    assert_eq!(index.resolve("energy__"), "energy__");
    assert_eq!(index.resolve("Sigma[1,1]"), "Sigma[1,1]");
    assert_eq!(index.resolve("beta.9"), "beta.9");
    assert_eq!(index.resolve("beta.0"), "beta.0");
    assert_eq!(index.resolve("beta"), "beta");
    assert_eq!(index.resolve("a.1.2.3"), "a.1.2.3");
    assert_eq!(index.resolve("not.a.number"), "not.a.number");
    assert_eq!(index.resolve(""), "");
}

#[test]
fn test_resolve_prefixes_outcomes_when_multivariate() {
    let index = ParameterIndex::new(&multivariate_design());

    assert_eq!(index.resolve("alpha.1"), "z1/Intercept");
    assert_eq!(index.resolve("alpha_c.2"), "z2/Intercept_c");
    assert_eq!(index.resolve("sigma.2"), "z2/sigma");
    assert_eq!(index.resolve("beta.1"), "z1/x");
    assert_eq!(index.resolve("beta.2"), "z2/x");
    // No outcome index to select with, or one out of range.
    assert_eq!(index.resolve("alpha"), "alpha");
    assert_eq!(index.resolve("alpha.3"), "alpha.3");
}

#[test]
fn test_resolve_group_coefficients() {
    let index = ParameterIndex::new(&multilevel_design());

    // Levels sort lexically: east is 1, west is 2.
    assert_eq!(index.resolve("Beta.1.1"), "site[east]/Intercept");
    assert_eq!(index.resolve("Beta.1.2"), "site[east]/w");
    assert_eq!(index.resolve("Beta.2.2"), "site[west]/w");
    assert_eq!(index.resolve("Beta[2,1]"), "site[west]/Intercept");
    assert_eq!(index.resolve("Beta.1"), "Beta.1");
    assert_eq!(index.resolve("Beta.1.3"), "Beta.1.3");
    assert_eq!(index.resolve("sigma_Beta.1"), "sigma_Beta.1");
}

#[test]
fn test_resolve_all_keeps_order() {
    let index = ParameterIndex::new(&univariate_design());
    let resolved = index.resolve_all(["alpha_c", "beta.1", "sigma", "alpha"]);

    assert_eq!(resolved, ["Intercept_c", "x", "sigma", "Intercept"]);
}

// ==================== Sample sets ====================

#[test]
fn test_partition_splits_diagnostics_from_parameters() {
    let index = ParameterIndex::new(&univariate_design());
    let set = SampleSet::from_output(sample_output(), &index, None).unwrap();

    assert_eq!(set.diagnostics().names(), ["lp__", "divergent__"]);
    assert_eq!(set.draws().names(), ["Intercept_c", "x", "sigma", "Intercept"]);
    assert_eq!(set.chains(), 2);
    assert_eq!(set.draws_per_chain(), 3);
    assert_eq!(set.parameter_columns(), [2, 3, 4]);
}

#[test]
fn test_flatten_is_chain_blocked() {
    let index = ParameterIndex::new(&univariate_design());
    let set = SampleSet::from_output(sample_output(), &index, None).unwrap();

    // First column of the parameter table is alpha_c (engine column 2).
    let alpha_c = set.draws().column("Intercept_c").unwrap();
    assert_eq!(alpha_c.to_vec(), vec![200.0, 201.0, 202.0, 210.0, 211.0, 212.0]);
}

#[test]
fn test_parameter_draws_restores_engine_layout() {
    let index = ParameterIndex::new(&univariate_design());
    let set = SampleSet::from_output(sample_output(), &index, None).unwrap();

    let cube = set.parameter_draws();
    assert_eq!(cube.dim(), (3, 2, 3));
    assert_abs_diff_eq!(cube[[0, 1, 2]], 212.0);
    assert_abs_diff_eq!(cube[[2, 0, 1]], 401.0);
}

#[test]
fn test_chain_tables_round_trip() {
    let index = ParameterIndex::new(&univariate_design());
    let set = SampleSet::from_output(sample_output(), &index, None).unwrap();

    let tables = set.chain_tables();
    assert_eq!(tables.len(), 2);
    let header = tables[0].lines().next().unwrap();
    assert_eq!(header, "lp__,divergent__,alpha_c,beta.1,sigma,alpha");

    let restored = SampleSet::from_chain_tables(&tables, vec![2, 3, 4], &index).unwrap();
    assert_eq!(restored.chains(), 2);
    assert_eq!(restored.draws().names(), set.draws().names());
    let original = set.draws().column("x").unwrap();
    let recovered = restored.draws().column("x").unwrap();
    for (a, b) in original.iter().zip(recovered.iter()) {
        assert_abs_diff_eq!(*a, *b);
    }
}

#[test]
fn test_chain_tables_reject_inconsistent_input() {
    let index = ParameterIndex::new(&univariate_design());
    let set = SampleSet::from_output(sample_output(), &index, None).unwrap();
    let tables = set.chain_tables();

    let err = SampleSet::from_chain_tables(&[], vec![], &index).unwrap_err();
    assert!(matches!(err, ModelError::State { .. }));

    let mut mismatched = tables.clone();
    mismatched[1] = mismatched[1].replacen("alpha_c", "gamma_c", 1);
    let err = SampleSet::from_chain_tables(&mismatched, vec![2], &index).unwrap_err();
    assert!(matches!(err, ModelError::State { .. }));

    let mut corrupt = tables.clone();
    corrupt[0] = corrupt[0].replacen("2.0", "oops", 1);
    let err = SampleSet::from_chain_tables(&corrupt, vec![2], &index).unwrap_err();
    assert!(matches!(err, ModelError::State { .. }));

    let err = SampleSet::from_chain_tables(&tables, vec![17], &index).unwrap_err();
    assert!(matches!(err, ModelError::State { .. }));
}

#[test]
fn test_filter_kind_selects_by_prefix() {
    let names = vec![
        "mu.1".to_string(),
        "mu.2".to_string(),
        "y.1".to_string(),
        "mu_star.1".to_string(),
    ];
    let values = arr2(&[[1.0, 2.0, 3.0, 4.0], [5.0, 6.0, 7.0, 8.0]]);
    let draws = Draws::new(names, values).unwrap();

    let mu = draws.filter_kind("mu");
    assert_eq!(mu.names(), ["mu.1", "mu.2"]);
    assert_eq!(mu.values().column(1).to_vec(), vec![2.0, 6.0]);

    let y = draws.filter_kind("y");
    assert_eq!(y.names(), ["y.1"]);
}

#[test]
fn test_draws_serde_round_trip() {
    let draws = Draws::new(
        vec!["a".to_string(), "b".to_string()],
        arr2(&[[1.0, 2.0], [3.0, 4.0]]),
    )
    .unwrap();

    let json = serde_json::to_string(&draws).unwrap();
    let restored: Draws = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, draws);
}

// ==================== Summary statistics ====================

#[test]
fn test_percentile_interpolates_linearly() {
    let sorted = [1.0, 2.0, 3.0, 4.0];

    assert_abs_diff_eq!(stats::percentile(&sorted, 0.0), 1.0);
    assert_abs_diff_eq!(stats::percentile(&sorted, 50.0), 2.5);
    assert_abs_diff_eq!(stats::percentile(&sorted, 100.0), 4.0);
    assert_abs_diff_eq!(stats::percentile(&sorted, 25.0), 1.75);
}

#[test]
fn test_autocorrelation_guards_degenerate_series() {
    assert_abs_diff_eq!(stats::autocorrelation(&[2.0, 2.0, 2.0, 2.0], 1), 0.0);
    assert_abs_diff_eq!(stats::autocorrelation(&[1.0, 2.0], 5), 0.0);
}

#[test]
fn test_effective_sample_size_bounds() {
    let ramp: Vec<f64> = (0..40).map(f64::from).collect();
    let ess = stats::effective_sample_size(&ramp);
    assert!(ess > 0.0);
    assert!(ess < 40.0);

    // Zero-variance chains have no autocorrelation signal at all.
    let flat = vec![1.0; 20];
    assert_abs_diff_eq!(stats::effective_sample_size(&flat), 20.0);
}

#[test]
fn test_summarize_known_draws() {
    let draws = Draws::new(
        vec!["theta".to_string()],
        arr2(&[[1.0], [2.0], [3.0], [4.0], [2.0], [3.0], [4.0], [5.0]]),
    )
    .unwrap();

    let summary = summarize(&draws, 2, &[50.0]);
    assert_eq!(summary.parameters.len(), 1);
    let theta = summary.parameter("theta").unwrap();

    assert_abs_diff_eq!(theta.mean, 3.0, epsilon = 1e-12);
    assert_abs_diff_eq!(theta.quantiles[0], 3.0, epsilon = 1e-12);
    // B = 2, W = 5/3, var_plus = 7/4.
    assert_abs_diff_eq!(theta.std_dev, (7.0_f64 / 4.0).sqrt(), epsilon = 1e-12);
    assert_abs_diff_eq!(theta.r_hat, (21.0_f64 / 20.0).sqrt(), epsilon = 1e-12);
    assert!(theta.n_eff > 0.0);
    assert!(theta.mcse > 0.0);
}

#[test]
fn test_summarize_flags_zero_within_chain_variance() {
    let draws = Draws::new(
        vec!["theta".to_string()],
        arr2(&[[1.0], [1.0], [1.0], [2.0], [2.0], [2.0]]),
    )
    .unwrap();

    let summary = summarize(&draws, 2, &[50.0]);
    assert!(summary.parameters[0].r_hat.is_nan());
}

#[test]
fn test_summary_display_lists_columns() {
    let draws = Draws::new(
        vec!["theta".to_string()],
        arr2(&[[1.0], [2.0], [3.0], [4.0]]),
    )
    .unwrap();
    let summary = summarize(&draws, 2, &[5.0, 50.0, 95.0]);

    let text = summary.to_string();
    assert!(text.contains("Parameter"));
    assert!(text.contains("Mean"));
    assert!(text.contains("50%"));
    assert!(text.contains("R_hat"));
    assert!(text.contains("theta"));
}

// ==================== Sampler health ====================

#[test]
fn test_hmc_diagnostics_counts_per_chain() {
    let names = vec![
        "divergent__".to_string(),
        "treedepth__".to_string(),
        "energy__".to_string(),
    ];
    let values = arr2(&[
        [0.0, 10.0, 1.0],
        [1.0, 9.0, 2.0],
        [1.0, 10.0, 4.0],
        [0.0, 8.0, 1.0],
        [0.0, 8.0, 1.0],
        [0.0, 8.0, 1.0],
    ]);
    let diagnostics = Draws::new(names, values).unwrap();

    let health = hmc_diagnostics(&diagnostics, 2, 10);
    assert_eq!(health.len(), 2);

    assert_eq!(health[0].chain, 0);
    assert_eq!(health[0].divergent, 2);
    assert_eq!(health[0].depth_exceeded, 2);
    assert_abs_diff_eq!(health[0].e_bfmi, 15.0 / 14.0, epsilon = 1e-12);

    assert_eq!(health[1].divergent, 0);
    assert_eq!(health[1].depth_exceeded, 0);
    assert!(health[1].e_bfmi.is_nan());
}

#[test]
fn test_hmc_diagnostics_tolerates_missing_columns() {
    let diagnostics = Draws::new(vec!["lp__".to_string()], arr2(&[[1.0], [2.0]])).unwrap();

    let health = hmc_diagnostics(&diagnostics, 1, 10);
    assert_eq!(health[0].divergent, 0);
    assert_eq!(health[0].depth_exceeded, 0);
    assert!(health[0].e_bfmi.is_nan());
}

// ==================== Bayesian R-squared ====================

#[test]
fn test_r_squared_per_draw() {
    let epred = Draws::new(
        vec!["mu.1".to_string(), "mu.2".to_string(), "mu.3".to_string()],
        arr2(&[[1.0, 2.0, 3.0], [2.0, 2.0, 2.0]]),
    )
    .unwrap();
    let sigma = ndarray::arr1(&[1.0, 2.0]);

    let r2 = r_squared(&epred, sigma.view());
    assert_eq!(r2.len(), 2);
    assert_abs_diff_eq!(r2[0], 0.5, epsilon = 1e-12);
    assert_abs_diff_eq!(r2[1], 0.0, epsilon = 1e-12);
}
