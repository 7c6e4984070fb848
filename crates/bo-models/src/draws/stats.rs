//! Summary statistics over posterior draws

use std::fmt;

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

use bo_core::data::FloatArray;

use crate::draws::samples::Draws;

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn variance(values: &[f64], ddof: f64) -> f64 {
    let n = values.len() as f64;
    if n - ddof <= 0.0 {
        return f64::NAN;
    }
    let center = mean(values);
    values.iter().map(|v| (v - center).powi(2)).sum::<f64>() / (n - ddof)
}

/// Lag-k autocorrelation, biased denominator.
pub(crate) fn autocorrelation(values: &[f64], lag: usize) -> f64 {
    let n = values.len();
    if lag >= n {
        return 0.0;
    }
    let center = mean(values);
    let denominator = values.iter().map(|v| (v - center).powi(2)).sum::<f64>() / n as f64;
    if denominator < 1e-15 {
        return 0.0;
    }
    let covariance = (0..n - lag)
        .map(|i| (values[i] - center) * (values[i + lag] - center))
        .sum::<f64>()
        / n as f64;
    covariance / denominator
}

/// Effective sample size of one chain from its integrated
/// autocorrelation time. Truncates the sum at the first negligible lag.
pub(crate) fn effective_sample_size(values: &[f64]) -> f64 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    let max_lag = (n / 2).min(100);
    let mut tau = 1.0;
    for lag in 1..max_lag {
        let rho = autocorrelation(values, lag);
        if rho.abs() < 0.05 {
            break;
        }
        tau += 2.0 * rho;
    }
    if tau <= 0.0 {
        return n as f64;
    }
    (n as f64 / tau).min(n as f64)
}

/// Linear-interpolation percentile of a sorted slice, `p` in percent.
pub(crate) fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let last = (sorted.len() - 1) as f64;
    let rank = ((p / 100.0) * last).clamp(0.0, last);
    let low = rank.floor() as usize;
    let high = rank.ceil() as usize;
    if low == high {
        return sorted[low];
    }
    let weight = rank - low as f64;
    sorted[low] * (1.0 - weight) + sorted[high] * weight
}

/// Convergence and location statistics for one parameter.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParameterSummary {
    /// Resolved parameter name
    pub name: String,
    /// Posterior mean
    pub mean: f64,
    /// Monte Carlo standard error of the mean
    pub mcse: f64,
    /// Posterior standard deviation, between-chain inflated
    pub std_dev: f64,
    /// Values at the summary's percentiles, in order
    pub quantiles: Vec<f64>,
    /// Effective sample size across chains
    pub n_eff: f64,
    /// Potential scale reduction factor; NaN when within-chain
    /// variance vanishes
    pub r_hat: f64,
}

/// Per-parameter summaries for one sampling pass.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FitSummary {
    /// Percentile levels the quantile columns were computed at
    pub percentiles: Vec<f64>,
    /// One row per model parameter, engine order
    pub parameters: Vec<ParameterSummary>,
}

impl FitSummary {
    /// Look up one parameter's row by resolved name.
    pub fn parameter(&self, name: &str) -> Option<&ParameterSummary> {
        self.parameters.iter().find(|summary| summary.name == name)
    }
}

fn percentile_label(p: f64) -> String {
    if p.fract() == 0.0 {
        format!("{p:.0}%")
    } else {
        format!("{p}%")
    }
}

impl fmt::Display for FitSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<20}", "Parameter")?;
        write!(f, " {:>12} {:>12} {:>12}", "Mean", "MCSE", "StdDev")?;
        for p in &self.percentiles {
            write!(f, " {:>12}", percentile_label(*p))?;
        }
        writeln!(f, " {:>12} {:>12}", "N_Eff", "R_hat")?;

        write!(f, "{:-<20}", "")?;
        for _ in 0..self.percentiles.len() + 5 {
            write!(f, " {:-<12}", "")?;
        }
        writeln!(f)?;

        for parameter in &self.parameters {
            write!(f, "{:<20}", parameter.name)?;
            write!(
                f,
                " {:>12.6} {:>12.6} {:>12.6}",
                parameter.mean, parameter.mcse, parameter.std_dev
            )?;
            for quantile in &parameter.quantiles {
                write!(f, " {quantile:>12.6}")?;
            }
            writeln!(f, " {:>12.1} {:>12.4}", parameter.n_eff, parameter.r_hat)?;
        }
        Ok(())
    }
}

/// Summarize every column of a chain-blocked draw table.
pub(crate) fn summarize(draws: &Draws, chains: usize, percentiles: &[f64]) -> FitSummary {
    let total = draws.nrows();
    let per_chain = if chains > 0 { total / chains } else { 0 };

    let parameters = draws
        .names()
        .iter()
        .enumerate()
        .map(|(index, name)| {
            let column: Vec<f64> = draws.values().column(index).to_vec();
            summarize_column(name, &column, chains, per_chain, percentiles)
        })
        .collect();

    FitSummary {
        percentiles: percentiles.to_vec(),
        parameters,
    }
}

fn summarize_column(
    name: &str,
    column: &[f64],
    chains: usize,
    per_chain: usize,
    percentiles: &[f64],
) -> ParameterSummary {
    let overall_mean = mean(column);

    // Split-free potential scale reduction: between-chain variance B
    // against the mean within-chain variance W.
    let (std_dev, r_hat) = if chains >= 2 && per_chain >= 2 {
        let blocks: Vec<&[f64]> = column.chunks_exact(per_chain).collect();
        let chain_means: Vec<f64> = blocks.iter().map(|block| mean(block)).collect();
        let chain_vars: Vec<f64> = blocks.iter().map(|block| variance(block, 1.0)).collect();
        let b = per_chain as f64 * variance(&chain_means, 1.0);
        let w = mean(&chain_vars);
        let var_plus = ((per_chain as f64 - 1.0) * w + b) / per_chain as f64;
        let r_hat = if w > 0.0 { (var_plus / w).sqrt() } else { f64::NAN };
        (var_plus.sqrt(), r_hat)
    } else {
        (variance(column, 1.0).sqrt(), f64::NAN)
    };

    let n_eff = if per_chain > 0 {
        column
            .chunks_exact(per_chain)
            .map(effective_sample_size)
            .sum::<f64>()
            .min(column.len() as f64)
    } else {
        0.0
    };
    let mcse = if n_eff > 0.0 {
        std_dev / n_eff.sqrt()
    } else {
        f64::NAN
    };

    let mut sorted = column.to_vec();
    sorted.sort_unstable_by(f64::total_cmp);
    let quantiles = percentiles
        .iter()
        .map(|&p| percentile(&sorted, p))
        .collect();

    ParameterSummary {
        name: name.to_string(),
        mean: overall_mean,
        mcse,
        std_dev,
        quantiles,
        n_eff,
        r_hat,
    }
}

/// Per-chain sampler health counters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChainDiagnostics {
    /// Chain index, zero-based
    pub chain: usize,
    /// Post-warmup divergent transitions
    pub divergent: usize,
    /// Draws that saturated the tree depth limit
    pub depth_exceeded: usize,
    /// Energy Bayesian fraction of missing information; NaN when the
    /// engine reported no energy column
    pub e_bfmi: f64,
}

/// One chain's slice of a diagnostic column, if the engine reported it.
fn chain_block(
    column: Option<ArrayView1<'_, f64>>,
    chain: usize,
    per_chain: usize,
) -> Option<Vec<f64>> {
    column.map(|values| {
        values
            .iter()
            .skip(chain * per_chain)
            .take(per_chain)
            .copied()
            .collect()
    })
}

/// Read the sampler's own health columns per chain.
pub(crate) fn hmc_diagnostics(
    diagnostics: &Draws,
    chains: usize,
    max_depth: usize,
) -> Vec<ChainDiagnostics> {
    let per_chain = if chains > 0 {
        diagnostics.nrows() / chains
    } else {
        0
    };

    (0..chains)
        .map(|chain| {
            let divergent = chain_block(diagnostics.column("divergent__"), chain, per_chain)
                .map(|values| values.iter().filter(|&&v| v != 0.0).count())
                .unwrap_or(0);
            let depth_exceeded = chain_block(diagnostics.column("treedepth__"), chain, per_chain)
                .map(|values| {
                    values
                        .iter()
                        .filter(|&&v| v >= max_depth as f64)
                        .count()
                })
                .unwrap_or(0);
            let e_bfmi = chain_block(diagnostics.column("energy__"), chain, per_chain)
                .map(|energy| {
                    let center = mean(&energy);
                    let jumps: f64 = energy.windows(2).map(|w| (w[1] - w[0]).powi(2)).sum();
                    let spread: f64 = energy.iter().map(|e| (e - center).powi(2)).sum();
                    jumps / spread
                })
                .unwrap_or(f64::NAN);
            ChainDiagnostics {
                chain,
                divergent,
                depth_exceeded,
                e_bfmi,
            }
        })
        .collect()
}

/// Bayesian R-squared, one value per draw: the variance of the
/// posterior expected values across observations against the residual
/// variance implied by that draw's sigma.
pub(crate) fn r_squared(epred: &Draws, sigma: ArrayView1<'_, f64>) -> FloatArray {
    FloatArray::from_shape_fn(epred.nrows(), |row| {
        let expected: Vec<f64> = epred.values().row(row).to_vec();
        let fit_variance = variance(&expected, 1.0);
        let residual_variance = sigma[row] * sigma[row];
        fit_variance / (fit_variance + residual_variance)
    })
}
