//! Storage for posterior draws

use ndarray::{Array2, Array3, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

use bo_core::data::Matrix;

use crate::draws::mapper::{ParameterIndex, kind_of};
use crate::engine::SampleOutput;
use crate::error::{ModelError, Result};

/// Floating point format used for persisted chain tables. 17 significant
/// digits round-trip an f64 exactly.
const TABLE_PRECISION: usize = 17;

/// A flat table of draws: one row per draw, one column per quantity.
///
/// Rows are chain-blocked: all of chain 0's draws come first, then all
/// of chain 1's, and so on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Draws {
    names: Vec<String>,
    values: Matrix,
}

impl Draws {
    pub(crate) fn new(names: Vec<String>, values: Matrix) -> Result<Self> {
        if names.len() != values.ncols() {
            return Err(ModelError::State {
                message: format!(
                    "{} names for {} draw columns",
                    names.len(),
                    values.ncols()
                ),
            });
        }
        Ok(Self { names, values })
    }

    /// Flatten engine output shaped `[column][chain][draw]` into the
    /// chain-blocked row layout.
    pub(crate) fn from_engine(names: Vec<String>, values: &Array3<f64>) -> Result<Self> {
        let (columns, chains, draws) = values.dim();
        if names.len() != columns {
            return Err(ModelError::State {
                message: format!("{} names for {} engine columns", names.len(), columns),
            });
        }
        let flat = Array2::from_shape_fn((chains * draws, columns), |(row, column)| {
            values[[column, row / draws, row % draws]]
        });
        Ok(Self {
            names,
            values: flat,
        })
    }

    /// Column names, in engine order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// The full table, one row per draw.
    pub fn values(&self) -> &Matrix {
        &self.values
    }

    /// Number of draws (rows).
    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    /// Number of quantities (columns).
    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }

    /// All draws of one named quantity.
    pub fn column(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        let index = self.names.iter().position(|n| n == name)?;
        Some(self.values.column(index))
    }

    /// The sub-table whose column kinds match `kind` (`mu` selects
    /// `mu.1`, `mu.2`, ... but not `mu_star.1`), preserving order.
    pub fn filter_kind(&self, kind: &str) -> Draws {
        let indices: Vec<usize> = self
            .names
            .iter()
            .enumerate()
            .filter(|(_, name)| kind_of(name) == kind)
            .map(|(index, _)| index)
            .collect();
        self.select(&indices)
    }

    /// The sub-table holding the given columns, in the given order.
    pub(crate) fn select(&self, indices: &[usize]) -> Draws {
        let names = indices
            .iter()
            .map(|&index| self.names[index].clone())
            .collect();
        Draws {
            names,
            values: self.values.select(Axis(1), indices),
        }
    }
}

/// Draws from one sampling pass, partitioned into sampler diagnostics
/// and model parameters.
///
/// The raw engine table is kept alongside the partitions so the exact
/// engine output can be persisted and fed back into a
/// generated-quantities pass. The scratch directory the engine sampled
/// in, if any, lives as long as the set and is removed on drop.
#[derive(Debug)]
pub struct SampleSet {
    table: Draws,
    parameter_columns: Vec<usize>,
    chains: usize,
    diagnostics: Draws,
    parameters: Draws,
    scratch: Option<TempDir>,
}

impl SampleSet {
    /// Partition a sampling pass's output and resolve parameter names.
    pub(crate) fn from_output(
        output: SampleOutput,
        index: &ParameterIndex,
        scratch: Option<TempDir>,
    ) -> Result<Self> {
        let (_, chains, _) = output.values.dim();
        let table = Draws::from_engine(output.names, &output.values)?;
        Self::build(table, output.parameter_columns, chains, index, scratch)
    }

    /// Rebuild a set from persisted per-chain tables.
    pub(crate) fn from_chain_tables(
        tables: &[String],
        parameter_columns: Vec<usize>,
        index: &ParameterIndex,
    ) -> Result<Self> {
        if tables.is_empty() {
            return Err(ModelError::State {
                message: "no chain tables".to_string(),
            });
        }

        let mut names: Option<Vec<String>> = None;
        let mut rows: Vec<Vec<f64>> = Vec::new();
        let mut draws_per_chain: Option<usize> = None;

        for (chain, text) in tables.iter().enumerate() {
            let mut lines = text.lines();
            let header: Vec<String> = lines
                .next()
                .ok_or_else(|| ModelError::State {
                    message: format!("chain table {chain} is empty"),
                })?
                .split(',')
                .map(str::to_string)
                .collect();
            match &names {
                None => names = Some(header),
                Some(expected) if *expected == header => {}
                Some(_) => {
                    return Err(ModelError::State {
                        message: format!("chain table {chain} has a different header"),
                    });
                }
            }

            let mut chain_rows = 0;
            for line in lines {
                let row = line
                    .split(',')
                    .map(|cell| {
                        cell.parse::<f64>().map_err(|_| ModelError::State {
                            message: format!("chain table {chain} holds non-numeric cell '{cell}'"),
                        })
                    })
                    .collect::<Result<Vec<f64>>>()?;
                rows.push(row);
                chain_rows += 1;
            }
            match draws_per_chain {
                None => draws_per_chain = Some(chain_rows),
                Some(expected) if expected == chain_rows => {}
                Some(expected) => {
                    return Err(ModelError::State {
                        message: format!(
                            "chain table {chain} holds {chain_rows} draws, expected {expected}"
                        ),
                    });
                }
            }
        }

        let names = names.unwrap_or_default();
        let columns = names.len();
        let mut flat = Array2::zeros((rows.len(), columns));
        for (index, row) in rows.iter().enumerate() {
            if row.len() != columns {
                return Err(ModelError::State {
                    message: format!(
                        "draw row {index} holds {} cells, expected {columns}",
                        row.len()
                    ),
                });
            }
            for (column, &value) in row.iter().enumerate() {
                flat[[index, column]] = value;
            }
        }

        let table = Draws::new(names, flat)?;
        Self::build(table, parameter_columns, tables.len(), index, None)
    }

    fn build(
        table: Draws,
        parameter_columns: Vec<usize>,
        chains: usize,
        index: &ParameterIndex,
        scratch: Option<TempDir>,
    ) -> Result<Self> {
        if chains == 0 || table.nrows() % chains != 0 {
            return Err(ModelError::State {
                message: format!("{} draws do not split into {chains} chains", table.nrows()),
            });
        }
        if let Some(&out_of_range) = parameter_columns
            .iter()
            .find(|&&column| column >= table.ncols())
        {
            return Err(ModelError::State {
                message: format!(
                    "parameter column {out_of_range} out of range for {} columns",
                    table.ncols()
                ),
            });
        }

        let mut diagnostic_columns = Vec::new();
        let mut model_columns = Vec::new();
        for (column, name) in table.names().iter().enumerate() {
            if name.ends_with("__") {
                diagnostic_columns.push(column);
            } else {
                model_columns.push(column);
            }
        }

        let diagnostics = table.select(&diagnostic_columns);
        let mut parameters = table.select(&model_columns);
        parameters.names = index.resolve_all(parameters.names.iter().map(String::as_str));

        Ok(Self {
            table,
            parameter_columns,
            chains,
            diagnostics,
            parameters,
            scratch,
        })
    }

    /// Model parameter draws under their resolved names.
    pub fn draws(&self) -> &Draws {
        &self.parameters
    }

    /// Sampler diagnostic draws under their engine names.
    pub fn diagnostics(&self) -> &Draws {
        &self.diagnostics
    }

    /// Number of chains the draws came from.
    pub fn chains(&self) -> usize {
        self.chains
    }

    /// Number of kept draws per chain.
    pub fn draws_per_chain(&self) -> usize {
        self.table.nrows() / self.chains
    }

    /// Engine-declared indices of the sampled parameter columns.
    pub fn parameter_columns(&self) -> &[usize] {
        &self.parameter_columns
    }

    /// The sampled parameters reshaped to `[parameter][chain][draw]`,
    /// ready for a generated-quantities pass.
    pub(crate) fn parameter_draws(&self) -> Array3<f64> {
        let draws = self.draws_per_chain();
        Array3::from_shape_fn(
            (self.parameter_columns.len(), self.chains, draws),
            |(parameter, chain, draw)| {
                self.table.values[[chain * draws + draw, self.parameter_columns[parameter]]]
            },
        )
    }

    /// Render each chain's slice of the raw table as comma-separated
    /// text, full precision, engine column names in the header.
    pub(crate) fn chain_tables(&self) -> Vec<String> {
        let draws = self.draws_per_chain();
        let header = self.table.names().join(",");
        (0..self.chains)
            .map(|chain| {
                let mut text = String::with_capacity((draws + 1) * self.table.ncols() * 8);
                text.push_str(&header);
                text.push('\n');
                for draw in 0..draws {
                    let row = self.table.values.row(chain * draws + draw);
                    for (column, value) in row.iter().enumerate() {
                        if column > 0 {
                            text.push(',');
                        }
                        text.push_str(&format!("{value:.prec$e}", prec = TABLE_PRECISION));
                    }
                    text.push('\n');
                }
                text
            })
            .collect()
    }
}
