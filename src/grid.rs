//! Chromosome topology: grid shape, per-gene bounds, and the index
//! arithmetic tying genes, nodes, and edge weights together.
//!
//! A chromosome encodes a rectangular grid of kernel nodes. For each
//! column `j` and row `i` it carries one function gene followed by
//! `a_j` connection genes; `m` output genes close the sequence. Node
//! ids assign `0..n` to the inputs and `n + j*rows + i` to the node at
//! `(column j, row i)`. The connection bounds only allow a node to read
//! from columns at most `levels_back` to its left (or the inputs when
//! reachable under that rule), so every valid chromosome is a DAG.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Node fan-in: one value for every column, or explicit per-column values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Arity {
    /// Every column has the same fan-in.
    Uniform(usize),
    /// One fan-in per column; the length must equal the column count.
    PerColumn(Vec<usize>),
}

/// Shape parameters for a CGP grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridConfig {
    /// Number of input nodes (independent variables).
    pub inputs: usize,
    /// Number of outputs (dependent variables).
    pub outputs: usize,
    /// Number of rows.
    pub rows: usize,
    /// Number of columns.
    pub cols: usize,
    /// How many columns back a connection may reach.
    pub levels_back: usize,
    /// Node fan-in.
    pub arity: Arity,
}

impl GridConfig {
    /// Convenience constructor for uniform arity.
    #[must_use]
    pub fn new(
        inputs: usize,
        outputs: usize,
        rows: usize,
        cols: usize,
        levels_back: usize,
        arity: usize,
    ) -> Self {
        Self {
            inputs,
            outputs,
            rows,
            cols,
            levels_back,
            arity: Arity::Uniform(arity),
        }
    }
}

/// Resolved topology of one expression: chromosome length, per-gene
/// bounds, and gene/weight offsets for every column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    inputs: usize,
    outputs: usize,
    rows: usize,
    cols: usize,
    levels_back: usize,
    /// Fan-in of each column.
    arities: Vec<usize>,
    /// First gene index of each column, plus the total node-gene count
    /// as the final entry (so `gene_offsets[cols]` is where the output
    /// genes start).
    gene_offsets: Vec<usize>,
    /// First weight index of each column, plus the total weight count.
    weight_offsets: Vec<usize>,
    /// Inclusive per-gene lower bounds.
    lb: Vec<usize>,
    /// Inclusive per-gene upper bounds.
    ub: Vec<usize>,
}

impl Grid {
    /// Resolve a shape against a kernel count.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Input`] if any dimension or `n_kernels` is zero,
    /// if any column arity is zero, or if a per-column arity vector does
    /// not have one entry per column.
    pub fn new(config: &GridConfig, n_kernels: usize) -> Result<Self> {
        if config.inputs == 0 {
            return Err(Error::Input("number of inputs is 0".to_string()));
        }
        if config.outputs == 0 {
            return Err(Error::Input("number of outputs is 0".to_string()));
        }
        if config.rows == 0 {
            return Err(Error::Input("number of rows is 0".to_string()));
        }
        if config.cols == 0 {
            return Err(Error::Input("number of columns is 0".to_string()));
        }
        if config.levels_back == 0 {
            return Err(Error::Input("number of levels-back is 0".to_string()));
        }
        if n_kernels == 0 {
            return Err(Error::Input("number of kernels is 0".to_string()));
        }

        let arities = match &config.arity {
            Arity::Uniform(a) => vec![*a; config.cols],
            Arity::PerColumn(v) => {
                if v.len() != config.cols {
                    return Err(Error::Input(format!(
                        "arity vector has {} entries, expected one per column ({})",
                        v.len(),
                        config.cols
                    )));
                }
                v.clone()
            }
        };
        if arities.iter().any(|&a| a == 0) {
            return Err(Error::Input("column arity is 0".to_string()));
        }

        let (inputs, outputs) = (config.inputs, config.outputs);
        let (rows, cols, levels_back) = (config.rows, config.cols, config.levels_back);

        let mut gene_offsets = Vec::with_capacity(cols + 1);
        let mut weight_offsets = Vec::with_capacity(cols + 1);
        let mut genes = 0;
        let mut weights = 0;
        for &a in &arities {
            gene_offsets.push(genes);
            weight_offsets.push(weights);
            genes += rows * (1 + a);
            weights += rows * a;
        }
        gene_offsets.push(genes);
        weight_offsets.push(weights);

        let len = genes + outputs;
        let mut lb = vec![0; len];
        let mut ub = vec![0; len];

        for (j, &a) in arities.iter().enumerate() {
            // Connections of column j may read node ids up to the end of
            // column j-1, and down to the start of column j-levels_back.
            let conn_ub = inputs + j * rows - 1;
            let conn_lb = if j >= levels_back {
                inputs + rows * (j - levels_back)
            } else {
                0
            };
            for i in 0..rows {
                let g = gene_offsets[j] + i * (1 + a);
                ub[g] = n_kernels - 1;
                for k in 0..a {
                    lb[g + 1 + k] = conn_lb;
                    ub[g + 1 + k] = conn_ub;
                }
            }
        }
        for o in 0..outputs {
            let g = genes + o;
            ub[g] = inputs + rows * cols - 1;
            if levels_back <= cols {
                lb[g] = inputs + rows * (cols - levels_back);
            }
        }

        Ok(Self {
            inputs,
            outputs,
            rows,
            cols,
            levels_back,
            arities,
            gene_offsets,
            weight_offsets,
            lb,
            ub,
        })
    }

    /// Chromosome length.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lb.len()
    }

    /// Always false: a valid grid has at least one output gene.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lb.is_empty()
    }

    #[must_use]
    pub fn inputs(&self) -> usize {
        self.inputs
    }

    #[must_use]
    pub fn outputs(&self) -> usize {
        self.outputs
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[must_use]
    pub fn levels_back(&self) -> usize {
        self.levels_back
    }

    /// Fan-in of each column.
    #[must_use]
    pub fn arities(&self) -> &[usize] {
        &self.arities
    }

    /// Inclusive per-gene lower bounds.
    #[must_use]
    pub fn lower_bounds(&self) -> &[usize] {
        &self.lb
    }

    /// Inclusive per-gene upper bounds.
    #[must_use]
    pub fn upper_bounds(&self) -> &[usize] {
        &self.ub
    }

    /// Total node count, inputs included.
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.inputs + self.rows * self.cols
    }

    /// Total incoming-edge count over all grid nodes.
    #[must_use]
    pub fn num_weights(&self) -> usize {
        self.weight_offsets[self.cols]
    }

    /// One bias per grid node.
    #[must_use]
    pub fn num_biases(&self) -> usize {
        self.rows * self.cols
    }

    /// Index of the first output gene.
    #[must_use]
    pub fn first_output_gene(&self) -> usize {
        self.gene_offsets[self.cols]
    }

    /// Column of a non-input node.
    #[must_use]
    pub fn column_of(&self, node: usize) -> usize {
        debug_assert!(node >= self.inputs);
        (node - self.inputs) / self.rows
    }

    /// Fan-in of a non-input node.
    #[must_use]
    pub fn node_arity(&self, node: usize) -> usize {
        self.arities[self.column_of(node)]
    }

    /// Index of a non-input node's function gene; its connection genes
    /// follow immediately.
    #[must_use]
    pub fn gene_start(&self, node: usize) -> usize {
        let j = self.column_of(node);
        let i = (node - self.inputs) % self.rows;
        self.gene_offsets[j] + i * (1 + self.arities[j])
    }

    /// Linear index of a non-input node's first weight; one weight per
    /// connection gene follows.
    #[must_use]
    pub fn weight_start(&self, node: usize) -> usize {
        let j = self.column_of(node);
        let i = (node - self.inputs) % self.rows;
        self.weight_offsets[j] + i * self.arities[j]
    }

    /// Index of a non-input node's bias.
    #[must_use]
    pub fn bias_index(&self, node: usize) -> usize {
        debug_assert!(node >= self.inputs);
        node - self.inputs
    }

    /// Whether a chromosome has the right length and every gene lies
    /// within its inclusive bounds.
    #[must_use]
    pub fn is_valid(&self, chromosome: &[usize]) -> bool {
        chromosome.len() == self.len()
            && chromosome
                .iter()
                .zip(self.lb.iter().zip(self.ub.iter()))
                .all(|(&x, (&lo, &hi))| x >= lo && x <= hi)
    }
}
