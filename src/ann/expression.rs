//! The ANN expression: a CGP chromosome whose edges carry weights and
//! whose nodes carry biases.
//!
//! Forward evaluation of a grid node with id `u` computes the
//! pre-activation `z_u = b_u + Σ_k w_{u,k} · value(src_{u,k})` and the
//! node value `φ(z_u)`, where `φ` is the scalar activation selected by
//! the node's function gene (`sum` is the identity).

use rand::rngs::SmallRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use crate::ann::Activation;
use crate::error::{Error, Result};
use crate::expression::Expression;
use crate::grid::{Grid, GridConfig};
use crate::kernel::{Kernel, KernelSet};

/// A CGP expression with one weight per incoming edge and one bias per
/// grid node, restricted to the ANN-compatible kernel subset
/// `{sig, tanh, ReLu, ELU, ISRU, sum}`.
#[derive(Debug, Clone)]
pub struct ExpressionAnn {
    pub(super) expr: Expression<f64>,
    pub(super) weights: Vec<f64>,
    pub(super) biases: Vec<f64>,
    /// Activation of each kernel in the set, by kernel index.
    pub(super) activations: Vec<Activation>,
}

impl ExpressionAnn {
    /// Build an ANN expression with a random chromosome, all weights at
    /// 1.0 and all biases at 0.0.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KernelIncompatible`] if any kernel is outside
    /// the ANN subset, or [`Error::Input`] for a degenerate shape.
    pub fn new(config: &GridConfig, kernels: &KernelSet<f64>, seed: u64) -> Result<Self> {
        let activations = kernels
            .kernels()
            .iter()
            .map(|k| {
                Activation::from_kernel_name(k.name())
                    .ok_or_else(|| Error::KernelIncompatible(k.name().to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        let expr = Expression::new(config, kernels, seed)?;
        let weights = vec![1.0; expr.grid().num_weights()];
        let biases = vec![0.0; expr.grid().num_biases()];
        Ok(Self {
            expr,
            weights,
            biases,
            activations,
        })
    }

    /// Evaluate the weighted expression at a point.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Input`] if `inputs` does not have one entry per
    /// input node.
    pub fn evaluate(&self, inputs: &[f64]) -> Result<Vec<f64>> {
        if inputs.len() != self.num_inputs() {
            return Err(Error::Input(format!(
                "{} input values for {} inputs",
                inputs.len(),
                self.num_inputs()
            )));
        }
        let grid = self.grid();
        let mut values = vec![0.0; grid.num_nodes()];
        let mut pre = vec![0.0; grid.num_nodes()];
        self.forward(inputs, &mut values, &mut pre);
        Ok(self.collect_outputs(&values))
    }

    /// Forward pass over the active nodes, ascending id order. Fills
    /// node values and pre-activations, both indexed by node id (input
    /// slots of `pre` stay zero).
    pub(super) fn forward(&self, inputs: &[f64], values: &mut [f64], pre: &mut [f64]) {
        let grid = self.grid();
        let n = grid.inputs();
        values[..n].copy_from_slice(inputs);
        let chromosome = self.expr.chromosome();
        for &node in self.expr.active_nodes() {
            if node < n {
                continue;
            }
            let g = grid.gene_start(node);
            let a = grid.node_arity(node);
            let w = grid.weight_start(node);
            let mut z = self.biases[grid.bias_index(node)];
            for k in 0..a {
                z += self.weights[w + k] * values[chromosome[g + 1 + k]];
            }
            pre[node] = z;
            values[node] = self.activations[chromosome[g]].apply(z);
        }
    }

    pub(super) fn collect_outputs(&self, values: &[f64]) -> Vec<f64> {
        let first_out = self.grid().first_output_gene();
        self.expr.chromosome()[first_out..]
            .iter()
            .map(|&src| values[src])
            .collect()
    }

    /// Print the weighted expression symbolically, one string per output.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Input`] if `symbols` does not have one entry per
    /// input node.
    pub fn symbolic(&self, symbols: &[String]) -> Result<Vec<String>> {
        if symbols.len() != self.num_inputs() {
            return Err(Error::Input(format!(
                "{} symbols for {} inputs",
                symbols.len(),
                self.num_inputs()
            )));
        }
        let grid = self.grid();
        let n = grid.inputs();
        let mut values = vec![String::new(); grid.num_nodes()];
        values[..n].clone_from_slice(symbols);
        let chromosome = self.expr.chromosome();

        let mut args: Vec<String> = Vec::new();
        for &node in self.expr.active_nodes() {
            if node < n {
                continue;
            }
            let g = grid.gene_start(node);
            let a = grid.node_arity(node);
            let w = grid.weight_start(node);
            args.clear();
            for k in 0..a {
                args.push(weighted_term(
                    self.weights[w + k],
                    &values[chromosome[g + 1 + k]],
                ));
            }
            let bias = self.biases[grid.bias_index(node)];
            if bias != 0.0 {
                args.push(bias.to_string());
            }
            values[node] = self.expr.kernels()[chromosome[g]].symbol(&args);
        }

        let first_out = grid.first_output_gene();
        Ok(chromosome[first_out..]
            .iter()
            .map(|&src| values[src].clone())
            .collect())
    }

    fn weight_index(&self, node: usize, input_id: usize) -> Result<usize> {
        let grid = self.grid();
        if node < grid.inputs() || node >= grid.num_nodes() {
            return Err(Error::Input(format!(
                "node {node} is not a grid node (valid range {}..{})",
                grid.inputs(),
                grid.num_nodes()
            )));
        }
        if input_id >= grid.node_arity(node) {
            return Err(Error::Input(format!(
                "input slot {input_id} out of range for node {node} with arity {}",
                grid.node_arity(node)
            )));
        }
        Ok(grid.weight_start(node) + input_id)
    }

    /// Set the weight of one incoming edge, addressed by node and slot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Input`] if `node` is not a grid node or
    /// `input_id` exceeds its arity.
    pub fn set_weight(&mut self, node: usize, input_id: usize, w: f64) -> Result<()> {
        let idx = self.weight_index(node, input_id)?;
        self.weights[idx] = w;
        Ok(())
    }

    /// Set a weight by linear index.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Input`] if `idx` is out of range.
    pub fn set_weight_at(&mut self, idx: usize, w: f64) -> Result<()> {
        if idx >= self.weights.len() {
            return Err(Error::Input(format!(
                "weight index {idx} out of range for {} weights",
                self.weights.len()
            )));
        }
        self.weights[idx] = w;
        Ok(())
    }

    /// The weight of one incoming edge, addressed by node and slot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Input`] on the same conditions as [`Self::set_weight`].
    pub fn weight(&self, node: usize, input_id: usize) -> Result<f64> {
        Ok(self.weights[self.weight_index(node, input_id)?])
    }

    /// A weight by linear index.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Input`] if `idx` is out of range.
    pub fn weight_at(&self, idx: usize) -> Result<f64> {
        self.weights
            .get(idx)
            .copied()
            .ok_or_else(|| {
                Error::Input(format!(
                    "weight index {idx} out of range for {} weights",
                    self.weights.len()
                ))
            })
    }

    /// All weights, linearly indexed.
    #[must_use]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Replace all weights.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Input`] on a length mismatch.
    pub fn set_weights(&mut self, weights: &[f64]) -> Result<()> {
        if weights.len() != self.weights.len() {
            return Err(Error::Input(format!(
                "{} weights for an expression with {}",
                weights.len(),
                self.weights.len()
            )));
        }
        self.weights.copy_from_slice(weights);
        Ok(())
    }

    /// Set the bias of a grid node.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Input`] if `node` is not a grid node.
    pub fn set_bias(&mut self, node: usize, b: f64) -> Result<()> {
        let idx = self.bias_index_checked(node)?;
        self.biases[idx] = b;
        Ok(())
    }

    /// Set a bias by linear index.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Input`] if `idx` is out of range.
    pub fn set_bias_at(&mut self, idx: usize, b: f64) -> Result<()> {
        if idx >= self.biases.len() {
            return Err(Error::Input(format!(
                "bias index {idx} out of range for {} biases",
                self.biases.len()
            )));
        }
        self.biases[idx] = b;
        Ok(())
    }

    /// The bias of a grid node.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Input`] if `node` is not a grid node.
    pub fn bias(&self, node: usize) -> Result<f64> {
        Ok(self.biases[self.bias_index_checked(node)?])
    }

    /// A bias by linear index.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Input`] if `idx` is out of range.
    pub fn bias_at(&self, idx: usize) -> Result<f64> {
        self.biases.get(idx).copied().ok_or_else(|| {
            Error::Input(format!(
                "bias index {idx} out of range for {} biases",
                self.biases.len()
            ))
        })
    }

    /// All biases, indexed by `node_id - inputs`.
    #[must_use]
    pub fn biases(&self) -> &[f64] {
        &self.biases
    }

    /// Replace all biases.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Input`] on a length mismatch.
    pub fn set_biases(&mut self, biases: &[f64]) -> Result<()> {
        if biases.len() != self.biases.len() {
            return Err(Error::Input(format!(
                "{} biases for an expression with {}",
                biases.len(),
                self.biases.len()
            )));
        }
        self.biases.copy_from_slice(biases);
        Ok(())
    }

    fn bias_index_checked(&self, node: usize) -> Result<usize> {
        let grid = self.grid();
        if node < grid.inputs() || node >= grid.num_nodes() {
            return Err(Error::Input(format!(
                "node {node} is not a grid node (valid range {}..{})",
                grid.inputs(),
                grid.num_nodes()
            )));
        }
        Ok(grid.bias_index(node))
    }

    /// Redraw every weight from `N(mean, std)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Input`] if `std` is not a valid standard deviation.
    pub fn randomise_weights(&mut self, mean: f64, std: f64, seed: u64) -> Result<()> {
        let normal = Normal::new(mean, std).map_err(|e| Error::Input(e.to_string()))?;
        let mut rng = SmallRng::seed_from_u64(seed);
        for w in &mut self.weights {
            *w = normal.sample(&mut rng);
        }
        Ok(())
    }

    /// Redraw every bias from `N(mean, std)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Input`] if `std` is not a valid standard deviation.
    pub fn randomise_biases(&mut self, mean: f64, std: f64, seed: u64) -> Result<()> {
        let normal = Normal::new(mean, std).map_err(|e| Error::Input(e.to_string()))?;
        let mut rng = SmallRng::seed_from_u64(seed);
        for b in &mut self.biases {
            *b = normal.sample(&mut rng);
        }
        Ok(())
    }

    /// Set the function gene of every node directly feeding an output.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Input`] if `name` is not in this expression's
    /// kernel set.
    pub fn set_output_f(&mut self, name: &str) -> Result<()> {
        let f_id = self
            .expr
            .kernels()
            .iter()
            .position(|k| k.name() == name)
            .ok_or_else(|| {
                Error::Input(format!("kernel '{name}' is not in the kernel set"))
            })?;
        let n = self.num_inputs();
        let first_out = self.grid().first_output_gene();
        let targets: Vec<usize> = self.expr.chromosome()[first_out..]
            .iter()
            .copied()
            .filter(|&node| node >= n)
            .collect();
        for node in targets {
            self.expr.set_f_gene(node, f_id)?;
        }
        Ok(())
    }

    /// Number of weights attached to the active subgraph. With
    /// `unique`, parallel edges between the same source and destination
    /// node count once.
    #[must_use]
    pub fn n_active_weights(&self, unique: bool) -> usize {
        let grid = self.grid();
        let n = grid.inputs();
        let chromosome = self.expr.chromosome();
        let mut count = 0;
        let mut sources: Vec<usize> = Vec::new();
        for &node in self.expr.active_nodes() {
            if node < n {
                continue;
            }
            let a = grid.node_arity(node);
            if unique {
                let g = grid.gene_start(node);
                sources.clear();
                sources.extend_from_slice(&chromosome[g + 1..=g + a]);
                sources.sort_unstable();
                sources.dedup();
                count += sources.len();
            } else {
                count += a;
            }
        }
        count
    }

    // Chromosome handling delegates to the underlying expression; the
    // weight and bias vectors are shape-addressed, so they stay valid
    // across any chromosome edit.

    /// See [`Expression::chromosome`].
    #[must_use]
    pub fn chromosome(&self) -> &[usize] {
        self.expr.chromosome()
    }

    /// See [`Expression::set`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Input`] if the chromosome does not fit this shape.
    pub fn set(&mut self, chromosome: &[usize]) -> Result<()> {
        self.expr.set(chromosome)
    }

    /// See [`Expression::set_f_gene`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Input`] on an invalid node or kernel index.
    pub fn set_f_gene(&mut self, node: usize, f_id: usize) -> Result<()> {
        self.expr.set_f_gene(node, f_id)
    }

    /// See [`Expression::mutate`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Input`] if any gene index is out of range.
    pub fn mutate(&mut self, idxs: &[usize]) -> Result<()> {
        self.expr.mutate(idxs)
    }

    /// See [`Expression::mutate_active`].
    pub fn mutate_active(&mut self, n_muts: usize) {
        self.expr.mutate_active(n_muts);
    }

    /// See [`Expression::mutate_random`].
    pub fn mutate_random(&mut self, n_muts: usize) {
        self.expr.mutate_random(n_muts);
    }

    #[must_use]
    pub fn active_nodes(&self) -> &[usize] {
        self.expr.active_nodes()
    }

    #[must_use]
    pub fn active_genes(&self) -> &[usize] {
        self.expr.active_genes()
    }

    #[must_use]
    pub fn num_inputs(&self) -> usize {
        self.expr.num_inputs()
    }

    #[must_use]
    pub fn num_outputs(&self) -> usize {
        self.expr.num_outputs()
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.expr.rows()
    }

    #[must_use]
    pub fn cols(&self) -> usize {
        self.expr.cols()
    }

    #[must_use]
    pub fn levels_back(&self) -> usize {
        self.expr.levels_back()
    }

    #[must_use]
    pub fn arities(&self) -> &[usize] {
        self.expr.arities()
    }

    #[must_use]
    pub fn grid(&self) -> &Grid {
        self.expr.grid()
    }

    /// The kernels referenced by function genes, in order.
    #[must_use]
    pub fn kernels(&self) -> &[Kernel<f64>] {
        self.expr.kernels()
    }
}

impl std::fmt::Display for ExpressionAnn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.expr)?;
        writeln!(f, "\tweights:\t\t{:?}", self.weights)?;
        write!(f, "\tbiases:\t\t\t{:?}", self.biases)
    }
}

fn weighted_term(w: f64, symbol: &str) -> String {
    if w == 0.0 {
        "0".to_string()
    } else if w == 1.0 {
        symbol.to_string()
    } else {
        format!("{w}*{symbol}")
    }
}
