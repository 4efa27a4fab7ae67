//! The generic CGP expression: a chromosome over a kernel set, with
//! seeded mutation, numeric evaluation, and symbolic printing.
//!
//! An [`Expression`] owns its topology ([`Grid`]), its kernels, the
//! current chromosome, and a seeded RNG. The RNG advances only on
//! construction and mutation; evaluation is pure. The set of *active*
//! nodes and genes (those reachable from at least one output) is
//! recomputed after every structural edit and cached.

use std::fmt;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::error::{Error, Result};
use crate::grid::{Grid, GridConfig};
use crate::kernel::{Kernel, KernelSet};
use crate::loss::{self, LossKind};
use crate::scalar::Scalar;

/// A CGP expression over the numeric domain `T`.
#[derive(Debug, Clone)]
pub struct Expression<T: Scalar> {
    grid: Grid,
    kernels: Vec<Kernel<T>>,
    chromosome: Vec<usize>,
    active_nodes: Vec<usize>,
    active_genes: Vec<usize>,
    rng: SmallRng,
}

impl<T: Scalar> Expression<T> {
    /// Build an expression with a uniformly random chromosome sampled
    /// within the per-gene bounds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Input`] if the shape is degenerate (any zero
    /// dimension, zero or mismatched arity) or the kernel set is empty.
    pub fn new(config: &GridConfig, kernels: &KernelSet<T>, seed: u64) -> Result<Self> {
        if kernels.is_empty() {
            return Err(Error::Input("number of kernels is 0".to_string()));
        }
        let grid = Grid::new(config, kernels.len())?;
        let mut rng = SmallRng::seed_from_u64(seed);
        let chromosome: Vec<usize> = grid
            .lower_bounds()
            .iter()
            .zip(grid.upper_bounds())
            .map(|(&lo, &hi)| rng.gen_range(lo..=hi))
            .collect();

        let mut expr = Self {
            grid,
            kernels: kernels.call(),
            chromosome,
            active_nodes: Vec::new(),
            active_genes: Vec::new(),
            rng,
        };
        expr.update_active();
        Ok(expr)
    }

    /// The current chromosome.
    #[must_use]
    pub fn chromosome(&self) -> &[usize] {
        &self.chromosome
    }

    /// Replace the chromosome after validating length and per-gene bounds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Input`] if the chromosome does not fit this shape.
    pub fn set(&mut self, chromosome: &[usize]) -> Result<()> {
        if !self.grid.is_valid(chromosome) {
            return Err(Error::Input("Chromosome is incompatible".to_string()));
        }
        self.chromosome.clear();
        self.chromosome.extend_from_slice(chromosome);
        self.update_active();
        Ok(())
    }

    /// Set the function gene of a single non-input node.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Input`] if `node` is an input or out of range,
    /// or `f_id` does not index a kernel.
    pub fn set_f_gene(&mut self, node: usize, f_id: usize) -> Result<()> {
        let n = self.grid.inputs();
        if node < n || node >= self.grid.num_nodes() {
            return Err(Error::Input(format!(
                "node {node} is not a grid node (valid range {n}..{})",
                self.grid.num_nodes()
            )));
        }
        if f_id >= self.kernels.len() {
            return Err(Error::Input(format!(
                "function gene {f_id} out of range for {} kernels",
                self.kernels.len()
            )));
        }
        let g = self.grid.gene_start(node);
        self.chromosome[g] = f_id;
        self.update_active();
        Ok(())
    }

    /// Mutate the listed genes: each gene whose bounds allow more than
    /// one value is redrawn uniformly until it differs from its current
    /// value. Genes with a single admissible value are left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Input`] if any index is out of range; no gene is
    /// changed in that case.
    pub fn mutate(&mut self, idxs: &[usize]) -> Result<()> {
        if let Some(&bad) = idxs.iter().find(|&&i| i >= self.chromosome.len()) {
            return Err(Error::Input(format!(
                "gene index {bad} out of range for chromosome of length {}",
                self.chromosome.len()
            )));
        }
        for &i in idxs {
            self.mutate_gene(i);
        }
        self.update_active();
        Ok(())
    }

    /// Mutate `n_muts` genes drawn (with replacement) from the active set.
    pub fn mutate_active(&mut self, n_muts: usize) {
        for _ in 0..n_muts {
            let pick = self.rng.gen_range(0..self.active_genes.len());
            let i = self.active_genes[pick];
            self.mutate_gene(i);
        }
        self.update_active();
    }

    /// Mutate `n_muts` genes drawn (with replacement) from the whole
    /// chromosome.
    pub fn mutate_random(&mut self, n_muts: usize) {
        for _ in 0..n_muts {
            let i = self.rng.gen_range(0..self.chromosome.len());
            self.mutate_gene(i);
        }
        self.update_active();
    }

    fn mutate_gene(&mut self, i: usize) {
        let lo = self.grid.lower_bounds()[i];
        let hi = self.grid.upper_bounds()[i];
        if lo < hi {
            loop {
                let v = self.rng.gen_range(lo..=hi);
                if v != self.chromosome[i] {
                    self.chromosome[i] = v;
                    break;
                }
            }
        }
    }

    /// Evaluate the expression at a point.
    ///
    /// Only active nodes are visited, in ascending node-id order.
    /// Non-finite results are returned as-is.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Input`] if `inputs` does not have one entry per
    /// input node.
    pub fn evaluate(&self, inputs: &[T]) -> Result<Vec<T>> {
        if inputs.len() != self.grid.inputs() {
            return Err(Error::Input(format!(
                "{} input values for {} inputs",
                inputs.len(),
                self.grid.inputs()
            )));
        }
        Ok(self.eval_nodes(inputs))
    }

    /// Evaluation core; callers have validated the input length.
    pub(crate) fn eval_nodes(&self, inputs: &[T]) -> Vec<T> {
        debug_assert_eq!(inputs.len(), self.grid.inputs());
        let n = self.grid.inputs();
        let mut values = vec![T::from_f64(0.0); self.grid.num_nodes()];
        values[..n].copy_from_slice(inputs);

        let mut args: Vec<T> = Vec::new();
        for &node in &self.active_nodes {
            if node < n {
                continue;
            }
            let g = self.grid.gene_start(node);
            let a = self.grid.node_arity(node);
            args.clear();
            args.extend(self.chromosome[g + 1..=g + a].iter().map(|&src| values[src]));
            values[node] = self.kernels[self.chromosome[g]].evaluate(&args);
        }

        let first_out = self.grid.first_output_gene();
        self.chromosome[first_out..]
            .iter()
            .map(|&src| values[src])
            .collect()
    }

    /// Print the expression symbolically, one string per output.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Input`] if `symbols` does not have one entry per
    /// input node.
    pub fn symbolic(&self, symbols: &[String]) -> Result<Vec<String>> {
        if symbols.len() != self.grid.inputs() {
            return Err(Error::Input(format!(
                "{} symbols for {} inputs",
                symbols.len(),
                self.grid.inputs()
            )));
        }
        let n = self.grid.inputs();
        let mut values = vec![String::new(); self.grid.num_nodes()];
        values[..n].clone_from_slice(symbols);

        let mut args: Vec<String> = Vec::new();
        for &node in &self.active_nodes {
            if node < n {
                continue;
            }
            let g = self.grid.gene_start(node);
            let a = self.grid.node_arity(node);
            args.clear();
            args.extend(
                self.chromosome[g + 1..=g + a]
                    .iter()
                    .map(|&src| values[src].clone()),
            );
            values[node] = self.kernels[self.chromosome[g]].symbol(&args);
        }

        let first_out = self.grid.first_output_gene();
        Ok(self.chromosome[first_out..]
            .iter()
            .map(|&src| values[src].clone())
            .collect())
    }

    /// Recompute the active node and gene sets from the output genes:
    /// pull connection targets of included grid nodes to a fixpoint.
    fn update_active(&mut self) {
        debug_assert_eq!(self.chromosome.len(), self.grid.len());
        let n = self.grid.inputs();
        let first_out = self.grid.first_output_gene();

        let mut seen = vec![false; self.grid.num_nodes()];
        let mut stack: Vec<usize> = self.chromosome[first_out..].to_vec();
        while let Some(node) = stack.pop() {
            if seen[node] {
                continue;
            }
            seen[node] = true;
            if node >= n {
                let g = self.grid.gene_start(node);
                let a = self.grid.node_arity(node);
                stack.extend_from_slice(&self.chromosome[g + 1..=g + a]);
            }
        }

        self.active_nodes = seen
            .iter()
            .enumerate()
            .filter_map(|(i, &s)| s.then_some(i))
            .collect();

        self.active_genes.clear();
        for &node in &self.active_nodes {
            if node >= n {
                let g = self.grid.gene_start(node);
                let a = self.grid.node_arity(node);
                self.active_genes.extend(g..=g + a);
            }
        }
        self.active_genes.extend(first_out..self.chromosome.len());
    }

    /// Node ids reachable from at least one output, ascending.
    #[must_use]
    pub fn active_nodes(&self) -> &[usize] {
        &self.active_nodes
    }

    /// Gene indices backing the active nodes plus all output genes,
    /// ascending.
    #[must_use]
    pub fn active_genes(&self) -> &[usize] {
        &self.active_genes
    }

    #[must_use]
    pub fn num_inputs(&self) -> usize {
        self.grid.inputs()
    }

    #[must_use]
    pub fn num_outputs(&self) -> usize {
        self.grid.outputs()
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.grid.rows()
    }

    #[must_use]
    pub fn cols(&self) -> usize {
        self.grid.cols()
    }

    #[must_use]
    pub fn levels_back(&self) -> usize {
        self.grid.levels_back()
    }

    /// Fan-in of each column.
    #[must_use]
    pub fn arities(&self) -> &[usize] {
        self.grid.arities()
    }

    /// Inclusive per-gene lower bounds.
    #[must_use]
    pub fn lower_bounds(&self) -> &[usize] {
        self.grid.lower_bounds()
    }

    /// Inclusive per-gene upper bounds.
    #[must_use]
    pub fn upper_bounds(&self) -> &[usize] {
        self.grid.upper_bounds()
    }

    /// The resolved topology.
    #[must_use]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// The kernels referenced by function genes, in order.
    #[must_use]
    pub fn kernels(&self) -> &[Kernel<T>] {
        &self.kernels
    }

    /// The mutation/shuffle RNG.
    pub(crate) fn rng_mut(&mut self) -> &mut SmallRng {
        &mut self.rng
    }
}

impl Expression<f64> {
    /// Mean loss over a point set.
    ///
    /// Samples with non-finite predictions contribute zero to the sum;
    /// the denominator is always the full sample count. With
    /// `parallel_shards >= 2` the set is split into that many contiguous
    /// shards evaluated across worker threads, which may change the
    /// floating-point reduction order at the last ULP.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Input`] if points and labels disagree in length,
    /// any row dimension mismatches the shape, or the point set is empty.
    pub fn loss(
        &self,
        points: &[Vec<f64>],
        labels: &[Vec<f64>],
        kind: LossKind,
        parallel_shards: usize,
    ) -> Result<f64> {
        loss::validate_points(points, labels, self.num_inputs(), self.num_outputs())?;
        let total = points.len();
        let sum = if parallel_shards >= 2 {
            use rayon::prelude::*;
            let shard = total.div_ceil(parallel_shards);
            points
                .par_chunks(shard)
                .zip(labels.par_chunks(shard))
                .map(|(ps, ls)| self.loss_partial(ps, ls, kind))
                .sum()
        } else {
            self.loss_partial(points, labels, kind)
        };
        Ok(sum / total as f64)
    }

    fn loss_partial(&self, points: &[Vec<f64>], labels: &[Vec<f64>], kind: LossKind) -> f64 {
        points
            .iter()
            .zip(labels)
            .map(|(point, label)| loss::sample_loss(&self.eval_nodes(point), label, kind))
            .sum()
    }
}

impl<T: Scalar> fmt::Display for Expression<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.kernels.iter().map(Kernel::name).collect();
        writeln!(f, "CGP expression:")?;
        writeln!(f, "\tinputs:\t\t\t{}", self.num_inputs())?;
        writeln!(f, "\toutputs:\t\t{}", self.num_outputs())?;
        writeln!(f, "\trows:\t\t\t{}", self.rows())?;
        writeln!(f, "\tcolumns:\t\t{}", self.cols())?;
        writeln!(f, "\tlevels-back:\t\t{}", self.levels_back())?;
        writeln!(f, "\tarity (per column):\t{:?}", self.arities())?;
        writeln!(f, "\tkernels:\t\t{names:?}")?;
        writeln!(f, "\tlower bounds:\t\t{:?}", self.grid.lower_bounds())?;
        writeln!(f, "\tupper bounds:\t\t{:?}", self.grid.upper_bounds())?;
        writeln!(f, "\tchromosome:\t\t{:?}", self.chromosome)?;
        writeln!(f, "\tactive nodes:\t\t{:?}", self.active_nodes)?;
        write!(f, "\tactive genes:\t\t{:?}", self.active_genes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dual::Dual;

    fn sum_expr(seed: u64) -> Expression<f64> {
        let kernels = KernelSet::from_names(&["sum"]).unwrap();
        Expression::new(&GridConfig::new(1, 1, 2, 2, 1, 1), &kernels, seed).unwrap()
    }

    #[test]
    fn test_construction_within_bounds() {
        let ex = sum_expr(42);
        for (i, &g) in ex.chromosome().iter().enumerate() {
            assert!(g >= ex.grid().lower_bounds()[i]);
            assert!(g <= ex.grid().upper_bounds()[i]);
        }
    }

    #[test]
    fn test_construction_is_deterministic() {
        assert_eq!(sum_expr(7).chromosome(), sum_expr(7).chromosome());
    }

    #[test]
    fn test_empty_kernel_set_rejected() {
        let kernels = KernelSet::<f64>::new();
        let err = Expression::new(&GridConfig::new(1, 1, 1, 1, 1, 1), &kernels, 0).unwrap_err();
        assert!(matches!(err, Error::Input(_)));
    }

    #[test]
    fn test_set_validates() {
        let mut ex = sum_expr(0);
        // n=1 r=2 c=2 a=1: genes (f,c)x4 then one output in {3, 4}.
        assert!(ex.set(&[0, 0, 0, 0, 0, 1, 0, 2, 3]).is_ok());
        assert_eq!(ex.chromosome(), &[0, 0, 0, 0, 0, 1, 0, 2, 3]);

        let err = ex.set(&[0, 0, 0, 0, 0, 1, 0, 2]).unwrap_err();
        assert_eq!(err, Error::Input("Chromosome is incompatible".to_string()));
        // Column 0 cannot read a grid node.
        assert!(ex.set(&[0, 1, 0, 0, 0, 1, 0, 2, 3]).is_err());
        // Output gene must point at the last column when levels_back = 1.
        assert!(ex.set(&[0, 0, 0, 0, 0, 1, 0, 2, 1]).is_err());
    }

    #[test]
    fn test_active_set() {
        let mut ex = sum_expr(0);
        // Output reads node 3; node 3 reads node 1; node 1 reads input 0.
        ex.set(&[0, 0, 0, 0, 0, 1, 0, 2, 3]).unwrap();
        assert_eq!(ex.active_nodes(), &[0, 1, 3]);
        assert_eq!(ex.active_genes(), &[0, 1, 4, 5, 8]);
    }

    #[test]
    fn test_evaluate_chain() {
        let mut ex = sum_expr(0);
        ex.set(&[0, 0, 0, 0, 0, 1, 0, 2, 3]).unwrap();
        // Unary sums pass the input through unchanged.
        let out = ex.evaluate(&[5.0]).unwrap();
        assert_eq!(out, vec![5.0]);

        let err = ex.evaluate(&[5.0, 1.0]).unwrap_err();
        assert!(matches!(err, Error::Input(_)));
    }

    #[test]
    fn test_evaluate_is_pure() {
        let ex = sum_expr(123);
        let a = ex.evaluate(&[0.37]).unwrap();
        let b = ex.evaluate(&[0.37]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_evaluate_over_duals() {
        let kernels = KernelSet::from_names(&["sum", "mul"]).unwrap();
        let mut ex =
            Expression::new(&GridConfig::new(1, 1, 1, 1, 1, 2), &kernels, 0).unwrap();
        // Single node: mul(x, x) = x^2.
        ex.set(&[1, 0, 0, 1]).unwrap();
        let out = ex.evaluate(&[Dual::variable(3.0)]).unwrap();
        assert!((out[0].v - 9.0).abs() < 1e-12);
        assert!((out[0].d - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_symbolic() {
        let kernels = KernelSet::from_names(&["sum", "mul"]).unwrap();
        let mut ex =
            Expression::<f64>::new(&GridConfig::new(1, 1, 1, 1, 1, 2), &kernels, 0).unwrap();
        ex.set(&[1, 0, 0, 1]).unwrap();
        let syms = ex.symbolic(&["x".to_string()]).unwrap();
        assert_eq!(syms, vec!["x^2".to_string()]);

        assert!(ex.symbolic(&[]).is_err());
    }

    #[test]
    fn test_set_f_gene() {
        let kernels = KernelSet::from_names(&["sum", "mul"]).unwrap();
        let mut ex =
            Expression::<f64>::new(&GridConfig::new(1, 1, 1, 1, 1, 2), &kernels, 0).unwrap();
        ex.set(&[0, 0, 0, 1]).unwrap();
        ex.set_f_gene(1, 1).unwrap();
        assert_eq!(ex.chromosome()[0], 1);

        assert!(ex.set_f_gene(0, 1).is_err()); // input node
        assert!(ex.set_f_gene(2, 1).is_err()); // out of range
        assert!(ex.set_f_gene(1, 2).is_err()); // no such kernel index
    }

    #[test]
    fn test_mutate_respects_bounds() {
        let mut ex = sum_expr(99);
        let idxs: Vec<usize> = (0..ex.chromosome().len()).collect();
        for _ in 0..50 {
            ex.mutate(&idxs).unwrap();
            for (i, &g) in ex.chromosome().iter().enumerate() {
                assert!(g >= ex.grid().lower_bounds()[i]);
                assert!(g <= ex.grid().upper_bounds()[i]);
            }
        }
    }

    #[test]
    fn test_mutate_out_of_range() {
        let mut ex = sum_expr(0);
        let before = ex.chromosome().to_vec();
        let err = ex.mutate(&[0, 100]).unwrap_err();
        assert!(matches!(err, Error::Input(_)));
        assert_eq!(ex.chromosome(), &before[..]);
    }

    #[test]
    fn test_frozen_genes_never_change() {
        // Shape (1,1,1,1,1,1) with one kernel pins every gene: the only
        // node reads the only input, and the output reads the only node.
        let kernels = KernelSet::from_names(&["sum"]).unwrap();
        let mut ex =
            Expression::<f64>::new(&GridConfig::new(1, 1, 1, 1, 1, 1), &kernels, 5).unwrap();
        let before = ex.chromosome().to_vec();
        ex.mutate(&[0, 1, 2]).unwrap();
        ex.mutate_active(10);
        ex.mutate_random(10);
        assert_eq!(ex.chromosome(), &before[..]);
    }

    #[test]
    fn test_mutation_is_seed_deterministic() {
        let mut a = sum_expr(11);
        let mut b = sum_expr(11);
        a.mutate_active(5);
        b.mutate_active(5);
        assert_eq!(a.chromosome(), b.chromosome());
    }

    #[test]
    fn test_loss_mse() {
        let mut ex = sum_expr(0);
        // Identity chain: prediction = x.
        ex.set(&[0, 0, 0, 0, 0, 1, 0, 2, 3]).unwrap();
        let points = vec![vec![1.0], vec![2.0]];
        let labels = vec![vec![0.0], vec![0.0]];
        // ((1)^2 + (2)^2) / 2 = 2.5
        let l = ex.loss(&points, &labels, LossKind::Mse, 0).unwrap();
        assert!((l - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_loss_parallel_matches_serial() {
        let kernels = KernelSet::from_names(&["sum", "diff", "mul", "div", "sin"]).unwrap();
        let ex =
            Expression::<f64>::new(&GridConfig::new(2, 2, 3, 4, 2, 2), &kernels, 31).unwrap();
        let points: Vec<Vec<f64>> = (0..100)
            .map(|i| vec![f64::from(i) * 0.01, 1.0 - f64::from(i) * 0.005])
            .collect();
        let labels: Vec<Vec<f64>> = (0..100)
            .map(|i| vec![f64::from(i) * 0.02, 0.5])
            .collect();
        let serial = ex.loss(&points, &labels, LossKind::Mse, 0).unwrap();
        let sharded = ex.loss(&points, &labels, LossKind::Mse, 4).unwrap();
        assert!((serial - sharded).abs() < 1e-9);
    }

    #[test]
    fn test_display_is_stable() {
        let ex = sum_expr(0);
        let s = ex.to_string();
        assert!(s.contains("CGP expression:"));
        assert!(s.contains("chromosome:"));
        assert!(s.contains("active nodes:"));
        assert!(s.contains("lower bounds:"));
    }
}
