//! Batch loss, exact backpropagation, and mini-batch SGD.
//!
//! The backward pass walks active nodes in descending id order, so every
//! node's accumulated error `δ = dL/dv` is complete before the node is
//! processed (connections only point backward). Gradients land in dense
//! vectors shaped like the weight and bias vectors; inactive entries
//! stay zero.

use rand::seq::SliceRandom;
use rayon::prelude::*;

use crate::ann::ExpressionAnn;
use crate::error::{Error, Result};
use crate::loss::{self, LossKind};

impl ExpressionAnn {
    /// Mean loss over a point set.
    ///
    /// Same contract as [`crate::Expression::loss`]: non-finite samples
    /// contribute zero, `parallel_shards >= 2` splits the set into
    /// contiguous shards across worker threads.
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
        let nn = self.grid().num_nodes();
        let mut values = vec![0.0; nn];
        let mut pre = vec![0.0; nn];
        points
            .iter()
            .zip(labels)
            .map(|(point, label)| {
                self.forward(point, &mut values, &mut pre);
                loss::sample_loss(&self.collect_outputs(&values), label, kind)
            })
            .sum()
    }

    /// Loss and exact gradients for a single sample.
    ///
    /// Returns `(value, grad_w, grad_b)` with the gradient vectors
    /// shaped like [`Self::weights`] and [`Self::biases`]. The value
    /// equals what [`Self::loss`] reports for the same one-sample set;
    /// a non-finite prediction yields zero value and zero gradients.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Input`] if `input` or `label` length mismatches
    /// the shape.
    pub fn d_loss(
        &self,
        input: &[f64],
        label: &[f64],
        kind: LossKind,
    ) -> Result<(f64, Vec<f64>, Vec<f64>)> {
        if input.len() != self.num_inputs() {
            return Err(Error::Input(format!(
                "{} input values for {} inputs",
                input.len(),
                self.num_inputs()
            )));
        }
        if label.len() != self.num_outputs() {
            return Err(Error::Input(format!(
                "{} label values for {} outputs",
                label.len(),
                self.num_outputs()
            )));
        }
        let mut grad_w = vec![0.0; self.weights.len()];
        let mut grad_b = vec![0.0; self.biases.len()];
        let value = self.backprop(input, label, kind, &mut grad_w, &mut grad_b);
        Ok((value, grad_w, grad_b))
    }

    /// One sample of forward + backward. Accumulates into `grad_w` /
    /// `grad_b` and returns the sample loss (zero, with no gradient
    /// contribution, when the prediction is non-finite).
    fn backprop(
        &self,
        point: &[f64],
        label: &[f64],
        kind: LossKind,
        grad_w: &mut [f64],
        grad_b: &mut [f64],
    ) -> f64 {
        let grid = self.grid();
        let n = grid.inputs();
        let nn = grid.num_nodes();
        let mut values = vec![0.0; nn];
        let mut pre = vec![0.0; nn];
        self.forward(point, &mut values, &mut pre);
        let predicted = self.collect_outputs(&values);
        if !predicted.iter().all(|y| y.is_finite()) {
            return 0.0;
        }
        let value = loss::sample_loss(&predicted, label, kind);
        let derr = loss::output_error(&predicted, label, kind);

        let chromosome = self.chromosome();
        let first_out = grid.first_output_gene();

        // δ[u] accumulates dL/dv_u; seeded at output-fed nodes.
        let mut delta = vec![0.0; nn];
        for (k, &src) in chromosome[first_out..].iter().enumerate() {
            delta[src] += derr[k];
        }

        for &node in self.active_nodes().iter().rev() {
            if node < n {
                continue;
            }
            let g = grid.gene_start(node);
            let a = grid.node_arity(node);
            let w = grid.weight_start(node);
            let dz = delta[node] * self.activations[chromosome[g]].derivative(pre[node]);
            for k in 0..a {
                let src = chromosome[g + 1 + k];
                grad_w[w + k] += dz * values[src];
                if src >= n {
                    delta[src] += dz * self.weights[w + k];
                }
            }
            grad_b[grid.bias_index(node)] += dz;
        }
        value
    }

    /// One epoch of mini-batch SGD. Returns the mean of the per-batch
    /// average losses, a proxy for (not equal to) the full-set loss.
    ///
    /// The index order is optionally shuffled with the expression's own
    /// RNG; batches of `batch_size` are then processed in order, each
    /// applying `w ← w − lr · avg_grad_w` and `b ← b − lr · avg_grad_b`.
    /// With `parallel_shards >= 2` the samples of each batch are spread
    /// across shards whose gradients are reduced by sum.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Input`] on malformed points/labels or a zero
    /// batch size.
    #[allow(clippy::too_many_arguments)]
    pub fn sgd(
        &mut self,
        points: &[Vec<f64>],
        labels: &[Vec<f64>],
        lr: f64,
        batch_size: usize,
        kind: LossKind,
        parallel_shards: usize,
        shuffle: bool,
    ) -> Result<f64> {
        loss::validate_points(points, labels, self.num_inputs(), self.num_outputs())?;
        if batch_size == 0 {
            return Err(Error::Input("batch size is 0".to_string()));
        }

        let mut order: Vec<usize> = (0..points.len()).collect();
        if shuffle {
            order.shuffle(self.expr.rng_mut());
        }

        let mut batch_losses = Vec::with_capacity(order.len().div_ceil(batch_size));
        for batch in order.chunks(batch_size) {
            let (batch_loss, grad_w, grad_b) =
                self.batch_grad(points, labels, batch, kind, parallel_shards);
            let scale = lr / batch.len() as f64;
            for (w, g) in self.weights.iter_mut().zip(&grad_w) {
                *w -= scale * g;
            }
            for (b, g) in self.biases.iter_mut().zip(&grad_b) {
                *b -= scale * g;
            }
            batch_losses.push(batch_loss / batch.len() as f64);
        }
        Ok(batch_losses.iter().sum::<f64>() / batch_losses.len() as f64)
    }

    /// Summed loss and gradients over one batch of sample indices.
    fn batch_grad(
        &self,
        points: &[Vec<f64>],
        labels: &[Vec<f64>],
        batch: &[usize],
        kind: LossKind,
        parallel_shards: usize,
    ) -> (f64, Vec<f64>, Vec<f64>) {
        let nw = self.weights.len();
        let nb = self.biases.len();
        if parallel_shards >= 2 && batch.len() > 1 {
            let chunk = batch.len().div_ceil(parallel_shards);
            batch
                .par_chunks(chunk)
                .map(|idxs| {
                    let mut gw = vec![0.0; nw];
                    let mut gb = vec![0.0; nb];
                    let mut sum = 0.0;
                    for &i in idxs {
                        sum += self.backprop(&points[i], &labels[i], kind, &mut gw, &mut gb);
                    }
                    (sum, gw, gb)
                })
                .reduce(
                    || (0.0, vec![0.0; nw], vec![0.0; nb]),
                    |mut acc, part| {
                        acc.0 += part.0;
                        for (a, p) in acc.1.iter_mut().zip(&part.1) {
                            *a += p;
                        }
                        for (a, p) in acc.2.iter_mut().zip(&part.2) {
                            *a += p;
                        }
                        acc
                    },
                )
        } else {
            let mut gw = vec![0.0; nw];
            let mut gb = vec![0.0; nb];
            let mut sum = 0.0;
            for &i in batch {
                sum += self.backprop(&points[i], &labels[i], kind, &mut gw, &mut gb);
            }
            (sum, gw, gb)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridConfig;
    use crate::kernel::KernelSet;

    #[test]
    fn test_d_loss_value_matches_loss() {
        let kernels = KernelSet::from_names(&["sig", "tanh", "ReLu"]).unwrap();
        let mut ex =
            ExpressionAnn::new(&GridConfig::new(3, 2, 4, 3, 1, 2), &kernels, 17).unwrap();
        ex.randomise_weights(0.0, 1.0, 18).unwrap();
        ex.randomise_biases(0.0, 1.0, 19).unwrap();

        let point = vec![0.1, -0.4, 0.9];
        let label = vec![0.3, 0.2];
        for kind in [LossKind::Mse, LossKind::CrossEntropy] {
            let (value, _, _) = ex.d_loss(&point, &label, kind).unwrap();
            let full = ex
                .loss(&[point.clone()], &[label.clone()], kind, 0)
                .unwrap();
            assert!((value - full).abs() < 1e-12);
        }
    }

    #[test]
    fn test_manual_gradient_single_node() {
        // One sigmoid node: out = sig(w*x + b), MSE with m = 1.
        let kernels = KernelSet::from_names(&["sig"]).unwrap();
        let mut ex =
            ExpressionAnn::new(&GridConfig::new(1, 1, 1, 1, 1, 1), &kernels, 0).unwrap();
        ex.set_weights(&[0.7]).unwrap();
        ex.set_biases(&[-0.2]).unwrap();

        let (x, y): (f64, f64) = (0.4, 0.9);
        let z = 0.7 * x - 0.2;
        let s = 1.0 / (1.0 + (-z).exp());
        let dy = 2.0 * (s - y);
        let dz = dy * s * (1.0 - s);

        let (value, gw, gb) = ex.d_loss(&[x], &[y], LossKind::Mse).unwrap();
        assert!((value - (s - y) * (s - y)).abs() < 1e-14);
        assert!((gw[0] - dz * x).abs() < 1e-14);
        assert!((gb[0] - dz).abs() < 1e-14);
    }

    #[test]
    fn test_inactive_parameters_get_no_gradient() {
        // Two rows, one column; the output reads row 0, so row 1 is dead.
        let kernels = KernelSet::from_names(&["tanh"]).unwrap();
        let mut ex =
            ExpressionAnn::new(&GridConfig::new(1, 1, 2, 1, 1, 1), &kernels, 0).unwrap();
        ex.set(&[0, 0, 0, 0, 1]).unwrap();
        let (_, gw, gb) = ex.d_loss(&[0.5], &[0.1], LossKind::Mse).unwrap();
        assert_ne!(gw[0], 0.0);
        assert_eq!(gw[1], 0.0);
        assert_ne!(gb[0], 0.0);
        assert_eq!(gb[1], 0.0);
    }

    #[test]
    fn test_sgd_decreases_loss() {
        let kernels = KernelSet::from_names(&["sig", "tanh"]).unwrap();
        let mut ex =
            ExpressionAnn::new(&GridConfig::new(1, 1, 4, 2, 1, 2), &kernels, 5).unwrap();
        ex.randomise_weights(0.0, 1.0, 6).unwrap();
        ex.randomise_biases(0.0, 1.0, 7).unwrap();

        let points: Vec<Vec<f64>> = (0..40).map(|i| vec![f64::from(i) * 0.05 - 1.0]).collect();
        let labels: Vec<Vec<f64>> = points.iter().map(|p| vec![0.5 * p[0]]).collect();

        let before = ex.loss(&points, &labels, LossKind::Mse, 0).unwrap();
        for _ in 0..30 {
            ex.sgd(&points, &labels, 0.01, 8, LossKind::Mse, 0, true).unwrap();
        }
        let after = ex.loss(&points, &labels, LossKind::Mse, 0).unwrap();
        assert!(after <= before, "MSE went up: {before} -> {after}");
    }

    #[test]
    fn test_sgd_sharded_matches_serial() {
        let kernels = KernelSet::from_names(&["tanh"]).unwrap();
        let mk = || {
            let mut ex =
                ExpressionAnn::new(&GridConfig::new(2, 1, 3, 2, 1, 2), &kernels, 9).unwrap();
            ex.randomise_weights(0.0, 1.0, 10).unwrap();
            ex.randomise_biases(0.0, 1.0, 11).unwrap();
            ex
        };
        let points: Vec<Vec<f64>> = (0..32)
            .map(|i| vec![f64::from(i) * 0.1, 1.0 - f64::from(i) * 0.05])
            .collect();
        let labels: Vec<Vec<f64>> = points.iter().map(|p| vec![p[0] * p[1]]).collect();

        let mut serial = mk();
        let mut sharded = mk();
        serial.sgd(&points, &labels, 0.01, 8, LossKind::Mse, 0, false).unwrap();
        sharded.sgd(&points, &labels, 0.01, 8, LossKind::Mse, 4, false).unwrap();
        for (a, b) in serial.weights().iter().zip(sharded.weights()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_sgd_validates() {
        let kernels = KernelSet::from_names(&["tanh"]).unwrap();
        let mut ex =
            ExpressionAnn::new(&GridConfig::new(1, 1, 1, 1, 1, 1), &kernels, 0).unwrap();
        let points = vec![vec![0.0]];
        let labels = vec![vec![0.0]];
        assert!(ex
            .sgd(&points, &labels, 0.1, 0, LossKind::Mse, 0, false)
            .is_err());
        assert!(ex
            .sgd(&points, &[], 0.1, 1, LossKind::Mse, 0, false)
            .is_err());
        assert!(ex
            .sgd(&[vec![0.0, 1.0]], &labels, 0.1, 1, LossKind::Mse, 0, false)
            .is_err());
    }
}
