// Allow unwrap in tests (test code is not production)
#![cfg_attr(test, allow(clippy::unwrap_used))]
//! Differentiable Cartesian Genetic Programming.
//!
//! This crate represents small computational graphs as fixed-length
//! integer chromosomes laid out on a rectangular grid, evaluates and
//! mutates them, and (in the ANN variant) trains per-edge weights and
//! per-node biases with exact backpropagation and mini-batch SGD.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │   ExpressionAnn (weights, biases,   │
//! │     backprop, mini-batch SGD)       │
//! ├─────────────────────────────────────┤
//! │   Expression<T> (evaluate, mutate,  │
//! │     symbolic, loss)                 │
//! ├─────────────────────────────────────┤
//! │   Grid (bounds, gene/weight index)  │
//! ├─────────────────────────────────────┤
//! │   KernelSet / Kernel<T> over the    │
//! │     Scalar domain (f64, Dual)       │
//! └─────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use dcgp::{Expression, GridConfig, KernelSet};
//!
//! let kernels = KernelSet::from_names(&["sum", "diff", "mul", "div"]).unwrap();
//! let ex = Expression::<f64>::new(&GridConfig::new(2, 1, 2, 4, 2, 2), &kernels, 42).unwrap();
//! let out = ex.evaluate(&[1.0, 2.0]).unwrap();
//! assert_eq!(out.len(), 1);
//! ```

pub mod ann;
pub mod dual;
pub mod error;
pub mod expression;
pub mod grid;
pub mod kernel;
pub mod loss;
pub mod scalar;

pub use ann::{Activation, ExpressionAnn};
pub use dual::Dual;
pub use error::{Error, Result};
pub use expression::Expression;
pub use grid::{Arity, Grid, GridConfig};
pub use kernel::{Kernel, KernelSet};
pub use loss::LossKind;
pub use scalar::Scalar;

/// A fresh nondeterministic seed, for callers that do not need
/// reproducibility in constructors or `randomise_*` calls.
#[must_use]
pub fn random_seed() -> u64 {
    rand::random()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_seed_varies() {
        // Two draws colliding is astronomically unlikely; a stuck source
        // would return equal values every time.
        let draws: Vec<u64> = (0..4).map(|_| random_seed()).collect();
        assert!(draws.windows(2).any(|w| w[0] != w[1]));
    }
}
