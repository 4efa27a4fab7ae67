//! The ANN-flavored expression: per-edge weights, per-node biases,
//! exact backpropagation, and mini-batch stochastic gradient descent.
//!
//! ```text
//! ┌───────────────────────────────────────────┐
//! │     sgd / loss (rayon shard reduction)    │
//! ├───────────────────────────────────────────┤
//! │   d_loss: forward pass + backward pass    │
//! ├───────────────────────────────────────────┤
//! │  ExpressionAnn: chromosome + weights/bias │
//! ├───────────────────────────────────────────┤
//! │     Activation: φ and φ′ per kernel       │
//! └───────────────────────────────────────────┘
//! ```

mod activation;
mod expression;
mod train;

pub use activation::Activation;
pub use expression::ExpressionAnn;
