//! Kernels: the named primitives computed by grid nodes.
//!
//! Every kernel carries two implementations of the same operation: one
//! over the numeric domain `T` and one over strings, used to print an
//! expression symbolically. Kernels are assembled into an ordered
//! [`KernelSet`] by registry name (or pushed verbatim) and referenced by
//! index from function genes.

mod function;
mod ops;
mod set;

pub use function::Kernel;
pub use set::KernelSet;
