//! Error types for expression construction, mutation, and training.

use std::fmt;

/// Errors surfaced by the chromosome, kernel, and training APIs.
///
/// Structural problems are reported immediately through these variants.
/// Numeric non-finiteness during evaluation is deliberately *not* an
/// error: evaluators return the non-finite value and loss aggregation
/// skips such samples, so that broken chromosomes stay cheap to score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Invalid shape, chromosome, gene index, vector length, loss kind,
    /// or kernel name passed to a setter.
    Input(String),
    /// A kernel name absent from the built-in registry.
    NoSuchKernel(String),
    /// An ANN expression was built with a kernel outside the
    /// ANN-compatible subset.
    KernelIncompatible(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Input(msg) => write!(f, "input error: {msg}"),
            Error::NoSuchKernel(name) => write!(f, "no kernel named '{name}' in the registry"),
            Error::KernelIncompatible(name) => {
                write!(f, "kernel '{name}' cannot be used in an ANN expression")
            }
        }
    }
}

impl std::error::Error for Error {}

/// Result type for all fallible operations in this crate.
pub type Result<T> = std::result::Result<T, Error>;
