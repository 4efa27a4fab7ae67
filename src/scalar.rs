//! The numeric capability set shared by every evaluation domain.
//!
//! Kernels are written once against [`Scalar`] and monomorphize to plain
//! `f64` evaluation or to forward-mode differentiation over [`crate::Dual`].

use std::fmt::Debug;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Arithmetic surface a kernel implementation may rely on.
///
/// The set is intentionally minimal: field operations plus the
/// elementary transcendentals the built-in kernels need. Branching
/// primitives (`ReLu`, `ELU`, `ISRU`) branch on the primal part via
/// [`Scalar::primal`], which keeps piecewise kernels well-defined for
/// differentiation types.
pub trait Scalar:
    Copy
    + Debug
    + PartialEq
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
{
    /// Lift a plain float into the domain.
    fn from_f64(x: f64) -> Self;

    /// The primal (value) part, used for branch decisions and
    /// finiteness checks.
    fn primal(self) -> f64;

    fn exp(self) -> Self;
    fn ln(self) -> Self;
    fn sin(self) -> Self;
    fn cos(self) -> Self;
    fn tanh(self) -> Self;
    fn sqrt(self) -> Self;

    /// Whether the primal part is a finite number.
    fn is_finite_primal(self) -> bool {
        self.primal().is_finite()
    }
}

impl Scalar for f64 {
    fn from_f64(x: f64) -> Self {
        x
    }

    fn primal(self) -> f64 {
        self
    }

    fn exp(self) -> Self {
        f64::exp(self)
    }

    fn ln(self) -> Self {
        f64::ln(self)
    }

    fn sin(self) -> Self {
        f64::sin(self)
    }

    fn cos(self) -> Self {
        f64::cos(self)
    }

    fn tanh(self) -> Self {
        f64::tanh(self)
    }

    fn sqrt(self) -> Self {
        f64::sqrt(self)
    }
}
