//! First-order forward-mode dual numbers.
//!
//! A [`Dual`] carries a value together with the derivative of that value
//! with respect to one seeded variable. Arithmetic propagates derivatives
//! by the chain rule, so evaluating an expression over `Dual` inputs
//! yields the expression's outputs *and* their exact partial derivatives
//! in a single forward pass.

use std::ops::{Add, Div, Mul, Neg, Sub};

use crate::scalar::Scalar;

/// A value/derivative pair `v + d·ε` with `ε² = 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dual {
    /// The value part.
    pub v: f64,
    /// The derivative part.
    pub d: f64,
}

impl Dual {
    /// A dual with explicit value and derivative parts.
    #[must_use]
    pub fn new(v: f64, d: f64) -> Self {
        Self { v, d }
    }

    /// A constant: derivative zero.
    #[must_use]
    pub fn constant(v: f64) -> Self {
        Self { v, d: 0.0 }
    }

    /// The seeded variable: derivative one.
    #[must_use]
    pub fn variable(v: f64) -> Self {
        Self { v, d: 1.0 }
    }
}

impl Add for Dual {
    type Output = Dual;

    fn add(self, rhs: Dual) -> Dual {
        Dual::new(self.v + rhs.v, self.d + rhs.d)
    }
}

impl Sub for Dual {
    type Output = Dual;

    fn sub(self, rhs: Dual) -> Dual {
        Dual::new(self.v - rhs.v, self.d - rhs.d)
    }
}

impl Mul for Dual {
    type Output = Dual;

    fn mul(self, rhs: Dual) -> Dual {
        Dual::new(self.v * rhs.v, self.d * rhs.v + self.v * rhs.d)
    }
}

impl Div for Dual {
    type Output = Dual;

    fn div(self, rhs: Dual) -> Dual {
        Dual::new(
            self.v / rhs.v,
            (self.d * rhs.v - self.v * rhs.d) / (rhs.v * rhs.v),
        )
    }
}

impl Neg for Dual {
    type Output = Dual;

    fn neg(self) -> Dual {
        Dual::new(-self.v, -self.d)
    }
}

impl Scalar for Dual {
    fn from_f64(x: f64) -> Self {
        Dual::constant(x)
    }

    fn primal(self) -> f64 {
        self.v
    }

    fn exp(self) -> Self {
        let e = self.v.exp();
        Dual::new(e, self.d * e)
    }

    fn ln(self) -> Self {
        Dual::new(self.v.ln(), self.d / self.v)
    }

    fn sin(self) -> Self {
        Dual::new(self.v.sin(), self.d * self.v.cos())
    }

    fn cos(self) -> Self {
        Dual::new(self.v.cos(), -self.d * self.v.sin())
    }

    fn tanh(self) -> Self {
        let t = self.v.tanh();
        Dual::new(t, self.d * (1.0 - t * t))
    }

    fn sqrt(self) -> Self {
        let s = self.v.sqrt();
        Dual::new(s, self.d / (2.0 * s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn test_arithmetic_derivatives() {
        let x = Dual::variable(3.0);
        let c = Dual::constant(2.0);

        // d/dx (x + 2) = 1
        assert!(((x + c).d - 1.0).abs() < EPS);
        // d/dx (x * x) = 2x = 6
        assert!(((x * x).d - 6.0).abs() < EPS);
        // d/dx (2 / x) = -2/x^2
        assert!(((c / x).d - (-2.0 / 9.0)).abs() < EPS);
        // d/dx (-x) = -1
        assert!(((-x).d + 1.0).abs() < EPS);
    }

    #[test]
    fn test_chain_rule() {
        // d/dx sin(x*x) = 2x cos(x^2) at x = 0.5
        let x = Dual::variable(0.5);
        let y = (x * x).sin();
        let expected = 2.0 * 0.5 * (0.25f64).cos();
        assert!((y.d - expected).abs() < EPS);
    }

    #[test]
    fn test_transcendental_derivatives() {
        let x = Dual::variable(0.7);
        assert!((x.exp().d - 0.7f64.exp()).abs() < EPS);
        assert!((x.ln().d - 1.0 / 0.7).abs() < EPS);
        assert!((x.cos().d + 0.7f64.sin()).abs() < EPS);
        let t = 0.7f64.tanh();
        assert!((x.tanh().d - (1.0 - t * t)).abs() < EPS);
        assert!((x.sqrt().d - 0.5 / 0.7f64.sqrt()).abs() < EPS);
    }

    #[test]
    fn test_matches_finite_differences() {
        let f = |x: Dual| (x * x + Dual::constant(1.0)).sqrt().exp();
        let g = |x: f64| (x * x + 1.0).sqrt().exp();

        let at = 1.3;
        let h = 1e-6;
        let numeric = (g(at + h) - g(at - h)) / (2.0 * h);
        let exact = f(Dual::variable(at)).d;
        assert!((numeric - exact).abs() < 1e-6);
    }
}
