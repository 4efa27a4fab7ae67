//! Scalar activations for the ANN kernel subset.

/// The activation a function gene selects in an ANN expression, applied
/// to the weighted, biased pre-activation. `sum` maps to the identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Sigmoid,
    Tanh,
    Relu,
    Elu,
    Isru,
    Identity,
}

impl Activation {
    /// Map an ANN-compatible kernel name; `None` for anything else.
    #[must_use]
    pub(crate) fn from_kernel_name(name: &str) -> Option<Self> {
        match name {
            "sig" => Some(Activation::Sigmoid),
            "tanh" => Some(Activation::Tanh),
            "ReLu" => Some(Activation::Relu),
            "ELU" => Some(Activation::Elu),
            "ISRU" => Some(Activation::Isru),
            "sum" => Some(Activation::Identity),
            _ => None,
        }
    }

    /// φ(z).
    #[must_use]
    pub fn apply(self, z: f64) -> f64 {
        match self {
            Activation::Sigmoid => 1.0 / (1.0 + (-z).exp()),
            Activation::Tanh => z.tanh(),
            Activation::Relu => {
                if z > 0.0 {
                    z
                } else {
                    0.0
                }
            }
            Activation::Elu => {
                if z > 0.0 {
                    z
                } else {
                    z.exp() - 1.0
                }
            }
            Activation::Isru => z / (1.0 + z * z).sqrt(),
            Activation::Identity => z,
        }
    }

    /// φ′(z).
    #[must_use]
    pub fn derivative(self, z: f64) -> f64 {
        match self {
            Activation::Sigmoid => {
                let s = 1.0 / (1.0 + (-z).exp());
                s * (1.0 - s)
            }
            Activation::Tanh => {
                let t = z.tanh();
                1.0 - t * t
            }
            Activation::Relu => {
                if z > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Activation::Elu => {
                if z > 0.0 {
                    1.0
                } else {
                    z.exp()
                }
            }
            Activation::Isru => (1.0 + z * z).powf(-1.5),
            Activation::Identity => 1.0,
        }
    }
}
