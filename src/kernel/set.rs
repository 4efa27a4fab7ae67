//! An ordered, append-only collection of kernels.

use crate::error::{Error, Result};
use crate::kernel::{ops, Kernel};
use crate::scalar::Scalar;

/// An ordered kernel collection. Kernels are appended by registry name
/// or pushed verbatim, and referenced by index from function genes.
/// Duplicate pushes are permitted (though rarely useful).
#[derive(Debug, Clone)]
pub struct KernelSet<T> {
    kernels: Vec<Kernel<T>>,
}

impl<T: Scalar> KernelSet<T> {
    /// An empty set.
    #[must_use]
    pub fn new() -> Self {
        Self { kernels: Vec::new() }
    }

    /// Build a set from registry names, in order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSuchKernel`] on the first unknown name.
    pub fn from_names(names: &[&str]) -> Result<Self> {
        let mut set = Self::new();
        for name in names {
            set.push_back(name)?;
        }
        Ok(set)
    }

    /// Append a kernel by registry name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSuchKernel`] if the name is not in the registry.
    pub fn push_back(&mut self, name: &str) -> Result<()> {
        match ops::lookup(name) {
            Some(kernel) => {
                self.kernels.push(kernel);
                Ok(())
            }
            None => Err(Error::NoSuchKernel(name.to_string())),
        }
    }

    /// Append a kernel verbatim.
    pub fn push_back_kernel(&mut self, kernel: Kernel<T>) {
        self.kernels.push(kernel);
    }

    /// The current ordered sequence, cloned out.
    #[must_use]
    pub fn call(&self) -> Vec<Kernel<T>> {
        self.kernels.clone()
    }

    /// The current ordered sequence, borrowed.
    #[must_use]
    pub fn kernels(&self) -> &[Kernel<T>] {
        &self.kernels
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }
}

impl<T: Scalar> Default for KernelSet<T> {
    fn default() -> Self {
        Self::new()
    }
}
