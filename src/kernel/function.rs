//! A single named primitive with numeric and symbolic implementations.

use std::fmt;

/// A named primitive: a numeric function over `T` plus a symbolic
/// printer over strings. Value-immutable after construction.
#[derive(Clone)]
pub struct Kernel<T> {
    name: String,
    fun: fn(&[T]) -> T,
    printer: fn(&[String]) -> String,
}

impl<T> Kernel<T> {
    /// Build a kernel from its two implementations.
    #[must_use]
    pub fn new(name: impl Into<String>, fun: fn(&[T]) -> T, printer: fn(&[String]) -> String) -> Self {
        Self {
            name: name.into(),
            fun,
            printer,
        }
    }

    /// The registry name of this kernel.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Apply the numeric implementation.
    #[must_use]
    pub fn evaluate(&self, args: &[T]) -> T {
        (self.fun)(args)
    }

    /// Apply the symbolic printer.
    #[must_use]
    pub fn symbol(&self, args: &[String]) -> String {
        (self.printer)(args)
    }
}

// Kernel holds function pointers; print the name instead of a derived dump.
impl<T> fmt::Debug for Kernel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kernel").field("name", &self.name).finish()
    }
}
