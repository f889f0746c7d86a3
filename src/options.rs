//! Runtime configuration snapshot carried by a compiled program.

/// Options controlling planning and evaluation.
///
/// A [`Program`](crate::program::Program) captures the options it was planned
/// with; the same snapshot is consulted during every evaluation of that
/// program so concurrent evaluations always agree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeOptions {
    /// Track attribute trails and propagate `Unknown` values for inputs
    /// matching the activation's unknown patterns.
    pub unknown_processing: bool,

    /// Produce error values for reads matching the activation's missing
    /// attribute patterns. Missing checks run before unknown checks at every
    /// read site.
    pub missing_attribute_errors: bool,

    /// Short-circuit `&&`, `||`, the ternary operator, and comprehension
    /// loop conditions. When disabled, both/all branches are evaluated and
    /// the same merge rules apply afterwards.
    pub short_circuiting: bool,

    /// Per-evaluation budget shared by all comprehensions; one unit per
    /// bound element. `0` means unlimited.
    pub comprehension_max_iterations: usize,

    /// Maximum depth of directly-recursive subprograms. `0` plans everything
    /// as flat instruction sequences; `usize::MAX` plans recursively
    /// wherever possible.
    pub max_recursion_depth: usize,

    /// Compare numeric values across int/uint/double (lossless) in equality
    /// and map-key lookup.
    pub heterogeneous_equality: bool,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        RuntimeOptions {
            unknown_processing: false,
            missing_attribute_errors: false,
            short_circuiting: true,
            comprehension_max_iterations: 10_000,
            max_recursion_depth: usize::MAX,
            heterogeneous_equality: true,
        }
    }
}

impl RuntimeOptions {
    /// True when any read site needs an attribute trail at all.
    pub(crate) fn attribute_tracking(&self) -> bool {
        self.unknown_processing || self.missing_attribute_errors
    }
}
