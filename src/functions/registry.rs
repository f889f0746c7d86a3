use bumpalo::Bump;
use ecow::EcoString;
use hashbrown::HashMap;

use crate::{Box, Vec, functions::FunctionDescriptor, values::Value};

/// A function implementation.
///
/// `invoke` is generic over the evaluation lifetime: one registered
/// implementation serves every arena, and the registry itself stays free of
/// evaluation borrows. Implementations own their captures.
///
/// Implementations never fail out-of-band: every failure mode is an error
/// value. Results depending on unknowns the implementation cannot describe
/// are flagged with [`Value::unknown_function_result`], which the call
/// protocol converts into a synthesized unknown.
pub trait Function: Send + Sync {
    fn invoke<'a>(&self, arena: &'a Bump, args: &[Value<'a>]) -> Value<'a>;
}

impl<F> Function for F
where
    F: for<'a> Fn(&'a Bump, &[Value<'a>]) -> Value<'a> + Send + Sync,
{
    fn invoke<'a>(&self, arena: &'a Bump, args: &[Value<'a>]) -> Value<'a> {
        self(arena, args)
    }
}

/// One declared overload paired with its implementation.
pub struct FunctionOverload {
    pub descriptor: FunctionDescriptor,
    pub implementation: Box<dyn Function>,
}

impl FunctionOverload {
    pub fn new(descriptor: FunctionDescriptor, implementation: impl Function + 'static) -> Self {
        FunctionOverload {
            descriptor,
            implementation: Box::new(implementation),
        }
    }
}

impl core::fmt::Debug for FunctionOverload {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FunctionOverload")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// Plan-time function table.
///
/// Eager registrations carry implementations and are bound statically; lazy
/// registrations carry descriptors only, with implementations supplied by
/// the activation at evaluation time. Planned programs borrow the overload
/// lists, so the registry must outlive every program planned against it.
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    eager: HashMap<EcoString, Vec<FunctionOverload>>,
    lazy: HashMap<EcoString, Vec<FunctionDescriptor>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, overload: FunctionOverload) -> &mut Self {
        self.eager
            .entry(overload.descriptor.name().into())
            .or_default()
            .push(overload);
        self
    }

    pub fn register_lazy(&mut self, descriptor: FunctionDescriptor) -> &mut Self {
        self.lazy
            .entry(descriptor.name().into())
            .or_default()
            .push(descriptor);
        self
    }

    /// Statically-bound candidates for `name`; empty when none.
    pub fn overloads(&self, name: &str) -> &[FunctionOverload] {
        self.eager.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_lazy(&self, name: &str) -> bool {
        self.lazy.contains_key(name)
    }

    pub fn lazy_descriptors(&self, name: &str) -> &[FunctionDescriptor] {
        self.lazy.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}
