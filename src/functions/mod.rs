//! Function overloads: declaration, registration, resolution, invocation.

pub mod builtins;
pub mod descriptor;
pub mod registry;
pub mod resolver;
pub use descriptor::FunctionDescriptor;
pub use registry::{Function, FunctionOverload, FunctionRegistry};
pub use resolver::{CallSite, OverloadCandidates};

#[cfg(test)]
mod resolver_test;
