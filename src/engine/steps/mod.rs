//! The step families, each in both evaluator flavors over one shared
//! semantics helper.

pub mod call;
pub mod comprehension;
pub mod constant;
pub mod container;
pub mod create;
pub mod ident;
pub mod lazy;
pub mod logic;
pub mod select;
