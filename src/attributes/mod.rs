//! Attribute identity for values: where a value came from, and whether that
//! place was declared unknown or missing.

pub mod pattern;
pub mod trail;
pub mod utility;
pub use pattern::{AttributePattern, MatchKind, QualifierPattern};
pub use trail::{Attribute, AttributeTrail, Qualifier};
pub use utility::{AttributeUtility, UnknownAccumulator};

#[cfg(test)]
mod pattern_test;
