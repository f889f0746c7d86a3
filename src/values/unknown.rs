use bumpalo::Bump;

use crate::{Vec, attributes::Attribute};

/// One call whose result was declared unknown, identified by function name
/// and call-site expression id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionResult<'a> {
    pub function: &'a str,
    pub expr_id: i64,
}

/// The set of reasons a result is not yet computable: attributes that were
/// declared unknown, and calls whose results were.
///
/// Both components are sets; merging is union with dedup, and equality is
/// order-insensitive.
#[derive(Debug, Clone, Copy)]
pub struct Unknown<'a> {
    pub attributes: &'a [Attribute<'a>],
    pub function_results: &'a [FunctionResult<'a>],
}

impl<'a> Unknown<'a> {
    pub fn from_attribute(arena: &'a Bump, attribute: Attribute<'a>) -> Unknown<'a> {
        Unknown {
            attributes: arena.alloc_slice_copy(&[attribute]),
            function_results: &[],
        }
    }

    pub fn from_function_result(arena: &'a Bump, function: &'a str, expr_id: i64) -> Unknown<'a> {
        Unknown {
            attributes: &[],
            function_results: arena.alloc_slice_copy(&[FunctionResult { function, expr_id }]),
        }
    }

    /// Set-union of two unknowns.
    pub fn merge(arena: &'a Bump, a: &Unknown<'a>, b: &Unknown<'a>) -> Unknown<'a> {
        let mut attributes: Vec<Attribute<'a>> = a.attributes.to_vec();
        for attr in b.attributes {
            if !attributes.contains(attr) {
                attributes.push(*attr);
            }
        }
        let mut function_results: Vec<FunctionResult<'a>> = a.function_results.to_vec();
        for fr in b.function_results {
            if !function_results.contains(fr) {
                function_results.push(*fr);
            }
        }
        Unknown {
            attributes: arena.alloc_slice_copy(&attributes),
            function_results: arena.alloc_slice_copy(&function_results),
        }
    }
}

impl PartialEq for Unknown<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.attributes.len() == other.attributes.len()
            && self.function_results.len() == other.function_results.len()
            && self
                .attributes
                .iter()
                .all(|a| other.attributes.contains(a))
            && self
                .function_results
                .iter()
                .all(|fr| other.function_results.contains(fr))
    }
}

impl core::fmt::Display for Unknown<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "unknown{{")?;
        let mut first = true;
        for attr in self.attributes {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            write!(f, "{attr}")?;
        }
        for fr in self.function_results {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            write!(f, "{}(#{})", fr.function, fr.expr_id)?;
        }
        write!(f, "}}")
    }
}
