use ecow::EcoString;
use smallvec::SmallVec;

use crate::values::{Kind, Value};

/// Declares one overload: name, call style, argument kinds, strictness.
///
/// For receiver-style overloads the receiver counts as argument zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDescriptor {
    name: EcoString,
    receiver_style: bool,
    kinds: SmallVec<[Kind; 4]>,
    is_strict: bool,
}

impl FunctionDescriptor {
    pub fn new(
        name: impl Into<EcoString>,
        receiver_style: bool,
        kinds: impl IntoIterator<Item = Kind>,
    ) -> Self {
        FunctionDescriptor {
            name: name.into(),
            receiver_style,
            kinds: kinds.into_iter().collect(),
            is_strict: true,
        }
    }

    /// Mark the overload non-strict: it is invoked even when arguments are
    /// errors or unknowns.
    pub fn non_strict(mut self) -> Self {
        self.is_strict = false;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn receiver_style(&self) -> bool {
        self.receiver_style
    }

    pub fn kinds(&self) -> &[Kind] {
        &self.kinds
    }

    pub fn is_strict(&self) -> bool {
        self.is_strict
    }

    pub fn arity(&self) -> usize {
        self.kinds.len()
    }

    /// Kind-match the call's arguments against this overload. `Kind::Any`
    /// positions accept anything; error and unknown arguments match every
    /// declared kind, so strictness can be decided after resolution.
    pub fn matches(&self, receiver_style: bool, args: &[Value<'_>]) -> bool {
        self.receiver_style == receiver_style
            && self.kinds.len() == args.len()
            && self.kinds.iter().zip(args.iter()).all(|(kind, arg)| {
                *kind == Kind::Any || arg.is_error_or_unknown() || arg.kind() == *kind
            })
    }
}
