use bumpalo::Bump;

use crate::{
    attributes::{AttributePattern, AttributeTrail, MatchKind},
    values::{Unknown, Value},
};

/// Read-only pattern matching shared by every read site of one evaluation.
///
/// Borrows the activation's pattern lists; cheap to copy into steps as
/// needed. When unknown processing is disabled the evaluation context hands
/// out an instance over empty pattern lists, so every check is a no-op.
#[derive(Clone, Copy)]
pub struct AttributeUtility<'f, 'a> {
    unknown_patterns: &'f [AttributePattern],
    missing_patterns: &'f [AttributePattern],
    arena: &'a Bump,
}

impl<'f, 'a> AttributeUtility<'f, 'a> {
    pub fn new(
        unknown_patterns: &'f [AttributePattern],
        missing_patterns: &'f [AttributePattern],
        arena: &'a Bump,
    ) -> Self {
        AttributeUtility {
            unknown_patterns,
            missing_patterns,
            arena,
        }
    }

    /// True when the trail matches a declared-unknown pattern. `use_partial`
    /// additionally accepts trails that merely lead into a pattern; read
    /// sites that will qualify further (function arguments, comprehension
    /// ranges) pass `true`, terminal reads pass `false`.
    pub fn check_for_unknown(&self, trail: &AttributeTrail<'a>, use_partial: bool) -> bool {
        let Some(attribute) = trail.attribute() else {
            return false;
        };
        self.unknown_patterns.iter().any(|p| {
            match p.is_match(&attribute) {
                MatchKind::Full => true,
                MatchKind::Partial => use_partial,
                MatchKind::None => false,
            }
        })
    }

    /// True when the trail fully matches a declared-missing pattern. Missing
    /// checks never use partial matches and take precedence over unknown
    /// checks at every read site.
    pub fn check_for_missing(&self, trail: &AttributeTrail<'a>) -> bool {
        let Some(attribute) = trail.attribute() else {
            return false;
        };
        self.missing_patterns
            .iter()
            .any(|p| p.is_match(&attribute) == MatchKind::Full)
    }

    /// Synthesize the unknown value describing `trail`.
    pub fn create_unknown(&self, trail: &AttributeTrail<'a>) -> Option<Value<'a>> {
        let attribute = trail.attribute()?;
        Some(Value::unknown(
            self.arena,
            Unknown::from_attribute(self.arena, attribute),
        ))
    }

    /// `create_unknown` gated on a pattern match.
    pub fn unknown_if_matched(
        &self,
        trail: &AttributeTrail<'a>,
        use_partial: bool,
    ) -> Option<Value<'a>> {
        if self.check_for_unknown(trail, use_partial) {
            self.create_unknown(trail)
        } else {
            None
        }
    }

    pub fn arena(&self) -> &'a Bump {
        self.arena
    }
}

/// Collects the unknowns among sibling subexpression results into one merged
/// unknown, as for list/map/struct construction and the call no-overload
/// path.
///
/// Borrow-scoped: built, fed, and consumed within a single step.
pub struct UnknownAccumulator<'f, 'a> {
    utility: AttributeUtility<'f, 'a>,
    merged: Option<Unknown<'a>>,
}

impl<'f, 'a> UnknownAccumulator<'f, 'a> {
    pub fn new(utility: AttributeUtility<'f, 'a>) -> Self {
        UnknownAccumulator {
            utility,
            merged: None,
        }
    }

    /// Fold in one sibling result. An explicit unknown value is taken as-is;
    /// otherwise an unknown is synthesized when the trail matches a declared
    /// pattern (exact or partial).
    pub fn maybe_add(&mut self, value: &Value<'a>, trail: &AttributeTrail<'a>) {
        let unknown = match value {
            Value::Unknown(u) => Some(**u),
            _ => {
                if self.utility.check_for_unknown(trail, true) {
                    trail
                        .attribute()
                        .map(|a| Unknown::from_attribute(self.utility.arena(), a))
                } else {
                    None
                }
            }
        };
        if let Some(unknown) = unknown {
            self.merged = Some(match &self.merged {
                Some(existing) => Unknown::merge(self.utility.arena(), existing, &unknown),
                None => unknown,
            });
        }
    }

    pub fn is_empty(&self) -> bool {
        self.merged.is_none()
    }

    /// The merged unknown as a value, or `None` when nothing accumulated.
    pub fn build(self) -> Option<Value<'a>> {
        let arena = self.utility.arena();
        self.merged.map(|u| Value::unknown(arena, u))
    }
}
