use ecow::EcoString;
use smallvec::SmallVec;

use crate::attributes::{Attribute, Qualifier};

/// Pattern over one qualifier position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QualifierPattern {
    /// Matches any qualifier at this position.
    Wildcard,
    String(EcoString),
    Int(i64),
    Uint(u64),
    Bool(bool),
}

impl QualifierPattern {
    fn matches(&self, qualifier: &Qualifier<'_>) -> bool {
        match (self, qualifier) {
            (QualifierPattern::Wildcard, _) => true,
            (QualifierPattern::String(p), Qualifier::String(q)) => p == q,
            (QualifierPattern::Int(p), Qualifier::Int(q)) => p == q,
            (QualifierPattern::Uint(p), Qualifier::Uint(q)) => p == q,
            (QualifierPattern::Bool(p), Qualifier::Bool(q)) => p == q,
            _ => false,
        }
    }
}

/// How a pattern relates to a concrete trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// No relation.
    None,
    /// The trail is a proper prefix of the pattern: some descendant of the
    /// trail would match, the trail itself does not.
    Partial,
    /// The pattern is a (non-strict) prefix of the trail: the trail, and
    /// everything reachable through it, matches.
    Full,
}

/// Declares a variable, or a region under one, as unknown or missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributePattern {
    variable: EcoString,
    qualifiers: SmallVec<[QualifierPattern; 4]>,
}

impl AttributePattern {
    pub fn new(variable: impl Into<EcoString>) -> Self {
        AttributePattern {
            variable: variable.into(),
            qualifiers: SmallVec::new(),
        }
    }

    pub fn field(mut self, name: impl Into<EcoString>) -> Self {
        self.qualifiers.push(QualifierPattern::String(name.into()));
        self
    }

    pub fn index(mut self, index: i64) -> Self {
        self.qualifiers.push(QualifierPattern::Int(index));
        self
    }

    pub fn index_uint(mut self, index: u64) -> Self {
        self.qualifiers.push(QualifierPattern::Uint(index));
        self
    }

    pub fn index_bool(mut self, index: bool) -> Self {
        self.qualifiers.push(QualifierPattern::Bool(index));
        self
    }

    pub fn wildcard(mut self) -> Self {
        self.qualifiers.push(QualifierPattern::Wildcard);
        self
    }

    pub fn variable(&self) -> &str {
        &self.variable
    }

    /// Classify `attribute` against this pattern.
    pub fn is_match(&self, attribute: &Attribute<'_>) -> MatchKind {
        if self.variable != attribute.variable {
            return MatchKind::None;
        }
        let shared = self.qualifiers.len().min(attribute.qualifiers.len());
        for i in 0..shared {
            if !self.qualifiers[i].matches(&attribute.qualifiers[i]) {
                return MatchKind::None;
            }
        }
        if self.qualifiers.len() <= attribute.qualifiers.len() {
            MatchKind::Full
        } else {
            MatchKind::Partial
        }
    }
}
