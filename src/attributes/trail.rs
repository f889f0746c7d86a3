use bumpalo::Bump;

/// One step into a container or field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qualifier<'a> {
    String(&'a str),
    Int(i64),
    Uint(u64),
    Bool(bool),
}

impl core::fmt::Display for Qualifier<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Qualifier::String(s) => write!(f, ".{s}"),
            Qualifier::Int(n) => write!(f, "[{n}]"),
            Qualifier::Uint(n) => write!(f, "[{n}u]"),
            Qualifier::Bool(b) => write!(f, "[{b}]"),
        }
    }
}

/// A concrete access path: root variable plus the qualifiers stepped through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attribute<'a> {
    pub variable: &'a str,
    pub qualifiers: &'a [Qualifier<'a>],
}

impl core::fmt::Display for Attribute<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.variable)?;
        for q in self.qualifiers {
            write!(f, "{q}")?;
        }
        Ok(())
    }
}

/// The attribute identity carried alongside every stack value.
///
/// Empty means "no identity": derived values (literals, call results) carry
/// no trail, and stepping an empty trail stays empty. `step` copies into a
/// fresh arena slice, so trails already on the stack are never mutated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttributeTrail<'a>(Option<Attribute<'a>>);

impl<'a> AttributeTrail<'a> {
    pub fn empty() -> Self {
        AttributeTrail(None)
    }

    pub fn for_variable(variable: &'a str) -> Self {
        AttributeTrail(Some(Attribute {
            variable,
            qualifiers: &[],
        }))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    pub fn attribute(&self) -> Option<Attribute<'a>> {
        self.0
    }

    /// Extend the trail by one qualifier.
    pub fn step(&self, qualifier: Qualifier<'a>, arena: &'a Bump) -> AttributeTrail<'a> {
        let Some(attr) = self.0 else {
            return AttributeTrail(None);
        };
        let n = attr.qualifiers.len();
        let qualifiers = arena.alloc_slice_fill_with(n + 1, |i| {
            if i < n { attr.qualifiers[i] } else { qualifier }
        });
        AttributeTrail(Some(Attribute {
            variable: attr.variable,
            qualifiers,
        }))
    }
}

impl core::fmt::Display for AttributeTrail<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match &self.0 {
            Some(attr) => write!(f, "{attr}"),
            None => write!(f, "<none>"),
        }
    }
}
