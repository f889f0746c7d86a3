use alloc::string::ToString;

use bumpalo::Bump;

use crate::{
    format,
    functions::FunctionOverload,
    values::{MapValue, OptionalValue, StructValue, Unknown},
};

/// A single evaluation result.
///
/// `Value` is a `Copy` handle: primitives are stored inline, everything
/// heavier borrows the evaluation arena. Errors and unknowns are ordinary
/// values that propagate through the operand stack like any other result,
/// never exceptions.
#[derive(Clone, Copy, Debug)]
pub enum Value<'a> {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Double(f64),
    String(&'a str),
    Bytes(&'a [u8]),
    List(&'a [Value<'a>]),
    Map(&'a MapValue<'a>),
    Struct(&'a StructValue<'a>),
    Optional(&'a OptionalValue<'a>),
    /// Expression-level failure; see [`ErrorValue`].
    Error(&'a ErrorValue<'a>),
    /// Result depending on inputs declared unknown; see [`Unknown`].
    Unknown(&'a Unknown<'a>),
    /// First-class reference to a named function's overload set.
    Overload(&'a OverloadValue<'a>),
}

// Two words of payload plus the tag. Keeping this small is what makes the
// parallel value/attribute stack cheap to copy through.
static_assertions::assert_eq_size!(Value<'static>, [usize; 3]);
static_assertions::assert_impl_all!(Value<'static>: Copy, Send, Sync);

/// Expression-level failure, carried as a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorValue<'a> {
    pub message: &'a str,
    /// Sentinel set by function implementations whose result depends on an
    /// unknown; the call protocol converts such a result into a synthesized
    /// [`Unknown`] instead of surfacing the error.
    pub unknown_function_result: bool,
}

/// A named function's overload set, as a value.
///
/// Produced when an identifier resolves to a registered function rather than
/// a variable; the overloads borrow the registry the program was planned
/// against.
#[derive(Clone, Copy)]
pub struct OverloadValue<'a> {
    pub name: &'a str,
    pub overloads: &'a [FunctionOverload],
}

impl core::fmt::Debug for OverloadValue<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OverloadValue")
            .field("name", &self.name)
            .field("overloads", &self.overloads.len())
            .finish()
    }
}

/// The coarse type of a value, used for overload matching and error
/// messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Wildcard in overload declarations; matches every argument.
    Any,
    Null,
    Bool,
    Int,
    Uint,
    Double,
    String,
    Bytes,
    List,
    Map,
    Struct,
    Optional,
    Function,
    Error,
    Unknown,
}

impl core::fmt::Display for Kind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Kind::Any => "any",
            Kind::Null => "null",
            Kind::Bool => "bool",
            Kind::Int => "int",
            Kind::Uint => "uint",
            Kind::Double => "double",
            Kind::String => "string",
            Kind::Bytes => "bytes",
            Kind::List => "list",
            Kind::Map => "map",
            Kind::Struct => "struct",
            Kind::Optional => "optional",
            Kind::Function => "function",
            Kind::Error => "error",
            Kind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

impl<'a> Value<'a> {
    pub fn kind(&self) -> Kind {
        match self {
            Value::Null => Kind::Null,
            Value::Bool(_) => Kind::Bool,
            Value::Int(_) => Kind::Int,
            Value::Uint(_) => Kind::Uint,
            Value::Double(_) => Kind::Double,
            Value::String(_) => Kind::String,
            Value::Bytes(_) => Kind::Bytes,
            Value::List(_) => Kind::List,
            Value::Map(_) => Kind::Map,
            Value::Struct(_) => Kind::Struct,
            Value::Optional(_) => Kind::Optional,
            Value::Error(_) => Kind::Error,
            Value::Unknown(_) => Kind::Unknown,
            Value::Overload(_) => Kind::Function,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Value::Unknown(_))
    }

    pub fn is_error_or_unknown(&self) -> bool {
        matches!(self, Value::Error(_) | Value::Unknown(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Create an error value with the given message.
    pub fn error(arena: &'a Bump, message: impl AsRef<str>) -> Value<'a> {
        Value::Error(arena.alloc(ErrorValue {
            message: arena.alloc_str(message.as_ref()),
            unknown_function_result: false,
        }))
    }

    /// Create the sentinel error a function implementation returns when its
    /// result depends on an unknown input it cannot describe itself.
    pub fn unknown_function_result(arena: &'a Bump) -> Value<'a> {
        Value::Error(arena.alloc(ErrorValue {
            message: "unknown function result",
            unknown_function_result: true,
        }))
    }

    /// The error produced when no overload of `function` accepts the given
    /// arguments, carrying the call's argument-kind signature.
    pub fn no_matching_overload(
        arena: &'a Bump,
        function: &str,
        args: &[Value<'a>],
    ) -> Value<'a> {
        let mut signature = crate::String::new();
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                signature.push_str(", ");
            }
            signature.push_str(&arg.kind().to_string());
        }
        Value::error(
            arena,
            format!("no matching overload for '{function}' applied to '({signature})'"),
        )
    }

    /// Wrap an unknown set as a value.
    pub fn unknown(arena: &'a Bump, unknown: Unknown<'a>) -> Value<'a> {
        Value::Unknown(arena.alloc(unknown))
    }

    /// Equality with configurable cross-kind numeric comparison.
    ///
    /// With `heterogeneous` set, int/uint/double compare by numeric value
    /// where the conversion is lossless; otherwise numerics of different
    /// kinds are simply unequal. Composite values compare structurally (maps
    /// order-insensitively). NaN is unequal to everything, itself included.
    pub fn equals(&self, other: &Value<'a>, heterogeneous: bool) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Uint(a), Value::Uint(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::Int(a), Value::Uint(b)) | (Value::Uint(b), Value::Int(a)) => {
                heterogeneous && u64::try_from(*a) == Ok(*b)
            }
            (Value::Int(a), Value::Double(b)) | (Value::Double(b), Value::Int(a)) => {
                heterogeneous && int_eq_double(*a, *b)
            }
            (Value::Uint(a), Value::Double(b)) | (Value::Double(b), Value::Uint(a)) => {
                heterogeneous && uint_eq_double(*a, *b)
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|(x, y)| x.equals(y, heterogeneous))
            }
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len()
                    && a.entries.iter().all(|(k, v)| {
                        b.lookup(*k, heterogeneous)
                            .is_some_and(|w| v.equals(&w, heterogeneous))
                    })
            }
            (Value::Struct(a), Value::Struct(b)) => {
                a.type_name == b.type_name
                    && a.fields.len() == b.fields.len()
                    && a.fields.iter().all(|(name, v)| {
                        b.field(name).is_some_and(|w| v.equals(&w, heterogeneous))
                    })
            }
            (Value::Optional(a), Value::Optional(b)) => match (a.value, b.value) {
                (None, None) => true,
                (Some(x), Some(y)) => x.equals(&y, heterogeneous),
                _ => false,
            },
            (Value::Error(a), Value::Error(b)) => a == b,
            (Value::Unknown(a), Value::Unknown(b)) => a == b,
            (Value::Overload(a), Value::Overload(b)) => a.name == b.name,
            _ => false,
        }
    }
}

impl<'a> PartialEq for Value<'a> {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other, true)
    }
}

impl core::fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Uint(n) => write!(f, "{n}u"),
            Value::Double(d) => format_double(f, *d),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Bytes(b) => write!(f, "b\"{}\"", b.escape_ascii()),
            Value::List(elements) => {
                write!(f, "[")?;
                for (i, elem) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{elem}")?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Value::Struct(s) => {
                write!(f, "{}{{", s.type_name)?;
                for (i, (name, v)) in s.fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {v}")?;
                }
                write!(f, "}}")
            }
            Value::Optional(o) => match o.value {
                Some(v) => write!(f, "optional.of({v})"),
                None => write!(f, "optional.none"),
            },
            Value::Error(e) => write!(f, "error: {}", e.message),
            Value::Unknown(u) => write!(f, "{u}"),
            Value::Overload(o) => write!(f, "function '{}'", o.name),
        }
    }
}

// Range checks keep the casts exact: 2^63 and 2^64 are representable as f64
// but not as i64/u64, and a saturating cast would silently equate them with
// the respective MAX.
fn int_eq_double(a: i64, b: f64) -> bool {
    b >= -9_223_372_036_854_775_808.0
        && b < 9_223_372_036_854_775_808.0
        && b as i64 == a
        && a as f64 == b
}

fn uint_eq_double(a: u64, b: f64) -> bool {
    b >= 0.0 && b < 18_446_744_073_709_551_616.0 && b as u64 == a && a as f64 == b
}

/// Format a double ensuring it always carries a decimal point.
fn format_double(f: &mut core::fmt::Formatter<'_>, value: f64) -> core::fmt::Result {
    if value.is_nan() {
        write!(f, "nan")
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            write!(f, "inf")
        } else {
            write!(f, "-inf")
        }
    } else {
        let s = value.to_string();
        if s.contains('.') || s.contains('e') || s.contains('E') {
            write!(f, "{s}")
        } else {
            write!(f, "{s}.")
        }
    }
}
