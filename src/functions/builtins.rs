//! The default function set: operators the planner does not own, enough for
//! realistic expressions over the engine's value model.

use bumpalo::Bump;

use crate::{
    String,
    ast::operators,
    functions::{Function, FunctionDescriptor, FunctionOverload, FunctionRegistry},
    options::RuntimeOptions,
    values::{Kind, OptionalValue, Value},
};

fn overload(
    registry: &mut FunctionRegistry,
    descriptor: FunctionDescriptor,
    f: impl Function + 'static,
) {
    registry.register(FunctionOverload::new(descriptor, f));
}

/// Register the standard operator set.
///
/// `options` is consulted at registration time: the equality and membership
/// overloads capture the heterogeneous-equality flag, so a program planned
/// against this registry keeps the semantics it was configured with.
pub fn register_standard_functions(registry: &mut FunctionRegistry, options: &RuntimeOptions) {
    let heterogeneous = options.heterogeneous_equality;

    overload(
        registry,
        FunctionDescriptor::new(operators::NOT, false, [Kind::Bool]),
        logical_not,
    );

    overload(
        registry,
        FunctionDescriptor::new(operators::NEGATE, false, [Kind::Int]),
        negate_int,
    );
    overload(
        registry,
        FunctionDescriptor::new(operators::NEGATE, false, [Kind::Double]),
        negate_double,
    );

    overload(
        registry,
        FunctionDescriptor::new(operators::EQUALS, false, [Kind::Any, Kind::Any]),
        Equality {
            negated: false,
            heterogeneous,
        },
    );
    overload(
        registry,
        FunctionDescriptor::new(operators::NOT_EQUALS, false, [Kind::Any, Kind::Any]),
        Equality {
            negated: true,
            heterogeneous,
        },
    );

    overload(
        registry,
        FunctionDescriptor::new(operators::ADD, false, [Kind::Int, Kind::Int]),
        add_int,
    );
    overload(
        registry,
        FunctionDescriptor::new(operators::ADD, false, [Kind::Uint, Kind::Uint]),
        add_uint,
    );
    overload(
        registry,
        FunctionDescriptor::new(operators::ADD, false, [Kind::Double, Kind::Double]),
        add_double,
    );
    overload(
        registry,
        FunctionDescriptor::new(operators::ADD, false, [Kind::String, Kind::String]),
        concat_string,
    );

    overload(
        registry,
        FunctionDescriptor::new(operators::SUBTRACT, false, [Kind::Int, Kind::Int]),
        subtract_int,
    );
    overload(
        registry,
        FunctionDescriptor::new(operators::SUBTRACT, false, [Kind::Uint, Kind::Uint]),
        subtract_uint,
    );
    overload(
        registry,
        FunctionDescriptor::new(operators::SUBTRACT, false, [Kind::Double, Kind::Double]),
        subtract_double,
    );

    overload(
        registry,
        FunctionDescriptor::new(operators::DIVIDE, false, [Kind::Int, Kind::Int]),
        divide_int,
    );
    overload(
        registry,
        FunctionDescriptor::new(operators::DIVIDE, false, [Kind::Uint, Kind::Uint]),
        divide_uint,
    );
    overload(
        registry,
        FunctionDescriptor::new(operators::DIVIDE, false, [Kind::Double, Kind::Double]),
        divide_double,
    );

    overload(
        registry,
        FunctionDescriptor::new(operators::IN, false, [Kind::Any, Kind::List]),
        ListMembership { heterogeneous },
    );
    overload(
        registry,
        FunctionDescriptor::new(operators::IN, false, [Kind::Any, Kind::Map]),
        MapMembership { heterogeneous },
    );

    // Loop-condition guard for fold-style macros: false stops the loop,
    // everything else (errors and unknowns included) keeps it running so
    // they reach the accumulator.
    overload(
        registry,
        FunctionDescriptor::new(operators::NOT_STRICTLY_FALSE, false, [Kind::Bool]).non_strict(),
        not_strictly_false,
    );

    overload(
        registry,
        FunctionDescriptor::new("optional.of", false, [Kind::Any]),
        optional_of,
    );
    overload(
        registry,
        FunctionDescriptor::new("optional.none", false, core::iter::empty::<Kind>()),
        optional_none,
    );
    overload(
        registry,
        FunctionDescriptor::new("orValue", true, [Kind::Optional, Kind::Any]),
        or_value,
    );
}

struct Equality {
    negated: bool,
    heterogeneous: bool,
}

impl Function for Equality {
    fn invoke<'a>(&self, _arena: &'a Bump, args: &[Value<'a>]) -> Value<'a> {
        Value::Bool(args[0].equals(&args[1], self.heterogeneous) != self.negated)
    }
}

struct ListMembership {
    heterogeneous: bool,
}

impl Function for ListMembership {
    fn invoke<'a>(&self, _arena: &'a Bump, args: &[Value<'a>]) -> Value<'a> {
        match args[1] {
            Value::List(elements) => Value::Bool(
                elements
                    .iter()
                    .any(|e| e.equals(&args[0], self.heterogeneous)),
            ),
            _ => args[1],
        }
    }
}

struct MapMembership {
    heterogeneous: bool,
}

impl Function for MapMembership {
    fn invoke<'a>(&self, _arena: &'a Bump, args: &[Value<'a>]) -> Value<'a> {
        match args[1] {
            Value::Map(map) => Value::Bool(map.contains_key(args[0], self.heterogeneous)),
            _ => args[1],
        }
    }
}

fn logical_not<'a>(_arena: &'a Bump, args: &[Value<'a>]) -> Value<'a> {
    match args[0] {
        Value::Bool(b) => Value::Bool(!b),
        other => other,
    }
}

fn negate_int<'a>(arena: &'a Bump, args: &[Value<'a>]) -> Value<'a> {
    match args[0] {
        Value::Int(n) => match n.checked_neg() {
            Some(r) => Value::Int(r),
            None => Value::error(arena, "integer overflow"),
        },
        other => other,
    }
}

fn negate_double<'a>(_arena: &'a Bump, args: &[Value<'a>]) -> Value<'a> {
    match args[0] {
        Value::Double(d) => Value::Double(-d),
        other => other,
    }
}

fn add_int<'a>(arena: &'a Bump, args: &[Value<'a>]) -> Value<'a> {
    int_arithmetic(arena, args, i64::checked_add)
}

fn add_uint<'a>(arena: &'a Bump, args: &[Value<'a>]) -> Value<'a> {
    uint_arithmetic(arena, args, u64::checked_add)
}

fn add_double<'a>(_arena: &'a Bump, args: &[Value<'a>]) -> Value<'a> {
    match (args[0], args[1]) {
        (Value::Double(a), Value::Double(b)) => Value::Double(a + b),
        _ => args[0],
    }
}

fn concat_string<'a>(arena: &'a Bump, args: &[Value<'a>]) -> Value<'a> {
    match (args[0], args[1]) {
        (Value::String(a), Value::String(b)) => {
            let mut s = String::with_capacity(a.len() + b.len());
            s.push_str(a);
            s.push_str(b);
            Value::String(arena.alloc_str(&s))
        }
        _ => args[0],
    }
}

fn subtract_int<'a>(arena: &'a Bump, args: &[Value<'a>]) -> Value<'a> {
    int_arithmetic(arena, args, i64::checked_sub)
}

fn subtract_uint<'a>(arena: &'a Bump, args: &[Value<'a>]) -> Value<'a> {
    uint_arithmetic(arena, args, u64::checked_sub)
}

fn subtract_double<'a>(_arena: &'a Bump, args: &[Value<'a>]) -> Value<'a> {
    match (args[0], args[1]) {
        (Value::Double(a), Value::Double(b)) => Value::Double(a - b),
        _ => args[0],
    }
}

fn divide_int<'a>(arena: &'a Bump, args: &[Value<'a>]) -> Value<'a> {
    match (args[0], args[1]) {
        (Value::Int(_), Value::Int(0)) => Value::error(arena, "division by zero"),
        (Value::Int(a), Value::Int(b)) => match a.checked_div(b) {
            Some(r) => Value::Int(r),
            None => Value::error(arena, "integer overflow"),
        },
        _ => args[0],
    }
}

fn divide_uint<'a>(arena: &'a Bump, args: &[Value<'a>]) -> Value<'a> {
    match (args[0], args[1]) {
        (Value::Uint(_), Value::Uint(0)) => Value::error(arena, "division by zero"),
        (Value::Uint(a), Value::Uint(b)) => Value::Uint(a / b),
        _ => args[0],
    }
}

fn divide_double<'a>(_arena: &'a Bump, args: &[Value<'a>]) -> Value<'a> {
    match (args[0], args[1]) {
        (Value::Double(a), Value::Double(b)) => Value::Double(a / b),
        _ => args[0],
    }
}

fn not_strictly_false<'a>(_arena: &'a Bump, args: &[Value<'a>]) -> Value<'a> {
    match args[0] {
        Value::Bool(b) => Value::Bool(b),
        _ => Value::Bool(true),
    }
}

fn optional_of<'a>(arena: &'a Bump, args: &[Value<'a>]) -> Value<'a> {
    OptionalValue::of(arena, args[0])
}

fn optional_none<'a>(arena: &'a Bump, _args: &[Value<'a>]) -> Value<'a> {
    OptionalValue::none(arena)
}

fn or_value<'a>(_arena: &'a Bump, args: &[Value<'a>]) -> Value<'a> {
    match args[0] {
        Value::Optional(o) => o.value.unwrap_or(args[1]),
        other => other,
    }
}

fn int_arithmetic<'a>(
    arena: &'a Bump,
    args: &[Value<'a>],
    op: fn(i64, i64) -> Option<i64>,
) -> Value<'a> {
    match (args[0], args[1]) {
        (Value::Int(a), Value::Int(b)) => match op(a, b) {
            Some(r) => Value::Int(r),
            None => Value::error(arena, "integer overflow"),
        },
        _ => args[0],
    }
}

fn uint_arithmetic<'a>(
    arena: &'a Bump,
    args: &[Value<'a>],
    op: fn(u64, u64) -> Option<u64>,
) -> Value<'a> {
    match (args[0], args[1]) {
        (Value::Uint(a), Value::Uint(b)) => match op(a, b) {
            Some(r) => Value::Uint(r),
            None => Value::error(arena, "unsigned integer overflow"),
        },
        _ => args[0],
    }
}
