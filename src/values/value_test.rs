use bumpalo::Bump;
use pretty_assertions::assert_eq;

use crate::attributes::{Attribute, Qualifier};
use crate::values::{MapValue, RecordFactory, TypeFactory, Unknown, Value};

#[test]
fn heterogeneous_equality_is_lossless_only() {
    assert!(Value::Int(2).equals(&Value::Uint(2), true));
    assert!(Value::Int(2).equals(&Value::Double(2.0), true));
    assert!(Value::Uint(2).equals(&Value::Double(2.0), true));
    assert!(!Value::Int(-1).equals(&Value::Uint(u64::MAX), true));
    assert!(!Value::Int(2).equals(&Value::Double(2.5), true));
    // i64::MAX is not representable as f64; the round-trip fails.
    assert!(!Value::Int(i64::MAX).equals(&Value::Double(i64::MAX as f64), true));
}

#[test]
fn homogeneous_equality_separates_numeric_kinds() {
    assert!(!Value::Int(2).equals(&Value::Uint(2), false));
    assert!(!Value::Int(2).equals(&Value::Double(2.0), false));
    assert!(Value::Int(2).equals(&Value::Int(2), false));
}

#[test]
fn nan_is_unequal_to_itself() {
    assert!(!Value::Double(f64::NAN).equals(&Value::Double(f64::NAN), true));
}

#[test]
fn map_equality_ignores_entry_order() {
    let arena = Bump::new();
    let ab = MapValue {
        entries: arena.alloc_slice_copy(&[
            (Value::String("a"), Value::Int(1)),
            (Value::String("b"), Value::Int(2)),
        ]),
    };
    let ba = MapValue {
        entries: arena.alloc_slice_copy(&[
            (Value::String("b"), Value::Int(2)),
            (Value::String("a"), Value::Int(1)),
        ]),
    };
    assert_eq!(Value::Map(arena.alloc(ab)), Value::Map(arena.alloc(ba)));
}

#[test]
fn map_lookup_coerces_numeric_keys() {
    let arena = Bump::new();
    let map = MapValue {
        entries: arena.alloc_slice_copy(&[(Value::Uint(2), Value::String("a"))]),
    };
    assert_eq!(map.lookup(Value::Int(2), true), Some(Value::String("a")));
    assert_eq!(map.lookup(Value::Int(2), false), None);
    assert_eq!(map.lookup(Value::Uint(2), false), Some(Value::String("a")));
}

#[test]
fn unknown_merge_is_set_union() {
    let arena = Bump::new();
    let attr = |name: &'static str| Attribute {
        variable: name,
        qualifiers: &[],
    };
    let a = Unknown::from_attribute(&arena, attr("a"));
    let b = Unknown::from_attribute(&arena, attr("b"));
    let ab = Unknown::merge(&arena, &a, &b);
    let ab_again = Unknown::merge(&arena, &ab, &a);
    assert_eq!(ab.attributes.len(), 2);
    assert_eq!(ab_again, ab);
    // Order-insensitive equality.
    let ba = Unknown::merge(&arena, &b, &a);
    assert_eq!(ba, ab);
}

#[test]
fn no_matching_overload_message_carries_kind_signature() {
    let arena = Bump::new();
    let err = Value::no_matching_overload(&arena, "_+_", &[Value::Int(1), Value::String("x")]);
    let Value::Error(e) = err else {
        panic!("expected an error value");
    };
    assert_eq!(
        e.message,
        "no matching overload for '_+_' applied to '(int, string)'"
    );
    assert!(!e.unknown_function_result);
}

#[test]
fn record_factory_builds_structs_and_rejects_duplicates() {
    let arena = Bump::new();
    let factory = RecordFactory;
    let mut builder = factory.new_builder(&arena, "Point").unwrap();
    builder.set_field_by_name("x", Value::Int(1)).unwrap();
    builder.set_field_by_name("y", Value::Int(2)).unwrap();
    assert!(builder.set_field_by_name("x", Value::Int(3)).is_err());
    let Value::Struct(s) = builder.build().unwrap() else {
        panic!("expected a struct value");
    };
    assert_eq!(s.type_name, "Point");
    assert_eq!(s.field("y"), Some(Value::Int(2)));
    assert_eq!(s.field("z"), None);
}

#[test]
fn display_matches_source_syntax() {
    let arena = Bump::new();
    let list = Value::List(arena.alloc_slice_copy(&[
        Value::Uint(1),
        Value::Int(2),
        Value::String("x"),
        Value::Double(3.0),
    ]));
    assert_eq!(list.to_string(), "[1u, 2, \"x\", 3.]");

    let trail = crate::attributes::AttributeTrail::for_variable("a")
        .step(Qualifier::String("b"), &arena)
        .step(Qualifier::Int(0), &arena);
    let unknown = Value::unknown(
        &arena,
        Unknown::from_attribute(&arena, trail.attribute().unwrap()),
    );
    assert_eq!(unknown.to_string(), "unknown{a.b[0]}");
}
