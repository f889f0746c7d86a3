use bumpalo::Bump;
use pretty_assertions::assert_eq;

use crate::attributes::{AttributePattern, AttributeTrail, AttributeUtility};
use crate::errors::InternalError;
use crate::functions::resolver::{CallSite, OverloadCandidates, evaluate_call};
use crate::functions::{FunctionDescriptor, FunctionOverload};
use crate::values::{Kind, Value};

fn double_int_impl<'a>(_arena: &'a Bump, args: &[Value<'a>]) -> Value<'a> {
    match args[0] {
        Value::Int(n) => Value::Int(n * 2),
        other => other,
    }
}

fn first_arg_impl<'a>(_arena: &'a Bump, args: &[Value<'a>]) -> Value<'a> {
    args[0]
}

fn unknown_result_impl<'a>(arena: &'a Bump, _args: &[Value<'a>]) -> Value<'a> {
    Value::unknown_function_result(arena)
}

fn bool_or_true_impl<'a>(_arena: &'a Bump, args: &[Value<'a>]) -> Value<'a> {
    match args[0] {
        Value::Bool(b) => Value::Bool(b),
        _ => Value::Bool(true),
    }
}

fn double_int() -> FunctionOverload {
    FunctionOverload::new(
        FunctionDescriptor::new("f", false, [Kind::Int]),
        double_int_impl,
    )
}

fn site() -> CallSite<'static> {
    CallSite {
        function: "f",
        expr_id: 42,
        receiver_style: false,
    }
}

fn call<'a>(
    arena: &'a Bump,
    overloads: &[FunctionOverload],
    args: &mut [Value<'a>],
    unknown_processing: bool,
) -> Result<Value<'a>, InternalError> {
    let utility = AttributeUtility::new(&[], &[], arena);
    let trails = crate::vec![AttributeTrail::empty(); args.len()];
    evaluate_call(
        arena,
        &site(),
        &OverloadCandidates::Static(overloads),
        args,
        &trails,
        &utility,
        unknown_processing,
    )
}

#[test]
fn static_resolution_invokes_the_matching_overload() {
    let arena = Bump::new();
    let overloads = [double_int()];
    let result = call(&arena, &overloads, &mut [Value::Int(21)], false).unwrap();
    assert_eq!(result, Value::Int(42));
}

#[test]
fn second_kind_match_is_ambiguous() {
    let arena = Bump::new();
    let overloads = [
        double_int(),
        FunctionOverload::new(
            FunctionDescriptor::new("f", false, [Kind::Any]),
            first_arg_impl,
        ),
    ];
    let err = call(&arena, &overloads, &mut [Value::Int(1)], false).unwrap_err();
    assert_eq!(
        err,
        InternalError::AmbiguousOverloads {
            function: "f".into()
        }
    );
}

#[test]
fn dirty_arguments_never_make_resolution_ambiguous() {
    let arena = Bump::new();
    let overloads = [
        double_int(),
        FunctionOverload::new(
            FunctionDescriptor::new("f", false, [Kind::String]),
            first_arg_impl,
        ),
    ];
    let error = Value::error(&arena, "boom");
    let result = call(&arena, &overloads, &mut [error], false).unwrap();
    assert_eq!(result, error);
}

#[test]
fn strict_overload_forwards_error_arguments() {
    let arena = Bump::new();
    let overloads = [double_int()];
    let error = Value::error(&arena, "boom");
    let result = call(&arena, &overloads, &mut [error], false).unwrap();
    assert_eq!(result, error);
}

#[test]
fn unknowns_dominate_errors_on_the_no_overload_path() {
    let arena = Bump::new();
    let overloads = [double_int()];
    let patterns = [AttributePattern::new("x")];
    let utility = AttributeUtility::new(&patterns, &[], &arena);
    let error = Value::error(&arena, "boom");
    let unknown = utility
        .create_unknown(&AttributeTrail::for_variable("x"))
        .unwrap();
    let mut args = [unknown, error];
    let trails = [AttributeTrail::empty(), AttributeTrail::empty()];
    let result = evaluate_call(
        &arena,
        &site(),
        &OverloadCandidates::Static(&overloads),
        &mut args,
        &trails,
        &utility,
        true,
    )
    .unwrap();
    assert!(result.is_unknown());
}

#[test]
fn arguments_matching_unknown_patterns_are_substituted_before_resolution() {
    let arena = Bump::new();
    let overloads = [double_int()];
    let patterns = [AttributePattern::new("x")];
    let utility = AttributeUtility::new(&patterns, &[], &arena);
    let mut args = [Value::Int(5)];
    let trails = [AttributeTrail::for_variable("x")];
    let result = evaluate_call(
        &arena,
        &site(),
        &OverloadCandidates::Static(&overloads),
        &mut args,
        &trails,
        &utility,
        true,
    )
    .unwrap();
    // The int argument was replaced, so the strict overload never ran.
    assert!(result.is_unknown());
}

#[test]
fn no_overload_error_names_the_argument_kinds() {
    let arena = Bump::new();
    let overloads = [double_int()];
    let result = call(&arena, &overloads, &mut [Value::String("x")], false).unwrap();
    let Value::Error(e) = result else {
        panic!("expected an error value");
    };
    assert_eq!(
        e.message,
        "no matching overload for 'f' applied to '(string)'"
    );
}

#[test]
fn unknown_function_result_sentinel_becomes_a_synthesized_unknown() {
    let arena = Bump::new();
    let overloads = [FunctionOverload::new(
        FunctionDescriptor::new("f", false, [Kind::Int]),
        unknown_result_impl,
    )];
    let result = call(&arena, &overloads, &mut [Value::Int(1)], false).unwrap();
    let Value::Unknown(u) = result else {
        panic!("expected an unknown value");
    };
    assert_eq!(u.function_results.len(), 1);
    assert_eq!(u.function_results[0].function, "f");
    assert_eq!(u.function_results[0].expr_id, 42);
}

#[test]
fn non_strict_overloads_see_their_error_arguments() {
    let arena = Bump::new();
    let overloads = [FunctionOverload::new(
        FunctionDescriptor::new("f", false, [Kind::Bool]).non_strict(),
        bool_or_true_impl,
    )];
    let error = Value::error(&arena, "boom");
    let result = call(&arena, &overloads, &mut [error], false).unwrap();
    assert_eq!(result, Value::Bool(true));
}
