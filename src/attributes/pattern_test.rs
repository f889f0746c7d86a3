use bumpalo::Bump;
use pretty_assertions::assert_eq;

use crate::attributes::{
    AttributePattern, AttributeTrail, AttributeUtility, MatchKind, Qualifier, UnknownAccumulator,
};
use crate::values::Value;

fn trail<'a>(arena: &'a Bump, variable: &'a str, qualifiers: &[Qualifier<'a>]) -> AttributeTrail<'a> {
    let mut t = AttributeTrail::for_variable(variable);
    for q in qualifiers {
        t = t.step(*q, arena);
    }
    t
}

#[test]
fn full_match_is_prefix_of_trail() {
    let arena = Bump::new();
    let pattern = AttributePattern::new("a").field("b");
    let exact = trail(&arena, "a", &[Qualifier::String("b")]);
    let deeper = trail(&arena, "a", &[Qualifier::String("b"), Qualifier::Int(3)]);
    assert_eq!(pattern.is_match(&exact.attribute().unwrap()), MatchKind::Full);
    assert_eq!(pattern.is_match(&deeper.attribute().unwrap()), MatchKind::Full);
}

#[test]
fn partial_match_is_proper_prefix_of_pattern() {
    let arena = Bump::new();
    let pattern = AttributePattern::new("a").field("b").index(2);
    let shallow = trail(&arena, "a", &[Qualifier::String("b")]);
    assert_eq!(
        pattern.is_match(&shallow.attribute().unwrap()),
        MatchKind::Partial
    );
}

#[test]
fn diverging_qualifier_is_no_match() {
    let arena = Bump::new();
    let pattern = AttributePattern::new("a").field("b");
    let other_field = trail(&arena, "a", &[Qualifier::String("c")]);
    let other_var = trail(&arena, "x", &[Qualifier::String("b")]);
    let typed = trail(&arena, "a", &[Qualifier::Int(0)]);
    assert_eq!(
        pattern.is_match(&other_field.attribute().unwrap()),
        MatchKind::None
    );
    assert_eq!(
        pattern.is_match(&other_var.attribute().unwrap()),
        MatchKind::None
    );
    assert_eq!(pattern.is_match(&typed.attribute().unwrap()), MatchKind::None);
}

#[test]
fn wildcard_matches_any_qualifier() {
    let arena = Bump::new();
    let pattern = AttributePattern::new("a").wildcard().field("b");
    let t = trail(&arena, "a", &[Qualifier::Int(7), Qualifier::String("b")]);
    assert_eq!(pattern.is_match(&t.attribute().unwrap()), MatchKind::Full);
}

#[test]
fn stepping_copies_instead_of_mutating() {
    let arena = Bump::new();
    let base = trail(&arena, "a", &[Qualifier::String("b")]);
    let stepped = base.step(Qualifier::Int(1), &arena);
    assert_eq!(base.attribute().unwrap().qualifiers.len(), 1);
    assert_eq!(stepped.attribute().unwrap().qualifiers.len(), 2);
    assert_eq!(base.step(Qualifier::Int(2), &arena).to_string(), "a.b[2]");
}

#[test]
fn empty_trail_never_matches_and_steps_to_empty() {
    let arena = Bump::new();
    let empty = AttributeTrail::empty();
    assert!(empty.step(Qualifier::Int(0), &arena).is_empty());
    let patterns = [AttributePattern::new("a")];
    let utility = AttributeUtility::new(&patterns, &[], &arena);
    assert!(!utility.check_for_unknown(&empty, true));
    assert!(!utility.check_for_missing(&empty));
}

#[test]
fn missing_uses_full_matches_only() {
    let arena = Bump::new();
    let patterns = [AttributePattern::new("a").field("b").index(2)];
    let utility = AttributeUtility::new(&[], &patterns, &arena);
    let shallow = trail(&arena, "a", &[Qualifier::String("b")]);
    let exact = trail(
        &arena,
        "a",
        &[Qualifier::String("b"), Qualifier::Int(2)],
    );
    assert!(!utility.check_for_missing(&shallow));
    assert!(utility.check_for_missing(&exact));
}

#[test]
fn accumulator_merges_explicit_and_synthesized_unknowns() {
    let arena = Bump::new();
    let patterns = [AttributePattern::new("b")];
    let utility = AttributeUtility::new(&patterns, &[], &arena);

    let a_trail = trail(&arena, "a", &[]);
    let explicit = utility.create_unknown(&a_trail).unwrap();
    let b_trail = trail(&arena, "b", &[Qualifier::Int(0)]);

    let mut acc = UnknownAccumulator::new(utility);
    assert!(acc.is_empty());
    acc.maybe_add(&explicit, &AttributeTrail::empty());
    acc.maybe_add(&Value::Int(1), &b_trail);
    acc.maybe_add(&Value::Int(2), &AttributeTrail::empty());

    let Some(Value::Unknown(u)) = acc.build() else {
        panic!("expected a merged unknown");
    };
    assert_eq!(u.attributes.len(), 2);
}

#[test]
fn accumulator_dedups_repeated_attributes() {
    let arena = Bump::new();
    let patterns = [AttributePattern::new("a")];
    let utility = AttributeUtility::new(&patterns, &[], &arena);
    let t = trail(&arena, "a", &[]);

    let mut acc = UnknownAccumulator::new(utility);
    acc.maybe_add(&Value::Int(1), &t);
    acc.maybe_add(&Value::Int(2), &t);

    let Some(Value::Unknown(u)) = acc.build() else {
        panic!("expected a merged unknown");
    };
    assert_eq!(u.attributes.len(), 1);
}
