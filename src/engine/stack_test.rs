use pretty_assertions::assert_eq;

use crate::{
    attributes::{AttributeTrail, Qualifier},
    engine::stack::{IteratorFrame, IteratorStack, RangeKind, ValueStack},
    engine::state::ComprehensionSlots,
    errors::InternalError,
    values::Value,
};

#[test]
fn push_pop_preserves_trail_pairing() {
    let mut stack = ValueStack::new();
    stack.push(Value::Int(1), AttributeTrail::empty());
    stack.push(Value::Int(2), AttributeTrail::for_variable("x"));
    let (value, trail) = stack.pop_pair().unwrap();
    assert_eq!(value, Value::Int(2));
    assert_eq!(trail, AttributeTrail::for_variable("x"));
    let (value, trail) = stack.pop_pair().unwrap();
    assert_eq!(value, Value::Int(1));
    assert!(trail.is_empty());
}

#[test]
fn underflow_reports_needed_and_actual() {
    let mut stack = ValueStack::new();
    stack.push(Value::Bool(true), AttributeTrail::empty());
    let err = stack.pop(2).unwrap_err();
    assert_eq!(
        err,
        InternalError::StackUnderflow {
            needed: 2,
            actual: 1
        }
    );
    assert_eq!(stack.len(), 1);
}

#[test]
fn top_n_is_bottom_to_top() {
    let mut stack = ValueStack::new();
    for n in 0..4 {
        stack.push(Value::Int(n), AttributeTrail::empty());
    }
    let (values, trails) = stack.top_n(3).unwrap();
    assert_eq!(values, &[Value::Int(1), Value::Int(2), Value::Int(3)]);
    assert_eq!(trails.len(), 3);
}

#[test]
fn pop_and_push_replaces_window() {
    let mut stack = ValueStack::new();
    stack.push(Value::Int(1), AttributeTrail::empty());
    stack.push(Value::Int(2), AttributeTrail::empty());
    stack.push(Value::Int(3), AttributeTrail::empty());
    stack
        .pop_and_push(2, Value::Bool(true), AttributeTrail::empty())
        .unwrap();
    assert_eq!(stack.len(), 2);
    assert_eq!(*stack.peek().unwrap(), Value::Bool(true));
}

#[test]
fn iterator_frame_walks_list_with_index_qualifiers() {
    let items = [Value::Int(10), Value::Int(20)];
    let mut frame = IteratorFrame {
        items: &items,
        pos: 0,
        range_trail: AttributeTrail::empty(),
        kind: RangeKind::List,
    };
    let (value, qualifier) = frame.current();
    assert_eq!(value, Value::Int(10));
    assert_eq!(qualifier, Some(Qualifier::Int(0)));
    frame.pos += 1;
    let (value, qualifier) = frame.current();
    assert_eq!(value, Value::Int(20));
    assert_eq!(qualifier, Some(Qualifier::Int(1)));
    frame.pos += 1;
    assert!(frame.exhausted());
}

#[test]
fn map_key_range_uses_key_qualifiers() {
    let keys = [Value::String("a"), Value::Uint(7)];
    let mut frame = IteratorFrame {
        items: &keys,
        pos: 0,
        range_trail: AttributeTrail::empty(),
        kind: RangeKind::MapKeys,
    };
    assert_eq!(frame.current().1, Some(Qualifier::String("a")));
    frame.pos += 1;
    assert_eq!(frame.current().1, Some(Qualifier::Uint(7)));
}

#[test]
fn iterator_stack_enforces_its_limit() {
    let mut iterators = IteratorStack::with_limit(1);
    let frame = IteratorFrame {
        items: &[],
        pos: 0,
        range_trail: AttributeTrail::empty(),
        kind: RangeKind::List,
    };
    iterators.push(frame).unwrap();
    assert_eq!(
        iterators.push(frame).unwrap_err(),
        InternalError::IteratorStackOverflow { limit: 1 }
    );
    iterators.pop().unwrap();
    assert_eq!(
        iterators.pop().unwrap_err(),
        InternalError::IteratorStackUnderflow
    );
}

#[test]
fn slots_read_before_assignment_is_fatal() {
    let mut slots = ComprehensionSlots::with_size(2);
    assert_eq!(
        slots.read(0).unwrap_err(),
        InternalError::UnassignedSlot { slot: 0 }
    );
    slots.set(0, Value::Int(5), AttributeTrail::empty());
    assert_eq!(slots.read(0).unwrap().0, Value::Int(5));
    slots.clear(0);
    assert!(!slots.is_set(0));
}
