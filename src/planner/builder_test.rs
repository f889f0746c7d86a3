use pretty_assertions::assert_eq;

use crate::{
    Box, Vec,
    engine::steps::constant::{ConstantStep, DirectConstant},
    engine::steps::logic::JumpStep,
    errors::InternalError,
    planner::builder::ProgramBuilder,
    program::Subprogram,
    values::Value,
};

fn constant(id: i64) -> Box<ConstantStep<'static>> {
    Box::new(ConstantStep::new(Value::Int(id), id))
}

fn flat_ids(subprogram: &Subprogram<'_>) -> Vec<Option<i64>> {
    match subprogram {
        Subprogram::Flat(steps) => steps.iter().map(|s| s.expr_id()).collect(),
        Subprogram::Direct(_) => panic!("expected a flat subprogram"),
    }
}

#[test]
fn flattening_splices_children_in_order() {
    let mut builder = ProgramBuilder::new();
    builder.enter_subexpression(1).unwrap();
    builder.enter_subexpression(2).unwrap();
    builder.add_step(constant(2)).unwrap();
    builder.exit_subexpression(2).unwrap();
    builder.enter_subexpression(3).unwrap();
    builder.add_step(constant(3)).unwrap();
    builder.exit_subexpression(3).unwrap();
    builder.add_step(constant(1)).unwrap();
    builder.exit_subexpression(1).unwrap();
    let (main, extracted) = builder.build().unwrap();
    assert!(extracted.is_empty());
    assert_eq!(flat_ids(&main), [Some(2), Some(3), Some(1)]);
}

#[test]
fn single_recursive_child_is_adopted() {
    let mut builder = ProgramBuilder::new();
    builder.enter_subexpression(1).unwrap();
    builder.enter_subexpression(2).unwrap();
    builder.add_step(constant(2)).unwrap();
    builder
        .set_recursive(2, Box::new(DirectConstant::new(Value::Int(2))), 1)
        .unwrap();
    builder.exit_subexpression(2).unwrap();
    builder.exit_subexpression(1).unwrap();
    assert_eq!(builder.recursive_depth(1), Some(1));
    let (main, _) = builder.build().unwrap();
    assert!(main.is_direct());
}

#[test]
fn recursive_child_becomes_one_instruction_in_a_flat_parent() {
    let mut builder = ProgramBuilder::new();
    builder.enter_subexpression(1).unwrap();
    builder.enter_subexpression(2).unwrap();
    builder.add_step(constant(2)).unwrap();
    builder
        .set_recursive(2, Box::new(DirectConstant::new(Value::Int(2))), 1)
        .unwrap();
    builder.exit_subexpression(2).unwrap();
    builder.enter_subexpression(3).unwrap();
    builder.add_step(constant(3)).unwrap();
    builder.exit_subexpression(3).unwrap();
    builder.add_step(constant(1)).unwrap();
    builder.exit_subexpression(1).unwrap();
    let (main, _) = builder.build().unwrap();
    // The wrapped node keeps reporting its expression id.
    assert_eq!(flat_ids(&main), [Some(2), Some(3), Some(1)]);
}

#[test]
fn offsets_are_measured_in_flattened_units() {
    let mut builder = ProgramBuilder::new();
    builder.enter_subexpression(1).unwrap();
    let jump = builder.add_placeholder().unwrap();
    builder.enter_subexpression(2).unwrap();
    builder.add_step(constant(2)).unwrap();
    builder.add_step(constant(2)).unwrap();
    builder.exit_subexpression(2).unwrap();
    let end = builder.current_label().unwrap();
    let offset = builder.offset(jump, end).unwrap();
    assert_eq!(offset, 2);
    builder
        .replace_step(jump, Box::new(JumpStep::new(offset)))
        .unwrap();
    builder.exit_subexpression(1).unwrap();
    let (main, _) = builder.build().unwrap();
    assert_eq!(flat_ids(&main).len(), 3);
}

#[test]
fn flattening_is_idempotent_and_matches_computed_size() {
    let mut builder = ProgramBuilder::new();
    builder.enter_subexpression(1).unwrap();
    builder.enter_subexpression(2).unwrap();
    builder.add_step(constant(2)).unwrap();
    builder.add_step(constant(2)).unwrap();
    builder.exit_subexpression(2).unwrap();
    builder.add_step(constant(1)).unwrap();
    builder.exit_subexpression(1).unwrap();
    let size = builder.flat_size(1).unwrap();
    builder.flatten(1).unwrap();
    builder.flatten(1).unwrap();
    assert_eq!(builder.flat_size(1).unwrap(), size);
    let (main, _) = builder.build().unwrap();
    assert_eq!(flat_ids(&main).len(), size);
    assert_eq!(size, 3);
}

#[test]
fn unpatched_placeholder_is_fatal() {
    let mut builder = ProgramBuilder::new();
    builder.enter_subexpression(1).unwrap();
    builder.add_placeholder().unwrap();
    builder.exit_subexpression(1).unwrap();
    assert!(matches!(
        builder.build().unwrap_err(),
        InternalError::InvalidProgram(_)
    ));
}

#[test]
fn extraction_detaches_the_last_planned_child() {
    let mut builder = ProgramBuilder::new();
    builder.enter_subexpression(1).unwrap();
    builder.enter_subexpression(2).unwrap();
    builder.add_step(constant(2)).unwrap();
    builder.exit_subexpression(2).unwrap();
    let extraction = builder.extract_subexpression(2).unwrap();
    assert_eq!(extraction, 0);
    assert!(!builder.extracted_is_recursive(extraction).unwrap());
    builder.add_step(constant(1)).unwrap();
    builder.exit_subexpression(1).unwrap();
    let (main, extracted) = builder.build().unwrap();
    assert_eq!(flat_ids(&main), [Some(1)]);
    assert_eq!(extracted.len(), 1);
    assert_eq!(flat_ids(&extracted[0]), [Some(2)]);
}
