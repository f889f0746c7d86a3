use smallvec::SmallVec;

use crate::{
    Vec,
    attributes::{AttributeTrail, UnknownAccumulator},
    engine::frame::{EvaluationContext, ExecutionFrame},
    engine::step::{DirectNode, DirectStep, ExpressionStep},
    errors::InternalError,
    format,
    values::{MapValue, TypeFactory, Value},
};

/// Merged unknowns across sibling results, else the first error. Shared by
/// every construction site: unknowns dominate errors when both are present.
fn unknowns_or_first_error<'a>(
    ctx: &EvaluationContext<'_, 'a>,
    values: &[Value<'a>],
    trails: &[AttributeTrail<'a>],
) -> Option<Value<'a>> {
    if ctx.options.unknown_processing {
        let mut accumulator = UnknownAccumulator::new(ctx.attribute_utility());
        for (value, trail) in values.iter().zip(trails.iter()) {
            accumulator.maybe_add(value, trail);
        }
        if let Some(merged) = accumulator.build() {
            return Some(merged);
        }
    }
    values.iter().find(|v| v.is_error()).copied()
}

pub(crate) fn assemble_list<'a>(
    ctx: &EvaluationContext<'_, 'a>,
    values: &[Value<'a>],
    trails: &[AttributeTrail<'a>],
) -> Value<'a> {
    if let Some(short) = unknowns_or_first_error(ctx, values, trails) {
        return short;
    }
    Value::List(ctx.arena.alloc_slice_copy(values))
}

/// `values` is interleaved key/value pairs, bottom-to-top.
pub(crate) fn assemble_map<'a>(
    ctx: &EvaluationContext<'_, 'a>,
    values: &[Value<'a>],
    trails: &[AttributeTrail<'a>],
) -> Value<'a> {
    debug_assert_eq!(values.len() % 2, 0);
    if let Some(short) = unknowns_or_first_error(ctx, values, trails) {
        return short;
    }
    let heterogeneous = ctx.options.heterogeneous_equality;
    let mut entries: Vec<(Value<'a>, Value<'a>)> = Vec::with_capacity(values.len() / 2);
    for pair in values.chunks_exact(2) {
        let (key, value) = (pair[0], pair[1]);
        if entries.iter().any(|(k, _)| k.equals(&key, heterogeneous)) {
            return Value::error(ctx.arena, format!("repeated key in map: {key}"));
        }
        entries.push((key, value));
    }
    Value::Map(ctx.arena.alloc(MapValue {
        entries: ctx.arena.alloc_slice_copy(&entries),
    }))
}

pub(crate) fn assemble_struct<'a>(
    ctx: &EvaluationContext<'_, 'a>,
    factory: &dyn TypeFactory<'a>,
    type_name: &'a str,
    field_names: &'a [&'a str],
    values: &[Value<'a>],
    trails: &[AttributeTrail<'a>],
) -> Value<'a> {
    debug_assert_eq!(field_names.len(), values.len());
    if let Some(short) = unknowns_or_first_error(ctx, values, trails) {
        return short;
    }
    let Some(mut builder) = factory.new_builder(ctx.arena, type_name) else {
        return Value::error(ctx.arena, format!("unknown type: '{type_name}'"));
    };
    for (name, value) in field_names.iter().zip(values.iter()) {
        if let Err(message) = builder.set_field_by_name(name, *value) {
            return Value::error(ctx.arena, message);
        }
    }
    match builder.build() {
        Ok(value) => value,
        Err(message) => Value::error(ctx.arena, message),
    }
}

pub struct CreateListStep {
    count: usize,
    expr_id: i64,
}

impl CreateListStep {
    pub fn new(count: usize, expr_id: i64) -> Self {
        CreateListStep { count, expr_id }
    }
}

impl<'a> ExpressionStep<'a> for CreateListStep {
    fn evaluate(&self, frame: &mut ExecutionFrame<'_, 'a>) -> Result<(), InternalError> {
        let (values, trails) = frame.stack.top_n(self.count)?;
        let result = assemble_list(&frame.ctx, values, trails);
        frame
            .stack
            .pop_and_push(self.count, result, AttributeTrail::empty())
    }

    fn expr_id(&self) -> Option<i64> {
        Some(self.expr_id)
    }
}

pub struct CreateMapStep {
    entry_count: usize,
    expr_id: i64,
}

impl CreateMapStep {
    pub fn new(entry_count: usize, expr_id: i64) -> Self {
        CreateMapStep {
            entry_count,
            expr_id,
        }
    }
}

impl<'a> ExpressionStep<'a> for CreateMapStep {
    fn evaluate(&self, frame: &mut ExecutionFrame<'_, 'a>) -> Result<(), InternalError> {
        let n = self.entry_count * 2;
        let (values, trails) = frame.stack.top_n(n)?;
        let result = assemble_map(&frame.ctx, values, trails);
        frame.stack.pop_and_push(n, result, AttributeTrail::empty())
    }

    fn expr_id(&self) -> Option<i64> {
        Some(self.expr_id)
    }
}

pub struct CreateStructStep<'a> {
    factory: &'a dyn TypeFactory<'a>,
    type_name: &'a str,
    field_names: &'a [&'a str],
    expr_id: i64,
}

impl<'a> CreateStructStep<'a> {
    pub fn new(
        factory: &'a dyn TypeFactory<'a>,
        type_name: &'a str,
        field_names: &'a [&'a str],
        expr_id: i64,
    ) -> Self {
        CreateStructStep {
            factory,
            type_name,
            field_names,
            expr_id,
        }
    }
}

impl<'a> ExpressionStep<'a> for CreateStructStep<'a> {
    fn evaluate(&self, frame: &mut ExecutionFrame<'_, 'a>) -> Result<(), InternalError> {
        let n = self.field_names.len();
        let (values, trails) = frame.stack.top_n(n)?;
        let result = assemble_struct(
            &frame.ctx,
            self.factory,
            self.type_name,
            self.field_names,
            values,
            trails,
        );
        frame.stack.pop_and_push(n, result, AttributeTrail::empty())
    }

    fn expr_id(&self) -> Option<i64> {
        Some(self.expr_id)
    }
}

fn evaluate_children<'a>(
    ctx: &mut EvaluationContext<'_, 'a>,
    children: &[DirectNode<'a>],
) -> Result<(SmallVec<[Value<'a>; 4]>, SmallVec<[AttributeTrail<'a>; 4]>), InternalError> {
    let mut values = SmallVec::with_capacity(children.len());
    let mut trails = SmallVec::with_capacity(children.len());
    for child in children {
        let (value, trail) = child.evaluate(ctx)?;
        values.push(value);
        trails.push(trail);
    }
    Ok((values, trails))
}

pub struct DirectCreateList<'a> {
    elements: Vec<DirectNode<'a>>,
}

impl<'a> DirectCreateList<'a> {
    pub fn new(elements: Vec<DirectNode<'a>>) -> Self {
        DirectCreateList { elements }
    }
}

impl<'a> DirectStep<'a> for DirectCreateList<'a> {
    fn evaluate(
        &self,
        ctx: &mut EvaluationContext<'_, 'a>,
    ) -> Result<(Value<'a>, AttributeTrail<'a>), InternalError> {
        let (values, trails) = evaluate_children(ctx, &self.elements)?;
        Ok((assemble_list(ctx, &values, &trails), AttributeTrail::empty()))
    }
}

/// Children interleave keys and values.
pub struct DirectCreateMap<'a> {
    entries: Vec<DirectNode<'a>>,
}

impl<'a> DirectCreateMap<'a> {
    pub fn new(entries: Vec<DirectNode<'a>>) -> Self {
        debug_assert_eq!(entries.len() % 2, 0);
        DirectCreateMap { entries }
    }
}

impl<'a> DirectStep<'a> for DirectCreateMap<'a> {
    fn evaluate(
        &self,
        ctx: &mut EvaluationContext<'_, 'a>,
    ) -> Result<(Value<'a>, AttributeTrail<'a>), InternalError> {
        let (values, trails) = evaluate_children(ctx, &self.entries)?;
        Ok((assemble_map(ctx, &values, &trails), AttributeTrail::empty()))
    }
}

pub struct DirectCreateStruct<'a> {
    factory: &'a dyn TypeFactory<'a>,
    type_name: &'a str,
    field_names: &'a [&'a str],
    fields: Vec<DirectNode<'a>>,
}

impl<'a> DirectCreateStruct<'a> {
    pub fn new(
        factory: &'a dyn TypeFactory<'a>,
        type_name: &'a str,
        field_names: &'a [&'a str],
        fields: Vec<DirectNode<'a>>,
    ) -> Self {
        DirectCreateStruct {
            factory,
            type_name,
            field_names,
            fields,
        }
    }
}

impl<'a> DirectStep<'a> for DirectCreateStruct<'a> {
    fn evaluate(
        &self,
        ctx: &mut EvaluationContext<'_, 'a>,
    ) -> Result<(Value<'a>, AttributeTrail<'a>), InternalError> {
        let (values, trails) = evaluate_children(ctx, &self.fields)?;
        Ok((
            assemble_struct(
                ctx,
                self.factory,
                self.type_name,
                self.field_names,
                &values,
                &trails,
            ),
            AttributeTrail::empty(),
        ))
    }
}
