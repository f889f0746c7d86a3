use crate::{
    ast::operators,
    attributes::{AttributeTrail, Qualifier, UnknownAccumulator},
    engine::frame::{EvaluationContext, ExecutionFrame},
    engine::step::{DirectNode, DirectStep, ExpressionStep},
    errors::InternalError,
    format,
    values::Value,
};

fn qualifier_for<'a>(key: &Value<'a>) -> Option<Qualifier<'a>> {
    match key {
        Value::String(s) => Some(Qualifier::String(s)),
        Value::Int(n) => Some(Qualifier::Int(*n)),
        Value::Uint(n) => Some(Qualifier::Uint(*n)),
        Value::Bool(b) => Some(Qualifier::Bool(*b)),
        _ => None,
    }
}

/// Shared semantics for `operand[key]`.
///
/// Unknowns among the two inputs dominate errors; both are checked before
/// the stepped-trail missing/unknown checks, which in turn precede the
/// actual lookup.
pub(crate) fn container_access<'a>(
    ctx: &EvaluationContext<'_, 'a>,
    operand: Value<'a>,
    operand_trail: AttributeTrail<'a>,
    key: Value<'a>,
    key_trail: AttributeTrail<'a>,
) -> (Value<'a>, AttributeTrail<'a>) {
    let utility = ctx.attribute_utility();
    if ctx.options.unknown_processing {
        let mut accumulator = UnknownAccumulator::new(utility);
        accumulator.maybe_add(&operand, &operand_trail);
        accumulator.maybe_add(&key, &key_trail);
        if let Some(merged) = accumulator.build() {
            return (merged, operand_trail);
        }
    }
    if operand.is_error() {
        return (operand, operand_trail);
    }
    if key.is_error() {
        return (key, key_trail);
    }
    let stepped = match qualifier_for(&key) {
        Some(q) => operand_trail.step(q, ctx.arena),
        None => AttributeTrail::empty(),
    };
    if utility.check_for_missing(&stepped) {
        return (
            Value::error(ctx.arena, format!("MissingAttributeError: {stepped}")),
            stepped,
        );
    }
    if let Some(unknown) = utility.unknown_if_matched(&stepped, false) {
        return (unknown, stepped);
    }
    let heterogeneous = ctx.options.heterogeneous_equality;
    let value = match operand {
        Value::List(elements) => {
            let index = match key {
                Value::Int(n) => usize::try_from(n).ok(),
                Value::Uint(n) => usize::try_from(n).ok(),
                _ => {
                    return (
                        Value::no_matching_overload(ctx.arena, operators::INDEX, &[operand, key]),
                        AttributeTrail::empty(),
                    );
                }
            };
            match index.and_then(|i| elements.get(i)) {
                Some(v) => *v,
                None => Value::error(ctx.arena, format!("index out of range: {key}")),
            }
        }
        Value::Map(map) => match map.lookup(key, heterogeneous) {
            Some(v) => v,
            None => Value::error(ctx.arena, format!("no such key: {key}")),
        },
        _ => {
            return (
                Value::no_matching_overload(ctx.arena, operators::INDEX, &[operand, key]),
                AttributeTrail::empty(),
            );
        }
    };
    (value, stepped)
}

pub struct ContainerAccessStep {
    expr_id: i64,
}

impl ContainerAccessStep {
    pub fn new(expr_id: i64) -> Self {
        ContainerAccessStep { expr_id }
    }
}

impl<'a> ExpressionStep<'a> for ContainerAccessStep {
    fn evaluate(&self, frame: &mut ExecutionFrame<'_, 'a>) -> Result<(), InternalError> {
        let (key, key_trail) = frame.stack.pop_pair()?;
        let (operand, operand_trail) = frame.stack.pop_pair()?;
        let (value, trail) = container_access(&frame.ctx, operand, operand_trail, key, key_trail);
        frame.stack.push(value, trail);
        Ok(())
    }

    fn expr_id(&self) -> Option<i64> {
        Some(self.expr_id)
    }
}

pub struct DirectContainerAccess<'a> {
    operand: DirectNode<'a>,
    key: DirectNode<'a>,
}

impl<'a> DirectContainerAccess<'a> {
    pub fn new(operand: DirectNode<'a>, key: DirectNode<'a>) -> Self {
        DirectContainerAccess { operand, key }
    }
}

impl<'a> DirectStep<'a> for DirectContainerAccess<'a> {
    fn evaluate(
        &self,
        ctx: &mut EvaluationContext<'_, 'a>,
    ) -> Result<(Value<'a>, AttributeTrail<'a>), InternalError> {
        let (operand, operand_trail) = self.operand.evaluate(ctx)?;
        let (key, key_trail) = self.key.evaluate(ctx)?;
        Ok(container_access(ctx, operand, operand_trail, key, key_trail))
    }
}
