use crate::{
    attributes::{AttributeTrail, Qualifier},
    engine::frame::{EvaluationContext, ExecutionFrame},
    engine::step::{DirectNode, DirectStep, ExpressionStep},
    errors::InternalError,
    format,
    values::Value,
};

/// Shared field-selection semantics for `x.f` and `has(x.f)`.
pub(crate) fn apply_select<'a>(
    ctx: &EvaluationContext<'_, 'a>,
    operand: Value<'a>,
    trail: AttributeTrail<'a>,
    field: &'a str,
    test_only: bool,
) -> (Value<'a>, AttributeTrail<'a>) {
    if operand.is_error_or_unknown() {
        return (operand, trail);
    }
    let stepped = trail.step(Qualifier::String(field), ctx.arena);
    let utility = ctx.attribute_utility();
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
        Value::Map(map) => {
            if test_only {
                Value::Bool(map.contains_key(Value::String(field), heterogeneous))
            } else {
                match map.lookup(Value::String(field), heterogeneous) {
                    Some(v) => v,
                    None => Value::error(ctx.arena, format!("no such key: '{field}'")),
                }
            }
        }
        Value::Struct(s) => {
            if test_only {
                Value::Bool(s.has_field(field))
            } else {
                match s.field(field) {
                    Some(v) => v,
                    None => Value::error(ctx.arena, format!("no such field: '{field}'")),
                }
            }
        }
        other => Value::error(
            ctx.arena,
            format!("type '{}' does not support field selection", other.kind()),
        ),
    };
    (value, stepped)
}

pub struct SelectStep<'a> {
    field: &'a str,
    test_only: bool,
    expr_id: i64,
}

impl<'a> SelectStep<'a> {
    pub fn new(field: &'a str, test_only: bool, expr_id: i64) -> Self {
        SelectStep {
            field,
            test_only,
            expr_id,
        }
    }
}

impl<'a> ExpressionStep<'a> for SelectStep<'a> {
    fn evaluate(&self, frame: &mut ExecutionFrame<'_, 'a>) -> Result<(), InternalError> {
        let (operand, trail) = frame.stack.pop_pair()?;
        let (value, stepped) = apply_select(&frame.ctx, operand, trail, self.field, self.test_only);
        frame.stack.push(value, stepped);
        Ok(())
    }

    fn expr_id(&self) -> Option<i64> {
        Some(self.expr_id)
    }
}

pub struct DirectSelect<'a> {
    operand: DirectNode<'a>,
    field: &'a str,
    test_only: bool,
}

impl<'a> DirectSelect<'a> {
    pub fn new(operand: DirectNode<'a>, field: &'a str, test_only: bool) -> Self {
        DirectSelect {
            operand,
            field,
            test_only,
        }
    }
}

impl<'a> DirectStep<'a> for DirectSelect<'a> {
    fn evaluate(
        &self,
        ctx: &mut EvaluationContext<'_, 'a>,
    ) -> Result<(Value<'a>, AttributeTrail<'a>), InternalError> {
        let (operand, trail) = self.operand.evaluate(ctx)?;
        Ok(apply_select(ctx, operand, trail, self.field, self.test_only))
    }
}
