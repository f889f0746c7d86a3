use crate::{
    attributes::AttributeTrail,
    engine::frame::{EvaluationContext, ExecutionFrame},
    engine::step::{DirectStep, ExpressionStep},
    errors::InternalError,
    format,
    functions::FunctionOverload,
    values::{OverloadValue, Value},
};

/// Shared identifier resolution.
///
/// Order matters: the missing check shadows the unknown check, which
/// shadows the activation; a name the activation does not bind falls back
/// to its registered overloads (as a function value) before becoming a
/// "no such attribute" error. The unknown check is exact-only here, a bare
/// variable read is a terminal read.
pub(crate) fn resolve_ident<'a>(
    ctx: &EvaluationContext<'_, 'a>,
    name: &'a str,
    overloads: Option<&'a [FunctionOverload]>,
) -> Result<(Value<'a>, AttributeTrail<'a>), InternalError> {
    let trail = if ctx.tracking() {
        AttributeTrail::for_variable(name)
    } else {
        AttributeTrail::empty()
    };
    let utility = ctx.attribute_utility();
    if utility.check_for_missing(&trail) {
        return Ok((
            Value::error(ctx.arena, format!("MissingAttributeError: {name}")),
            trail,
        ));
    }
    if let Some(unknown) = utility.unknown_if_matched(&trail, false) {
        return Ok((unknown, trail));
    }
    if let Some(value) = ctx.activation.find_variable(ctx.arena, name)? {
        return Ok((value, trail));
    }
    if let Some(overloads) = overloads
        && !overloads.is_empty()
    {
        let value = Value::Overload(ctx.arena.alloc(OverloadValue { name, overloads }));
        return Ok((value, trail));
    }
    Ok((
        Value::error(ctx.arena, format!("no such attribute: '{name}'")),
        trail,
    ))
}

pub struct IdentStep<'a> {
    name: &'a str,
    overloads: Option<&'a [FunctionOverload]>,
    expr_id: i64,
}

impl<'a> IdentStep<'a> {
    pub fn new(name: &'a str, overloads: Option<&'a [FunctionOverload]>, expr_id: i64) -> Self {
        IdentStep {
            name,
            overloads,
            expr_id,
        }
    }
}

impl<'a> ExpressionStep<'a> for IdentStep<'a> {
    fn evaluate(&self, frame: &mut ExecutionFrame<'_, 'a>) -> Result<(), InternalError> {
        let (value, trail) = resolve_ident(&frame.ctx, self.name, self.overloads)?;
        frame.stack.push(value, trail);
        Ok(())
    }

    fn expr_id(&self) -> Option<i64> {
        Some(self.expr_id)
    }
}

pub struct DirectIdent<'a> {
    name: &'a str,
    overloads: Option<&'a [FunctionOverload]>,
}

impl<'a> DirectIdent<'a> {
    pub fn new(name: &'a str, overloads: Option<&'a [FunctionOverload]>) -> Self {
        DirectIdent { name, overloads }
    }
}

impl<'a> DirectStep<'a> for DirectIdent<'a> {
    fn evaluate(
        &self,
        ctx: &mut EvaluationContext<'_, 'a>,
    ) -> Result<(Value<'a>, AttributeTrail<'a>), InternalError> {
        resolve_ident(ctx, self.name, self.overloads)
    }
}
