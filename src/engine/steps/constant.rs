use crate::{
    attributes::AttributeTrail,
    engine::frame::{EvaluationContext, ExecutionFrame},
    engine::step::{DirectStep, ExpressionStep},
    errors::InternalError,
    values::Value,
};

/// Push a literal. Constants never carry an attribute trail.
pub struct ConstantStep<'a> {
    value: Value<'a>,
    expr_id: i64,
}

impl<'a> ConstantStep<'a> {
    pub fn new(value: Value<'a>, expr_id: i64) -> Self {
        ConstantStep { value, expr_id }
    }
}

impl<'a> ExpressionStep<'a> for ConstantStep<'a> {
    fn evaluate(&self, frame: &mut ExecutionFrame<'_, 'a>) -> Result<(), InternalError> {
        frame.stack.push(self.value, AttributeTrail::empty());
        Ok(())
    }

    fn expr_id(&self) -> Option<i64> {
        Some(self.expr_id)
    }
}

pub struct DirectConstant<'a> {
    value: Value<'a>,
}

impl<'a> DirectConstant<'a> {
    pub fn new(value: Value<'a>) -> Self {
        DirectConstant { value }
    }
}

impl<'a> DirectStep<'a> for DirectConstant<'a> {
    fn evaluate(
        &self,
        _ctx: &mut EvaluationContext<'_, 'a>,
    ) -> Result<(Value<'a>, AttributeTrail<'a>), InternalError> {
        Ok((self.value, AttributeTrail::empty()))
    }
}
