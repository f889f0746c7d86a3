use crate::{
    attributes::AttributeTrail,
    engine::frame::{EvaluationContext, ExecutionFrame},
    engine::step::{DirectNode, DirectStep, ExpressionStep},
    errors::InternalError,
    program::Subprogram,
    values::Value,
};

/// Reads a bound variable from its slot. Comprehension loop variables and
/// already-initialized lazy aliases both resolve through here.
pub struct SlotStep {
    slot: usize,
    expr_id: i64,
}

impl SlotStep {
    pub fn new(slot: usize, expr_id: i64) -> Self {
        SlotStep { slot, expr_id }
    }
}

impl<'a> ExpressionStep<'a> for SlotStep {
    fn evaluate(&self, frame: &mut ExecutionFrame<'_, 'a>) -> Result<(), InternalError> {
        let (value, trail) = frame.ctx.slots.read(self.slot)?;
        frame.stack.push(value, trail);
        Ok(())
    }

    fn expr_id(&self) -> Option<i64> {
        Some(self.expr_id)
    }
}

pub struct DirectSlot {
    slot: usize,
}

impl DirectSlot {
    pub fn new(slot: usize) -> Self {
        DirectSlot { slot }
    }
}

impl<'a> DirectStep<'a> for DirectSlot {
    fn evaluate(
        &self,
        ctx: &mut EvaluationContext<'_, 'a>,
    ) -> Result<(Value<'a>, AttributeTrail<'a>), InternalError> {
        ctx.slots.read(self.slot)
    }
}

/// Use site of a lazily-bound alias. The first read runs the extracted
/// initializer and caches its result in the slot; later reads hit the
/// cache. No expr id here: the call path would report the alias before
/// the initializer's own steps had run.
pub struct CheckLazyInitStep {
    slot: usize,
    extraction: usize,
}

impl CheckLazyInitStep {
    pub fn new(slot: usize, extraction: usize) -> Self {
        CheckLazyInitStep { slot, extraction }
    }
}

impl<'a> ExpressionStep<'a> for CheckLazyInitStep {
    fn evaluate(&self, frame: &mut ExecutionFrame<'_, 'a>) -> Result<(), InternalError> {
        if let Some((value, trail)) = frame.ctx.slots.get(self.slot) {
            frame.stack.push(value, trail);
            return Ok(());
        }
        let extracted = frame.ctx.extracted;
        match extracted.get(self.extraction) {
            Some(Subprogram::Direct(node)) => {
                let (value, trail) = node.evaluate(&mut frame.ctx)?;
                frame.ctx.slots.set(self.slot, value, trail);
                frame.stack.push(value, trail);
                Ok(())
            }
            Some(Subprogram::Flat(_)) => frame.call(self.slot, self.extraction),
            None => Err(InternalError::invalid(
                "extracted subprogram index out of range",
            )),
        }
    }
}

/// Drops a lazy alias's cached value when its binding goes out of scope.
pub struct ClearSlotStep {
    slot: usize,
}

impl ClearSlotStep {
    pub fn new(slot: usize) -> Self {
        ClearSlotStep { slot }
    }
}

impl<'a> ExpressionStep<'a> for ClearSlotStep {
    fn evaluate(&self, frame: &mut ExecutionFrame<'_, 'a>) -> Result<(), InternalError> {
        frame.ctx.slots.clear(self.slot);
        Ok(())
    }
}

/// Direct-mode use site of a lazily-bound alias.
pub struct DirectLazyInit {
    slot: usize,
    extraction: usize,
}

impl DirectLazyInit {
    pub fn new(slot: usize, extraction: usize) -> Self {
        DirectLazyInit { slot, extraction }
    }
}

impl<'a> DirectStep<'a> for DirectLazyInit {
    fn evaluate(
        &self,
        ctx: &mut EvaluationContext<'_, 'a>,
    ) -> Result<(Value<'a>, AttributeTrail<'a>), InternalError> {
        if let Some(cached) = ctx.slots.get(self.slot) {
            return Ok(cached);
        }
        match ctx.extracted.get(self.extraction) {
            Some(Subprogram::Direct(node)) => {
                let (value, trail) = node.evaluate(ctx)?;
                ctx.slots.set(self.slot, value, trail);
                Ok((value, trail))
            }
            Some(Subprogram::Flat(_)) => Err(InternalError::invalid(
                "lazily bound subexpression is not recursive",
            )),
            None => Err(InternalError::invalid(
                "extracted subprogram index out of range",
            )),
        }
    }
}

/// A whole `bind` expression upgraded to direct form: the body runs with
/// the alias slot live, and the slot is cleared on every exit path.
pub struct DirectBind<'a> {
    slot: usize,
    body: DirectNode<'a>,
}

impl<'a> DirectBind<'a> {
    pub fn new(slot: usize, body: DirectNode<'a>) -> Self {
        DirectBind { slot, body }
    }
}

impl<'a> DirectStep<'a> for DirectBind<'a> {
    fn evaluate(
        &self,
        ctx: &mut EvaluationContext<'_, 'a>,
    ) -> Result<(Value<'a>, AttributeTrail<'a>), InternalError> {
        let result = self.body.evaluate(ctx);
        ctx.slots.clear(self.slot);
        result
    }
}
