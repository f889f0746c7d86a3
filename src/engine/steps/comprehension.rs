use crate::{
    Vec,
    attributes::AttributeTrail,
    engine::frame::{EvaluationContext, ExecutionFrame},
    engine::stack::{IteratorFrame, RangeKind},
    engine::step::{DirectNode, DirectStep, ExpressionStep},
    errors::InternalError,
    format,
    values::Value,
};

const ITER_RANGE: &str = "<iter_range>";
const LOOP_CONDITION: &str = "<loop_condition>";

/// Classify a comprehension range. Map ranges project to their key list;
/// the loop variable is the key.
fn project_range<'a>(
    ctx: &EvaluationContext<'_, 'a>,
    range: Value<'a>,
) -> Result<(&'a [Value<'a>], RangeKind), Value<'a>> {
    match range {
        Value::List(items) => Ok((items, RangeKind::List)),
        Value::Map(map) => {
            let keys: Vec<Value<'a>> = map.keys().collect();
            Ok((ctx.arena.alloc_slice_copy(&keys), RangeKind::MapKeys))
        }
        Value::Error(_) | Value::Unknown(_) => Err(range),
        other => Err(Value::no_matching_overload(ctx.arena, ITER_RANGE, &[other])),
    }
}

/// The loop variable's binding for the element at `pos`, with the missing
/// and unknown checks applied against the stepped range trail (partial
/// matches included, deeper qualification may follow inside the body).
fn bind_element<'a>(
    ctx: &EvaluationContext<'_, 'a>,
    items: &'a [Value<'a>],
    pos: usize,
    kind: RangeKind,
    range_trail: AttributeTrail<'a>,
) -> (Value<'a>, AttributeTrail<'a>) {
    let cursor = IteratorFrame {
        items,
        pos,
        range_trail,
        kind,
    };
    let (value, qualifier) = cursor.current();
    let trail = match qualifier {
        Some(q) if ctx.tracking() => range_trail.step(q, ctx.arena),
        _ => AttributeTrail::empty(),
    };
    let utility = ctx.attribute_utility();
    if utility.check_for_missing(&trail) {
        return (
            Value::error(ctx.arena, format!("MissingAttributeError: {trail}")),
            trail,
        );
    }
    if let Some(unknown) = utility.unknown_if_matched(&trail, true) {
        return (unknown, trail);
    }
    (value, trail)
}

/// Validates the range and opens the iterator frame. A range matching an
/// unknown pattern, or already an error/unknown, or not list-like, becomes
/// the comprehension's result directly: push it and jump to the end,
/// skipping even the accumulator initializer.
pub struct ComprehensionInitStep {
    end_offset: i64,
}

impl ComprehensionInitStep {
    pub fn new(end_offset: i64) -> Self {
        ComprehensionInitStep { end_offset }
    }
}

impl<'a> ExpressionStep<'a> for ComprehensionInitStep {
    fn evaluate(&self, frame: &mut ExecutionFrame<'_, 'a>) -> Result<(), InternalError> {
        let (range, trail) = frame.stack.pop_pair()?;
        if let Some(unknown) = frame.ctx.attribute_utility().unknown_if_matched(&trail, true) {
            frame.stack.push(unknown, trail);
            return frame.jump_to(self.end_offset);
        }
        match project_range(&frame.ctx, range) {
            Ok((items, kind)) => frame.iterators.push(IteratorFrame {
                items,
                pos: 0,
                range_trail: trail,
                kind,
            }),
            Err(result) => {
                let result_trail = if result.is_error_or_unknown() && result == range {
                    trail
                } else {
                    AttributeTrail::empty()
                };
                frame.stack.push(result, result_trail);
                frame.jump_to(self.end_offset)
            }
        }
    }
}

/// Pops the accumulator's initial value into its slot.
pub struct AccuInitStep {
    accu_slot: usize,
}

impl AccuInitStep {
    pub fn new(accu_slot: usize) -> Self {
        AccuInitStep { accu_slot }
    }
}

impl<'a> ExpressionStep<'a> for AccuInitStep {
    fn evaluate(&self, frame: &mut ExecutionFrame<'_, 'a>) -> Result<(), InternalError> {
        let (value, trail) = frame.stack.pop_pair()?;
        frame.ctx.slots.set(self.accu_slot, value, trail);
        Ok(())
    }
}

/// Advances the cursor and binds the loop variable. Exhaustion is not a
/// fault: it jumps to the finish sequence. Each bound element charges one
/// unit of the evaluation's iteration budget; the exhaustion probe is free.
pub struct ComprehensionNextStep {
    iter_slot: usize,
    finish_offset: i64,
}

impl ComprehensionNextStep {
    pub fn new(iter_slot: usize, finish_offset: i64) -> Self {
        ComprehensionNextStep {
            iter_slot,
            finish_offset,
        }
    }
}

impl<'a> ExpressionStep<'a> for ComprehensionNextStep {
    fn evaluate(&self, frame: &mut ExecutionFrame<'_, 'a>) -> Result<(), InternalError> {
        let exhausted = frame.iterators.top_mut()?.exhausted();
        if exhausted {
            return frame.jump_to(self.finish_offset);
        }
        frame.ctx.charge_iteration()?;
        let (items, pos, kind, range_trail) = {
            let cursor = frame.iterators.top_mut()?;
            let snapshot = (cursor.items, cursor.pos, cursor.kind, cursor.range_trail);
            cursor.pos += 1;
            snapshot
        };
        let (value, trail) = bind_element(&frame.ctx, items, pos, kind, range_trail);
        frame.ctx.slots.set(self.iter_slot, value, trail);
        Ok(())
    }
}

/// Pops the loop condition. True continues into the body; false jumps to
/// the finish sequence when short-circuiting, and otherwise keeps looping.
/// A non-bool condition aborts the whole comprehension: iterator frame
/// popped, both slots cleared, the error (or the condition itself, for
/// errors and unknowns) pushed as the result, control past the end.
pub struct ComprehensionCondStep {
    iter_slot: usize,
    accu_slot: usize,
    finish_offset: i64,
    end_offset: i64,
}

impl ComprehensionCondStep {
    pub fn new(iter_slot: usize, accu_slot: usize, finish_offset: i64, end_offset: i64) -> Self {
        ComprehensionCondStep {
            iter_slot,
            accu_slot,
            finish_offset,
            end_offset,
        }
    }

    fn abort<'a>(
        &self,
        frame: &mut ExecutionFrame<'_, 'a>,
        result: Value<'a>,
        trail: AttributeTrail<'a>,
    ) -> Result<(), InternalError> {
        frame.iterators.pop()?;
        frame.ctx.slots.clear(self.iter_slot);
        frame.ctx.slots.clear(self.accu_slot);
        frame.stack.push(result, trail);
        frame.jump_to(self.end_offset)
    }
}

impl<'a> ExpressionStep<'a> for ComprehensionCondStep {
    fn evaluate(&self, frame: &mut ExecutionFrame<'_, 'a>) -> Result<(), InternalError> {
        let (condition, trail) = frame.stack.pop_pair()?;
        match condition {
            Value::Bool(true) => Ok(()),
            Value::Bool(false) => {
                if frame.ctx.options.short_circuiting {
                    frame.jump_to(self.finish_offset)
                } else {
                    Ok(())
                }
            }
            Value::Error(_) | Value::Unknown(_) => self.abort(frame, condition, trail),
            other => {
                let error =
                    Value::no_matching_overload(frame.ctx.arena, LOOP_CONDITION, &[other]);
                self.abort(frame, error, AttributeTrail::empty())
            }
        }
    }
}

/// Pops the body's result into the accumulator slot and loops back.
pub struct ComprehensionUpdateStep {
    accu_slot: usize,
    loop_offset: i64,
}

impl ComprehensionUpdateStep {
    pub fn new(accu_slot: usize, loop_offset: i64) -> Self {
        ComprehensionUpdateStep {
            accu_slot,
            loop_offset,
        }
    }
}

impl<'a> ExpressionStep<'a> for ComprehensionUpdateStep {
    fn evaluate(&self, frame: &mut ExecutionFrame<'_, 'a>) -> Result<(), InternalError> {
        let (value, trail) = frame.stack.pop_pair()?;
        frame.ctx.slots.set(self.accu_slot, value, trail);
        frame.jump_to(self.loop_offset)
    }
}

/// Runs after the result expression: closes the iterator frame and clears
/// both slots, leaving the result on the stack. Every comprehension exit
/// path leaves both slots unset.
pub struct ComprehensionFinishStep {
    iter_slot: usize,
    accu_slot: usize,
    expr_id: i64,
}

impl ComprehensionFinishStep {
    pub fn new(iter_slot: usize, accu_slot: usize, expr_id: i64) -> Self {
        ComprehensionFinishStep {
            iter_slot,
            accu_slot,
            expr_id,
        }
    }
}

impl<'a> ExpressionStep<'a> for ComprehensionFinishStep {
    fn evaluate(&self, frame: &mut ExecutionFrame<'_, 'a>) -> Result<(), InternalError> {
        frame.iterators.pop()?;
        frame.ctx.slots.clear(self.iter_slot);
        frame.ctx.slots.clear(self.accu_slot);
        Ok(())
    }

    fn expr_id(&self) -> Option<i64> {
        Some(self.expr_id)
    }
}

/// The whole fold as one direct node, bit-for-bit equivalent to the flat
/// step sequence.
pub struct DirectComprehension<'a> {
    range: DirectNode<'a>,
    accu_init: DirectNode<'a>,
    condition: DirectNode<'a>,
    step: DirectNode<'a>,
    result: DirectNode<'a>,
    iter_slot: usize,
    accu_slot: usize,
}

impl<'a> DirectComprehension<'a> {
    pub fn new(
        range: DirectNode<'a>,
        accu_init: DirectNode<'a>,
        condition: DirectNode<'a>,
        step: DirectNode<'a>,
        result: DirectNode<'a>,
        iter_slot: usize,
        accu_slot: usize,
    ) -> Self {
        DirectComprehension {
            range,
            accu_init,
            condition,
            step,
            result,
            iter_slot,
            accu_slot,
        }
    }

    fn run_loop(
        &self,
        ctx: &mut EvaluationContext<'_, 'a>,
        items: &'a [Value<'a>],
        kind: RangeKind,
        range_trail: AttributeTrail<'a>,
    ) -> Result<(Value<'a>, AttributeTrail<'a>), InternalError> {
        let (accu, accu_trail) = self.accu_init.evaluate(ctx)?;
        ctx.slots.set(self.accu_slot, accu, accu_trail);
        let mut pos = 0;
        while pos < items.len() {
            ctx.charge_iteration()?;
            let (value, trail) = bind_element(ctx, items, pos, kind, range_trail);
            ctx.slots.set(self.iter_slot, value, trail);
            pos += 1;
            let (condition, condition_trail) = self.condition.evaluate(ctx)?;
            match condition {
                Value::Bool(true) => {}
                Value::Bool(false) => {
                    if ctx.options.short_circuiting {
                        break;
                    }
                }
                Value::Error(_) | Value::Unknown(_) => return Ok((condition, condition_trail)),
                other => {
                    return Ok((
                        Value::no_matching_overload(ctx.arena, LOOP_CONDITION, &[other]),
                        AttributeTrail::empty(),
                    ));
                }
            }
            let (step, step_trail) = self.step.evaluate(ctx)?;
            ctx.slots.set(self.accu_slot, step, step_trail);
        }
        self.result.evaluate(ctx)
    }
}

impl<'a> DirectStep<'a> for DirectComprehension<'a> {
    fn evaluate(
        &self,
        ctx: &mut EvaluationContext<'_, 'a>,
    ) -> Result<(Value<'a>, AttributeTrail<'a>), InternalError> {
        let (range, trail) = self.range.evaluate(ctx)?;
        if let Some(unknown) = ctx.attribute_utility().unknown_if_matched(&trail, true) {
            return Ok((unknown, trail));
        }
        let (items, kind) = match project_range(ctx, range) {
            Ok(projected) => projected,
            Err(result) => {
                let result_trail = if result.is_error_or_unknown() && result == range {
                    trail
                } else {
                    AttributeTrail::empty()
                };
                return Ok((result, result_trail));
            }
        };
        let outcome = self.run_loop(ctx, items, kind, trail);
        ctx.slots.clear(self.iter_slot);
        ctx.slots.clear(self.accu_slot);
        outcome
    }
}
