use crate::{
    ast::operators,
    attributes::{AttributeTrail, UnknownAccumulator},
    engine::frame::{EvaluationContext, ExecutionFrame},
    engine::step::{DirectNode, DirectStep, ExpressionStep},
    errors::InternalError,
    values::Value,
};

/// Merge rules shared by `_&&_` and `_||_`, applied after both operands are
/// on hand (short-circuiting, when on, already skipped this step for a
/// dominant left operand).
///
/// A dominant bool wins over everything, errors and unknowns included; two
/// bools combine; otherwise unknowns merge and dominate errors, then the
/// first error propagates, then the mismatch is a "no matching overload".
pub(crate) fn merge_and_or<'a>(
    ctx: &EvaluationContext<'_, 'a>,
    left: Value<'a>,
    left_trail: AttributeTrail<'a>,
    right: Value<'a>,
    right_trail: AttributeTrail<'a>,
    is_or: bool,
) -> Value<'a> {
    let dominant = is_or;
    if left.as_bool() == Some(dominant) {
        return left;
    }
    if right.as_bool() == Some(dominant) {
        return right;
    }
    if let (Some(a), Some(b)) = (left.as_bool(), right.as_bool()) {
        return Value::Bool(if is_or { a || b } else { a && b });
    }
    if ctx.options.unknown_processing {
        let mut accumulator = UnknownAccumulator::new(ctx.attribute_utility());
        accumulator.maybe_add(&left, &left_trail);
        accumulator.maybe_add(&right, &right_trail);
        if let Some(merged) = accumulator.build() {
            return merged;
        }
    }
    if left.is_error() {
        return left;
    }
    if right.is_error() {
        return right;
    }
    let name = if is_or { operators::OR } else { operators::AND };
    Value::no_matching_overload(ctx.arena, name, &[left, right])
}

fn select_ternary<'a>(
    ctx: &EvaluationContext<'_, 'a>,
    condition: Value<'a>,
) -> Result<Value<'a>, Value<'a>> {
    // Ok carries the branch selector; Err carries the call's early result.
    match condition.as_bool() {
        Some(b) => Ok(Value::Bool(b)),
        None if condition.is_error_or_unknown() => Err(condition),
        None => Err(Value::no_matching_overload(
            ctx.arena,
            operators::TERNARY,
            &[condition],
        )),
    }
}

/// Unconditional relative jump.
pub struct JumpStep {
    offset: i64,
}

impl JumpStep {
    pub fn new(offset: i64) -> Self {
        JumpStep { offset }
    }
}

impl<'a> ExpressionStep<'a> for JumpStep {
    fn evaluate(&self, frame: &mut ExecutionFrame<'_, 'a>) -> Result<(), InternalError> {
        frame.jump_to(self.offset)
    }
}

/// Peeks the left operand of `&&`/`||`; a dominant bool jumps past the
/// right operand and the merge, leaving itself as the result.
pub struct ShortCircuitJumpStep {
    dominant: bool,
    offset: i64,
}

impl ShortCircuitJumpStep {
    pub fn new(dominant: bool, offset: i64) -> Self {
        ShortCircuitJumpStep { dominant, offset }
    }
}

impl<'a> ExpressionStep<'a> for ShortCircuitJumpStep {
    fn evaluate(&self, frame: &mut ExecutionFrame<'_, 'a>) -> Result<(), InternalError> {
        if frame.stack.peek()?.as_bool() == Some(self.dominant) {
            frame.jump_to(self.offset)?;
        }
        Ok(())
    }
}

/// Pops both operands and applies the merge rules.
pub struct AndOrStep {
    is_or: bool,
    expr_id: i64,
}

impl AndOrStep {
    pub fn new(is_or: bool, expr_id: i64) -> Self {
        AndOrStep { is_or, expr_id }
    }
}

impl<'a> ExpressionStep<'a> for AndOrStep {
    fn evaluate(&self, frame: &mut ExecutionFrame<'_, 'a>) -> Result<(), InternalError> {
        let (right, right_trail) = frame.stack.pop_pair()?;
        let (left, left_trail) = frame.stack.pop_pair()?;
        let result = merge_and_or(&frame.ctx, left, left_trail, right, right_trail, self.is_or);
        frame.stack.push(result, AttributeTrail::empty());
        Ok(())
    }

    fn expr_id(&self) -> Option<i64> {
        Some(self.expr_id)
    }
}

/// Pops the ternary condition: true falls through into the then-branch,
/// false jumps to the else-branch, anything else pushes the call's result
/// and jumps past both branches.
pub struct TernaryJumpStep {
    else_offset: i64,
    end_offset: i64,
}

impl TernaryJumpStep {
    pub fn new(else_offset: i64, end_offset: i64) -> Self {
        TernaryJumpStep {
            else_offset,
            end_offset,
        }
    }
}

impl<'a> ExpressionStep<'a> for TernaryJumpStep {
    fn evaluate(&self, frame: &mut ExecutionFrame<'_, 'a>) -> Result<(), InternalError> {
        let (condition, trail) = frame.stack.pop_pair()?;
        match select_ternary(&frame.ctx, condition) {
            Ok(Value::Bool(true)) => Ok(()),
            Ok(_) => frame.jump_to(self.else_offset),
            Err(result) => {
                frame.stack.push(result, trail);
                frame.jump_to(self.end_offset)
            }
        }
    }
}

/// Exhaustive-mode ternary: all three operands evaluated, then selected.
pub struct TernaryMergeStep {
    expr_id: i64,
}

impl TernaryMergeStep {
    pub fn new(expr_id: i64) -> Self {
        TernaryMergeStep { expr_id }
    }
}

impl<'a> ExpressionStep<'a> for TernaryMergeStep {
    fn evaluate(&self, frame: &mut ExecutionFrame<'_, 'a>) -> Result<(), InternalError> {
        let (otherwise, otherwise_trail) = frame.stack.pop_pair()?;
        let (then, then_trail) = frame.stack.pop_pair()?;
        let (condition, condition_trail) = frame.stack.pop_pair()?;
        let (result, trail) = match select_ternary(&frame.ctx, condition) {
            Ok(Value::Bool(true)) => (then, then_trail),
            Ok(_) => (otherwise, otherwise_trail),
            Err(result) => (result, condition_trail),
        };
        frame.stack.push(result, trail);
        Ok(())
    }

    fn expr_id(&self) -> Option<i64> {
        Some(self.expr_id)
    }
}

pub struct DirectAndOr<'a> {
    left: DirectNode<'a>,
    right: DirectNode<'a>,
    is_or: bool,
}

impl<'a> DirectAndOr<'a> {
    pub fn new(left: DirectNode<'a>, right: DirectNode<'a>, is_or: bool) -> Self {
        DirectAndOr { left, right, is_or }
    }
}

impl<'a> DirectStep<'a> for DirectAndOr<'a> {
    fn evaluate(
        &self,
        ctx: &mut EvaluationContext<'_, 'a>,
    ) -> Result<(Value<'a>, AttributeTrail<'a>), InternalError> {
        let (left, left_trail) = self.left.evaluate(ctx)?;
        if ctx.options.short_circuiting && left.as_bool() == Some(self.is_or) {
            return Ok((left, left_trail));
        }
        let (right, right_trail) = self.right.evaluate(ctx)?;
        let result = merge_and_or(ctx, left, left_trail, right, right_trail, self.is_or);
        Ok((result, AttributeTrail::empty()))
    }
}

pub struct DirectTernary<'a> {
    condition: DirectNode<'a>,
    then: DirectNode<'a>,
    otherwise: DirectNode<'a>,
}

impl<'a> DirectTernary<'a> {
    pub fn new(condition: DirectNode<'a>, then: DirectNode<'a>, otherwise: DirectNode<'a>) -> Self {
        DirectTernary {
            condition,
            then,
            otherwise,
        }
    }
}

impl<'a> DirectStep<'a> for DirectTernary<'a> {
    fn evaluate(
        &self,
        ctx: &mut EvaluationContext<'_, 'a>,
    ) -> Result<(Value<'a>, AttributeTrail<'a>), InternalError> {
        let (condition, condition_trail) = self.condition.evaluate(ctx)?;
        if ctx.options.short_circuiting {
            return match select_ternary(ctx, condition) {
                Ok(Value::Bool(true)) => self.then.evaluate(ctx),
                Ok(_) => self.otherwise.evaluate(ctx),
                Err(result) => Ok((result, condition_trail)),
            };
        }
        let then = self.then.evaluate(ctx)?;
        let otherwise = self.otherwise.evaluate(ctx)?;
        match select_ternary(ctx, condition) {
            Ok(Value::Bool(true)) => Ok(then),
            Ok(_) => Ok(otherwise),
            Err(result) => Ok((result, condition_trail)),
        }
    }
}
