use crate::{
    Box,
    attributes::AttributeTrail,
    engine::frame::{EvaluationContext, ExecutionFrame},
    errors::InternalError,
    values::Value,
};

/// One flat-machine instruction.
///
/// Steps communicate through the frame's operand stack; control flow goes
/// through [`ExecutionFrame::jump_to`] with offsets relative to the next pc.
pub trait ExpressionStep<'a>: Send + Sync {
    fn evaluate(&self, frame: &mut ExecutionFrame<'_, 'a>) -> Result<(), InternalError>;

    /// The expression id this instruction reports to listeners; `None` for
    /// synthetic control-flow instructions.
    fn expr_id(&self) -> Option<i64> {
        None
    }
}

/// One directly-recursive step: parents evaluate children by calling them.
pub trait DirectStep<'a>: Send + Sync {
    fn evaluate(
        &self,
        ctx: &mut EvaluationContext<'_, 'a>,
    ) -> Result<(Value<'a>, AttributeTrail<'a>), InternalError>;
}

pub type DirectNode<'a> = Box<dyn DirectStep<'a> + 'a>;

/// A recursive subtree embedded in a flat program as a single instruction.
pub struct WrappedDirectStep<'a> {
    node: DirectNode<'a>,
    expr_id: i64,
}

impl<'a> WrappedDirectStep<'a> {
    pub fn new(node: DirectNode<'a>, expr_id: i64) -> Self {
        WrappedDirectStep { node, expr_id }
    }
}

impl<'a> ExpressionStep<'a> for WrappedDirectStep<'a> {
    fn evaluate(&self, frame: &mut ExecutionFrame<'_, 'a>) -> Result<(), InternalError> {
        let (value, trail) = self.node.evaluate(&mut frame.ctx)?;
        frame.stack.push(value, trail);
        Ok(())
    }

    fn expr_id(&self) -> Option<i64> {
        Some(self.expr_id)
    }
}
