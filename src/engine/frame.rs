use bumpalo::Bump;

use crate::{
    Vec,
    activation::Activation,
    attributes::{AttributePattern, AttributeTrail, AttributeUtility},
    engine::stack::{IteratorStack, ValueStack},
    engine::state::ComprehensionSlots,
    errors::InternalError,
    options::RuntimeOptions,
    program::{EvaluationListener, Subprogram},
    values::Value,
};

/// Everything an evaluation reads and mutates besides the operand stack:
/// the activation, the options snapshot, pattern lists, slots, extracted
/// subprograms, the iteration budget, and the optional listener.
///
/// Both evaluators share this type; the flat machine wraps it in an
/// [`ExecutionFrame`], direct steps take it as-is.
pub struct EvaluationContext<'f, 'a> {
    pub arena: &'a Bump,
    pub activation: &'f dyn Activation<'a>,
    pub options: &'f RuntimeOptions,
    unknown_patterns: &'f [AttributePattern],
    missing_patterns: &'f [AttributePattern],
    pub slots: &'f mut ComprehensionSlots<'a>,
    pub(crate) extracted: &'f [Subprogram<'a>],
    iterations: usize,
    listener: Option<&'f mut dyn EvaluationListener<'a>>,
}

impl<'f, 'a> EvaluationContext<'f, 'a> {
    pub fn new(
        arena: &'a Bump,
        activation: &'f dyn Activation<'a>,
        options: &'f RuntimeOptions,
        extracted: &'f [Subprogram<'a>],
        slots: &'f mut ComprehensionSlots<'a>,
        listener: Option<&'f mut dyn EvaluationListener<'a>>,
    ) -> Self {
        // Disabled tracking means empty pattern lists; every check below
        // then degenerates to a no-op.
        let unknown_patterns = if options.unknown_processing {
            activation.unknown_attribute_patterns()
        } else {
            &[]
        };
        let missing_patterns = if options.missing_attribute_errors {
            activation.missing_attribute_patterns()
        } else {
            &[]
        };
        EvaluationContext {
            arena,
            activation,
            options,
            unknown_patterns,
            missing_patterns,
            slots,
            extracted,
            iterations: 0,
            listener,
        }
    }

    pub fn attribute_utility(&self) -> AttributeUtility<'_, 'a> {
        AttributeUtility::new(self.unknown_patterns, self.missing_patterns, self.arena)
    }

    /// True when read sites should carry attribute trails at all.
    pub fn tracking(&self) -> bool {
        self.options.attribute_tracking()
    }

    /// Consume one unit of the per-evaluation comprehension budget.
    pub fn charge_iteration(&mut self) -> Result<(), InternalError> {
        let limit = self.options.comprehension_max_iterations;
        if limit == 0 {
            return Ok(());
        }
        self.iterations += 1;
        if self.iterations > limit {
            return Err(InternalError::IterationBudgetExceeded { limit });
        }
        Ok(())
    }

    pub(crate) fn has_listener(&self) -> bool {
        self.listener.is_some()
    }

    pub(crate) fn observe(
        &mut self,
        expr_id: i64,
        value: &Value<'a>,
        trail: &AttributeTrail<'a>,
    ) -> Result<(), InternalError> {
        match self.listener.as_mut() {
            Some(listener) => listener.observe(expr_id, value, trail),
            None => Ok(()),
        }
    }
}

struct CallFrame {
    return_pc: usize,
    return_window: usize,
    return_window_len: usize,
    slot: usize,
}

/// The flat machine's register file: pc, active instruction window, pending
/// call frames, and borrows of the evaluation state.
///
/// Window 0 is the main program; window `i + 1` is extracted subprogram `i`,
/// entered via [`call`](ExecutionFrame::call) for lazily-bound aliases.
pub struct ExecutionFrame<'f, 'a> {
    pub ctx: EvaluationContext<'f, 'a>,
    pub stack: &'f mut ValueStack<'a>,
    pub iterators: &'f mut IteratorStack<'a>,
    pub pc: usize,
    pub window: usize,
    window_len: usize,
    call_stack: Vec<CallFrame>,
}

impl<'f, 'a> ExecutionFrame<'f, 'a> {
    pub fn new(
        ctx: EvaluationContext<'f, 'a>,
        stack: &'f mut ValueStack<'a>,
        iterators: &'f mut IteratorStack<'a>,
        window_len: usize,
    ) -> Self {
        ExecutionFrame {
            ctx,
            stack,
            iterators,
            pc: 0,
            window: 0,
            window_len,
            call_stack: Vec::new(),
        }
    }

    /// Transfer control relative to the next pc.
    pub fn jump_to(&mut self, offset: i64) -> Result<(), InternalError> {
        let target = self.pc as i64 + offset;
        if target < 0 || target as usize > self.window_len {
            return Err(InternalError::JumpOutOfRange {
                target,
                limit: self.window_len,
            });
        }
        self.pc = target as usize;
        Ok(())
    }

    /// Enter an extracted flat subprogram. When its window ends, the result
    /// on top of the stack is stored into `slot` and control returns here,
    /// with the value left on the stack as the use site's result.
    pub fn call(&mut self, slot: usize, extraction: usize) -> Result<(), InternalError> {
        let subprogram = self
            .ctx
            .extracted
            .get(extraction)
            .ok_or_else(|| InternalError::invalid("extracted subprogram index out of range"))?;
        let instructions = subprogram.flat()?;
        self.call_stack.push(CallFrame {
            return_pc: self.pc,
            return_window: self.window,
            return_window_len: self.window_len,
            slot,
        });
        self.window = extraction + 1;
        self.window_len = instructions.len();
        self.pc = 0;
        Ok(())
    }

    /// Handle reaching the end of the active window. Returns `true` when
    /// the main window finished and evaluation is complete.
    pub(crate) fn finish_window(&mut self) -> Result<bool, InternalError> {
        match self.call_stack.pop() {
            Some(frame) => {
                let (value, trail) = self.stack.peek_pair()?;
                self.ctx.slots.set(frame.slot, value, trail);
                self.pc = frame.return_pc;
                self.window = frame.return_window;
                self.window_len = frame.return_window_len;
                Ok(false)
            }
            None => Ok(true),
        }
    }

    pub(crate) fn observe_top(&mut self, expr_id: i64) -> Result<(), InternalError> {
        if !self.ctx.has_listener() {
            return Ok(());
        }
        let (value, trail) = self.stack.peek_pair()?;
        self.ctx.observe(expr_id, &value, &trail)
    }
}
