//! Compiled programs and their evaluation entry points.

use bumpalo::Bump;
use tracing::debug;

use crate::{
    Box, Vec,
    activation::Activation,
    attributes::AttributeTrail,
    engine::frame::{EvaluationContext, ExecutionFrame},
    engine::state::EvaluatorState,
    engine::step::{DirectNode, ExpressionStep},
    errors::InternalError,
    options::RuntimeOptions,
    values::Value,
};

/// One compiled unit: either a flat instruction sequence for the stack
/// machine or a single directly-recursive node.
pub enum Subprogram<'a> {
    Flat(Vec<Box<dyn ExpressionStep<'a> + 'a>>),
    Direct(DirectNode<'a>),
}

impl<'a> Subprogram<'a> {
    pub fn is_direct(&self) -> bool {
        matches!(self, Subprogram::Direct(_))
    }

    /// The flat instruction window, or a fatal error for direct units. Call
    /// sites that enter a window (lazy-binding calls) must have checked the
    /// shape at plan time.
    pub(crate) fn flat(&self) -> Result<&[Box<dyn ExpressionStep<'a> + 'a>], InternalError> {
        match self {
            Subprogram::Flat(instructions) => Ok(instructions),
            Subprogram::Direct(_) => Err(InternalError::invalid(
                "expected a flat subprogram, found a recursive one",
            )),
        }
    }
}

impl core::fmt::Debug for Subprogram<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Subprogram::Flat(instructions) => f
                .debug_struct("Flat")
                .field("len", &instructions.len())
                .finish(),
            Subprogram::Direct(_) => f.debug_struct("Direct").finish_non_exhaustive(),
        }
    }
}

/// Observes every expression result as evaluation produces it.
///
/// The flat machine reports each expression-bearing instruction as it
/// completes; a fully recursive program reports only the root. An `Err`
/// from the listener aborts evaluation.
pub trait EvaluationListener<'a> {
    fn observe(
        &mut self,
        expr_id: i64,
        value: &Value<'a>,
        trail: &AttributeTrail<'a>,
    ) -> Result<(), InternalError>;
}

impl<'a, F> EvaluationListener<'a> for F
where
    F: FnMut(i64, &Value<'a>, &AttributeTrail<'a>) -> Result<(), InternalError>,
{
    fn observe(
        &mut self,
        expr_id: i64,
        value: &Value<'a>,
        trail: &AttributeTrail<'a>,
    ) -> Result<(), InternalError> {
        self(expr_id, value, trail)
    }
}

/// A planned expression, immutable and reusable across evaluations.
///
/// Concurrent evaluations are safe as long as each brings its own
/// [`EvaluatorState`]; [`evaluate`](Program::evaluate) allocates a fresh
/// one per call.
#[derive(Debug)]
pub struct Program<'a> {
    main: Subprogram<'a>,
    extracted: Vec<Subprogram<'a>>,
    slot_count: usize,
    iterator_bound: usize,
    root_expr_id: i64,
    options: RuntimeOptions,
}

impl<'a> Program<'a> {
    pub(crate) fn new(
        main: Subprogram<'a>,
        extracted: Vec<Subprogram<'a>>,
        slot_count: usize,
        iterator_bound: usize,
        root_expr_id: i64,
        options: RuntimeOptions,
    ) -> Self {
        Program {
            main,
            extracted,
            slot_count,
            iterator_bound,
            root_expr_id,
            options,
        }
    }

    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    /// True when the whole program runs as one recursive tree.
    pub fn is_recursive(&self) -> bool {
        self.main.is_direct()
    }

    /// Evaluation state sized for this program.
    pub fn make_state(&self) -> EvaluatorState<'a> {
        let stack_capacity = match &self.main {
            Subprogram::Flat(instructions) => instructions.len(),
            Subprogram::Direct(_) => 0,
        };
        EvaluatorState::new(stack_capacity, self.iterator_bound, self.slot_count)
    }

    /// Evaluate against an activation with fresh state.
    pub fn evaluate(
        &self,
        arena: &'a Bump,
        activation: &dyn Activation<'a>,
    ) -> Result<Value<'a>, InternalError> {
        let mut state = self.make_state();
        self.run(arena, activation, &mut state, None).map(|r| r.0)
    }

    /// Evaluate reusing caller-held state.
    pub fn evaluate_with_state(
        &self,
        arena: &'a Bump,
        activation: &dyn Activation<'a>,
        state: &mut EvaluatorState<'a>,
    ) -> Result<Value<'a>, InternalError> {
        self.run(arena, activation, state, None).map(|r| r.0)
    }

    /// Evaluate with a listener observing intermediate results.
    pub fn trace(
        &self,
        arena: &'a Bump,
        activation: &dyn Activation<'a>,
        listener: &mut dyn EvaluationListener<'a>,
    ) -> Result<Value<'a>, InternalError> {
        let mut state = self.make_state();
        self.run(arena, activation, &mut state, Some(listener))
            .map(|r| r.0)
    }

    fn run<'e>(
        &'e self,
        arena: &'a Bump,
        activation: &'e dyn Activation<'a>,
        state: &'e mut EvaluatorState<'a>,
        listener: Option<&'e mut dyn EvaluationListener<'a>>,
    ) -> Result<(Value<'a>, AttributeTrail<'a>), InternalError> {
        state.reset(self.iterator_bound, self.slot_count);
        let has_listener = listener.is_some();
        let mut ctx = EvaluationContext::new(
            arena,
            activation,
            &self.options,
            &self.extracted,
            &mut state.slots,
            listener,
        );
        match &self.main {
            Subprogram::Direct(node) => {
                debug!(root = self.root_expr_id, "evaluating recursive program");
                let (value, trail) = node.evaluate(&mut ctx)?;
                if has_listener {
                    ctx.observe(self.root_expr_id, &value, &trail)?;
                }
                Ok((value, trail))
            }
            Subprogram::Flat(instructions) => {
                debug!(
                    root = self.root_expr_id,
                    len = instructions.len(),
                    "evaluating flat program"
                );
                let mut frame = ExecutionFrame::new(
                    ctx,
                    &mut state.stack,
                    &mut state.iterators,
                    instructions.len(),
                );
                self.run_flat(instructions, &mut frame)?;
                if frame.stack.len() != 1 {
                    return Err(InternalError::UnexpectedStackSize {
                        expected: 1,
                        actual: frame.stack.len(),
                    });
                }
                frame.stack.pop_pair()
            }
        }
    }

    fn run_flat<'f>(
        &'f self,
        main: &'f [Box<dyn ExpressionStep<'a> + 'a>],
        frame: &mut ExecutionFrame<'f, 'a>,
    ) -> Result<(), InternalError> {
        loop {
            let instructions = match frame.window {
                0 => main,
                w => self.extracted[w - 1].flat()?,
            };
            if frame.pc >= instructions.len() {
                if frame.finish_window()? {
                    return Ok(());
                }
                continue;
            }
            let step = &instructions[frame.pc];
            frame.pc += 1;
            step.evaluate(frame)?;
            if let Some(expr_id) = step.expr_id() {
                frame.observe_top(expr_id)?;
            }
        }
    }
}
