//! Fatal engine failures.
//!
//! The evaluator keeps two disjoint error tracks:
//!
//! - **Expression-level errors and unknowns** are ordinary [`Value`]s
//!   (`Value::Error` / `Value::Unknown`). They flow through the operand stack
//!   like any other result, are absorbed only by steps documented to absorb
//!   them (non-strict functions, the `&&`/`||`/ternary merge rules), and
//!   otherwise surface as the evaluation's final result.
//!
//! - **Internal failures** abort evaluation immediately. They indicate a
//!   planner or engine defect (or a misbehaving host callback), never
//!   malformed user input: a well-formed expression over well-typed inputs
//!   must not produce one.
//!
//! [`Value`]: crate::values::Value

use ecow::EcoString;
use thiserror::Error;

/// Fatal failure aborting an evaluation.
///
/// These are reported to the caller as `Err`, distinct from expression-level
/// error values, and are never expected against a correctly built
/// [`Program`](crate::program::Program).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InternalError {
    /// A step required more operands than the value stack holds.
    #[error("stack underflow: needed {needed} values but stack holds {actual}")]
    StackUnderflow { needed: usize, actual: usize },

    /// A jump target fell outside the active instruction window.
    #[error("jump out of range: target {target} not within [0, {limit}]")]
    JumpOutOfRange { target: i64, limit: usize },

    /// More nested iterator frames than the program was planned for.
    #[error("iterator stack overflow: limit {limit}")]
    IteratorStackOverflow { limit: usize },

    /// An iterator step ran with no active iterator frame.
    #[error("iterator stack underflow")]
    IteratorStackUnderflow,

    /// More than one overload's argument-kind signature matched a call.
    #[error("cannot resolve overloads: ambiguous binding for '{function}'")]
    AmbiguousOverloads { function: EcoString },

    /// The per-evaluation comprehension iteration budget was exhausted.
    #[error("iteration budget exceeded: {limit}")]
    IterationBudgetExceeded { limit: usize },

    /// A slot was read before any binding step assigned it.
    #[error("slot {slot} read before assignment")]
    UnassignedSlot { slot: usize },

    /// Evaluation finished with a stack size other than entry size plus one.
    #[error("evaluation finished with unexpected stack size: expected {expected}, got {actual}")]
    UnexpectedStackSize { expected: usize, actual: usize },

    /// The planner produced a program the engine cannot execute.
    #[error("invalid program: {0}")]
    InvalidProgram(EcoString),

    /// The activation failed while resolving a variable or function provider.
    #[error("activation error: {0}")]
    Activation(EcoString),
}

impl InternalError {
    pub(crate) fn invalid(message: impl Into<EcoString>) -> Self {
        InternalError::InvalidProgram(message.into())
    }
}
