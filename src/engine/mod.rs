//! The two co-equal evaluators: a flat, jump-addressed stack machine and a
//! directly-recursive step tree, sharing one semantics.

pub mod frame;
pub mod stack;
pub mod state;
pub mod step;
pub mod steps;
pub use frame::{EvaluationContext, ExecutionFrame};
pub use stack::{IteratorStack, ValueStack};
pub use state::{ComprehensionSlots, EvaluatorState};
pub use step::{DirectNode, DirectStep, ExpressionStep};

#[cfg(test)]
mod stack_test;
