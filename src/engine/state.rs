use crate::{
    Vec,
    attributes::AttributeTrail,
    engine::stack::{IteratorStack, ValueStack},
    errors::InternalError,
    values::Value,
};

/// Fixed-size, index-addressed storage for comprehension and lazy-binding
/// variables.
///
/// Indices are assigned at plan time, so nested and lazy bindings never
/// collide; the planner guarantees every read index was sized for.
#[derive(Debug, Default)]
pub struct ComprehensionSlots<'a> {
    slots: Vec<Option<(Value<'a>, AttributeTrail<'a>)>>,
}

impl<'a> ComprehensionSlots<'a> {
    pub fn with_size(size: usize) -> Self {
        let mut slots = Vec::new();
        slots.resize(size, None);
        ComprehensionSlots { slots }
    }

    pub fn set(&mut self, slot: usize, value: Value<'a>, trail: AttributeTrail<'a>) {
        debug_assert!(slot < self.slots.len());
        self.slots[slot] = Some((value, trail));
    }

    pub fn clear(&mut self, slot: usize) {
        debug_assert!(slot < self.slots.len());
        self.slots[slot] = None;
    }

    pub fn get(&self, slot: usize) -> Option<(Value<'a>, AttributeTrail<'a>)> {
        debug_assert!(slot < self.slots.len());
        self.slots[slot]
    }

    /// `get` for slots that must have been assigned already.
    pub fn read(&self, slot: usize) -> Result<(Value<'a>, AttributeTrail<'a>), InternalError> {
        self.get(slot).ok_or(InternalError::UnassignedSlot { slot })
    }

    pub fn is_set(&self, slot: usize) -> bool {
        self.slots.get(slot).is_some_and(Option::is_some)
    }

    /// Resize and clear all slots, keeping backing storage.
    pub fn reset(&mut self, size: usize) {
        self.slots.clear();
        self.slots.resize(size, None);
    }
}

/// Mutable evaluation state for one program, reusable across evaluations
/// via [`reset`](EvaluatorState::reset).
///
/// A compiled program is immutable and evaluates concurrently as long as
/// each evaluation brings its own state.
#[derive(Debug, Default)]
pub struct EvaluatorState<'a> {
    pub stack: ValueStack<'a>,
    pub iterators: IteratorStack<'a>,
    pub slots: ComprehensionSlots<'a>,
}

impl<'a> EvaluatorState<'a> {
    pub fn new(stack_capacity: usize, iterator_bound: usize, slot_count: usize) -> Self {
        EvaluatorState {
            stack: ValueStack::with_capacity(stack_capacity),
            iterators: IteratorStack::with_limit(iterator_bound),
            slots: ComprehensionSlots::with_size(slot_count),
        }
    }

    /// Clear for a fresh evaluation without deallocating.
    pub fn reset(&mut self, iterator_bound: usize, slot_count: usize) {
        self.stack.reset();
        self.iterators.reset(iterator_bound);
        self.slots.reset(slot_count);
    }
}
