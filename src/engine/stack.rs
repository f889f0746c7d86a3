use crate::{
    Vec,
    attributes::{AttributeTrail, Qualifier},
    errors::InternalError,
    values::Value,
};

/// The operand stack: parallel value and attribute-trail vectors, always the
/// same length.
///
/// Underflow is [`InternalError::StackUnderflow`], never an expression-level
/// error: a well-planned program pops exactly what it pushed.
#[derive(Debug, Default)]
pub struct ValueStack<'a> {
    values: Vec<Value<'a>>,
    trails: Vec<AttributeTrail<'a>>,
    #[cfg(debug_assertions)]
    max_size: usize,
}

impl<'a> ValueStack<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        ValueStack {
            values: Vec::with_capacity(capacity),
            trails: Vec::with_capacity(capacity),
            #[cfg(debug_assertions)]
            max_size: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn has_enough(&self, n: usize) -> bool {
        self.values.len() >= n
    }

    fn underflow(&self, needed: usize) -> InternalError {
        InternalError::StackUnderflow {
            needed,
            actual: self.values.len(),
        }
    }

    pub fn push(&mut self, value: Value<'a>, trail: AttributeTrail<'a>) {
        self.values.push(value);
        self.trails.push(trail);
        #[cfg(debug_assertions)]
        {
            self.max_size = self.max_size.max(self.values.len());
        }
    }

    /// Discard the top `n` entries.
    pub fn pop(&mut self, n: usize) -> Result<(), InternalError> {
        if !self.has_enough(n) {
            return Err(self.underflow(n));
        }
        self.values.truncate(self.values.len() - n);
        self.trails.truncate(self.trails.len() - n);
        Ok(())
    }

    /// Remove and return the top entry.
    pub fn pop_pair(&mut self) -> Result<(Value<'a>, AttributeTrail<'a>), InternalError> {
        match (self.values.pop(), self.trails.pop()) {
            (Some(v), Some(t)) => Ok((v, t)),
            _ => Err(self.underflow(1)),
        }
    }

    pub fn peek(&self) -> Result<&Value<'a>, InternalError> {
        self.values.last().ok_or_else(|| self.underflow(1))
    }

    pub fn peek_pair(&self) -> Result<(Value<'a>, AttributeTrail<'a>), InternalError> {
        match (self.values.last(), self.trails.last()) {
            (Some(v), Some(t)) => Ok((*v, *t)),
            _ => Err(self.underflow(1)),
        }
    }

    /// The top `n` entries, bottom-to-top, as parallel spans.
    pub fn top_n(
        &self,
        n: usize,
    ) -> Result<(&[Value<'a>], &[AttributeTrail<'a>]), InternalError> {
        if !self.has_enough(n) {
            return Err(self.underflow(n));
        }
        let start = self.values.len() - n;
        Ok((&self.values[start..], &self.trails[start..]))
    }

    /// Replace the top `n` entries with one result.
    pub fn pop_and_push(
        &mut self,
        n: usize,
        value: Value<'a>,
        trail: AttributeTrail<'a>,
    ) -> Result<(), InternalError> {
        self.pop(n)?;
        self.push(value, trail);
        Ok(())
    }

    /// Clear without deallocating.
    pub fn reset(&mut self) {
        self.values.clear();
        self.trails.clear();
    }

    #[cfg(debug_assertions)]
    pub fn max_size(&self) -> usize {
        self.max_size
    }
}

/// What one comprehension iterates over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeKind {
    List,
    /// Map range projected to its key list; the loop variable is the key.
    MapKeys,
}

/// One active comprehension's cursor.
#[derive(Debug, Clone, Copy)]
pub struct IteratorFrame<'a> {
    pub items: &'a [Value<'a>],
    pub pos: usize,
    pub range_trail: AttributeTrail<'a>,
    pub kind: RangeKind,
}

impl<'a> IteratorFrame<'a> {
    pub fn exhausted(&self) -> bool {
        self.pos >= self.items.len()
    }

    /// The element the cursor points at, with the qualifier that steps the
    /// range trail to it. Map keys of non-qualifier kinds yield no
    /// qualifier.
    pub fn current(&self) -> (Value<'a>, Option<Qualifier<'a>>) {
        let value = self.items[self.pos];
        let qualifier = match self.kind {
            RangeKind::List => Some(Qualifier::Int(self.pos as i64)),
            RangeKind::MapKeys => match value {
                Value::String(s) => Some(Qualifier::String(s)),
                Value::Int(n) => Some(Qualifier::Int(n)),
                Value::Uint(n) => Some(Qualifier::Uint(n)),
                Value::Bool(b) => Some(Qualifier::Bool(b)),
                _ => None,
            },
        };
        (value, qualifier)
    }
}

/// Nested comprehension cursors, bounded by the program's maximum
/// comprehension nesting depth.
#[derive(Debug, Default)]
pub struct IteratorStack<'a> {
    frames: Vec<IteratorFrame<'a>>,
    limit: usize,
}

impl<'a> IteratorStack<'a> {
    pub fn with_limit(limit: usize) -> Self {
        IteratorStack {
            frames: Vec::with_capacity(limit),
            limit,
        }
    }

    pub fn push(&mut self, frame: IteratorFrame<'a>) -> Result<(), InternalError> {
        if self.frames.len() >= self.limit {
            return Err(InternalError::IteratorStackOverflow { limit: self.limit });
        }
        self.frames.push(frame);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<IteratorFrame<'a>, InternalError> {
        self.frames
            .pop()
            .ok_or(InternalError::IteratorStackUnderflow)
    }

    pub fn top_mut(&mut self) -> Result<&mut IteratorFrame<'a>, InternalError> {
        self.frames
            .last_mut()
            .ok_or(InternalError::IteratorStackUnderflow)
    }

    pub fn reset(&mut self, limit: usize) {
        self.frames.clear();
        self.limit = limit;
    }
}
