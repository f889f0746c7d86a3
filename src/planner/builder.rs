//! Assembles flat instruction sequences and recursive nodes into a program.
//!
//! Planning walks the expression tree; each node opens a subexpression,
//! emits steps (with placeholders for not-yet-resolvable jumps), and closes
//! it again. A closed subexpression can later be upgraded to a single
//! recursive node, extracted as a lazily-evaluated unit, or left in place
//! to be spliced into its parent when the program is flattened.

use hashbrown::HashMap;

use crate::{
    Box, Vec,
    engine::step::{DirectNode, ExpressionStep, WrappedDirectStep},
    errors::InternalError,
    program::Subprogram,
    vec,
};

type Step<'a> = Box<dyn ExpressionStep<'a> + 'a>;

enum Element<'a> {
    Step(Step<'a>),
    /// Reserved instruction slot, patched via [`ProgramBuilder::replace_step`]
    /// once its jump target is known.
    Placeholder,
    /// A nested subexpression, spliced in at flatten time.
    Child(usize),
}

enum SubexprState<'a> {
    /// Open or closed, still editable as a sequence of elements.
    Tree(Vec<Element<'a>>),
    /// A linear instruction list with all children spliced in.
    Flattened(Vec<Step<'a>>),
    /// A single recursive node.
    Recursive(DirectNode<'a>),
}

struct Subexpression<'a> {
    state: SubexprState<'a>,
    expr_id: i64,
    recursive_depth: usize,
}

/// Identifies one reserved instruction slot.
#[derive(Debug, Clone, Copy)]
pub struct StepHandle {
    subexpr: usize,
    element: usize,
}

/// A position between instructions, used as a jump target.
#[derive(Debug, Clone, Copy)]
pub struct Label {
    subexpr: usize,
    element: usize,
}

/// Builds one program as a pool of subexpressions addressed by expression id.
#[derive(Default)]
pub struct ProgramBuilder<'a> {
    pool: Vec<Option<Subexpression<'a>>>,
    open: Vec<usize>,
    by_expr_id: HashMap<i64, usize>,
    extracted: Vec<usize>,
    root: Option<usize>,
}

impl<'a> ProgramBuilder<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, idx: usize) -> Result<&Subexpression<'a>, InternalError> {
        self.pool
            .get(idx)
            .and_then(Option::as_ref)
            .ok_or_else(|| InternalError::invalid("subexpression no longer in pool"))
    }

    fn entry_mut(&mut self, idx: usize) -> Result<&mut Subexpression<'a>, InternalError> {
        self.pool
            .get_mut(idx)
            .and_then(Option::as_mut)
            .ok_or_else(|| InternalError::invalid("subexpression no longer in pool"))
    }

    fn take_entry(&mut self, idx: usize) -> Result<Subexpression<'a>, InternalError> {
        let entry = self
            .pool
            .get_mut(idx)
            .and_then(Option::take)
            .ok_or_else(|| InternalError::invalid("subexpression no longer in pool"))?;
        self.by_expr_id.remove(&entry.expr_id);
        Ok(entry)
    }

    fn index_of(&self, expr_id: i64) -> Result<usize, InternalError> {
        self.by_expr_id
            .get(&expr_id)
            .copied()
            .ok_or_else(|| InternalError::invalid("unknown expression id"))
    }

    fn current(&self) -> Result<usize, InternalError> {
        self.open
            .last()
            .copied()
            .ok_or_else(|| InternalError::invalid("no open subexpression"))
    }

    fn current_tree(&mut self) -> Result<&mut Vec<Element<'a>>, InternalError> {
        let idx = self.current()?;
        match &mut self.entry_mut(idx)?.state {
            SubexprState::Tree(tree) => Ok(tree),
            _ => Err(InternalError::invalid(
                "cannot append to a finished subexpression",
            )),
        }
    }

    /// Open a subexpression for `expr_id`, nesting it into the currently
    /// open one (or making it the root).
    pub fn enter_subexpression(&mut self, expr_id: i64) -> Result<(), InternalError> {
        let idx = self.pool.len();
        self.pool.push(Some(Subexpression {
            state: SubexprState::Tree(Vec::new()),
            expr_id,
            recursive_depth: 0,
        }));
        if self.by_expr_id.insert(expr_id, idx).is_some() {
            return Err(InternalError::invalid("duplicate expression id"));
        }
        if self.open.is_empty() {
            if self.root.is_some() {
                return Err(InternalError::invalid("program already has a root"));
            }
            self.root = Some(idx);
        } else {
            self.current_tree()?.push(Element::Child(idx));
        }
        self.open.push(idx);
        Ok(())
    }

    /// Close the innermost subexpression, which must belong to `expr_id`.
    ///
    /// A closing tree whose only element is a recursive child adopts the
    /// child's node wholesale, so wrapper-less nodes stay recursive without
    /// their parents knowing.
    pub fn exit_subexpression(&mut self, expr_id: i64) -> Result<(), InternalError> {
        let idx = self
            .open
            .pop()
            .ok_or_else(|| InternalError::invalid("no open subexpression"))?;
        let entry = self.entry(idx)?;
        if entry.expr_id != expr_id {
            return Err(InternalError::invalid("mismatched subexpression exit"));
        }
        let adopt = match &entry.state {
            SubexprState::Tree(tree) => match tree.as_slice() {
                [Element::Child(c)] => {
                    matches!(self.entry(*c)?.state, SubexprState::Recursive(_)).then_some(*c)
                }
                _ => None,
            },
            _ => None,
        };
        if let Some(child) = adopt {
            let taken = self.take_entry(child)?;
            let this = self.entry_mut(idx)?;
            this.state = taken.state;
            this.recursive_depth = taken.recursive_depth;
        }
        Ok(())
    }

    pub fn add_step(&mut self, step: Step<'a>) -> Result<StepHandle, InternalError> {
        let subexpr = self.current()?;
        let tree = self.current_tree()?;
        let element = tree.len();
        tree.push(Element::Step(step));
        Ok(StepHandle { subexpr, element })
    }

    pub fn add_placeholder(&mut self) -> Result<StepHandle, InternalError> {
        let subexpr = self.current()?;
        let tree = self.current_tree()?;
        let element = tree.len();
        tree.push(Element::Placeholder);
        Ok(StepHandle { subexpr, element })
    }

    /// Fill a reserved slot (or swap an already-emitted step).
    pub fn replace_step(&mut self, handle: StepHandle, step: Step<'a>) -> Result<(), InternalError> {
        let entry = self.entry_mut(handle.subexpr)?;
        match &mut entry.state {
            SubexprState::Tree(tree) => {
                let slot = tree
                    .get_mut(handle.element)
                    .ok_or_else(|| InternalError::invalid("step handle out of range"))?;
                *slot = Element::Step(step);
                Ok(())
            }
            _ => Err(InternalError::invalid(
                "cannot patch a finished subexpression",
            )),
        }
    }

    /// The position just past everything emitted so far in the innermost
    /// subexpression.
    pub fn current_label(&self) -> Result<Label, InternalError> {
        let subexpr = self.current()?;
        match &self.entry(subexpr)?.state {
            SubexprState::Tree(tree) => Ok(Label {
                subexpr,
                element: tree.len(),
            }),
            _ => Err(InternalError::invalid(
                "no label inside a finished subexpression",
            )),
        }
    }

    /// Size of a subexpression in flattened-instruction units. A recursive
    /// subexpression occupies exactly one instruction.
    fn size_of(&self, idx: usize) -> Result<usize, InternalError> {
        let mut total = 0;
        let mut work = vec![idx];
        while let Some(i) = work.pop() {
            match &self.entry(i)?.state {
                SubexprState::Recursive(_) => total += 1,
                SubexprState::Flattened(steps) => total += steps.len(),
                SubexprState::Tree(tree) => {
                    for element in tree {
                        match element {
                            Element::Step(_) | Element::Placeholder => total += 1,
                            Element::Child(c) => work.push(*c),
                        }
                    }
                }
            }
        }
        Ok(total)
    }

    /// Flattened position of the first `element` elements of a tree.
    fn flat_position(&self, subexpr: usize, element: usize) -> Result<usize, InternalError> {
        let tree = match &self.entry(subexpr)?.state {
            SubexprState::Tree(tree) => tree,
            _ => {
                return Err(InternalError::invalid(
                    "no positions inside a finished subexpression",
                ));
            }
        };
        let mut position = 0;
        for e in tree.get(..element).ok_or_else(|| {
            InternalError::invalid("position out of range")
        })? {
            position += match e {
                Element::Step(_) | Element::Placeholder => 1,
                Element::Child(c) => self.size_of(*c)?,
            };
        }
        Ok(position)
    }

    /// The jump offset from the instruction at `from` to the position `to`,
    /// relative to the pc after `from` executes. Both must be in the same
    /// subexpression; the result may be negative.
    pub fn offset(&self, from: StepHandle, to: Label) -> Result<i64, InternalError> {
        if from.subexpr != to.subexpr {
            return Err(InternalError::invalid(
                "jump crosses a subexpression boundary",
            ));
        }
        let from_pos = self.flat_position(from.subexpr, from.element)? as i64;
        let to_pos = self.flat_position(to.subexpr, to.element)? as i64;
        Ok(to_pos - from_pos - 1)
    }

    /// Detach the just-closed subexpression for `expr_id` from its parent
    /// and register it as an extracted unit; returns the extraction index.
    pub fn extract_subexpression(&mut self, expr_id: i64) -> Result<usize, InternalError> {
        let idx = self.index_of(expr_id)?;
        let tree = self.current_tree()?;
        match tree.last() {
            Some(Element::Child(c)) if *c == idx => {
                tree.pop();
            }
            _ => {
                return Err(InternalError::invalid(
                    "extraction target is not the last planned child",
                ));
            }
        }
        self.extracted.push(idx);
        Ok(self.extracted.len() - 1)
    }

    /// Replace a subexpression's planned steps with one recursive node.
    ///
    /// The discarded tree's nested children are removed from the pool; the
    /// caller has already taken the ones the node absorbed.
    pub fn set_recursive(
        &mut self,
        expr_id: i64,
        node: DirectNode<'a>,
        depth: usize,
    ) -> Result<(), InternalError> {
        let idx = self.index_of(expr_id)?;
        let entry = self.entry_mut(idx)?;
        let old = core::mem::replace(&mut entry.state, SubexprState::Recursive(node));
        entry.recursive_depth = depth;
        let mut orphans = Vec::new();
        if let SubexprState::Tree(tree) = old {
            for element in tree {
                if let Element::Child(c) = element {
                    orphans.push(c);
                }
            }
        }
        while let Some(c) = orphans.pop() {
            let Some(child) = self.pool.get_mut(c).and_then(Option::take) else {
                continue;
            };
            self.by_expr_id.remove(&child.expr_id);
            if let SubexprState::Tree(tree) = child.state {
                for element in tree {
                    if let Element::Child(grandchild) = element {
                        orphans.push(grandchild);
                    }
                }
            }
        }
        Ok(())
    }

    /// `Some(depth)` when the subexpression for `expr_id` is recursive.
    pub fn recursive_depth(&self, expr_id: i64) -> Option<usize> {
        let idx = self.by_expr_id.get(&expr_id)?;
        let entry = self.pool.get(*idx)?.as_ref()?;
        match entry.state {
            SubexprState::Recursive(_) => Some(entry.recursive_depth),
            _ => None,
        }
    }

    /// Remove a recursive subexpression from the pool, yielding its node for
    /// absorption into a parent node.
    pub fn take_recursive(&mut self, expr_id: i64) -> Result<DirectNode<'a>, InternalError> {
        let idx = self.index_of(expr_id)?;
        let entry = self.take_entry(idx)?;
        match entry.state {
            SubexprState::Recursive(node) => Ok(node),
            _ => Err(InternalError::invalid("subexpression is not recursive")),
        }
    }

    pub fn extracted_is_recursive(&self, extraction: usize) -> Result<bool, InternalError> {
        let idx = *self
            .extracted
            .get(extraction)
            .ok_or_else(|| InternalError::invalid("extraction index out of range"))?;
        Ok(matches!(
            self.entry(idx)?.state,
            SubexprState::Recursive(_)
        ))
    }

    /// Convert a tree subexpression to its flat instruction list in place,
    /// splicing flattened children and wrapping recursive ones as single
    /// instructions. Flattening an already-flattened subexpression is a
    /// no-op; flattening a recursive one is a fault.
    pub(crate) fn flatten(&mut self, expr_id: i64) -> Result<(), InternalError> {
        let idx = self.index_of(expr_id)?;
        self.flatten_index(idx)
    }

    fn flatten_index(&mut self, idx: usize) -> Result<(), InternalError> {
        let entry = self.entry_mut(idx)?;
        let tree = match &mut entry.state {
            SubexprState::Flattened(_) => return Ok(()),
            SubexprState::Recursive(_) => {
                return Err(InternalError::invalid(
                    "cannot flatten a recursive subexpression",
                ));
            }
            SubexprState::Tree(tree) => core::mem::take(tree),
        };
        let mut out = Vec::new();
        let mut work = vec![tree.into_iter()];
        while let Some(iter) = work.last_mut() {
            let Some(element) = iter.next() else {
                work.pop();
                continue;
            };
            match element {
                Element::Step(step) => out.push(step),
                Element::Placeholder => {
                    return Err(InternalError::invalid("unpatched placeholder"));
                }
                Element::Child(c) => {
                    let child = self.take_entry(c)?;
                    match child.state {
                        SubexprState::Tree(t) => work.push(t.into_iter()),
                        SubexprState::Flattened(steps) => out.extend(steps),
                        SubexprState::Recursive(node) => {
                            out.push(Box::new(WrappedDirectStep::new(node, child.expr_id)));
                        }
                    }
                }
            }
        }
        self.entry_mut(idx)?.state = SubexprState::Flattened(out);
        Ok(())
    }

    /// Flattened-instruction size of the subexpression for `expr_id`.
    pub(crate) fn flat_size(&self, expr_id: i64) -> Result<usize, InternalError> {
        self.size_of(self.index_of(expr_id)?)
    }

    fn finish_subexpression(&mut self, idx: usize) -> Result<Subprogram<'a>, InternalError> {
        let entry = self.entry(idx)?;
        if !matches!(entry.state, SubexprState::Recursive(_)) {
            let expr_id = entry.expr_id;
            self.flatten(expr_id)?;
        }
        match self.take_entry(idx)?.state {
            SubexprState::Recursive(node) => Ok(Subprogram::Direct(node)),
            SubexprState::Flattened(steps) => Ok(Subprogram::Flat(steps)),
            SubexprState::Tree(_) => {
                Err(InternalError::invalid("subexpression was not flattened"))
            }
        }
    }

    /// Consume the builder, producing the main subprogram and the extracted
    /// units in extraction order.
    pub fn build(mut self) -> Result<(Subprogram<'a>, Vec<Subprogram<'a>>), InternalError> {
        if !self.open.is_empty() {
            return Err(InternalError::invalid("unclosed subexpression"));
        }
        let root = self
            .root
            .ok_or_else(|| InternalError::invalid("program has no root"))?;
        let main = self.finish_subexpression(root)?;
        let indices = core::mem::take(&mut self.extracted);
        let mut extracted = Vec::with_capacity(indices.len());
        for idx in indices {
            extracted.push(self.finish_subexpression(idx)?);
        }
        Ok((main, extracted))
    }
}
