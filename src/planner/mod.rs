//! Turns checked expression trees into executable programs.
//!
//! Every node is planned twice over, in one pass: its flat instruction
//! sequence is always emitted, and when the node and all of its children
//! are expressible as directly-recursive steps (within the configured
//! depth), the sequence is replaced by a single recursive node. The root
//! decides the program's final shape.

pub mod builder;

use bumpalo::Bump;
use tracing::debug;

use crate::{
    Box, String, Vec,
    ast::{Comprehension, Constant, Expr, ExprKind, operators},
    engine::steps::call::{CallStep, DirectCall, DirectLazyCall, LazyCallStep},
    engine::steps::comprehension::{
        AccuInitStep, ComprehensionCondStep, ComprehensionFinishStep, ComprehensionInitStep,
        ComprehensionNextStep, ComprehensionUpdateStep, DirectComprehension,
    },
    engine::steps::constant::{ConstantStep, DirectConstant},
    engine::steps::container::{ContainerAccessStep, DirectContainerAccess},
    engine::steps::create::{
        CreateListStep, CreateMapStep, CreateStructStep, DirectCreateList, DirectCreateMap,
        DirectCreateStruct,
    },
    engine::steps::ident::{DirectIdent, IdentStep},
    engine::steps::lazy::{
        CheckLazyInitStep, ClearSlotStep, DirectBind, DirectLazyInit, DirectSlot, SlotStep,
    },
    engine::steps::logic::{
        AndOrStep, DirectAndOr, DirectTernary, JumpStep, ShortCircuitJumpStep, TernaryJumpStep,
        TernaryMergeStep,
    },
    engine::steps::select::{DirectSelect, SelectStep},
    errors::InternalError,
    functions::{FunctionRegistry, resolver::CallSite},
    options::RuntimeOptions,
    planner::builder::ProgramBuilder,
    program::Program,
    values::{TypeFactory, Value},
};

#[cfg(test)]
mod builder_test;

/// Plan `expr` into an executable [`Program`].
pub fn plan<'a>(
    arena: &'a Bump,
    registry: &'a FunctionRegistry,
    type_factory: &'a dyn TypeFactory<'a>,
    options: RuntimeOptions,
    expr: &Expr,
) -> Result<Program<'a>, InternalError> {
    let mut planner = Planner {
        arena,
        registry,
        type_factory,
        options,
        builder: ProgramBuilder::new(),
        scopes: Vec::new(),
        slot_count: 0,
        comprehension_depth: 0,
        max_comprehension_depth: 0,
        extraction_depths: Vec::new(),
    };
    planner.plan_expr(expr)?;
    let slot_count = planner.slot_count;
    let iterator_bound = planner.max_comprehension_depth;
    let options = planner.options;
    let main_size = planner.builder.flat_size(expr.id)?;
    let (main, extracted) = planner.builder.build()?;
    debug!(
        root = expr.id,
        recursive = main.is_direct(),
        size = main_size,
        extracted = extracted.len(),
        slots = slot_count,
        "planned program"
    );
    Ok(Program::new(
        main,
        extracted,
        slot_count,
        iterator_bound,
        expr.id,
        options,
    ))
}

/// A name bound by an enclosing comprehension or lazy binding.
struct ScopeEntry {
    name: String,
    slot: usize,
    /// `Some` for lazily-bound aliases; the extraction holding the
    /// initializer.
    lazy_extraction: Option<usize>,
}

struct Planner<'a> {
    arena: &'a Bump,
    registry: &'a FunctionRegistry,
    type_factory: &'a dyn TypeFactory<'a>,
    options: RuntimeOptions,
    builder: ProgramBuilder<'a>,
    scopes: Vec<ScopeEntry>,
    slot_count: usize,
    comprehension_depth: usize,
    max_comprehension_depth: usize,
    /// Per extraction, the deepest comprehension nesting inside the
    /// extracted initializer itself.
    extraction_depths: Vec<usize>,
}

impl<'a> Planner<'a> {
    fn plan_expr(&mut self, expr: &Expr) -> Result<(), InternalError> {
        self.builder.enter_subexpression(expr.id)?;
        match &expr.kind {
            ExprKind::Literal(constant) => self.plan_literal(expr.id, constant)?,
            ExprKind::Ident(name) => self.plan_ident(expr.id, name)?,
            ExprKind::Select {
                operand,
                field,
                test_only,
            } => self.plan_select(expr.id, operand, field, *test_only)?,
            ExprKind::Call {
                target,
                function,
                args,
            } => self.plan_call(expr.id, target.as_deref(), function, args)?,
            ExprKind::List { elements } => self.plan_list(expr.id, elements)?,
            ExprKind::Map { entries } => self.plan_map(expr.id, entries)?,
            ExprKind::Struct { type_name, fields } => {
                self.plan_struct(expr.id, type_name, fields)?
            }
            ExprKind::Comprehension(c) => self.plan_comprehension(expr.id, c)?,
        }
        self.builder.exit_subexpression(expr.id)
    }

    fn next_slot(&mut self) -> usize {
        let slot = self.slot_count;
        self.slot_count += 1;
        slot
    }

    /// `Some(depth)` when a node whose children are `child_ids` may be
    /// upgraded to a recursive step: recursion is enabled, every child
    /// already is one, and the combined depth stays within bounds.
    fn upgrade_depth(&self, child_ids: &[i64]) -> Option<usize> {
        if self.options.max_recursion_depth == 0 {
            return None;
        }
        let mut max_child = 0;
        for id in child_ids {
            max_child = max_child.max(self.builder.recursive_depth(*id)?);
        }
        let depth = max_child + 1;
        (depth <= self.options.max_recursion_depth).then_some(depth)
    }

    fn take_children(&mut self, child_ids: &[i64]) -> Result<Vec<crate::engine::DirectNode<'a>>, InternalError> {
        let mut nodes = Vec::with_capacity(child_ids.len());
        for id in child_ids {
            nodes.push(self.builder.take_recursive(*id)?);
        }
        Ok(nodes)
    }

    fn constant_value(&self, constant: &Constant) -> Value<'a> {
        match constant {
            Constant::Null => Value::Null,
            Constant::Bool(b) => Value::Bool(*b),
            Constant::Int(n) => Value::Int(*n),
            Constant::Uint(n) => Value::Uint(*n),
            Constant::Double(d) => Value::Double(*d),
            Constant::String(s) => Value::String(self.arena.alloc_str(s)),
            Constant::Bytes(b) => Value::Bytes(self.arena.alloc_slice_copy(b)),
        }
    }

    fn plan_literal(&mut self, id: i64, constant: &Constant) -> Result<(), InternalError> {
        let value = self.constant_value(constant);
        self.builder
            .add_step(Box::new(ConstantStep::new(value, id)))?;
        if let Some(depth) = self.upgrade_depth(&[]) {
            self.builder
                .set_recursive(id, Box::new(DirectConstant::new(value)), depth)?;
        }
        Ok(())
    }

    fn plan_ident(&mut self, id: i64, name: &str) -> Result<(), InternalError> {
        let bound = self
            .scopes
            .iter()
            .rev()
            .find(|entry| entry.name == name)
            .map(|entry| (entry.slot, entry.lazy_extraction));
        match bound {
            Some((slot, Some(extraction))) => {
                // The initializer runs at this use site's runtime depth, so
                // its own comprehensions stack on top of whatever folds are
                // live here.
                let needed = self.comprehension_depth
                    + self.extraction_depths.get(extraction).copied().unwrap_or(0);
                self.max_comprehension_depth = self.max_comprehension_depth.max(needed);
                self.builder
                    .add_step(Box::new(CheckLazyInitStep::new(slot, extraction)))?;
                if self.builder.extracted_is_recursive(extraction)?
                    && let Some(depth) = self.upgrade_depth(&[])
                {
                    self.builder.set_recursive(
                        id,
                        Box::new(DirectLazyInit::new(slot, extraction)),
                        depth,
                    )?;
                }
            }
            Some((slot, None)) => {
                self.builder.add_step(Box::new(SlotStep::new(slot, id)))?;
                if let Some(depth) = self.upgrade_depth(&[]) {
                    self.builder
                        .set_recursive(id, Box::new(DirectSlot::new(slot)), depth)?;
                }
            }
            None => {
                let name: &'a str = self.arena.alloc_str(name);
                let overloads = {
                    let candidates = self.registry.overloads(name);
                    (!candidates.is_empty()).then_some(candidates)
                };
                self.builder
                    .add_step(Box::new(IdentStep::new(name, overloads, id)))?;
                if let Some(depth) = self.upgrade_depth(&[]) {
                    self.builder.set_recursive(
                        id,
                        Box::new(DirectIdent::new(name, overloads)),
                        depth,
                    )?;
                }
            }
        }
        Ok(())
    }

    fn plan_select(
        &mut self,
        id: i64,
        operand: &Expr,
        field: &str,
        test_only: bool,
    ) -> Result<(), InternalError> {
        self.plan_expr(operand)?;
        let field: &'a str = self.arena.alloc_str(field);
        self.builder
            .add_step(Box::new(SelectStep::new(field, test_only, id)))?;
        if let Some(depth) = self.upgrade_depth(&[operand.id]) {
            let node = self.builder.take_recursive(operand.id)?;
            self.builder.set_recursive(
                id,
                Box::new(DirectSelect::new(node, field, test_only)),
                depth,
            )?;
        }
        Ok(())
    }

    fn plan_call(
        &mut self,
        id: i64,
        target: Option<&Expr>,
        function: &str,
        args: &[Expr],
    ) -> Result<(), InternalError> {
        if target.is_none() {
            match (function, args) {
                (operators::AND, [left, right]) => {
                    return self.plan_and_or(id, left, right, false);
                }
                (operators::OR, [left, right]) => {
                    return self.plan_and_or(id, left, right, true);
                }
                (operators::TERNARY, [condition, then, otherwise]) => {
                    return self.plan_ternary(id, condition, then, otherwise);
                }
                (operators::INDEX, [operand, key]) => {
                    return self.plan_index(id, operand, key);
                }
                _ => {}
            }
        }
        let mut child_ids = Vec::with_capacity(args.len() + 1);
        if let Some(target) = target {
            self.plan_expr(target)?;
            child_ids.push(target.id);
        }
        for arg in args {
            self.plan_expr(arg)?;
            child_ids.push(arg.id);
        }
        let site = CallSite {
            function: self.arena.alloc_str(function),
            expr_id: id,
            receiver_style: target.is_some(),
        };
        if self.registry.is_lazy(function) {
            self.builder
                .add_step(Box::new(LazyCallStep::new(site, child_ids.len())))?;
            if let Some(depth) = self.upgrade_depth(&child_ids) {
                let arguments = self.take_children(&child_ids)?;
                self.builder.set_recursive(
                    id,
                    Box::new(DirectLazyCall::new(site, arguments)),
                    depth,
                )?;
            }
        } else {
            let overloads = self.registry.overloads(function);
            self.builder
                .add_step(Box::new(CallStep::new(site, overloads, child_ids.len())))?;
            if let Some(depth) = self.upgrade_depth(&child_ids) {
                let arguments = self.take_children(&child_ids)?;
                self.builder.set_recursive(
                    id,
                    Box::new(DirectCall::new(site, overloads, arguments)),
                    depth,
                )?;
            }
        }
        Ok(())
    }

    fn plan_and_or(
        &mut self,
        id: i64,
        left: &Expr,
        right: &Expr,
        is_or: bool,
    ) -> Result<(), InternalError> {
        self.plan_expr(left)?;
        let jump = if self.options.short_circuiting {
            Some(self.builder.add_placeholder()?)
        } else {
            None
        };
        self.plan_expr(right)?;
        self.builder.add_step(Box::new(AndOrStep::new(is_or, id)))?;
        if let Some(jump) = jump {
            let end = self.builder.current_label()?;
            let offset = self.builder.offset(jump, end)?;
            self.builder
                .replace_step(jump, Box::new(ShortCircuitJumpStep::new(is_or, offset)))?;
        }
        if let Some(depth) = self.upgrade_depth(&[left.id, right.id]) {
            let left = self.builder.take_recursive(left.id)?;
            let right = self.builder.take_recursive(right.id)?;
            self.builder
                .set_recursive(id, Box::new(DirectAndOr::new(left, right, is_or)), depth)?;
        }
        Ok(())
    }

    fn plan_ternary(
        &mut self,
        id: i64,
        condition: &Expr,
        then: &Expr,
        otherwise: &Expr,
    ) -> Result<(), InternalError> {
        self.plan_expr(condition)?;
        if self.options.short_circuiting {
            let branch = self.builder.add_placeholder()?;
            self.plan_expr(then)?;
            let skip = self.builder.add_placeholder()?;
            let else_label = self.builder.current_label()?;
            self.plan_expr(otherwise)?;
            let end = self.builder.current_label()?;
            let else_offset = self.builder.offset(branch, else_label)?;
            let end_offset = self.builder.offset(branch, end)?;
            let skip_offset = self.builder.offset(skip, end)?;
            self.builder.replace_step(
                branch,
                Box::new(TernaryJumpStep::new(else_offset, end_offset)),
            )?;
            self.builder
                .replace_step(skip, Box::new(JumpStep::new(skip_offset)))?;
        } else {
            self.plan_expr(then)?;
            self.plan_expr(otherwise)?;
            self.builder
                .add_step(Box::new(TernaryMergeStep::new(id)))?;
        }
        if let Some(depth) = self.upgrade_depth(&[condition.id, then.id, otherwise.id]) {
            let condition = self.builder.take_recursive(condition.id)?;
            let then = self.builder.take_recursive(then.id)?;
            let otherwise = self.builder.take_recursive(otherwise.id)?;
            self.builder.set_recursive(
                id,
                Box::new(DirectTernary::new(condition, then, otherwise)),
                depth,
            )?;
        }
        Ok(())
    }

    fn plan_index(&mut self, id: i64, operand: &Expr, key: &Expr) -> Result<(), InternalError> {
        self.plan_expr(operand)?;
        self.plan_expr(key)?;
        self.builder
            .add_step(Box::new(ContainerAccessStep::new(id)))?;
        if let Some(depth) = self.upgrade_depth(&[operand.id, key.id]) {
            let operand = self.builder.take_recursive(operand.id)?;
            let key = self.builder.take_recursive(key.id)?;
            self.builder.set_recursive(
                id,
                Box::new(DirectContainerAccess::new(operand, key)),
                depth,
            )?;
        }
        Ok(())
    }

    fn plan_list(&mut self, id: i64, elements: &[Expr]) -> Result<(), InternalError> {
        let mut child_ids = Vec::with_capacity(elements.len());
        for element in elements {
            self.plan_expr(element)?;
            child_ids.push(element.id);
        }
        self.builder
            .add_step(Box::new(CreateListStep::new(elements.len(), id)))?;
        if let Some(depth) = self.upgrade_depth(&child_ids) {
            let elements = self.take_children(&child_ids)?;
            self.builder
                .set_recursive(id, Box::new(DirectCreateList::new(elements)), depth)?;
        }
        Ok(())
    }

    fn plan_map(&mut self, id: i64, entries: &[(Expr, Expr)]) -> Result<(), InternalError> {
        let mut child_ids = Vec::with_capacity(entries.len() * 2);
        for (key, value) in entries {
            self.plan_expr(key)?;
            child_ids.push(key.id);
            self.plan_expr(value)?;
            child_ids.push(value.id);
        }
        self.builder
            .add_step(Box::new(CreateMapStep::new(entries.len(), id)))?;
        if let Some(depth) = self.upgrade_depth(&child_ids) {
            let entries = self.take_children(&child_ids)?;
            self.builder
                .set_recursive(id, Box::new(DirectCreateMap::new(entries)), depth)?;
        }
        Ok(())
    }

    fn plan_struct(
        &mut self,
        id: i64,
        type_name: &str,
        fields: &[(String, Expr)],
    ) -> Result<(), InternalError> {
        let names: Vec<&'a str> = fields
            .iter()
            .map(|(name, _)| &*self.arena.alloc_str(name))
            .collect();
        let field_names: &'a [&'a str] = self.arena.alloc_slice_copy(&names);
        let type_name: &'a str = self.arena.alloc_str(type_name);
        let mut child_ids = Vec::with_capacity(fields.len());
        for (_, value) in fields {
            self.plan_expr(value)?;
            child_ids.push(value.id);
        }
        self.builder.add_step(Box::new(CreateStructStep::new(
            self.type_factory,
            type_name,
            field_names,
            id,
        )))?;
        if let Some(depth) = self.upgrade_depth(&child_ids) {
            let fields = self.take_children(&child_ids)?;
            self.builder.set_recursive(
                id,
                Box::new(DirectCreateStruct::new(
                    self.type_factory,
                    type_name,
                    field_names,
                    fields,
                )),
                depth,
            )?;
        }
        Ok(())
    }

    fn plan_comprehension(&mut self, id: i64, c: &Comprehension) -> Result<(), InternalError> {
        if c.is_bind() {
            self.plan_bind(id, c)
        } else {
            self.plan_fold(id, c)
        }
    }

    /// Lazily-bound alias: the initializer becomes an extracted subprogram
    /// evaluated on first use, and the body runs with the alias in scope.
    ///
    /// The initializer never runs at its lexical position, so its
    /// comprehension depth is tracked in isolation and charged at each use
    /// site instead.
    fn plan_bind(&mut self, id: i64, c: &Comprehension) -> Result<(), InternalError> {
        let saved_depth = core::mem::replace(&mut self.comprehension_depth, 0);
        let saved_max = core::mem::replace(&mut self.max_comprehension_depth, 0);
        let planned = self.plan_expr(&c.accu_init);
        let initializer_depth = self.max_comprehension_depth;
        self.comprehension_depth = saved_depth;
        self.max_comprehension_depth = saved_max;
        planned?;
        let extraction = self.builder.extract_subexpression(c.accu_init.id)?;
        self.extraction_depths.push(initializer_depth);
        let slot = self.next_slot();
        self.scopes.push(ScopeEntry {
            name: c.accu_var.clone(),
            slot,
            lazy_extraction: Some(extraction),
        });
        let body = self.plan_expr(&c.result);
        self.scopes.pop();
        body?;
        self.builder.add_step(Box::new(ClearSlotStep::new(slot)))?;
        if self.builder.extracted_is_recursive(extraction)?
            && let Some(depth) = self.upgrade_depth(&[c.result.id])
        {
            let body = self.builder.take_recursive(c.result.id)?;
            self.builder
                .set_recursive(id, Box::new(DirectBind::new(slot, body)), depth)?;
        }
        Ok(())
    }

    fn plan_fold(&mut self, id: i64, c: &Comprehension) -> Result<(), InternalError> {
        self.comprehension_depth += 1;
        self.max_comprehension_depth = self.max_comprehension_depth.max(self.comprehension_depth);
        let outcome = self.plan_fold_inner(id, c);
        self.comprehension_depth -= 1;
        outcome
    }

    fn plan_fold_inner(&mut self, id: i64, c: &Comprehension) -> Result<(), InternalError> {
        self.plan_expr(&c.iter_range)?;
        let init = self.builder.add_placeholder()?;
        self.plan_expr(&c.accu_init)?;
        let iter_slot = self.next_slot();
        let accu_slot = self.next_slot();
        self.builder
            .add_step(Box::new(AccuInitStep::new(accu_slot)))?;
        self.scopes.push(ScopeEntry {
            name: c.accu_var.clone(),
            slot: accu_slot,
            lazy_extraction: None,
        });
        self.scopes.push(ScopeEntry {
            name: c.iter_var.clone(),
            slot: iter_slot,
            lazy_extraction: None,
        });
        let plan_loop = (|| {
            let loop_start = self.builder.current_label()?;
            let next = self.builder.add_placeholder()?;
            self.plan_expr(&c.loop_condition)?;
            let cond = self.builder.add_placeholder()?;
            self.plan_expr(&c.loop_step)?;
            let update = self.builder.add_placeholder()?;
            let finish = self.builder.current_label()?;
            Ok::<_, InternalError>((loop_start, next, cond, update, finish))
        })();
        self.scopes.pop();
        let (loop_start, next, cond, update, finish) = match plan_loop {
            Ok(handles) => handles,
            Err(e) => {
                self.scopes.pop();
                return Err(e);
            }
        };
        let result = self.plan_expr(&c.result);
        self.scopes.pop();
        result?;
        self.builder.add_step(Box::new(ComprehensionFinishStep::new(
            iter_slot, accu_slot, id,
        )))?;
        let end = self.builder.current_label()?;
        let init_to_end = self.builder.offset(init, end)?;
        let next_to_finish = self.builder.offset(next, finish)?;
        let cond_to_finish = self.builder.offset(cond, finish)?;
        let cond_to_end = self.builder.offset(cond, end)?;
        let update_to_start = self.builder.offset(update, loop_start)?;
        self.builder
            .replace_step(init, Box::new(ComprehensionInitStep::new(init_to_end)))?;
        self.builder.replace_step(
            next,
            Box::new(ComprehensionNextStep::new(iter_slot, next_to_finish)),
        )?;
        self.builder.replace_step(
            cond,
            Box::new(ComprehensionCondStep::new(
                iter_slot,
                accu_slot,
                cond_to_finish,
                cond_to_end,
            )),
        )?;
        self.builder.replace_step(
            update,
            Box::new(ComprehensionUpdateStep::new(accu_slot, update_to_start)),
        )?;
        let child_ids = [
            c.iter_range.id,
            c.accu_init.id,
            c.loop_condition.id,
            c.loop_step.id,
            c.result.id,
        ];
        if let Some(depth) = self.upgrade_depth(&child_ids) {
            let range = self.builder.take_recursive(c.iter_range.id)?;
            let accu_init = self.builder.take_recursive(c.accu_init.id)?;
            let condition = self.builder.take_recursive(c.loop_condition.id)?;
            let step = self.builder.take_recursive(c.loop_step.id)?;
            let result = self.builder.take_recursive(c.result.id)?;
            self.builder.set_recursive(
                id,
                Box::new(DirectComprehension::new(
                    range, accu_init, condition, step, result, iter_slot, accu_slot,
                )),
                depth,
            )?;
        }
        Ok(())
    }
}
