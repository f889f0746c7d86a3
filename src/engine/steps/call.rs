use smallvec::SmallVec;

use crate::{
    Vec,
    attributes::AttributeTrail,
    engine::frame::{EvaluationContext, ExecutionFrame},
    engine::step::{DirectNode, DirectStep, ExpressionStep},
    errors::InternalError,
    functions::resolver::{CallSite, OverloadCandidates, evaluate_call},
    functions::FunctionOverload,
    values::Value,
};

type Args<'a> = SmallVec<[Value<'a>; 4]>;
type Trails<'a> = SmallVec<[AttributeTrail<'a>; 4]>;

/// Statically-bound call: candidates fixed at plan time.
pub struct CallStep<'a> {
    site: CallSite<'a>,
    overloads: &'a [FunctionOverload],
    arity: usize,
}

impl<'a> CallStep<'a> {
    pub fn new(site: CallSite<'a>, overloads: &'a [FunctionOverload], arity: usize) -> Self {
        CallStep {
            site,
            overloads,
            arity,
        }
    }
}

impl<'a> ExpressionStep<'a> for CallStep<'a> {
    fn evaluate(&self, frame: &mut ExecutionFrame<'_, 'a>) -> Result<(), InternalError> {
        let (values, trails) = frame.stack.top_n(self.arity)?;
        let mut args: Args<'a> = SmallVec::from_slice(values);
        let trails: Trails<'a> = SmallVec::from_slice(trails);
        let utility = frame.ctx.attribute_utility();
        let result = evaluate_call(
            frame.ctx.arena,
            &self.site,
            &OverloadCandidates::Static(self.overloads),
            &mut args,
            &trails,
            &utility,
            frame.ctx.options.unknown_processing,
        )?;
        frame
            .stack
            .pop_and_push(self.arity, result, AttributeTrail::empty())
    }

    fn expr_id(&self) -> Option<i64> {
        Some(self.site.expr_id)
    }
}

/// Lazily-bound call: the activation supplies the candidates at evaluation
/// time.
pub struct LazyCallStep<'a> {
    site: CallSite<'a>,
    arity: usize,
}

impl<'a> LazyCallStep<'a> {
    pub fn new(site: CallSite<'a>, arity: usize) -> Self {
        LazyCallStep { site, arity }
    }
}

impl<'a> ExpressionStep<'a> for LazyCallStep<'a> {
    fn evaluate(&self, frame: &mut ExecutionFrame<'_, 'a>) -> Result<(), InternalError> {
        let (values, trails) = frame.stack.top_n(self.arity)?;
        let mut args: Args<'a> = SmallVec::from_slice(values);
        let trails: Trails<'a> = SmallVec::from_slice(trails);
        let candidates = frame
            .ctx
            .activation
            .find_function_overloads(self.site.function)?;
        let utility = frame.ctx.attribute_utility();
        let result = evaluate_call(
            frame.ctx.arena,
            &self.site,
            &OverloadCandidates::Lazy(&candidates),
            &mut args,
            &trails,
            &utility,
            frame.ctx.options.unknown_processing,
        )?;
        frame
            .stack
            .pop_and_push(self.arity, result, AttributeTrail::empty())
    }

    fn expr_id(&self) -> Option<i64> {
        Some(self.site.expr_id)
    }
}

fn evaluate_arguments<'a>(
    ctx: &mut EvaluationContext<'_, 'a>,
    children: &[DirectNode<'a>],
) -> Result<(Args<'a>, Trails<'a>), InternalError> {
    let mut args = SmallVec::with_capacity(children.len());
    let mut trails = SmallVec::with_capacity(children.len());
    for child in children {
        let (value, trail) = child.evaluate(ctx)?;
        args.push(value);
        trails.push(trail);
    }
    Ok((args, trails))
}

pub struct DirectCall<'a> {
    site: CallSite<'a>,
    overloads: &'a [FunctionOverload],
    arguments: Vec<DirectNode<'a>>,
}

impl<'a> DirectCall<'a> {
    pub fn new(
        site: CallSite<'a>,
        overloads: &'a [FunctionOverload],
        arguments: Vec<DirectNode<'a>>,
    ) -> Self {
        DirectCall {
            site,
            overloads,
            arguments,
        }
    }
}

impl<'a> DirectStep<'a> for DirectCall<'a> {
    fn evaluate(
        &self,
        ctx: &mut EvaluationContext<'_, 'a>,
    ) -> Result<(Value<'a>, AttributeTrail<'a>), InternalError> {
        let (mut args, trails) = evaluate_arguments(ctx, &self.arguments)?;
        let utility = ctx.attribute_utility();
        let result = evaluate_call(
            ctx.arena,
            &self.site,
            &OverloadCandidates::Static(self.overloads),
            &mut args,
            &trails,
            &utility,
            ctx.options.unknown_processing,
        )?;
        Ok((result, AttributeTrail::empty()))
    }
}

pub struct DirectLazyCall<'a> {
    site: CallSite<'a>,
    arguments: Vec<DirectNode<'a>>,
}

impl<'a> DirectLazyCall<'a> {
    pub fn new(site: CallSite<'a>, arguments: Vec<DirectNode<'a>>) -> Self {
        DirectLazyCall { site, arguments }
    }
}

impl<'a> DirectStep<'a> for DirectLazyCall<'a> {
    fn evaluate(
        &self,
        ctx: &mut EvaluationContext<'_, 'a>,
    ) -> Result<(Value<'a>, AttributeTrail<'a>), InternalError> {
        let (mut args, trails) = evaluate_arguments(ctx, &self.arguments)?;
        let candidates = ctx.activation.find_function_overloads(self.site.function)?;
        let utility = ctx.attribute_utility();
        let result = evaluate_call(
            ctx.arena,
            &self.site,
            &OverloadCandidates::Lazy(&candidates),
            &mut args,
            &trails,
            &utility,
            ctx.options.unknown_processing,
        )?;
        Ok((result, AttributeTrail::empty()))
    }
}
