//! The call protocol shared by static and lazy call steps, and by both
//! evaluation strategies.

use bumpalo::Bump;

use crate::{
    attributes::{AttributeTrail, AttributeUtility, UnknownAccumulator},
    errors::InternalError,
    functions::FunctionOverload,
    values::{Unknown, Value},
};

/// Identity of one call expression.
#[derive(Debug, Clone, Copy)]
pub struct CallSite<'a> {
    pub function: &'a str,
    pub expr_id: i64,
    pub receiver_style: bool,
}

/// Where a call's candidate overloads come from.
///
/// Static candidates were bound at plan time from the registry; lazy
/// candidates were just fetched from the activation, already narrowed by
/// name and call style.
pub enum OverloadCandidates<'f> {
    Static(&'f [FunctionOverload]),
    Lazy(&'f [&'f FunctionOverload]),
}

impl<'f> OverloadCandidates<'f> {
    fn len(&self) -> usize {
        match self {
            OverloadCandidates::Static(s) => s.len(),
            OverloadCandidates::Lazy(s) => s.len(),
        }
    }

    fn get(&self, index: usize) -> &'f FunctionOverload {
        match self {
            OverloadCandidates::Static(s) => &s[index],
            OverloadCandidates::Lazy(s) => s[index],
        }
    }
}

/// Resolve and invoke one call.
///
/// The protocol, in order:
///
/// 1. Every argument whose trail matches a declared unknown pattern (exact
///    or partial) is replaced by a synthesized unknown, even for non-strict
///    overloads.
/// 2. Candidates are filtered by argument-kind match; a second match over
///    clean arguments is [`InternalError::AmbiguousOverloads`], while a
///    second match caused by error or unknown arguments (which match any
///    kind) drops to the no-overload path.
/// 3. A non-strict overload is always invoked; a strict one only when no
///    argument is an error or unknown.
/// 4. Otherwise the no-overload path applies: merged unknowns first (when
///    unknown processing is enabled), then the first error argument
///    verbatim, then a "no matching overload" error naming the call's
///    argument kinds.
/// 5. A result flagged as an unknown function result becomes a synthesized
///    unknown carrying the call's name and expression id.
pub fn evaluate_call<'f, 'a>(
    arena: &'a Bump,
    site: &CallSite<'a>,
    candidates: &OverloadCandidates<'f>,
    args: &mut [Value<'a>],
    trails: &[AttributeTrail<'a>],
    utility: &AttributeUtility<'f, 'a>,
    unknown_processing: bool,
) -> Result<Value<'a>, InternalError> {
    debug_assert_eq!(args.len(), trails.len());
    if unknown_processing {
        for (arg, trail) in args.iter_mut().zip(trails.iter()) {
            if let Some(unknown) = utility.unknown_if_matched(trail, true) {
                *arg = unknown;
            }
        }
    }

    // Error and unknown arguments match every declared kind, so a multiple
    // match over dirty arguments is not a planner defect; it falls through
    // to the no-overload path, which forwards the dirty arguments.
    let dirty = args.iter().any(Value::is_error_or_unknown);
    let mut found: Option<&FunctionOverload> = None;
    for i in 0..candidates.len() {
        let candidate = candidates.get(i);
        if candidate.descriptor.matches(site.receiver_style, args) {
            if found.is_some() {
                if !dirty {
                    return Err(InternalError::AmbiguousOverloads {
                        function: site.function.into(),
                    });
                }
                found = None;
                break;
            }
            found = Some(candidate);
        }
    }

    if let Some(overload) = found {
        let strict_rejects =
            overload.descriptor.is_strict() && args.iter().any(Value::is_error_or_unknown);
        if !strict_rejects {
            let result = overload.implementation.invoke(arena, args);
            if let Value::Error(e) = result
                && e.unknown_function_result
            {
                return Ok(Value::unknown(
                    arena,
                    Unknown::from_function_result(arena, site.function, site.expr_id),
                ));
            }
            return Ok(result);
        }
    }

    if unknown_processing {
        let mut accumulator = UnknownAccumulator::new(*utility);
        for (arg, trail) in args.iter().zip(trails.iter()) {
            accumulator.maybe_add(arg, trail);
        }
        if let Some(merged) = accumulator.build() {
            return Ok(merged);
        }
    }
    if let Some(error) = args.iter().find(|a| a.is_error()) {
        return Ok(*error);
    }
    Ok(Value::no_matching_overload(arena, site.function, args))
}
