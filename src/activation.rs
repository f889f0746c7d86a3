//! The variable environment an evaluation runs against.

use bumpalo::Bump;
use ecow::EcoString;
use hashbrown::HashMap;

use crate::{
    Vec,
    attributes::AttributePattern,
    errors::InternalError,
    functions::FunctionOverload,
    values::Value,
};

/// Host-supplied bindings consumed during one evaluation.
///
/// Variable and overload lookups may fail with an [`InternalError`] when the
/// host's own storage misbehaves; an absent binding is `Ok(None)` / an empty
/// list, not an error. The pattern lists must stay valid for the
/// evaluation's duration.
pub trait Activation<'a> {
    /// Resolve a variable. The arena is available for implementations that
    /// materialize values on lookup.
    fn find_variable(
        &self,
        arena: &'a Bump,
        name: &str,
    ) -> Result<Option<Value<'a>>, InternalError>;

    /// Overloads for a lazily-bound function name.
    fn find_function_overloads(
        &self,
        name: &str,
    ) -> Result<Vec<&FunctionOverload>, InternalError>;

    /// Attributes declared unknown for this evaluation.
    fn unknown_attribute_patterns(&self) -> &[AttributePattern];

    /// Attributes declared missing for this evaluation.
    fn missing_attribute_patterns(&self) -> &[AttributePattern];
}

/// Map-backed activation for production and test use.
#[derive(Default)]
pub struct SimpleActivation<'a> {
    variables: HashMap<EcoString, Value<'a>>,
    functions: HashMap<EcoString, Vec<FunctionOverload>>,
    unknown_patterns: Vec<AttributePattern>,
    missing_patterns: Vec<AttributePattern>,
}

impl<'a> SimpleActivation<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_variable(&mut self, name: impl Into<EcoString>, value: Value<'a>) -> &mut Self {
        self.variables.insert(name.into(), value);
        self
    }

    pub fn add_function(
        &mut self,
        name: impl Into<EcoString>,
        overload: FunctionOverload,
    ) -> &mut Self {
        self.functions.entry(name.into()).or_default().push(overload);
        self
    }

    pub fn mark_unknown(&mut self, pattern: AttributePattern) -> &mut Self {
        self.unknown_patterns.push(pattern);
        self
    }

    pub fn mark_missing(&mut self, pattern: AttributePattern) -> &mut Self {
        self.missing_patterns.push(pattern);
        self
    }
}

impl<'a> Activation<'a> for SimpleActivation<'a> {
    fn find_variable(
        &self,
        _arena: &'a Bump,
        name: &str,
    ) -> Result<Option<Value<'a>>, InternalError> {
        Ok(self.variables.get(name).copied())
    }

    fn find_function_overloads(
        &self,
        name: &str,
    ) -> Result<Vec<&FunctionOverload>, InternalError> {
        Ok(self
            .functions
            .get(name)
            .map(|v| v.iter().collect())
            .unwrap_or_default())
    }

    fn unknown_attribute_patterns(&self) -> &[AttributePattern] {
        &self.unknown_patterns
    }

    fn missing_attribute_patterns(&self) -> &[AttributePattern] {
        &self.missing_patterns
    }
}
