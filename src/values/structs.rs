use bumpalo::Bump;
use ecow::EcoString;

use crate::{Box, Vec, format, values::Value};

/// A constructed record: a type name plus named fields in declaration order.
#[derive(Debug, Clone, Copy)]
pub struct StructValue<'a> {
    pub type_name: &'a str,
    pub fields: &'a [(&'a str, Value<'a>)],
}

impl<'a> StructValue<'a> {
    pub fn field(&self, name: &str) -> Option<Value<'a>> {
        self.fields
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| *v)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|(n, _)| *n == name)
    }
}

/// An optional value: engaged with a payload, or empty.
#[derive(Debug, Clone, Copy)]
pub struct OptionalValue<'a> {
    pub value: Option<Value<'a>>,
}

impl<'a> OptionalValue<'a> {
    pub fn of(arena: &'a Bump, value: Value<'a>) -> Value<'a> {
        Value::Optional(arena.alloc(OptionalValue { value: Some(value) }))
    }

    pub fn none(arena: &'a Bump) -> Value<'a> {
        Value::Optional(arena.alloc(OptionalValue { value: None }))
    }
}

/// Incremental construction of one struct value.
///
/// Field-level failures are messages, not values; the construction step
/// turns them into error values with the evaluation arena it holds.
pub trait StructBuilder<'a> {
    fn set_field_by_name(&mut self, name: &str, value: Value<'a>) -> Result<(), EcoString>;
    fn build(self: Box<Self>) -> Result<Value<'a>, EcoString>;
}

/// Resolves struct type names to builders. Consulted only by
/// struct-construction steps; `None` means the type name is not known to
/// this factory.
pub trait TypeFactory<'a>: Send + Sync {
    fn new_builder(
        &self,
        arena: &'a Bump,
        type_name: &str,
    ) -> Option<Box<dyn StructBuilder<'a> + 'a>>;
}

/// Factory accepting every type name and building plain [`StructValue`]s.
#[derive(Debug, Default)]
pub struct RecordFactory;

impl<'a> TypeFactory<'a> for RecordFactory {
    fn new_builder(
        &self,
        arena: &'a Bump,
        type_name: &str,
    ) -> Option<Box<dyn StructBuilder<'a> + 'a>> {
        Some(Box::new(RecordBuilder {
            arena,
            type_name: arena.alloc_str(type_name),
            fields: Vec::new(),
        }))
    }
}

struct RecordBuilder<'a> {
    arena: &'a Bump,
    type_name: &'a str,
    fields: Vec<(&'a str, Value<'a>)>,
}

impl<'a> StructBuilder<'a> for RecordBuilder<'a> {
    fn set_field_by_name(&mut self, name: &str, value: Value<'a>) -> Result<(), EcoString> {
        if self.fields.iter().any(|(n, _)| *n == name) {
            return Err(format!("duplicate field '{name}' in {}", self.type_name).into());
        }
        self.fields.push((self.arena.alloc_str(name), value));
        Ok(())
    }

    fn build(self: Box<Self>) -> Result<Value<'a>, EcoString> {
        let fields = self.arena.alloc_slice_copy(&self.fields);
        Ok(Value::Struct(self.arena.alloc(StructValue {
            type_name: self.type_name,
            fields,
        })))
    }
}
