pub mod map;
pub mod structs;
pub mod unknown;
pub mod value;
pub use map::MapValue;
pub use structs::{OptionalValue, RecordFactory, StructBuilder, StructValue, TypeFactory};
pub use unknown::{FunctionResult, Unknown};
pub use value::{ErrorValue, Kind, OverloadValue, Value};

#[cfg(test)]
mod value_test;
