//! Serde integration for modelcast
//!
//! This layer connects models to serde and JSON. It adds:
//! - `JsonDriver` / `JsonSerializer`: the JSON wire format for model states
//! - `TypedModel`: read and write model fields as Rust types
//! - `StackDefinition`: component stacks described as JSON, rebuilt into schemas
//! - Value <-> serde conversions
//!
//! # Example
//!
//! ```rust
//! use modelcast_core::{Model, Settings, Value};
//! use modelcast_serde::{Bytes, JsonDriver, StackDefinition};
//!
//! let definition = StackDefinition::from_json_str(r#"{
//!     "name": "user",
//!     "components": [{"kind": "integer", "name": "id", "default": 0}]
//! }"#).unwrap();
//!
//! let mut user = Model::new(definition.build_schema().unwrap());
//! let payload = Bytes::from_static(br#"{"id": 7}"#);
//! user.load(&JsonDriver::new(), &payload, &Settings::new()).unwrap();
//! assert_eq!(user.get("id").unwrap(), Some(Value::Integer(7)));
//! ```

pub use bytes::Bytes;

mod convert;
mod definition;
mod driver;
mod typed;

pub use convert::{coerce, from_value, json_to_value, to_value, value_to_json};
pub use definition::{
    ComponentDefinition, LeafDefinition, NestedDefinition, PredicateDefinition, StackDefinition,
};
pub use driver::{FieldShape, JsonDriver, JsonSerializer, ENVELOPE, PRETTY};
pub use typed::TypedModel;

// Re-export core types for convenience
pub use modelcast_core::{Driver, Error, Format, Model, ModelSchema, Serializer, Settings, Value};
