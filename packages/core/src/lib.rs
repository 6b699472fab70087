//! Core modelcast: versioned, composable data models
//!
//! This layer describes a model as a stack of components and gives each
//! model instance its own storage behind compiled slot bindings:
//! - `Component`: a named leaf or nested-model field with version bounds
//! - `Stack`: ordered, lock-protected components filtered by an applicability rule
//! - `ModelSchema`: a stack compiled once into a binding table (with aliases)
//! - `Model`: an instance with `get_state`/`set_state`/`dump`/`load`
//! - `Serializer`/`Driver`: the boundary to concrete wire formats
//! - `Feature`/`Capability`: composable serializer behavior
//!
//! The core never depends on a concrete wire format; see `modelcast-serde`
//! for JSON.
//!
//! # Example
//!
//! ```rust
//! use modelcast_core::{Component, Model, ModelSchema, Settings, Value, VERSION_KEY};
//!
//! let schema = ModelSchema::builder("user")
//!     .field("id", Component::integer().with_default(0))
//!     .field("name", Component::string().since(2))
//!     .build()
//!     .unwrap();
//!
//! let mut user = Model::new(schema);
//! user.set("name", "ann").unwrap();
//!
//! let v1 = user.get_state(None, &Settings::new().with(VERSION_KEY, 1)).unwrap();
//! assert_eq!(v1.len(), 1);
//! ```

pub use bytes::Bytes;

mod binding;
pub mod capability;
mod component;
mod error;
mod feature;
mod format;
mod model;
mod path;
pub mod predicate;
mod schema;
mod serializer;
mod settings;
mod stack;
mod state;
mod value;

pub use binding::{AliasBinding, Binding, BindingTable, PrimaryBinding, Read, Write};
pub use capability::{Capability, CapabilityRegistry, ComposedSerializer, Composition, FeatureTable};
pub use component::{Component, ComponentArg, ComponentKind};
pub use error::Error;
pub use feature::{Feature, FeatureAction, FeatureBuilder, Hook};
pub use format::Format;
pub use model::{Model, ModelOptions};
pub use path::{Path, PathError};
pub use predicate::{AllOf, Always, Applicability, FlagPredicate, VersionRange};
pub use schema::{ModelSchema, ModelSchemaBuilder};
pub use serializer::{resolve_serializer, Driver, ModelContext, Serializer, Target};
pub use settings::{Settings, VERSION_KEY};
pub use stack::{Matching, Stack};
pub use state::{RawState, State};
pub use value::{Value, ValueKind};
