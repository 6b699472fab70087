//! modelcast: versioned data models over component stacks.
//!
//! A model is declared once as a stack of components, each with optional
//! version bounds, and then dumped or loaded through any driver. Fields that
//! do not apply to the requested version are left out of the state.
//!
//! - `modelcast_core`: components, stacks, schemas, models, features
//! - `modelcast_serde`: JSON driver, typed access, stack definitions

pub use modelcast_core;
pub use modelcast_serde;

pub use modelcast_core::{
    path, Always, Applicability, Bytes, Capability, CapabilityRegistry, Component, ComponentArg,
    ComposedSerializer, Composition, Driver, Error, Feature, FlagPredicate, Format, Model,
    ModelOptions, ModelSchema, Path, RawState, Read, Serializer, Settings, Stack, State, Value,
    ValueKind, VersionRange, Write, VERSION_KEY,
};
pub use modelcast_serde::{JsonDriver, JsonSerializer, StackDefinition, TypedModel};
