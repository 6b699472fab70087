//! Serializer and driver traits, and how a model picks its serializer.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;

use crate::stack::Matching;
use crate::{Error, Format, Settings, Value};

/// Encodes a model state and decodes a payload back into a raw state.
///
/// Implementations are format-specific; the core only ever hands them a
/// [`Value`] and the effective settings of the call.
///
/// # Object Safety
///
/// This trait is object-safe: serializers travel as `Arc<dyn Serializer>`.
pub trait Serializer: Send + Sync {
    /// Encode `state` (a `Value::Map` of field name to value).
    fn dump(&self, state: &Value, settings: &Settings) -> Result<Bytes, Error>;

    /// Decode `payload` into a raw state (a sequence or a mapping).
    fn load(&self, payload: &Bytes, settings: &Settings) -> Result<Value, Error>;

    /// A serializer scoped to the sub-part called `name`.
    ///
    /// `default` carries the defaults of that sub-part, and `settings` are
    /// layered over whatever this serializer was configured with.
    fn get_dependency(
        &self,
        name: &str,
        default: Option<&Value>,
        settings: &Settings,
    ) -> Result<Arc<dyn Serializer>, Error>;
}

/// Everything a driver needs to know to build a serializer for one model.
#[derive(Clone, Debug)]
pub struct ModelContext {
    pub name: String,
    /// The model's applicable components, in stack order.
    pub components: Matching,
    /// Instance-level defaults, keyed by field name.
    pub defaults: BTreeMap<String, Value>,
}

impl ModelContext {
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.components.iter().map(|(name, _)| name.as_str())
    }
}

/// A codec family, selecting serializers for models.
pub trait Driver: Send + Sync {
    fn format(&self) -> Format;

    fn lookup_model_serializer(
        &self,
        model: &ModelContext,
        settings: &Settings,
    ) -> Result<Arc<dyn Serializer>, Error>;
}

/// What `dump`/`load` were asked to go through.
#[derive(Clone)]
pub enum Target<'a> {
    /// Look a serializer up through the driver.
    Driver(&'a dyn Driver),
    /// Use this serializer, scoped to the model via `get_dependency`.
    Serializer(Arc<dyn Serializer>),
}

impl<'a, D: Driver> From<&'a D> for Target<'a> {
    fn from(driver: &'a D) -> Self {
        Target::Driver(driver)
    }
}

impl From<Arc<dyn Serializer>> for Target<'_> {
    fn from(serializer: Arc<dyn Serializer>) -> Self {
        Target::Serializer(serializer)
    }
}

impl From<&Arc<dyn Serializer>> for Target<'_> {
    fn from(serializer: &Arc<dyn Serializer>) -> Self {
        Target::Serializer(Arc::clone(serializer))
    }
}

/// Pick the serializer a model should use for `target`.
pub fn resolve_serializer(
    target: Target<'_>,
    model: &ModelContext,
    settings: &Settings,
) -> Result<Arc<dyn Serializer>, Error> {
    match target {
        Target::Driver(driver) => {
            log::debug!(
                "resolving {} serializer for model {:?} ({} components)",
                driver.format(),
                model.name,
                model.components.len()
            );
            driver.lookup_model_serializer(model, settings)
        }
        Target::Serializer(serializer) => {
            let defaults = Value::Map(model.defaults.clone());
            serializer.get_dependency(&model.name, Some(&defaults), settings)
        }
    }
}
