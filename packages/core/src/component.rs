//! Components: the declared fields of a schema.
//!
//! A component is either a leaf (a typed value slot) or a reference to a
//! nested [`ModelSchema`]. Components are shared as `Arc<Component>`; the
//! identity of that `Arc` is what alias discovery keys on.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use crate::schema::ModelSchema;
use crate::{Error, Path, PathError, Value, ValueKind};

/// What a component stores.
#[derive(Clone)]
pub enum ComponentKind {
    /// A single value of the given kind.
    Leaf(ValueKind),
    /// A nested model compiled from its own schema.
    Model(Arc<ModelSchema>),
}

impl fmt::Debug for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentKind::Leaf(kind) => f.debug_tuple("Leaf").field(kind).finish(),
            ComponentKind::Model(schema) => f.debug_tuple("Model").field(&schema.name()).finish(),
        }
    }
}

/// A named, typed field with version applicability bounds.
pub struct Component {
    name: OnceLock<String>,
    kind: ComponentKind,
    default: Option<Value>,
    since_version: Option<i64>,
    until_version: Option<i64>,
    flags: Vec<String>,
    copyable: bool,
    owned: AtomicBool,
}

impl Component {
    /// A leaf component holding a value of `kind`.
    pub fn leaf(kind: ValueKind) -> Self {
        Self {
            name: OnceLock::new(),
            kind: ComponentKind::Leaf(kind),
            default: None,
            since_version: None,
            until_version: None,
            flags: Vec::new(),
            copyable: true,
            owned: AtomicBool::new(false),
        }
    }

    /// A component referring to a nested model.
    pub fn model(schema: Arc<ModelSchema>) -> Self {
        Self {
            kind: ComponentKind::Model(schema),
            ..Self::leaf(ValueKind::Any)
        }
    }

    pub fn any() -> Self {
        Self::leaf(ValueKind::Any)
    }

    pub fn boolean() -> Self {
        Self::leaf(ValueKind::Bool)
    }

    pub fn integer() -> Self {
        Self::leaf(ValueKind::Integer)
    }

    pub fn float() -> Self {
        Self::leaf(ValueKind::Float)
    }

    pub fn string() -> Self {
        Self::leaf(ValueKind::String)
    }

    pub fn bytes() -> Self {
        Self::leaf(ValueKind::Bytes)
    }

    /// Give the component an explicit name.
    ///
    /// Stacks only assign their `default_name` to unnamed components.
    #[must_use]
    pub fn named(self, name: impl Into<String>) -> Self {
        let _ = self.name.set(name.into());
        self
    }

    #[must_use]
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// First version (inclusive) in which the component participates.
    #[must_use]
    pub fn since(mut self, version: i64) -> Self {
        self.since_version = Some(version);
        self
    }

    /// Last version (inclusive) in which the component participates.
    #[must_use]
    pub fn until(mut self, version: i64) -> Self {
        self.until_version = Some(version);
        self
    }

    /// Require a feature flag for the component to participate under a flag filter.
    #[must_use]
    pub fn flag(mut self, flag: impl Into<String>) -> Self {
        self.flags.push(flag.into());
        self
    }

    /// Forbid implicit duplication when the component is reused.
    #[must_use]
    pub fn exclusive(mut self) -> Self {
        self.copyable = false;
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.get().map(String::as_str)
    }

    pub fn kind(&self) -> &ComponentKind {
        &self.kind
    }

    /// Human-readable kind, used in error messages.
    pub fn kind_name(&self) -> &str {
        match &self.kind {
            ComponentKind::Leaf(kind) => kind.as_str(),
            ComponentKind::Model(schema) => schema.name(),
        }
    }

    /// The nested schema, for model components.
    pub fn schema(&self) -> Option<&Arc<ModelSchema>> {
        match &self.kind {
            ComponentKind::Model(schema) => Some(schema),
            ComponentKind::Leaf(_) => None,
        }
    }

    pub fn refers_to_model(&self) -> bool {
        matches!(self.kind, ComponentKind::Model(_))
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn since_version(&self) -> Option<i64> {
        self.since_version
    }

    pub fn until_version(&self) -> Option<i64> {
        self.until_version
    }

    pub fn flags(&self) -> &[String] {
        &self.flags
    }

    pub fn is_copyable(&self) -> bool {
        self.copyable
    }

    pub fn is_owned(&self) -> bool {
        self.owned.load(Ordering::Acquire)
    }

    /// An unowned copy carrying the same declaration.
    pub fn duplicate(&self) -> Component {
        let name = OnceLock::new();
        if let Some(existing) = self.name.get() {
            let _ = name.set(existing.clone());
        }
        Component {
            name,
            kind: self.kind.clone(),
            default: self.default.clone(),
            since_version: self.since_version,
            until_version: self.until_version,
            flags: self.flags.clone(),
            copyable: self.copyable,
            owned: AtomicBool::new(false),
        }
    }

    /// Assign `name` unless the component already has one.
    pub(crate) fn assign_name(&self, name: Option<&str>) -> Result<&str, Error> {
        if let Some(name) = name {
            if self.name.get().is_none() {
                Path::validate_name(name)?;
            }
            let _ = self.name.set(name.to_string());
        }
        let assigned = self.name().ok_or_else(|| {
            Error::InvalidName(PathError::InvalidPath {
                message: format!("{} component has no name", self.kind_name()),
            })
        })?;
        Path::validate_name(assigned)?;
        Ok(assigned)
    }

    /// Mark the component as owned; `false` if another stack got there first.
    pub(crate) fn claim(&self) -> bool {
        self.owned
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn release(&self) {
        self.owned.store(false, Ordering::Release);
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.name())
            .field("kind", &self.kind)
            .field("default", &self.default)
            .field("since_version", &self.since_version)
            .field("until_version", &self.until_version)
            .field("owned", &self.is_owned())
            .finish()
    }
}

/// Anything a stack can turn into a component.
#[derive(Clone, Debug)]
pub enum ComponentArg {
    /// An already-built component, possibly owned elsewhere.
    Built(Arc<Component>),
    /// A bare kind, instantiated with no default and unbounded versions.
    Kind(ValueKind),
    /// A nested model reference.
    Model(Arc<ModelSchema>),
}

impl ComponentArg {
    /// Identity of a built component, for alias discovery.
    pub(crate) fn identity(&self) -> Option<*const Component> {
        match self {
            ComponentArg::Built(component) => Some(Arc::as_ptr(component)),
            _ => None,
        }
    }
}

impl From<Arc<Component>> for ComponentArg {
    fn from(component: Arc<Component>) -> Self {
        ComponentArg::Built(component)
    }
}

impl From<&Arc<Component>> for ComponentArg {
    fn from(component: &Arc<Component>) -> Self {
        ComponentArg::Built(Arc::clone(component))
    }
}

impl From<Component> for ComponentArg {
    fn from(component: Component) -> Self {
        ComponentArg::Built(Arc::new(component))
    }
}

impl From<ValueKind> for ComponentArg {
    fn from(kind: ValueKind) -> Self {
        ComponentArg::Kind(kind)
    }
}

impl From<Arc<ModelSchema>> for ComponentArg {
    fn from(schema: Arc<ModelSchema>) -> Self {
        ComponentArg::Model(schema)
    }
}

impl From<&Arc<ModelSchema>> for ComponentArg {
    fn from(schema: &Arc<ModelSchema>) -> Self {
        ComponentArg::Model(Arc::clone(schema))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_records_bounds_and_default() {
        let c = Component::integer().named("id").with_default(0).since(2).until(4);
        assert_eq!(c.name(), Some("id"));
        assert_eq!(c.default_value(), Some(&Value::Integer(0)));
        assert_eq!(c.since_version(), Some(2));
        assert_eq!(c.until_version(), Some(4));
        assert_eq!(c.kind_name(), "integer");
        assert!(!c.refers_to_model());
    }

    #[test]
    fn claim_is_exclusive_until_released() {
        let c = Component::string();
        assert!(c.claim());
        assert!(c.is_owned());
        assert!(!c.claim());
        c.release();
        assert!(c.claim());
    }

    #[test]
    fn duplicate_is_unowned_and_keeps_declaration() {
        let c = Component::string().named("title").with_default("x").flag("beta");
        assert!(c.claim());
        let copy = c.duplicate();
        assert!(!copy.is_owned());
        assert_eq!(copy.name(), Some("title"));
        assert_eq!(copy.default_value(), Some(&Value::from("x")));
        assert_eq!(copy.flags(), ["beta".to_string()]);
    }

    #[test]
    fn assign_name_keeps_an_explicit_name() {
        let c = Component::integer().named("explicit");
        assert_eq!(c.assign_name(Some("attribute")).unwrap(), "explicit");
    }

    #[test]
    fn assign_name_rejects_non_identifiers() {
        let c = Component::integer();
        let err = c.assign_name(Some("not a name")).unwrap_err();
        assert!(err.is_construction());
        assert_eq!(c.name(), None);
    }

    #[test]
    fn unnamed_component_without_default_name_fails() {
        let c = Component::integer();
        assert!(matches!(c.assign_name(None), Err(Error::InvalidName(_))));
    }

    #[test]
    fn arg_identity_only_for_built_components() {
        let c = Component::any().shared();
        let arg = ComponentArg::from(&c);
        assert_eq!(arg.identity(), Some(Arc::as_ptr(&c)));
        assert_eq!(ComponentArg::from(ValueKind::Bool).identity(), None);
    }
}
