//! Model schemas: a component stack compiled into a binding table.
//!
//! A schema is compiled exactly once, either from explicit declarations
//! ([`ModelSchema::builder`]) or from the components an existing stack
//! currently matches ([`ModelSchema::from_stack`]). The set of legal
//! attribute names is fixed afterwards.

use std::sync::Arc;

use crate::binding::BindingTable;
use crate::component::{Component, ComponentArg};
use crate::predicate::{Applicability, VersionRange};
use crate::stack::{Matching, Stack};
use crate::{Error, Path, Settings, Value};

/// The compiled, immutable description of a model.
#[derive(Debug)]
pub struct ModelSchema {
    name: String,
    settings: Settings,
    stack: Arc<Stack>,
    bindings: BindingTable,
}

impl ModelSchema {
    /// Start declaring a schema.
    pub fn builder(name: impl Into<String>) -> ModelSchemaBuilder {
        ModelSchemaBuilder {
            name: name.into(),
            settings: Settings::new(),
            predicate: None,
            members: Vec::new(),
        }
    }

    /// A schema with no fields.
    pub fn empty(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            settings: Settings::new(),
            stack: Arc::new(Stack::new()),
            bindings: BindingTable::default(),
        })
    }

    /// Compile a schema from the components `stack` matches under `settings`.
    ///
    /// Used when a model is rebuilt from a stored stack definition rather
    /// than from declarations. The stack keeps ownership of its components.
    pub fn from_stack(
        name: impl Into<String>,
        stack: Arc<Stack>,
        settings: Settings,
    ) -> Result<Arc<Self>, Error> {
        let name = name.into();
        let mut bindings = BindingTable::default();
        for (field, component) in stack.get_matching_components(&settings) {
            bindings.bind(&field, component)?;
        }
        log::debug!(
            "loaded schema {:?} from stack: {} of {} components bound",
            name,
            bindings.slot_count(),
            stack.len()
        );
        Ok(Arc::new(Self {
            name,
            settings,
            stack,
            bindings,
        }))
    }

    /// Build a version-aware stack from loose, named components and compile it.
    pub fn from_components<I, C>(
        name: impl Into<String>,
        components: I,
        settings: Settings,
    ) -> Result<Arc<Self>, Error>
    where
        I: IntoIterator<Item = C>,
        C: Into<ComponentArg>,
    {
        let stack = Stack::new();
        for component in components {
            stack.add(component, &settings, None)?;
        }
        Self::from_stack(name, Arc::new(stack), settings)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn stack(&self) -> &Arc<Stack> {
        &self.stack
    }

    pub fn bindings(&self) -> &BindingTable {
        &self.bindings
    }

    /// Components applicable under the schema settings layered with `settings`.
    pub fn suitable_components(&self, settings: &Settings) -> Matching {
        self.stack
            .get_matching_components(&self.settings.merged(settings))
    }
}

enum Member {
    Field(String, ComponentArg),
    Alias(String, String),
}

/// Declares the members of a [`ModelSchema`].
///
/// ```rust
/// use modelcast_core::{Component, ModelSchema};
///
/// let id = Component::integer().with_default(0).shared();
/// let schema = ModelSchema::builder("user")
///     .field("id", &id)
///     .field("user_id", &id) // same component: becomes an alias of `id`
///     .field("name", Component::string().since(2))
///     .build()
///     .unwrap();
///
/// assert!(schema.bindings().get("user_id").unwrap().is_alias());
/// ```
pub struct ModelSchemaBuilder {
    name: String,
    settings: Settings,
    predicate: Option<Box<dyn Applicability>>,
    members: Vec<Member>,
}

impl ModelSchemaBuilder {
    #[must_use]
    pub fn setting(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.settings.insert(key, value);
        self
    }

    #[must_use]
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = self.settings.merged(&settings);
        self
    }

    /// Replace the default version-range rule of the schema's stack.
    #[must_use]
    pub fn predicate(mut self, predicate: impl Applicability + 'static) -> Self {
        self.predicate = Some(Box::new(predicate));
        self
    }

    /// Declare an attribute backed by `component`.
    ///
    /// Declaring the same built component (by identity) under a second name
    /// makes the second name an alias of the first.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, component: impl Into<ComponentArg>) -> Self {
        self.members
            .push(Member::Field(name.into(), component.into()));
        self
    }

    /// Declare a nested model attribute.
    #[must_use]
    pub fn nested(self, name: impl Into<String>, schema: &Arc<ModelSchema>) -> Self {
        self.field(name, ComponentArg::Model(Arc::clone(schema)))
    }

    /// Expose an existing attribute under another name.
    #[must_use]
    pub fn alias(mut self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.members.push(Member::Alias(name.into(), target.into()));
        self
    }

    /// Compile the declarations into a stack and binding table.
    pub fn build(self) -> Result<Arc<ModelSchema>, Error> {
        let stack = match self.predicate {
            Some(predicate) => Stack::with_boxed_predicate(predicate),
            None => Stack::with_predicate(VersionRange::new()),
        };
        let mut bindings = BindingTable::default();
        let mut seen: Vec<(*const Component, String)> = Vec::new();

        for member in self.members {
            match member {
                Member::Field(attribute, component) => {
                    Path::validate_name(&attribute)?;
                    let identity = component.identity();
                    if let Some((_, primary)) = seen
                        .iter()
                        .find(|(ptr, _)| identity == Some(*ptr))
                    {
                        bindings.alias(&attribute, primary)?;
                        continue;
                    }

                    let component = stack.add(component, &self.settings, Some(&attribute))?;
                    let name = component.name().unwrap_or(&attribute).to_string();
                    bindings.bind(&name, Arc::clone(&component))?;
                    if name != attribute {
                        bindings.alias(&attribute, &name)?;
                    }
                    if let Some(ptr) = identity {
                        seen.push((ptr, name));
                    }
                }
                Member::Alias(alias, target) => {
                    Path::validate_name(&alias)?;
                    bindings.alias(&alias, &target)?;
                }
            }
        }

        log::debug!(
            "compiled schema {:?}: {} fields, {} aliases",
            self.name,
            bindings.slot_count(),
            bindings.iter().filter(|b| b.is_alias()).count()
        );

        Ok(Arc::new(ModelSchema {
            name: self.name,
            settings: self.settings,
            stack: Arc::new(stack),
            bindings,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::Binding;
    use crate::predicate::FlagPredicate;
    use crate::settings::VERSION_KEY;
    use crate::ValueKind;

    #[test]
    fn builder_binds_fields_in_declaration_order() {
        let schema = ModelSchema::builder("point")
            .field("x", ValueKind::Integer)
            .field("y", ValueKind::Integer)
            .build()
            .unwrap();

        let names: Vec<_> = schema.bindings().primaries().map(|b| b.name()).collect();
        assert_eq!(names, ["x", "y"]);
        assert_eq!(schema.stack().len(), 2);
    }

    #[test]
    fn repeated_component_becomes_alias() {
        let id = Component::integer().shared();
        let schema = ModelSchema::builder("user")
            .field("id", &id)
            .field("user_id", &id)
            .build()
            .unwrap();

        assert_eq!(schema.stack().len(), 1);
        assert_eq!(schema.bindings().slot_count(), 1);
        match schema.bindings().get("user_id").unwrap() {
            Binding::Alias(alias) => assert_eq!(alias.primary(), "id"),
            other => panic!("unexpected binding: {other:?}"),
        }
    }

    #[test]
    fn explicit_component_name_wins_and_attribute_aliases_it() {
        let schema = ModelSchema::builder("user")
            .field("attr", Component::string().named("title"))
            .build()
            .unwrap();

        assert_eq!(schema.bindings().resolve("attr").unwrap().name(), "title");
        assert!(!schema.bindings().get("title").unwrap().is_alias());
    }

    #[test]
    fn explicit_alias_and_cycle() {
        let schema = ModelSchema::builder("user")
            .field("id", ValueKind::Integer)
            .alias("key", "id")
            .build()
            .unwrap();
        assert_eq!(schema.bindings().resolve("key").unwrap().name(), "id");

        let err = ModelSchema::builder("user")
            .alias("a", "a")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::AliasCycle { .. }));
    }

    #[test]
    fn invalid_attribute_name_fails_fast() {
        let err = ModelSchema::builder("user")
            .field("not valid", ValueKind::Integer)
            .build()
            .unwrap_err();
        assert!(err.is_construction());
    }

    #[test]
    fn exclusive_component_cannot_join_two_schemas() {
        let id = Component::integer().exclusive().shared();
        let _first = ModelSchema::builder("a").field("id", &id).build().unwrap();
        let err = ModelSchema::builder("b").field("id", &id).build().unwrap_err();
        assert!(matches!(err, Error::AlreadyOwned { .. }));
    }

    #[test]
    fn from_stack_binds_only_matching_components() {
        let stack = Arc::new(Stack::new());
        stack.push(Component::integer().named("id")).unwrap();
        stack.push(Component::string().named("name").since(2)).unwrap();

        let v1 = ModelSchema::from_stack("v1", Arc::clone(&stack), Settings::new().with(VERSION_KEY, 1))
            .unwrap();
        let v2 = ModelSchema::from_stack("v2", Arc::clone(&stack), Settings::new().with(VERSION_KEY, 2))
            .unwrap();

        assert!(!v1.bindings().contains("name"));
        assert!(v2.bindings().contains("name"));
        assert_eq!(stack.len(), 2);
    }

    #[test]
    fn from_components_requires_names() {
        let schema = ModelSchema::from_components(
            "loose",
            [Component::integer().named("a"), Component::string().named("b")],
            Settings::new(),
        )
        .unwrap();
        assert_eq!(schema.bindings().slot_count(), 2);

        let err = ModelSchema::from_components("loose", [Component::integer()], Settings::new())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidName(_)));
    }

    #[test]
    fn custom_predicate_drives_suitable_components() {
        let schema = ModelSchema::builder("flags")
            .predicate(FlagPredicate)
            .field("id", ValueKind::Integer)
            .field("trace", Component::string().flag("debug"))
            .build()
            .unwrap();

        assert_eq!(schema.suitable_components(&Settings::new()).len(), 1);
        assert_eq!(
            schema
                .suitable_components(&Settings::new().with("debug", true))
                .len(),
            2
        );
    }
}
