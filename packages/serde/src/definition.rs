//! Serialized stack definitions.
//!
//! A [`StackDefinition`] describes a component stack as data, so a model
//! schema can be rebuilt at runtime from JSON (a string, a parsed value, or
//! a file) and exported back from a live stack.
//!
//! ```json
//! {
//!   "name": "user",
//!   "settings": {"version": 2},
//!   "components": [
//!     {"kind": "integer", "name": "id", "default": 0},
//!     {"kind": "string", "name": "name", "since": 2},
//!     {"kind": "model", "name": "address", "model": {"name": "address", "components": []}}
//!   ]
//! }
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use modelcast_core::{
    Always, Component, ComponentKind, Error, FlagPredicate, Format, ModelSchema, Settings, Stack,
    ValueKind, VersionRange,
};
use serde::{Deserialize, Serialize};

use crate::convert::{json_to_value, value_to_json};

/// Which applicability rule the rebuilt stack uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredicateDefinition {
    #[default]
    Version,
    Flags,
    Always,
}

/// Fields shared by every component definition.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LeafDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub exclusive: bool,
}

impl LeafDefinition {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NestedDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<String>,
    pub model: StackDefinition,
}

/// One component, tagged by its kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ComponentDefinition {
    Any(LeafDefinition),
    Bool(LeafDefinition),
    Integer(LeafDefinition),
    Float(LeafDefinition),
    String(LeafDefinition),
    Bytes(LeafDefinition),
    Array(LeafDefinition),
    Map(LeafDefinition),
    Model(NestedDefinition),
}

impl ComponentDefinition {
    pub fn name(&self) -> &str {
        match self {
            ComponentDefinition::Model(nested) => &nested.name,
            ComponentDefinition::Any(leaf)
            | ComponentDefinition::Bool(leaf)
            | ComponentDefinition::Integer(leaf)
            | ComponentDefinition::Float(leaf)
            | ComponentDefinition::String(leaf)
            | ComponentDefinition::Bytes(leaf)
            | ComponentDefinition::Array(leaf)
            | ComponentDefinition::Map(leaf) => &leaf.name,
        }
    }

    fn leaf(kind: ValueKind, leaf: LeafDefinition) -> Self {
        match kind {
            ValueKind::Bool => ComponentDefinition::Bool(leaf),
            ValueKind::Integer => ComponentDefinition::Integer(leaf),
            ValueKind::Float => ComponentDefinition::Float(leaf),
            ValueKind::String => ComponentDefinition::String(leaf),
            ValueKind::Bytes => ComponentDefinition::Bytes(leaf),
            ValueKind::Array => ComponentDefinition::Array(leaf),
            ValueKind::Map => ComponentDefinition::Map(leaf),
            ValueKind::Any | ValueKind::Null => ComponentDefinition::Any(leaf),
        }
    }

    /// Describe a live component.
    pub fn from_component(component: &Component) -> Result<Self, Error> {
        let name = component
            .name()
            .ok_or_else(|| Error::other(format!("cannot export unnamed {} component", component.kind_name())))?
            .to_string();
        Ok(match component.kind() {
            ComponentKind::Model(schema) => ComponentDefinition::Model(NestedDefinition {
                name,
                since: component.since_version(),
                until: component.until_version(),
                flags: component.flags().to_vec(),
                model: StackDefinition::from_schema(schema)?,
            }),
            ComponentKind::Leaf(kind) => Self::leaf(
                *kind,
                LeafDefinition {
                    name,
                    default: component.default_value().cloned().map(value_to_json),
                    since: component.since_version(),
                    until: component.until_version(),
                    flags: component.flags().to_vec(),
                    exclusive: !component.is_copyable(),
                },
            ),
        })
    }

    /// Build the component this definition describes.
    pub fn build(&self) -> Result<Component, Error> {
        let (leaf, kind) = match self {
            ComponentDefinition::Model(nested) => {
                let mut component = Component::model(nested.model.build_schema()?).named(&nested.name);
                component = bounds(component, nested.since, nested.until, &nested.flags);
                return Ok(component);
            }
            ComponentDefinition::Any(leaf) => (leaf, ValueKind::Any),
            ComponentDefinition::Bool(leaf) => (leaf, ValueKind::Bool),
            ComponentDefinition::Integer(leaf) => (leaf, ValueKind::Integer),
            ComponentDefinition::Float(leaf) => (leaf, ValueKind::Float),
            ComponentDefinition::String(leaf) => (leaf, ValueKind::String),
            ComponentDefinition::Bytes(leaf) => (leaf, ValueKind::Bytes),
            ComponentDefinition::Array(leaf) => (leaf, ValueKind::Array),
            ComponentDefinition::Map(leaf) => (leaf, ValueKind::Map),
        };

        let mut component = Component::leaf(kind).named(&leaf.name);
        if let Some(default) = &leaf.default {
            component = component.with_default(json_to_value(default.clone()));
        }
        if leaf.exclusive {
            component = component.exclusive();
        }
        Ok(bounds(component, leaf.since, leaf.until, &leaf.flags))
    }
}

fn bounds(mut component: Component, since: Option<i64>, until: Option<i64>, flags: &[String]) -> Component {
    if let Some(since) = since {
        component = component.since(since);
    }
    if let Some(until) = until {
        component = component.until(until);
    }
    for flag in flags {
        component = component.flag(flag);
    }
    component
}

/// A component stack described as data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StackDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub settings: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub predicate: PredicateDefinition,
    #[serde(default)]
    pub components: Vec<ComponentDefinition>,
}

impl StackDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            settings: BTreeMap::new(),
            predicate: PredicateDefinition::default(),
            components: Vec::new(),
        }
    }

    #[must_use]
    pub fn component(mut self, component: ComponentDefinition) -> Self {
        self.components.push(component);
        self
    }

    pub fn from_json_str(s: &str) -> Result<Self, Error> {
        serde_json::from_str(s).map_err(|e| Error::decode(Format::JSON, e.to_string()))
    }

    pub fn from_json(json: serde_json::Value) -> Result<Self, Error> {
        serde_json::from_value(json).map_err(|e| Error::decode(Format::JSON, e.to_string()))
    }

    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::other(format!("reading {}: {e}", path.display())))?;
        log::debug!("loading stack definition from {}", path.display());
        Self::from_json_str(&text)
    }

    pub fn to_json(&self) -> Result<serde_json::Value, Error> {
        serde_json::to_value(self).map_err(|e| Error::encode(Format::JSON, e.to_string()))
    }

    pub fn to_json_string_pretty(&self) -> Result<String, Error> {
        serde_json::to_string_pretty(self).map_err(|e| Error::encode(Format::JSON, e.to_string()))
    }

    /// Describe every member of `stack`, matching or not.
    ///
    /// Applicability rules are code, so the exported definition always uses
    /// the default version rule.
    pub fn from_stack(name: impl Into<String>, stack: &Stack, settings: &Settings) -> Result<Self, Error> {
        let components = stack
            .components()
            .iter()
            .map(|component| ComponentDefinition::from_component(component))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            name: name.into(),
            settings: settings
                .iter()
                .map(|(key, value)| (key.clone(), value_to_json(value.clone())))
                .collect(),
            predicate: PredicateDefinition::default(),
            components,
        })
    }

    pub fn from_schema(schema: &ModelSchema) -> Result<Self, Error> {
        Self::from_stack(schema.name(), schema.stack(), schema.settings())
    }

    pub fn settings(&self) -> Settings {
        self.settings
            .iter()
            .map(|(key, value)| (key.clone(), json_to_value(value.clone())))
            .collect()
    }

    /// Build a fresh stack holding the described components.
    pub fn build_stack(&self) -> Result<Stack, Error> {
        let stack = match self.predicate {
            PredicateDefinition::Version => Stack::with_predicate(VersionRange::new()),
            PredicateDefinition::Flags => Stack::with_predicate(FlagPredicate),
            PredicateDefinition::Always => Stack::with_predicate(Always),
        };
        for definition in &self.components {
            stack.push(definition.build()?)?;
        }
        Ok(stack)
    }

    /// Build the stack and compile a schema from what it matches under the
    /// definition's settings.
    pub fn build_schema(&self) -> Result<Arc<ModelSchema>, Error> {
        let stack = self.build_stack()?;
        ModelSchema::from_stack(self.name.clone(), Arc::new(stack), self.settings())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelcast_core::{Model, Value, VERSION_KEY};
    use serde_json::json;
    use std::io::Write;

    fn user() -> serde_json::Value {
        json!({
            "name": "user",
            "components": [
                {"kind": "integer", "name": "id", "default": 0},
                {"kind": "string", "name": "name", "since": 2},
                {"kind": "bytes", "name": "avatar", "flags": ["media"], "exclusive": true},
                {
                    "kind": "model",
                    "name": "address",
                    "model": {
                        "name": "address",
                        "components": [{"kind": "string", "name": "street"}]
                    }
                }
            ]
        })
    }

    #[test]
    fn parses_tagged_components() {
        let def = StackDefinition::from_json(user()).unwrap();
        assert_eq!(def.predicate, PredicateDefinition::Version);
        assert_eq!(def.components.len(), 4);
        assert!(matches!(&def.components[0], ComponentDefinition::Integer(leaf) if leaf.default == Some(json!(0))));
        assert!(matches!(&def.components[3], ComponentDefinition::Model(_)));
        assert_eq!(def.components[2].name(), "avatar");
    }

    #[test]
    fn unknown_kind_is_a_decode_error() {
        let err = StackDefinition::from_json(json!({
            "name": "x",
            "components": [{"kind": "tensor", "name": "t"}]
        }))
        .unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn builds_a_schema_filtered_by_its_settings() {
        let mut def = StackDefinition::from_json(user()).unwrap();
        def.settings.insert(VERSION_KEY.to_string(), json!(1));

        let schema = def.build_schema().unwrap();
        assert!(schema.bindings().contains("id"));
        assert!(!schema.bindings().contains("name"));
        assert_eq!(schema.stack().len(), 4);

        let mut model = Model::new(schema);
        model.set("avatar", Value::Bytes(vec![1])).unwrap();
        model.write_path(&modelcast_core::path!("address/street"), "Elm").unwrap();
        assert_eq!(model.get("id").unwrap(), Some(Value::Integer(0)));
    }

    #[test]
    fn export_round_trips_through_json() {
        let schema = StackDefinition::from_json(user()).unwrap().build_schema().unwrap();
        let exported = StackDefinition::from_schema(&schema).unwrap();
        assert_eq!(exported, StackDefinition::from_json(user()).unwrap());

        let text = exported.to_json_string_pretty().unwrap();
        assert_eq!(StackDefinition::from_json_str(&text).unwrap(), exported);
    }

    #[test]
    fn builder_style_definitions() {
        let def = StackDefinition::new("flags")
            .component(ComponentDefinition::Integer(LeafDefinition::named("id")))
            .component(ComponentDefinition::String(LeafDefinition {
                flags: vec!["beta".to_string()],
                ..LeafDefinition::named("preview")
            }));
        let flagged = StackDefinition {
            predicate: PredicateDefinition::Flags,
            ..def.clone()
        };

        assert_eq!(def.build_schema().unwrap().bindings().slot_count(), 2);
        assert_eq!(flagged.build_schema().unwrap().bindings().slot_count(), 1);
        assert_eq!(
            def.to_json().unwrap()["components"][1],
            json!({"kind": "string", "name": "preview", "flags": ["beta"]})
        );
    }

    #[test]
    fn loads_from_a_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(user().to_string().as_bytes()).unwrap();

        let def = StackDefinition::from_json_file(file.path()).unwrap();
        assert_eq!(def.name, "user");

        let missing = file.path().with_extension("missing");
        assert!(matches!(
            StackDefinition::from_json_file(missing),
            Err(Error::Other { .. })
        ));
    }
}
