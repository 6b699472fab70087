//! JSON driver and serializer.

use std::sync::Arc;

use bytes::Bytes;
use modelcast_core::{
    Component, ComponentKind, ComposedSerializer, Composition, Driver, Error, Format,
    ModelContext, Serializer, Settings, Value, ValueKind,
};

use crate::convert::{coerce, json_to_value, value_to_json};

/// Setting: emit indented JSON.
pub const PRETTY: &str = "pretty";
/// Setting: wrap the state as `{"<model name>": state}`.
pub const ENVELOPE: &str = "envelope";

/// Selects [`JsonSerializer`]s for models.
///
/// When configured with a [`Composition`], every serializer it hands out is
/// wrapped in a [`ComposedSerializer`] running that composition's hooks.
///
/// ```rust
/// use modelcast_core::{Component, Model, ModelSchema, Settings};
/// use modelcast_serde::JsonDriver;
///
/// let schema = ModelSchema::builder("point")
///     .field("x", Component::integer())
///     .field("y", Component::integer())
///     .build()
///     .unwrap();
/// let mut point = Model::new(schema);
/// point.bind([("x", 1), ("y", 2)]).unwrap();
///
/// let payload = point.dump(&JsonDriver::new(), &Settings::new()).unwrap();
/// assert_eq!(&payload[..], br#"{"x":1,"y":2}"#);
/// ```
#[derive(Clone, Debug, Default)]
pub struct JsonDriver {
    composition: Option<Arc<Composition>>,
}

impl JsonDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_composition(composition: Arc<Composition>) -> Self {
        Self {
            composition: Some(composition),
        }
    }

    pub fn composition(&self) -> Option<&Arc<Composition>> {
        self.composition.as_ref()
    }

    fn wrap(&self, serializer: JsonSerializer) -> Arc<dyn Serializer> {
        match &self.composition {
            Some(composition) => Arc::new(ComposedSerializer::new(
                Arc::new(serializer),
                Arc::clone(composition),
            )),
            None => Arc::new(serializer),
        }
    }
}

impl Driver for JsonDriver {
    fn format(&self) -> Format {
        Format::JSON
    }

    fn lookup_model_serializer(
        &self,
        model: &ModelContext,
        settings: &Settings,
    ) -> Result<Arc<dyn Serializer>, Error> {
        let fields = model
            .components
            .iter()
            .map(|(name, component)| (name.clone(), FieldShape::of_component(component)))
            .collect();
        Ok(self.wrap(JsonSerializer {
            name: model.name.clone(),
            fields,
            settings: settings.clone(),
        }))
    }
}

/// The declared shape of a field, down through nested models.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldShape {
    Leaf(ValueKind),
    Model(Vec<(String, FieldShape)>),
}

impl FieldShape {
    /// Every primary field of a nested model, whatever its version bounds.
    pub fn of_component(component: &Component) -> Self {
        match component.kind() {
            ComponentKind::Leaf(kind) => FieldShape::Leaf(*kind),
            ComponentKind::Model(schema) => FieldShape::Model(
                schema
                    .bindings()
                    .primaries()
                    .map(|binding| {
                        (
                            binding.name().to_string(),
                            Self::of_component(binding.component()),
                        )
                    })
                    .collect(),
            ),
        }
    }

    /// Guess a shape from a default value; maps are read as nested models.
    pub fn of_value(value: &Value) -> Self {
        match value {
            Value::Map(map) => FieldShape::Model(
                map.iter()
                    .map(|(name, value)| (name.clone(), Self::of_value(value)))
                    .collect(),
            ),
            other => FieldShape::Leaf(other.kind()),
        }
    }

    fn restore(&self, value: Value) -> Value {
        match self {
            FieldShape::Leaf(kind) => coerce(value, *kind),
            FieldShape::Model(fields) => restore_fields(fields, value),
        }
    }
}

fn restore_fields(fields: &[(String, FieldShape)], raw: Value) -> Value {
    match raw {
        Value::Map(map) => Value::Map(
            map.into_iter()
                .map(|(name, value)| {
                    let value = match fields.iter().find(|(field, _)| *field == name) {
                        Some((_, shape)) => shape.restore(value),
                        None => value,
                    };
                    (name, value)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .enumerate()
                .map(|(i, value)| match fields.get(i) {
                    Some((_, shape)) => shape.restore(value),
                    None => value,
                })
                .collect(),
        ),
        other => other,
    }
}

/// Encodes model states as JSON objects.
///
/// Knows the declared shape of each field, nested models included, so that
/// decoding can restore what JSON cannot carry (bytes, integral floats).
#[derive(Clone, Debug)]
pub struct JsonSerializer {
    name: String,
    fields: Vec<(String, FieldShape)>,
    settings: Settings,
}

impl JsonSerializer {
    /// A serializer for a model called `name` with no declared fields.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            settings: Settings::new(),
        }
    }

    #[must_use]
    pub fn field(mut self, name: impl Into<String>, kind: ValueKind) -> Self {
        self.fields.push((name.into(), FieldShape::Leaf(kind)));
        self
    }

    /// Declare a nested model field with its own fields.
    #[must_use]
    pub fn nested(mut self, name: impl Into<String>, fields: Vec<(String, FieldShape)>) -> Self {
        self.fields.push((name.into(), FieldShape::Model(fields)));
        self
    }

    #[must_use]
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = self.settings.merged(&settings);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[(String, FieldShape)] {
        &self.fields
    }
}

impl Serializer for JsonSerializer {
    fn dump(&self, state: &Value, settings: &Settings) -> Result<Bytes, Error> {
        let settings = self.settings.merged(settings);
        if !state.is_map() {
            return Err(Error::encode(
                Format::JSON,
                format!("expected a mapping state, got {}", state.kind()),
            ));
        }

        let mut json = value_to_json(state.clone());
        if settings.get_bool(ENVELOPE) {
            let mut outer = serde_json::Map::new();
            outer.insert(self.name.clone(), json);
            json = serde_json::Value::Object(outer);
        }
        let bytes = if settings.get_bool(PRETTY) {
            serde_json::to_vec_pretty(&json)
        } else {
            serde_json::to_vec(&json)
        }
        .map_err(|e| Error::encode(Format::JSON, e.to_string()))?;

        log::trace!("encoded {:?} as {} bytes of json", self.name, bytes.len());
        Ok(Bytes::from(bytes))
    }

    fn load(&self, payload: &Bytes, settings: &Settings) -> Result<Value, Error> {
        let settings = self.settings.merged(settings);
        let mut json: serde_json::Value = serde_json::from_slice(payload)
            .map_err(|e| Error::decode(Format::JSON, e.to_string()))?;

        if settings.get_bool(ENVELOPE) {
            json = match json {
                serde_json::Value::Object(mut outer) => outer.remove(&self.name).ok_or_else(|| {
                    Error::decode(Format::JSON, format!("missing envelope key {:?}", self.name))
                })?,
                _ => {
                    return Err(Error::decode(
                        Format::JSON,
                        "enveloped payload is not an object",
                    ))
                }
            };
        }

        Ok(restore_fields(&self.fields, json_to_value(json)))
    }

    fn get_dependency(
        &self,
        name: &str,
        default: Option<&Value>,
        settings: &Settings,
    ) -> Result<Arc<dyn Serializer>, Error> {
        // Without components, the defaults are the best description of the sub-part.
        let fields = match default.map(FieldShape::of_value) {
            Some(FieldShape::Model(fields)) => fields,
            _ => Vec::new(),
        };
        Ok(Arc::new(JsonSerializer {
            name: name.to_string(),
            fields,
            settings: self.settings.merged(settings),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use collection_literals::btree;
    use modelcast_core::capability::DUMP;
    use modelcast_core::{Capability, CapabilityRegistry, Component, Feature};

    fn state() -> Value {
        Value::Map(btree! {
            "id".into() => Value::from(5),
            "blob".into() => Value::Bytes(vec![1, 2, 3]),
        })
    }

    fn serializer() -> JsonSerializer {
        JsonSerializer::new("user")
            .field("id", ValueKind::Integer)
            .field("blob", ValueKind::Bytes)
    }

    #[test]
    fn dump_and_load_restore_declared_kinds() {
        let s = serializer();
        let payload = s.dump(&state(), &Settings::new()).unwrap();
        assert_eq!(s.load(&payload, &Settings::new()).unwrap(), state());
    }

    #[test]
    fn envelope_wraps_under_the_model_name() {
        let s = serializer().settings(Settings::new().with(ENVELOPE, true));
        let payload = s.dump(&state(), &Settings::new()).unwrap();

        let json: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(json["user"]["id"], serde_json::json!(5));
        assert_eq!(s.load(&payload, &Settings::new()).unwrap(), state());

        let bare = serializer().dump(&state(), &Settings::new()).unwrap();
        assert!(matches!(
            s.load(&bare, &Settings::new()),
            Err(Error::Decode { .. })
        ));
    }

    #[test]
    fn pretty_output_is_indented() {
        let payload = serializer()
            .dump(&state(), &Settings::new().with(PRETTY, true))
            .unwrap();
        assert!(payload.contains(&b'\n'));
    }

    #[test]
    fn non_mapping_states_are_rejected() {
        let err = serializer()
            .dump(&Value::from(1), &Settings::new())
            .unwrap_err();
        assert!(matches!(err, Error::Encode { .. }));
    }

    #[test]
    fn malformed_payloads_fail_to_decode() {
        let err = serializer()
            .load(&Bytes::from_static(b"{not json"), &Settings::new())
            .unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn sequences_are_restored_positionally() {
        let payload = Bytes::from_static(br#"[7, "AQID"]"#);
        let raw = serializer().load(&payload, &Settings::new()).unwrap();
        assert_eq!(
            raw,
            Value::Array(vec![Value::from(7), Value::Bytes(vec![1, 2, 3])])
        );
    }

    #[test]
    fn dependencies_inherit_settings_and_read_kinds_from_defaults() {
        let parent = serializer().settings(Settings::new().with(ENVELOPE, true));
        let defaults = Value::Map(btree! { "ratio".into() => Value::Float(0.5) });
        let child = parent
            .get_dependency("stats", Some(&defaults), &Settings::new())
            .unwrap();

        let payload = Bytes::from_static(br#"{"stats": {"ratio": 2}}"#);
        assert_eq!(
            child.load(&payload, &Settings::new()).unwrap(),
            Value::Map(btree! { "ratio".into() => Value::Float(2.0) })
        );
    }

    #[test]
    fn driver_scopes_serializers_to_model_components() {
        let context = ModelContext {
            name: "user".to_string(),
            components: vec![(
                "blob".to_string(),
                Component::bytes().named("blob").shared(),
            )],
            defaults: Default::default(),
        };
        let s = JsonDriver::new()
            .lookup_model_serializer(&context, &Settings::new())
            .unwrap();
        let raw = s
            .load(&Bytes::from_static(br#"{"blob": "AQID"}"#), &Settings::new())
            .unwrap();
        assert_eq!(
            raw,
            Value::Map(btree! { "blob".into() => Value::Bytes(vec![1, 2, 3]) })
        );
    }

    #[test]
    fn nested_model_fields_restore_their_declared_kinds() {
        let inner = modelcast_core::ModelSchema::builder("blob")
            .field("data", ValueKind::Bytes)
            .field("ratio", ValueKind::Float)
            .build()
            .unwrap();
        let context = ModelContext {
            name: "holder".to_string(),
            components: vec![(
                "blob".to_string(),
                Component::model(inner).named("blob").shared(),
            )],
            defaults: Default::default(),
        };
        let s = JsonDriver::new()
            .lookup_model_serializer(&context, &Settings::new())
            .unwrap();

        let expected = Value::Map(btree! {
            "blob".into() => Value::Map(btree! {
                "data".into() => Value::Bytes(vec![1, 2, 3]),
                "ratio".into() => Value::Float(1.0),
            }),
        });
        let by_name = Bytes::from_static(br#"{"blob": {"data": "AQID", "ratio": 1}}"#);
        assert_eq!(s.load(&by_name, &Settings::new()).unwrap(), expected);

        let by_position = Bytes::from_static(br#"{"blob": ["AQID", 1]}"#);
        assert_eq!(
            s.load(&by_position, &Settings::new()).unwrap(),
            Value::Map(btree! {
                "blob".into() => Value::Array(vec![Value::Bytes(vec![1, 2, 3]), Value::Float(1.0)]),
            })
        );
    }

    #[test]
    fn composed_driver_runs_hooks() {
        let mut registry = CapabilityRegistry::new();
        registry
            .register(Capability::register(
                "stamp",
                [Feature::builder("stamp")
                    .before(DUMP)
                    .hook(|state, _| match state {
                        Value::Map(mut map) => {
                            map.insert("stamped".into(), Value::from(true));
                            Ok(Value::Map(map))
                        }
                        other => Ok(other),
                    })
                    .build()
                    .unwrap()],
            ))
            .unwrap();
        let driver = JsonDriver::with_composition(Arc::new(
            registry.compose("json", &["stamp"]).unwrap(),
        ));

        let context = ModelContext {
            name: "user".to_string(),
            components: Vec::new(),
            defaults: Default::default(),
        };
        let s = driver
            .lookup_model_serializer(&context, &Settings::new())
            .unwrap();
        let payload = s.dump(&Value::map(), &Settings::new()).unwrap();
        assert_eq!(&payload[..], br#"{"stamped":true}"#);
    }
}
