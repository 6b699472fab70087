//! Typed field and state access for models.

use modelcast_core::{Error, Model, Settings};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::convert::{from_value, to_value, value_to_json};

/// Extension trait reading and writing model fields as Rust types.
///
/// # Example
///
/// ```rust
/// use modelcast_core::{Component, Model, ModelSchema, Settings};
/// use modelcast_serde::TypedModel;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, PartialEq, Serialize, Deserialize)]
/// struct Point {
///     x: i64,
///     y: i64,
/// }
///
/// let schema = ModelSchema::builder("point")
///     .field("x", Component::integer())
///     .field("y", Component::integer())
///     .build()
///     .unwrap();
///
/// let mut model = Model::new(schema);
/// model.set_state_from(&Point { x: 1, y: 2 }).unwrap();
///
/// let point: Point = model.state_as(&Settings::new()).unwrap();
/// assert_eq!(point, Point { x: 1, y: 2 });
/// assert_eq!(model.read_as::<i64>("y").unwrap(), Some(2));
/// ```
pub trait TypedModel {
    /// Read a field and deserialize it; `None` when it has no value.
    fn read_as<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, Error>;

    /// Serialize `data` and write it to a field.
    fn write_as<T: Serialize>(&mut self, name: &str, data: &T) -> Result<(), Error>;

    /// Deserialize the applicable state (missing values are an error).
    fn state_as<T: DeserializeOwned>(&self, settings: &Settings) -> Result<T, Error>;

    /// Serialize `data` and apply it as a state (unknown keys are skipped).
    fn set_state_from<T: Serialize>(&mut self, data: &T) -> Result<(), Error>;

    /// The safe snapshot as JSON.
    fn state_json(&self) -> serde_json::Value;
}

impl TypedModel for Model {
    fn read_as<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, Error> {
        self.get(name)?.map(from_value).transpose()
    }

    fn write_as<T: Serialize>(&mut self, name: &str, data: &T) -> Result<(), Error> {
        self.set(name, to_value(data)?)
    }

    fn state_as<T: DeserializeOwned>(&self, settings: &Settings) -> Result<T, Error> {
        from_value(self.get_state(None, settings)?.into_value())
    }

    fn set_state_from<T: Serialize>(&mut self, data: &T) -> Result<(), Error> {
        self.load_state(to_value(data)?).map(|_| ())
    }

    fn state_json(&self) -> serde_json::Value {
        value_to_json(self.state().into_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelcast_core::{Component, ModelSchema, ValueKind};
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::Arc;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Address {
        street: String,
        zip: String,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Person {
        name: String,
        address: Address,
    }

    fn person() -> Model {
        let address: Arc<ModelSchema> = ModelSchema::builder("address")
            .field("street", ValueKind::String)
            .field("zip", Component::string().with_default("00000"))
            .build()
            .unwrap();
        let schema = ModelSchema::builder("person")
            .field("name", ValueKind::String)
            .nested("address", &address)
            .build()
            .unwrap();
        Model::new(schema)
    }

    #[test]
    fn nested_structs_round_trip() {
        let mut model = person();
        let original = Person {
            name: "Ann".to_string(),
            address: Address {
                street: "Elm".to_string(),
                zip: "12345".to_string(),
            },
        };

        model.set_state_from(&original).unwrap();
        assert_eq!(model.state_as::<Person>(&Settings::new()).unwrap(), original);
        assert_eq!(
            model.read_as::<Address>("address").unwrap(),
            Some(Address {
                street: "Elm".to_string(),
                zip: "12345".to_string(),
            })
        );
    }

    #[test]
    fn unset_fields_read_as_none_and_fail_typed_state() {
        let model = person();
        assert_eq!(model.read_as::<String>("name").unwrap(), None);
        assert!(matches!(
            model.state_as::<Person>(&Settings::new()),
            Err(Error::MissingValue { .. })
        ));
        assert_eq!(
            model.state_json(),
            json!({"name": null, "address": {"street": null, "zip": "00000"}})
        );
    }

    #[test]
    fn write_as_and_type_mismatch() {
        let mut model = person();
        model.write_as("name", &"Bo").unwrap();
        assert_eq!(model.read_as::<String>("name").unwrap().as_deref(), Some("Bo"));
        assert!(matches!(
            model.read_as::<i64>("name"),
            Err(Error::Decode { .. })
        ));
        assert!(matches!(
            model.write_as("age", &3),
            Err(Error::UnknownField { .. })
        ));
    }

    #[test]
    fn snapshots_deserialize_directly() {
        let mut model = person();
        model.write_as("name", &"Cy").unwrap();
        model
            .write_path(&modelcast_core::path!("address/street"), "Oak")
            .unwrap();
        let snapshot = model.get_state(None, &Settings::new()).unwrap().into_value();
        let person: Person = from_value(snapshot).unwrap();
        assert_eq!(person.address.zip, "00000");
    }
}
