//! Conversions between `Value`, `serde_json::Value` and serde types.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use modelcast_core::{Error, Format, Value, ValueKind};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Deserialize a Rust type out of a `Value`.
pub fn from_value<T: DeserializeOwned>(value: Value) -> Result<T, Error> {
    serde_json::from_value(value_to_json(value)).map_err(|e| Error::decode(Format::VALUE, e.to_string()))
}

/// Serialize a Rust type into a `Value`.
pub fn to_value<T: Serialize>(data: &T) -> Result<Value, Error> {
    let json = serde_json::to_value(data).map_err(|e| Error::encode(Format::VALUE, e.to_string()))?;
    Ok(json_to_value(json))
}

/// JSON has no bytes, so `Value::Bytes` becomes a base64 string and
/// non-finite floats become `null`.
pub fn value_to_json(value: Value) -> serde_json::Value {
    use serde_json::Value as Json;

    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(b),
        Value::Integer(i) => Json::from(i),
        Value::Float(f) => serde_json::Number::from_f64(f).map_or(Json::Null, Json::Number),
        Value::String(s) => Json::String(s),
        Value::Bytes(bytes) => Json::String(STANDARD.encode(bytes)),
        Value::Array(items) => items.into_iter().map(value_to_json).collect(),
        Value::Map(map) => Json::Object(
            map.into_iter()
                .map(|(key, value)| (key, value_to_json(value)))
                .collect(),
        ),
    }
}

pub fn json_to_value(json: serde_json::Value) -> Value {
    use serde_json::Value as Json;

    match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(b),
        Json::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Value::Integer(i),
            (None, Some(f)) => Value::Float(f),
            // arbitrary-precision numbers with no f64 form
            (None, None) => Value::String(n.to_string()),
        },
        Json::String(s) => Value::String(s),
        Json::Array(items) => Value::Array(items.into_iter().map(json_to_value).collect()),
        Json::Object(map) => Value::Map(
            map.into_iter()
                .map(|(key, value)| (key, json_to_value(value)))
                .collect(),
        ),
    }
}

/// Undo the lossy parts of JSON for a field declared as `kind`.
///
/// Base64 strings become bytes again and integers widen to floats. Values
/// that do not fit the declared kind are returned unchanged.
pub fn coerce(value: Value, kind: ValueKind) -> Value {
    match (value, kind) {
        (Value::String(s), ValueKind::Bytes) => match STANDARD.decode(&s) {
            Ok(bytes) => Value::Bytes(bytes),
            Err(_) => Value::String(s),
        },
        (Value::Integer(i), ValueKind::Float) => Value::Float(i as f64),
        (value, _) => value,
    }
}
