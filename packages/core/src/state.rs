//! State snapshots and raw decoded payloads.

use std::collections::BTreeMap;

use crate::{Error, Value};

/// An ordered name -> value snapshot of a model.
///
/// Entries keep the model's declaration order. Equality ignores order, so
/// two snapshots with the same fields and values compare equal.
#[derive(Clone, Debug, Default)]
pub struct State {
    entries: Vec<(String, Value)>,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace `name`, keeping its original position on replace.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, value)| value)
    }

    /// The snapshot as a `Value::Map` (declaration order is not kept).
    pub fn into_value(self) -> Value {
        Value::Map(self.into_map())
    }

    pub fn into_map(self) -> BTreeMap<String, Value> {
        self.entries.into_iter().collect()
    }

    /// Values in declaration order, for positional encodings.
    pub fn into_sequence(self) -> Value {
        Value::Array(self.entries.into_iter().map(|(_, value)| value).collect())
    }
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(name, value)| other.get(name) == Some(value))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for State {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut state = State::new();
        for (name, value) in iter {
            state.insert(name, value);
        }
        state
    }
}

impl IntoIterator for State {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// A decoded payload about to be applied to a model.
///
/// Sequences are zipped positionally against the declared fields; mappings
/// are applied by name.
#[derive(Clone, Debug, PartialEq)]
pub enum RawState {
    Sequence(Vec<Value>),
    Mapping(Vec<(String, Value)>),
}

impl RawState {
    pub fn mapping<K: Into<String>, V: Into<Value>>(
        pairs: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        RawState::Mapping(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn sequence<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        RawState::Sequence(values.into_iter().map(Into::into).collect())
    }
}

impl TryFrom<Value> for RawState {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Error> {
        match value {
            Value::Array(values) => Ok(RawState::Sequence(values)),
            Value::Map(map) => Ok(RawState::Mapping(map.into_iter().collect())),
            other => Err(Error::UnsupportedPayload { kind: other.kind() }),
        }
    }
}

impl From<State> for RawState {
    fn from(state: State) -> Self {
        RawState::Mapping(state.entries)
    }
}

impl From<BTreeMap<String, Value>> for RawState {
    fn from(map: BTreeMap<String, Value>) -> Self {
        RawState::Mapping(map.into_iter().collect())
    }
}

impl From<Vec<Value>> for RawState {
    fn from(values: Vec<Value>) -> Self {
        RawState::Sequence(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ValueKind;
    use collection_literals::btree;

    #[test]
    fn insert_keeps_first_position() {
        let mut state = State::new();
        state.insert("id", 1);
        state.insert("name", "x");
        state.insert("id", 2);

        assert_eq!(state.keys().collect::<Vec<_>>(), ["id", "name"]);
        assert_eq!(state.get("id"), Some(&Value::Integer(2)));
    }

    #[test]
    fn equality_ignores_order() {
        let a: State = [("id", Value::from(1)), ("name", Value::from("x"))]
            .into_iter()
            .collect();
        let b: State = [("name", Value::from("x")), ("id", Value::from(1))]
            .into_iter()
            .collect();
        let c: State = [("id", Value::from(1))].into_iter().collect();

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn raw_state_from_values() {
        assert_eq!(
            RawState::try_from(Value::from(vec![1i64, 2])).unwrap(),
            RawState::sequence([1i64, 2])
        );
        assert_eq!(
            RawState::try_from(Value::Map(btree! {
                "id".into() => Value::from(5),
            }))
            .unwrap(),
            RawState::mapping([("id", 5)])
        );
    }

    #[test]
    fn scalars_are_unsupported_payloads() {
        let err = RawState::try_from(Value::from("nope")).unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedPayload {
                kind: ValueKind::String
            }
        ));
    }

    #[test]
    fn sequence_view_follows_declaration_order() {
        let state: State = [("b", 2i64), ("a", 1i64)].into_iter().collect();
        assert_eq!(state.clone().into_sequence(), Value::from(vec![2i64, 1]));
        assert!(state.into_value().is_map());
    }
}
