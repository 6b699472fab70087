//! Slot bindings: the accessors connecting attribute names to components.
//!
//! A schema compiles one [`Binding`] per exposed name. Primary bindings own a
//! slot index into each model instance's storage; alias bindings forward to a
//! primary and never hold storage of their own. Values therefore live on the
//! instance, never on the binding.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use crate::component::Component;
use crate::model::Model;
use crate::{Error, Value};

/// Per-instance storage behind one primary binding.
#[derive(Debug)]
pub(crate) enum Slot {
    Leaf(Option<Value>),
    Nested(OnceLock<Box<Model>>),
}

impl Clone for Slot {
    fn clone(&self) -> Self {
        match self {
            Slot::Leaf(value) => Slot::Leaf(value.clone()),
            Slot::Nested(cell) => {
                let copy = OnceLock::new();
                if let Some(model) = cell.get() {
                    let _ = copy.set(model.clone());
                }
                Slot::Nested(copy)
            }
        }
    }
}

/// Result of reading a binding.
#[derive(Debug)]
pub enum Read<'a> {
    /// A stored value or an applicable default.
    Value(Value),
    /// Never set and no default exists.
    Missing,
    /// The nested model instance scoped to the reading instance.
    Model(&'a Model),
}

impl Read<'_> {
    pub fn is_missing(&self) -> bool {
        matches!(self, Read::Missing)
    }

    /// The leaf value, if any.
    pub fn into_value(self) -> Option<Value> {
        match self {
            Read::Value(value) => Some(value),
            _ => None,
        }
    }
}

/// What to do with a slot.
#[derive(Clone, Debug, PartialEq)]
pub enum Write {
    Set(Value),
    /// Unset a leaf, or reset a nested model to empty.
    Clear,
}

impl<T: Into<Value>> From<T> for Write {
    fn from(value: T) -> Self {
        Write::Set(value.into())
    }
}

/// A binding that owns a slot.
#[derive(Clone, Debug)]
pub struct PrimaryBinding {
    name: String,
    component: Arc<Component>,
    slot: usize,
}

impl PrimaryBinding {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn component(&self) -> &Arc<Component> {
        &self.component
    }

    pub(crate) fn slot(&self) -> usize {
        self.slot
    }

    pub(crate) fn new_slot(&self) -> Slot {
        if self.component.refers_to_model() {
            Slot::Nested(OnceLock::new())
        } else {
            Slot::Leaf(None)
        }
    }

    /// Read through `slot`, falling back to `default` and then the component default.
    pub(crate) fn read<'a>(&self, slot: &'a Slot, default: Option<&Value>) -> Read<'a> {
        match slot {
            Slot::Leaf(Some(value)) => Read::Value(value.clone()),
            Slot::Leaf(None) => default
                .or(self.component.default_value())
                .map_or(Read::Missing, |value| Read::Value(value.clone())),
            Slot::Nested(cell) => Read::Model(self.nested(cell)),
        }
    }

    pub(crate) fn write(&self, slot: &mut Slot, write: Write) -> Result<(), Error> {
        match slot {
            Slot::Leaf(stored) => {
                *stored = match write {
                    Write::Set(value) => Some(value),
                    Write::Clear => None,
                };
                Ok(())
            }
            Slot::Nested(cell) => {
                let model = self.nested_mut(cell)?;
                match write {
                    Write::Clear => {
                        model.clear();
                        Ok(())
                    }
                    Write::Set(value) => model.load_state(value).map(|_| ()),
                }
            }
        }
    }

    /// The nested instance, constructed on first access.
    pub(crate) fn nested<'a>(&self, cell: &'a OnceLock<Box<Model>>) -> &'a Model {
        cell.get_or_init(|| Box::new(self.instantiate()))
    }

    pub(crate) fn nested_mut<'a>(
        &self,
        cell: &'a mut OnceLock<Box<Model>>,
    ) -> Result<&'a mut Model, Error> {
        if cell.get().is_none() {
            let _ = cell.set(Box::new(self.instantiate()));
        }
        cell.get_mut()
            .map(Box::as_mut)
            .ok_or_else(|| Error::NotAModel {
                field: self.name.clone(),
            })
    }

    fn instantiate(&self) -> Model {
        match self.component.schema() {
            Some(schema) => Model::new(Arc::clone(schema)),
            // new_slot only builds nested slots for model components
            None => Model::empty(&self.name),
        }
    }
}

/// A binding that forwards to a primary binding in the same model.
#[derive(Clone, Debug)]
pub struct AliasBinding {
    name: String,
    primary: String,
}

impl AliasBinding {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn primary(&self) -> &str {
        &self.primary
    }
}

#[derive(Clone, Debug)]
pub enum Binding {
    Primary(PrimaryBinding),
    Alias(AliasBinding),
}

impl Binding {
    pub fn name(&self) -> &str {
        match self {
            Binding::Primary(b) => b.name(),
            Binding::Alias(b) => b.name(),
        }
    }

    pub fn is_alias(&self) -> bool {
        matches!(self, Binding::Alias(_))
    }
}

/// The compiled name -> binding map of one schema.
///
/// Fixed once built: the set of legal attribute names never changes.
#[derive(Clone, Debug, Default)]
pub struct BindingTable {
    bindings: Vec<Binding>,
    index: BTreeMap<String, usize>,
    primaries: Vec<usize>,
}

impl BindingTable {
    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.index.get(name).map(|&i| &self.bindings[i])
    }

    /// The primary binding behind `name`, following an alias.
    pub fn resolve(&self, name: &str) -> Option<&PrimaryBinding> {
        match self.get(name)? {
            Binding::Primary(primary) => Some(primary),
            Binding::Alias(alias) => match self.get(&alias.primary)? {
                Binding::Primary(primary) => Some(primary),
                Binding::Alias(_) => None,
            },
        }
    }

    /// Primary bindings in declaration order.
    pub fn primaries(&self) -> impl Iterator<Item = &PrimaryBinding> {
        self.primaries.iter().filter_map(|&i| match &self.bindings[i] {
            Binding::Primary(primary) => Some(primary),
            Binding::Alias(_) => None,
        })
    }

    /// Every binding, primaries and aliases, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Binding> {
        self.bindings.iter()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn slot_count(&self) -> usize {
        self.primaries.len()
    }

    pub(crate) fn new_slots(&self) -> Vec<Slot> {
        self.primaries().map(PrimaryBinding::new_slot).collect()
    }

    /// Add a primary binding for `component` under `name`.
    pub(crate) fn bind(&mut self, name: &str, component: Arc<Component>) -> Result<(), Error> {
        if self.contains(name) {
            return Err(Error::DuplicateField {
                name: name.to_string(),
            });
        }
        let slot = self.primaries.len();
        self.primaries.push(self.bindings.len());
        self.push(Binding::Primary(PrimaryBinding {
            name: name.to_string(),
            component,
            slot,
        }));
        Ok(())
    }

    /// Add an alias `name` forwarding to the binding called `target`.
    ///
    /// Alias chains are flattened so every alias points at a primary.
    pub(crate) fn alias(&mut self, name: &str, target: &str) -> Result<(), Error> {
        let mut visited = vec![name];
        let mut current = target;
        let primary = loop {
            if visited.contains(&current) {
                return Err(Error::AliasCycle {
                    alias: name.to_string(),
                });
            }
            match self.get(current) {
                Some(Binding::Primary(primary)) => break primary.name().to_string(),
                Some(Binding::Alias(alias)) => {
                    visited.push(current);
                    current = alias.primary();
                }
                None => {
                    return Err(Error::UnknownAliasTarget {
                        alias: name.to_string(),
                        target: target.to_string(),
                    })
                }
            }
        };
        if self.contains(name) {
            return Err(Error::DuplicateField {
                name: name.to_string(),
            });
        }
        self.push(Binding::Alias(AliasBinding {
            name: name.to_string(),
            primary,
        }));
        Ok(())
    }

    fn push(&mut self, binding: Binding) {
        self.index
            .insert(binding.name().to_string(), self.bindings.len());
        self.bindings.push(binding);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> BindingTable {
        let mut table = BindingTable::default();
        table.bind("id", Component::integer().shared()).unwrap();
        table
            .bind("name", Component::string().with_default("anon").shared())
            .unwrap();
        table
    }

    #[test]
    fn aliases_resolve_to_their_primary() {
        let mut table = table();
        table.alias("identifier", "id").unwrap();
        table.alias("ident", "identifier").unwrap();

        assert_eq!(table.resolve("identifier").unwrap().name(), "id");
        match table.get("ident").unwrap() {
            Binding::Alias(alias) => assert_eq!(alias.primary(), "id"),
            other => panic!("unexpected binding: {other:?}"),
        }
        assert_eq!(table.slot_count(), 2);
        assert_eq!(table.iter().count(), 4);
    }

    #[test]
    fn self_alias_is_a_cycle() {
        let mut table = table();
        let err = table.alias("loop", "loop").unwrap_err();
        assert!(matches!(err, Error::AliasCycle { .. }));
    }

    #[test]
    fn alias_to_unknown_name_fails() {
        let mut table = table();
        let err = table.alias("nick", "nickname").unwrap_err();
        assert!(matches!(err, Error::UnknownAliasTarget { .. }));
    }

    #[test]
    fn duplicate_names_fail() {
        let mut table = table();
        assert!(matches!(
            table.bind("id", Component::integer().shared()),
            Err(Error::DuplicateField { .. })
        ));
        assert!(matches!(
            table.alias("name", "id"),
            Err(Error::DuplicateField { .. })
        ));
    }

    #[test]
    fn leaf_read_falls_back_through_defaults() {
        let table = table();
        let id = table.resolve("id").unwrap();
        let name = table.resolve("name").unwrap();
        let mut slots = table.new_slots();

        assert!(id.read(&slots[id.slot()], None).is_missing());
        assert_eq!(
            id.read(&slots[id.slot()], Some(&Value::Integer(7))).into_value(),
            Some(Value::Integer(7))
        );
        assert_eq!(
            name.read(&slots[name.slot()], None).into_value(),
            Some(Value::from("anon"))
        );

        id.write(&mut slots[id.slot()], Write::from(3)).unwrap();
        assert_eq!(
            id.read(&slots[id.slot()], Some(&Value::Integer(7))).into_value(),
            Some(Value::Integer(3))
        );

        id.write(&mut slots[id.slot()], Write::Clear).unwrap();
        assert!(id.read(&slots[id.slot()], None).is_missing());
    }
}
