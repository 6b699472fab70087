//! Model instances: per-instance field storage over a compiled schema.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;

use crate::binding::{PrimaryBinding, Read, Slot, Write};
use crate::schema::ModelSchema;
use crate::serializer::{resolve_serializer, ModelContext, Target};
use crate::stack::Matching;
use crate::state::{RawState, State};
use crate::{Error, Path, PathError, Settings, Value};

/// Construction options for [`Model::with_options`].
///
/// Settings whose key names a declared field are consumed as that field's
/// initial value instead of being kept as free-form settings.
#[derive(Clone, Debug, Default)]
pub struct ModelOptions {
    name: Option<String>,
    defaults: BTreeMap<String, Value>,
    settings: Settings,
}

impl ModelOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the schema name for this instance.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_default(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.defaults.insert(field.into(), value.into());
        self
    }

    #[must_use]
    pub fn defaults(mut self, defaults: BTreeMap<String, Value>) -> Self {
        self.defaults.extend(defaults);
        self
    }

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
}

/// One instance of a [`ModelSchema`].
///
/// Values live in slots owned by the instance, one per primary binding, so
/// two instances of the same schema never observe each other's writes.
///
/// ```rust
/// use modelcast_core::{Component, ModelSchema, Model, Settings, Value, VERSION_KEY};
///
/// let schema = ModelSchema::builder("user")
///     .field("id", Component::integer().with_default(0))
///     .field("name", Component::string().since(2))
///     .build()
///     .unwrap();
///
/// let mut user = Model::new(schema);
/// let v1 = user.get_state(None, &Settings::new().with(VERSION_KEY, 1)).unwrap();
/// assert_eq!(v1.get("id"), Some(&Value::Integer(0)));
/// assert!(!v1.contains("name"));
///
/// user.set("name", "x").unwrap();
/// let v2 = user.get_state(None, &Settings::new().with(VERSION_KEY, 2)).unwrap();
/// assert_eq!(v2.get("name"), Some(&Value::from("x")));
/// ```
#[derive(Clone, Debug)]
pub struct Model {
    schema: Arc<ModelSchema>,
    name: String,
    defaults: BTreeMap<String, Value>,
    settings: Settings,
    slots: Vec<Slot>,
}

fn lookup<'s>(schema: &'s ModelSchema, name: &str) -> Result<&'s PrimaryBinding, Error> {
    schema
        .bindings()
        .resolve(name)
        .ok_or_else(|| Error::UnknownField {
            name: name.to_string(),
        })
}

/// Pair each applicable value with the field it targets.
fn planned_writes(schema: &ModelSchema, model: &str, state: RawState) -> Vec<(String, Value)> {
    match state {
        RawState::Sequence(values) => schema
            .bindings()
            .primaries()
            .map(|binding| binding.name().to_string())
            .zip(values)
            .collect(),
        RawState::Mapping(entries) => entries
            .into_iter()
            .filter(|(name, _)| {
                let known = schema.bindings().contains(name);
                if !known {
                    log::trace!("model {:?}: ignoring unknown field {:?}", model, name);
                }
                known
            })
            .collect(),
    }
}

fn check_nested_payloads(schema: &ModelSchema, writes: &[(String, Value)]) -> Result<(), Error> {
    for (name, value) in writes {
        let Some(nested) = schema
            .bindings()
            .resolve(name)
            .and_then(|binding| binding.component().schema())
        else {
            continue;
        };
        let inner = RawState::try_from(value.clone())?;
        check_nested_payloads(nested, &planned_writes(nested, nested.name(), inner))?;
    }
    Ok(())
}

fn empty_path() -> Error {
    Error::InvalidName(PathError::InvalidPath {
        message: "empty field path".to_string(),
    })
}

impl Model {
    pub fn new(schema: Arc<ModelSchema>) -> Self {
        Self {
            name: schema.name().to_string(),
            slots: schema.bindings().new_slots(),
            defaults: BTreeMap::new(),
            settings: Settings::new(),
            schema,
        }
    }

    /// An instance of a schema with no fields.
    pub fn empty(name: &str) -> Self {
        Self::new(ModelSchema::empty(name))
    }

    pub fn with_options(schema: Arc<ModelSchema>, options: ModelOptions) -> Result<Self, Error> {
        let mut model = Self::new(schema);
        if let Some(name) = options.name {
            model.name = name;
        }
        model.defaults = options.defaults;

        let mut initial = Vec::new();
        for (key, value) in options.settings.iter() {
            if model.schema.bindings().contains(key) {
                initial.push((key.clone(), value.clone()));
            } else {
                model.settings.insert(key.clone(), value.clone());
            }
        }
        for (field, value) in initial {
            model.set(&field, value)?;
        }
        Ok(model)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Arc<ModelSchema> {
        &self.schema
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn defaults(&self) -> &BTreeMap<String, Value> {
        &self.defaults
    }

    /// Schema settings < `settings` < instance settings.
    ///
    /// An instance built with a version stays pinned to it whatever the
    /// caller passes.
    pub fn effective_settings(&self, settings: &Settings) -> Settings {
        self.schema
            .settings()
            .merged(settings)
            .merged(&self.settings)
    }

    fn default_for(&self, binding: &PrimaryBinding, name: &str) -> Option<&Value> {
        self.defaults
            .get(name)
            .or_else(|| self.defaults.get(binding.name()))
    }

    /// Read a field (or alias) by name.
    pub fn read(&self, name: &str) -> Result<Read<'_>, Error> {
        let binding = lookup(&self.schema, name)?;
        Ok(binding.read(&self.slots[binding.slot()], self.default_for(binding, name)))
    }

    /// The field's value; a nested model yields its safe snapshot.
    pub fn get(&self, name: &str) -> Result<Option<Value>, Error> {
        Ok(match self.read(name)? {
            Read::Value(value) => Some(value),
            Read::Missing => None,
            Read::Model(model) => Some(model.state().into_value()),
        })
    }

    pub fn set(&mut self, name: &str, write: impl Into<Write>) -> Result<(), Error> {
        let binding = lookup(&self.schema, name)?;
        binding.write(&mut self.slots[binding.slot()], write.into())
    }

    pub fn clear_field(&mut self, name: &str) -> Result<(), Error> {
        self.set(name, Write::Clear)
    }

    pub fn nested(&self, name: &str) -> Result<&Model, Error> {
        match self.read(name)? {
            Read::Model(model) => Ok(model),
            _ => Err(Error::NotAModel {
                field: name.to_string(),
            }),
        }
    }

    pub fn nested_mut(&mut self, name: &str) -> Result<&mut Model, Error> {
        let binding = lookup(&self.schema, name)?;
        match &mut self.slots[binding.slot()] {
            Slot::Nested(cell) => binding.nested_mut(cell),
            Slot::Leaf(_) => Err(Error::NotAModel {
                field: name.to_string(),
            }),
        }
    }

    /// Read through nested models, e.g. `address/street`.
    pub fn read_path(&self, path: &Path) -> Result<Read<'_>, Error> {
        let (first, rest) = path.split_first().ok_or_else(empty_path)?;
        if rest.is_empty() {
            self.read(first)
        } else {
            self.nested(first)?.read_path(&rest)
        }
    }

    pub fn write_path(&mut self, path: &Path, write: impl Into<Write>) -> Result<(), Error> {
        let (first, rest) = path.split_first().ok_or_else(empty_path)?;
        if rest.is_empty() {
            self.set(first, write)
        } else {
            self.nested_mut(first)?.write_path(&rest, write)
        }
    }

    /// Every effective default; nested models contribute their own as maps.
    pub fn default_state(&self) -> State {
        let mut state = State::new();
        for binding in self.schema.bindings().primaries() {
            match &self.slots[binding.slot()] {
                Slot::Nested(cell) => {
                    let nested = binding.nested(cell);
                    state.insert(binding.name(), nested.default_state().into_value());
                }
                Slot::Leaf(_) => {
                    if let Some(value) = self
                        .default_for(binding, binding.name())
                        .or(binding.component().default_value())
                    {
                        state.insert(binding.name(), value.clone());
                    }
                }
            }
        }
        state
    }

    pub fn suitable_components(&self, settings: &Settings) -> Matching {
        self.schema
            .stack()
            .get_matching_components(&self.effective_settings(settings))
    }

    fn suitable_bindings(&self, settings: &Settings) -> Vec<&PrimaryBinding> {
        let matching = self.suitable_components(settings);
        self.schema
            .bindings()
            .primaries()
            .filter(|binding| matching.iter().any(|(name, _)| name == binding.name()))
            .collect()
    }

    /// Snapshot the applicable fields.
    ///
    /// A field with no value and no default is filled with `fill`, or
    /// reported as [`Error::MissingValue`] when no fill value is given.
    pub fn get_state(&self, fill: Option<&Value>, settings: &Settings) -> Result<State, Error> {
        let nested_settings = settings.merged(&self.settings);
        let mut state = State::new();
        for binding in self.suitable_bindings(settings) {
            let name = binding.name();
            let value = match self.read(name)? {
                Read::Value(value) => value,
                Read::Model(model) => model.get_state(fill, &nested_settings)?.into_value(),
                Read::Missing => match fill {
                    Some(fill) => fill.clone(),
                    None => {
                        return Err(Error::MissingValue {
                            field: name.to_string(),
                            kind: binding.component().kind_name().to_string(),
                        })
                    }
                },
            };
            state.insert(name, value);
        }
        Ok(state)
    }

    /// The snapshot with `Null` standing in for missing values.
    pub fn state(&self) -> State {
        let mut state = State::new();
        for binding in self.suitable_bindings(&Settings::new()) {
            let value = match binding.read(
                &self.slots[binding.slot()],
                self.default_for(binding, binding.name()),
            ) {
                Read::Value(value) => value,
                Read::Model(model) => model.state().into_value(),
                Read::Missing => Value::Null,
            };
            state.insert(binding.name(), value);
        }
        state
    }

    /// Apply a sequence (zipped against declaration order) or a mapping.
    ///
    /// Names the model does not bind are skipped. Payloads for nested models
    /// are shape-checked at every depth before anything is written, so a
    /// failed call leaves the model untouched.
    pub fn set_state(&mut self, state: impl Into<RawState>) -> Result<&mut Self, Error> {
        let writes = planned_writes(&self.schema, &self.name, state.into());
        check_nested_payloads(&self.schema, &writes)?;
        for (name, value) in writes {
            self.set(&name, value)?;
        }
        Ok(self)
    }

    /// Keyword-style [`set_state`](Self::set_state).
    pub fn bind<K, V>(&mut self, values: impl IntoIterator<Item = (K, V)>) -> Result<&mut Self, Error>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.set_state(RawState::mapping(values))
    }

    /// Normalize a decoded value and apply it.
    pub fn load_state(&mut self, raw: Value) -> Result<&mut Self, Error> {
        let state = RawState::try_from(raw)?;
        self.set_state(state)
    }

    /// Unset every field, recursing into nested models.
    pub fn clear(&mut self) -> &mut Self {
        for slot in &mut self.slots {
            match slot {
                Slot::Leaf(value) => *value = None,
                Slot::Nested(cell) => {
                    if let Some(nested) = cell.get_mut() {
                        nested.clear();
                    }
                }
            }
        }
        self
    }

    /// `(name, read)` for every primary field, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Read<'_>)> {
        self.schema.bindings().primaries().map(move |binding| {
            let read = binding.read(
                &self.slots[binding.slot()],
                self.default_for(binding, binding.name()),
            );
            (binding.name(), read)
        })
    }

    pub fn context(&self, settings: &Settings) -> ModelContext {
        ModelContext {
            name: self.name.clone(),
            components: self.suitable_components(settings),
            defaults: self.defaults.clone(),
        }
    }

    /// Encode the applicable state through `target`.
    pub fn dump<'t>(&self, target: impl Into<Target<'t>>, settings: &Settings) -> Result<Bytes, Error> {
        let effective = self.effective_settings(settings);
        let serializer = resolve_serializer(target.into(), &self.context(settings), &effective)?;
        let state = self.get_state(None, settings)?;
        serializer.dump(&state.into_value(), &effective)
    }

    /// Decode `payload` through `target` and apply it to this model.
    pub fn load<'t>(
        &mut self,
        target: impl Into<Target<'t>>,
        payload: &Bytes,
        settings: &Settings,
    ) -> Result<&mut Self, Error> {
        let effective = self.effective_settings(settings);
        let serializer = resolve_serializer(target.into(), &self.context(settings), &effective)?;
        let raw = serializer.load(payload, &effective)?;
        self.load_state(raw)
    }
}

impl PartialEq for Model {
    fn eq(&self, other: &Self) -> bool {
        self.state() == other.state()
    }
}

impl PartialOrd for Model {
    /// Field-by-field over the fields both states share, in declaration
    /// order. When only one side has extra fields, the side missing them
    /// counts as the greater one. Disjoint extras, or shared fields declared
    /// in a different order, are unordered.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        let lhs = self.state();
        let rhs = other.state();
        let shared: Vec<&str> = lhs.keys().filter(|name| rhs.contains(name)).collect();
        if !rhs
            .keys()
            .filter(|name| lhs.contains(name))
            .eq(shared.iter().copied())
        {
            return None;
        }

        let lhs_extra = lhs.len() > shared.len();
        let rhs_extra = rhs.len() > shared.len();
        if lhs_extra && rhs_extra {
            return None;
        }

        for name in &shared {
            match lhs.get(name)?.compare(rhs.get(name)?)? {
                Ordering::Equal => continue,
                unequal => return Some(unequal),
            }
        }
        Some(match (lhs_extra, rhs_extra) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => Ordering::Equal,
        })
    }
}
