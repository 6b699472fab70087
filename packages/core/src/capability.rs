//! Capability registration and composition.
//!
//! A [`Capability`] is a named bundle of [`Feature`]s. Registering one
//! partitions its features into independent and dependent sets and freezes
//! its table. A [`Composition`] layers the capabilities a codec declares,
//! fewest dependents first, into one immutable feature table.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;

use crate::feature::Feature;
use crate::serializer::Serializer;
use crate::{Error, Settings, Value};

/// Serializer operation name for encoding.
pub const DUMP: &str = "dump";
/// Serializer operation name for decoding.
pub const LOAD: &str = "load";

/// Name -> feature layers, in insertion order.
///
/// A non-override feature is layered beside an existing one of the same
/// name; an override replaces every earlier layer.
#[derive(Clone, Debug, Default)]
pub struct FeatureTable {
    entries: Vec<(String, Vec<Feature>)>,
}

impl FeatureTable {
    fn insert(&mut self, feature: Feature) {
        match self
            .entries
            .iter_mut()
            .find(|(name, _)| name == feature.name())
        {
            Some((_, layers)) if feature.is_override() => *layers = vec![feature],
            Some((_, layers)) => layers.push(feature),
            None => self.entries.push((feature.name().to_string(), vec![feature])),
        }
    }

    /// The effective (most recent) feature called `name`.
    pub fn get(&self, name: &str) -> Option<&Feature> {
        self.layers(name).last()
    }

    /// Every layer of `name`, oldest first.
    pub fn layers(&self, name: &str) -> &[Feature] {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map_or(&[], |(_, layers)| layers.as_slice())
    }

    pub fn contains(&self, name: &str) -> bool {
        !self.layers(name).is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// All layers of all features, in table order.
    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.entries.iter().flat_map(|(_, layers)| layers.iter())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A registered bundle of features.
#[derive(Clone, Debug)]
pub struct Capability {
    name: String,
    table: FeatureTable,
    dependent: Vec<Feature>,
}

impl Capability {
    /// Register `features` under `name`.
    ///
    /// Disabled features are dropped. Dependent features are recorded after
    /// the independent ones.
    pub fn register(name: impl Into<String>, features: impl IntoIterator<Item = Feature>) -> Self {
        let name = name.into();
        let (dependent, independent): (Vec<_>, Vec<_>) = features
            .into_iter()
            .filter(|feature| !feature.is_disabled())
            .partition(Feature::is_dependent);

        let mut table = FeatureTable::default();
        for feature in independent.iter().chain(dependent.iter()) {
            table.insert(feature.clone());
        }
        log::debug!(
            "registered capability {:?}: {} features, {} dependent",
            name,
            table.len(),
            dependent.len()
        );
        Self {
            name,
            table,
            dependent,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn features(&self) -> &FeatureTable {
        &self.table
    }

    pub fn total_dependents(&self) -> usize {
        self.dependent.len()
    }

    pub fn dependents(&self) -> &[Feature] {
        &self.dependent
    }
}

/// The set of known capabilities.
#[derive(Debug, Default)]
pub struct CapabilityRegistry {
    capabilities: BTreeMap<String, Arc<Capability>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, capability: Capability) -> Result<Arc<Capability>, Error> {
        if self.capabilities.contains_key(capability.name()) {
            return Err(Error::DuplicateCapability {
                name: capability.name().to_string(),
            });
        }
        let capability = Arc::new(capability);
        self.capabilities
            .insert(capability.name().to_string(), Arc::clone(&capability));
        Ok(capability)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Capability>> {
        self.capabilities.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.capabilities.contains_key(name)
    }

    /// The registered capabilities among `bases`, fewest dependents first.
    ///
    /// Unregistered names are skipped. Ties keep declaration order.
    pub fn get_plugins(&self, bases: &[&str]) -> Vec<Arc<Capability>> {
        let mut plugins: Vec<_> = bases
            .iter()
            .filter_map(|base| self.capabilities.get(*base).cloned())
            .collect();
        plugins.sort_by_key(|capability| capability.total_dependents());
        plugins
    }

    /// Compose the capabilities `codec` declares in `bases`.
    ///
    /// Every dependent feature must find its prerequisite among the features
    /// of the capabilities composed so far, its own included.
    pub fn compose(&self, codec: impl Into<String>, bases: &[&str]) -> Result<Composition, Error> {
        let codec = codec.into();
        let order = self.get_plugins(bases);
        let mut table = FeatureTable::default();

        for capability in &order {
            for feature in capability.features().iter() {
                table.insert(feature.clone());
            }
            for feature in capability.dependents() {
                if let Some(requires) = feature.requires() {
                    if !table.contains(requires) {
                        return Err(Error::MissingPrerequisite {
                            feature: feature.name().to_string(),
                            requires: requires.to_string(),
                        });
                    }
                }
            }
        }

        log::debug!(
            "composed {:?} from [{}]",
            codec,
            order
                .iter()
                .map(|c| c.name())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(Composition {
            codec,
            order,
            table,
        })
    }
}

/// The immutable feature table of one codec.
#[derive(Clone, Debug)]
pub struct Composition {
    codec: String,
    order: Vec<Arc<Capability>>,
    table: FeatureTable,
}

impl Composition {
    pub fn codec(&self) -> &str {
        &self.codec
    }

    /// Capabilities in composition order.
    pub fn capabilities(&self) -> &[Arc<Capability>] {
        &self.order
    }

    pub fn table(&self) -> &FeatureTable {
        &self.table
    }

    pub fn feature(&self, name: &str) -> Option<&Feature> {
        self.table.get(name)
    }

    /// Run the effective feature called `name`.
    pub fn call(&self, name: &str, value: Value, settings: &Settings) -> Result<Value, Error> {
        let feature = self.feature(name).ok_or_else(|| {
            Error::other(format!("{} has no feature {:?}", self.codec, name))
        })?;
        feature.run(value, settings)
    }

    pub fn hooks_before<'a>(&'a self, op: &'a str) -> impl Iterator<Item = &'a Feature> + 'a {
        self.table.iter().filter(move |f| f.before() == Some(op))
    }

    pub fn hooks_after<'a>(&'a self, op: &'a str) -> impl Iterator<Item = &'a Feature> + 'a {
        self.table.iter().filter(move |f| f.after() == Some(op))
    }

    pub fn apply_before(&self, op: &str, value: Value, settings: &Settings) -> Result<Value, Error> {
        self.hooks_before(op)
            .try_fold(value, |value, hook| hook.run(value, settings))
    }

    pub fn apply_after(&self, op: &str, value: Value, settings: &Settings) -> Result<Value, Error> {
        self.hooks_after(op)
            .try_fold(value, |value, hook| hook.run(value, settings))
    }
}

/// Wraps a serializer with the hooks of a composition.
///
/// `before("dump")` hooks see the state, `after("dump")` and
/// `before("load")` hooks see the payload as `Value::Bytes`, and
/// `after("load")` hooks see the decoded raw state.
#[derive(Clone)]
pub struct ComposedSerializer {
    inner: Arc<dyn Serializer>,
    composition: Arc<Composition>,
}

impl ComposedSerializer {
    pub fn new(inner: Arc<dyn Serializer>, composition: Arc<Composition>) -> Self {
        Self { inner, composition }
    }

    pub fn composition(&self) -> &Arc<Composition> {
        &self.composition
    }
}

fn expect_bytes(op: &str, value: Value) -> Result<Bytes, Error> {
    match value {
        Value::Bytes(bytes) => Ok(Bytes::from(bytes)),
        other => Err(Error::other(format!(
            "{op} hook returned {} where bytes were expected",
            other.kind()
        ))),
    }
}

impl Serializer for ComposedSerializer {
    fn dump(&self, state: &Value, settings: &Settings) -> Result<Bytes, Error> {
        let state = self.composition.apply_before(DUMP, state.clone(), settings)?;
        let payload = self.inner.dump(&state, settings)?;
        if self.composition.hooks_after(DUMP).next().is_none() {
            return Ok(payload);
        }
        let payload = self
            .composition
            .apply_after(DUMP, Value::Bytes(payload.to_vec()), settings)?;
        expect_bytes(DUMP, payload)
    }

    fn load(&self, payload: &Bytes, settings: &Settings) -> Result<Value, Error> {
        let raw = if self.composition.hooks_before(LOAD).next().is_none() {
            self.inner.load(payload, settings)?
        } else {
            let payload = self
                .composition
                .apply_before(LOAD, Value::Bytes(payload.to_vec()), settings)?;
            self.inner.load(&expect_bytes(LOAD, payload)?, settings)?
        };
        self.composition.apply_after(LOAD, raw, settings)
    }

    fn get_dependency(
        &self,
        name: &str,
        default: Option<&Value>,
        settings: &Settings,
    ) -> Result<Arc<dyn Serializer>, Error> {
        let inner = self.inner.get_dependency(name, default, settings)?;
        Ok(Arc::new(ComposedSerializer::new(
            inner,
            Arc::clone(&self.composition),
        )))
    }
}
