//! Stack: an ordered, thread-safe, filterable collection of components.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::component::{Component, ComponentArg};
use crate::predicate::{Applicability, VersionRange};
use crate::{Error, Settings};

/// Matching components keyed by name, in stack order.
pub type Matching = Vec<(String, Arc<Component>)>;

/// An ordered sequence of components plus a mutation lock.
///
/// Every mutating or index-reading operation takes the lock for exactly one
/// `Vec` operation. Normalization in [`Stack::add`] happens outside the
/// lock, so building nested stacks never serializes against this one.
///
/// Components are claimed when they enter the stack and released when they
/// leave it (through `pop`, `discard`, `clear`, or drop).
pub struct Stack {
    components: Mutex<Vec<Arc<Component>>>,
    predicate: Box<dyn Applicability>,
}

impl Stack {
    /// A version-aware stack.
    pub fn new() -> Self {
        Self::with_predicate(VersionRange::new())
    }

    pub fn with_predicate(predicate: impl Applicability + 'static) -> Self {
        Self::with_boxed_predicate(Box::new(predicate))
    }

    pub fn with_boxed_predicate(predicate: Box<dyn Applicability>) -> Self {
        Self {
            components: Mutex::new(Vec::new()),
            predicate,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<Component>>> {
        self.components.lock().unwrap_or_else(|poisoned: PoisonError<_>| {
            log::warn!("recovering poisoned component stack lock");
            poisoned.into_inner()
        })
    }

    /// Normalize `component`, name it and append it.
    ///
    /// Bare kinds are instantiated and nested-model references are wrapped.
    /// A built component that another stack already owns is duplicated when
    /// it is copyable; otherwise this fails with [`Error::AlreadyOwned`].
    pub fn add(
        &self,
        component: impl Into<ComponentArg>,
        settings: &Settings,
        default_name: Option<&str>,
    ) -> Result<Arc<Component>, Error> {
        let component = self.normalize(component.into(), default_name)?;
        log::trace!(
            "adding component {:?} ({}) with {} settings",
            component.name(),
            component.kind_name(),
            settings.len()
        );
        self.lock().push(Arc::clone(&component));
        Ok(component)
    }

    fn normalize(
        &self,
        component: ComponentArg,
        default_name: Option<&str>,
    ) -> Result<Arc<Component>, Error> {
        let component = match component {
            ComponentArg::Kind(kind) => Arc::new(Component::leaf(kind)),
            ComponentArg::Model(schema) => Arc::new(Component::model(schema)),
            ComponentArg::Built(component) => component,
        };
        let component = Self::claim(component)?;
        if let Err(e) = component.assign_name(default_name) {
            component.release();
            return Err(e);
        }
        Ok(component)
    }

    fn claim(component: Arc<Component>) -> Result<Arc<Component>, Error> {
        if component.claim() {
            return Ok(component);
        }
        if !component.is_copyable() {
            return Err(Error::AlreadyOwned {
                component: component.name().unwrap_or(component.kind_name()).to_string(),
            });
        }
        let copy = Arc::new(component.duplicate());
        copy.claim();
        Ok(copy)
    }

    /// Append a component, claiming it.
    pub fn push(&self, component: impl Into<ComponentArg>) -> Result<Arc<Component>, Error> {
        self.add(component, &Settings::new(), None)
    }

    /// Insert at `index`, clamped to the current length.
    pub fn insert(
        &self,
        index: usize,
        component: impl Into<ComponentArg>,
    ) -> Result<Arc<Component>, Error> {
        let component = self.normalize(component.into(), None)?;
        let mut components = self.lock();
        let index = index.min(components.len());
        log::trace!("inserting component {:?} at {}", component.name(), index);
        components.insert(index, Arc::clone(&component));
        Ok(component)
    }

    /// Remove and release the component at `index`; `None` when out of range.
    pub fn pop(&self, index: usize) -> Option<Arc<Component>> {
        let mut components = self.lock();
        if index >= components.len() {
            return None;
        }
        let component = components.remove(index);
        drop(components);
        component.release();
        log::trace!("popped component {:?}", component.name());
        Some(component)
    }

    /// Remove and release the last component.
    pub fn pop_last(&self) -> Option<Arc<Component>> {
        let component = self.lock().pop()?;
        component.release();
        Some(component)
    }

    /// Remove `component` (by identity); `false` if it is not a member.
    pub fn discard(&self, component: &Arc<Component>) -> bool {
        let mut components = self.lock();
        let Some(index) = components.iter().position(|c| Arc::ptr_eq(c, component)) else {
            return false;
        };
        components.remove(index);
        drop(components);
        component.release();
        log::trace!("discarded component {:?}", component.name());
        true
    }

    /// Remove and release every component.
    pub fn clear(&self) {
        let drained: Vec<_> = self.lock().drain(..).collect();
        for component in &drained {
            component.release();
        }
        log::trace!("cleared {} components", drained.len());
    }

    /// The component at `index` if it applies to `settings`.
    pub fn get(&self, index: usize, settings: &Settings) -> Option<Arc<Component>> {
        let component = self.lock().get(index).cloned()?;
        self.matches(&component, settings).then_some(component)
    }

    /// Every component applicable to `settings`, keyed by name in stack order.
    ///
    /// A later component with the same name replaces the earlier entry.
    pub fn get_matching_components(&self, settings: &Settings) -> Matching {
        let snapshot = self.components();
        let mut matching: Matching = Vec::with_capacity(snapshot.len());
        for component in snapshot {
            if !self.matches(&component, settings) {
                continue;
            }
            let Some(name) = component.name().map(str::to_string) else {
                continue;
            };
            match matching.iter_mut().find(|(existing, _)| *existing == name) {
                Some(entry) => entry.1 = component,
                None => matching.push((name, component)),
            }
        }
        matching
    }

    pub fn matches(&self, component: &Component, settings: &Settings) -> bool {
        self.predicate.matches(component, settings)
    }

    /// Snapshot of the members, unfiltered.
    pub fn components(&self) -> Vec<Arc<Component>> {
        self.lock().clone()
    }

    pub fn contains(&self, component: &Arc<Component>) -> bool {
        self.lock().iter().any(|c| Arc::ptr_eq(c, component))
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl Default for Stack {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Stack {
    fn drop(&mut self) {
        let components = self
            .components
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        for component in components.drain(..) {
            component.release();
        }
    }
}

impl fmt::Debug for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self
            .components()
            .iter()
            .map(|c| c.name().unwrap_or("?").to_string())
            .collect();
        f.debug_struct("Stack").field("components", &names).finish()
    }
}
