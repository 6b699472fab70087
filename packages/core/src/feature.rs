//! Features: composable behavior units attached to serializers.

use std::fmt;
use std::sync::Arc;

use crate::{Error, Settings, Value};

/// Executable body of a feature: transforms a value under the call settings.
pub type Hook = Arc<dyn Fn(Value, &Settings) -> Result<Value, Error> + Send + Sync>;

/// What running a feature does.
#[derive(Clone)]
pub enum FeatureAction {
    Hook(Hook),
    /// Ignore the input and produce this constant.
    Default(Value),
}

impl fmt::Debug for FeatureAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureAction::Hook(_) => f.write_str("Hook(..)"),
            FeatureAction::Default(value) => f.debug_tuple("Default").field(value).finish(),
        }
    }
}

/// A named behavior contributed by a capability.
///
/// A feature with `before`/`after` set is a hook on that serializer
/// operation; otherwise it is a plain export looked up by name. A feature
/// that `requires` another is dependent and is ordered after independent
/// ones when its capability registers.
#[derive(Clone, Debug)]
pub struct Feature {
    name: String,
    action: FeatureAction,
    disabled: bool,
    replaces: bool,
    before: Option<String>,
    after: Option<String>,
    requires: Option<String>,
}

impl Feature {
    /// Start declaring a feature called `name`.
    pub fn builder(name: impl Into<String>) -> FeatureBuilder {
        FeatureBuilder {
            name: name.into(),
            hook: None,
            constant: None,
            disabled: false,
            replaces: false,
            before: None,
            after: None,
            requires: None,
        }
    }

    /// A constant-valued export.
    pub fn constant(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            action: FeatureAction::Default(value.into()),
            disabled: false,
            replaces: false,
            before: None,
            after: None,
            requires: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn action(&self) -> &FeatureAction {
        &self.action
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Whether this feature replaces a same-named one instead of layering beside it.
    pub fn is_override(&self) -> bool {
        self.replaces
    }

    pub fn before(&self) -> Option<&str> {
        self.before.as_deref()
    }

    pub fn after(&self) -> Option<&str> {
        self.after.as_deref()
    }

    pub fn requires(&self) -> Option<&str> {
        self.requires.as_deref()
    }

    pub fn is_hook(&self) -> bool {
        self.before.is_some() || self.after.is_some()
    }

    pub fn is_dependent(&self) -> bool {
        self.requires.is_some()
    }

    pub fn run(&self, value: Value, settings: &Settings) -> Result<Value, Error> {
        match &self.action {
            FeatureAction::Hook(hook) => hook(value, settings),
            FeatureAction::Default(constant) => Ok(constant.clone()),
        }
    }
}

/// Declares a [`Feature`].
///
/// ```rust
/// use modelcast_core::{Feature, Value};
///
/// let upper = Feature::builder("upper")
///     .before("dump")
///     .hook(|value, _settings| Ok(value))
///     .build()
///     .unwrap();
/// assert!(upper.is_hook());
///
/// let conflict = Feature::builder("both")
///     .hook(|value, _settings| Ok(value))
///     .constant(Value::Null)
///     .build();
/// assert!(conflict.is_err());
/// ```
pub struct FeatureBuilder {
    name: String,
    hook: Option<Hook>,
    constant: Option<Value>,
    disabled: bool,
    replaces: bool,
    before: Option<String>,
    after: Option<String>,
    requires: Option<String>,
}

impl FeatureBuilder {
    #[must_use]
    pub fn hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(Value, &Settings) -> Result<Value, Error> + Send + Sync + 'static,
    {
        self.hook = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn constant(mut self, value: impl Into<Value>) -> Self {
        self.constant = Some(value.into());
        self
    }

    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    #[must_use]
    pub fn overriding(mut self) -> Self {
        self.replaces = true;
        self
    }

    /// Run before serializer operation `op` (`"dump"` or `"load"`).
    #[must_use]
    pub fn before(mut self, op: impl Into<String>) -> Self {
        self.before = Some(op.into());
        self
    }

    /// Run after serializer operation `op`.
    #[must_use]
    pub fn after(mut self, op: impl Into<String>) -> Self {
        self.after = Some(op.into());
        self
    }

    /// Name the feature this one depends on.
    #[must_use]
    pub fn requires(mut self, feature: impl Into<String>) -> Self {
        self.requires = Some(feature.into());
        self
    }

    pub fn build(self) -> Result<Feature, Error> {
        let action = match (self.hook, self.constant) {
            (Some(_), Some(_)) => {
                return Err(Error::FeatureConflict { feature: self.name });
            }
            (Some(hook), None) => FeatureAction::Hook(hook),
            (None, constant) => FeatureAction::Default(constant.unwrap_or(Value::Null)),
        };
        Ok(Feature {
            name: self.name,
            action,
            disabled: self.disabled,
            replaces: self.replaces,
            before: self.before,
            after: self.after,
            requires: self.requires,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hook_and_constant_conflict() {
        let err = Feature::builder("f")
            .hook(|v, _| Ok(v))
            .constant(1)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::FeatureConflict { ref feature } if feature == "f"));
        assert!(err.is_construction());
    }

    #[test]
    fn bare_feature_yields_null() {
        let f = Feature::builder("noop").build().unwrap();
        assert_eq!(f.run(Value::from(3), &Settings::new()).unwrap(), Value::Null);
        assert!(!f.is_hook());
        assert!(!f.is_dependent());
    }

    #[test]
    fn hooks_see_settings() {
        let f = Feature::builder("scale")
            .before("dump")
            .hook(|v, settings| {
                let factor = settings.get_integer("factor").unwrap_or(1);
                Ok(Value::from(v.as_integer().unwrap_or(0) * factor))
            })
            .build()
            .unwrap();

        let out = f
            .run(Value::from(4), &Settings::new().with("factor", 3))
            .unwrap();
        assert_eq!(out, Value::Integer(12));
        assert_eq!(f.before(), Some("dump"));
    }

    #[test]
    fn constant_ignores_input() {
        let f = Feature::constant("magic", "cafe");
        assert_eq!(
            f.run(Value::Null, &Settings::new()).unwrap(),
            Value::from("cafe")
        );
    }

    #[test]
    fn flags_are_recorded() {
        let f = Feature::builder("x")
            .requires("y")
            .overriding()
            .disabled()
            .after("load")
            .build()
            .unwrap();
        assert!(f.is_dependent());
        assert_eq!(f.requires(), Some("y"));
        assert!(f.is_override());
        assert!(f.is_disabled());
        assert!(f.is_hook());
    }
}
