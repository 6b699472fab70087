//! Applicability rules deciding which components participate in a context.

use crate::settings::VERSION_KEY;
use crate::{Component, Settings};

/// Decides whether a component is active for the given settings.
///
/// A [`Stack`](crate::Stack) is generic over this rule, so filters other
/// than version ranges plug in without touching stack mutation logic.
pub trait Applicability: Send + Sync {
    fn matches(&self, component: &Component, settings: &Settings) -> bool;
}

impl<F> Applicability for F
where
    F: Fn(&Component, &Settings) -> bool + Send + Sync,
{
    fn matches(&self, component: &Component, settings: &Settings) -> bool {
        self(component, settings)
    }
}

/// The default rule: `since_version <= v <= until_version`.
///
/// `v` is read from the settings' version key, falling back to
/// `default_version` (unbounded-high unless configured). Missing bounds
/// default to unbounded-low and unbounded-high.
#[derive(Clone, Debug)]
pub struct VersionRange {
    version_field: String,
    default_version: i64,
}

impl VersionRange {
    pub fn new() -> Self {
        Self {
            version_field: VERSION_KEY.to_string(),
            default_version: i64::MAX,
        }
    }

    /// Read the version from a different settings key.
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.version_field = field.into();
        self
    }

    /// Version assumed when the settings carry none.
    #[must_use]
    pub fn with_default_version(mut self, version: i64) -> Self {
        self.default_version = version;
        self
    }

    pub fn version_field(&self) -> &str {
        &self.version_field
    }

    pub fn version(&self, settings: &Settings) -> i64 {
        settings
            .get_integer(&self.version_field)
            .unwrap_or(self.default_version)
    }
}

impl Default for VersionRange {
    fn default() -> Self {
        Self::new()
    }
}

impl Applicability for VersionRange {
    fn matches(&self, component: &Component, settings: &Settings) -> bool {
        let version = self.version(settings);
        let since = component.since_version().unwrap_or(i64::MIN);
        let until = component.until_version().unwrap_or(i64::MAX);
        since <= version && version <= until
    }
}

/// Accepts every component.
#[derive(Clone, Copy, Debug, Default)]
pub struct Always;

impl Applicability for Always {
    fn matches(&self, _component: &Component, _settings: &Settings) -> bool {
        true
    }
}

/// Passes a component iff every flag it declares is truthy in the settings.
#[derive(Clone, Copy, Debug, Default)]
pub struct FlagPredicate;

impl Applicability for FlagPredicate {
    fn matches(&self, component: &Component, settings: &Settings) -> bool {
        component.flags().iter().all(|flag| settings.get_bool(flag))
    }
}

/// Passes a component iff every inner rule does.
pub struct AllOf(pub Vec<Box<dyn Applicability>>);

impl Applicability for AllOf {
    fn matches(&self, component: &Component, settings: &Settings) -> bool {
        self.0.iter().all(|rule| rule.matches(component, settings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(version: i64) -> Settings {
        Settings::new().with(VERSION_KEY, version)
    }

    #[test]
    fn bounds_are_inclusive() {
        let rule = VersionRange::new();
        let c = Component::integer().since(2).until(5);

        assert!(rule.matches(&c, &at(2)));
        assert!(rule.matches(&c, &at(5)));
        assert!(!rule.matches(&c, &at(1)));
        assert!(!rule.matches(&c, &at(6)));
    }

    #[test]
    fn missing_version_means_latest() {
        let rule = VersionRange::new();
        assert!(rule.matches(&Component::integer().since(100), &Settings::new()));
        assert!(!rule.matches(&Component::integer().until(100), &Settings::new()));
    }

    #[test]
    fn unbounded_component_always_matches() {
        let rule = VersionRange::new();
        let c = Component::integer();
        assert!(rule.matches(&c, &at(i64::MIN)));
        assert!(rule.matches(&c, &at(i64::MAX)));
    }

    #[test]
    fn custom_field_and_default_version() {
        let rule = VersionRange::new()
            .with_field("protocol")
            .with_default_version(1);
        let c = Component::integer().since(2);

        assert!(!rule.matches(&c, &Settings::new()));
        assert!(rule.matches(&c, &Settings::new().with("protocol", 2)));
        // the standard key is ignored
        assert!(!rule.matches(&c, &at(9)));
    }

    #[test]
    fn flags_must_all_be_enabled() {
        let c = Component::string().flag("beta").flag("tracing");
        let on = Settings::new().with("beta", true).with("tracing", 1);
        let partial = Settings::new().with("beta", true);

        assert!(FlagPredicate.matches(&c, &on));
        assert!(!FlagPredicate.matches(&c, &partial));
        assert!(FlagPredicate.matches(&Component::string(), &Settings::new()));
    }

    #[test]
    fn all_of_and_closures_compose() {
        let rule = AllOf(vec![
            Box::new(VersionRange::new()),
            Box::new(|c: &Component, _: &Settings| c.name() != Some("hidden")),
        ]);

        assert!(rule.matches(&Component::integer().named("id"), &at(1)));
        assert!(!rule.matches(&Component::integer().named("hidden"), &at(1)));
        assert!(!rule.matches(&Component::integer().since(2), &at(1)));
        assert!(Always.matches(&Component::integer().since(2), &at(1)));
    }
}
