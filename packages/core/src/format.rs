//! Wire format identifiers.

use std::borrow::Cow;
use std::fmt;

/// Identifies the external encoding a driver produces.
///
/// MIME-type-like strings are used for familiarity; any string a driver
/// understands works.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Format(pub Cow<'static, str>);

impl Format {
    /// JSON format (`application/json`)
    pub const JSON: Format = Format(Cow::Borrowed("application/json"));

    /// MessagePack (`application/msgpack`)
    pub const MSGPACK: Format = Format(Cow::Borrowed("application/msgpack"));

    /// A state that was never encoded.
    ///
    /// Reported by conversions that stay inside the `Value` tree.
    pub const VALUE: Format = Format(Cow::Borrowed("application/x-modelcast-value"));

    pub const fn from_static(s: &'static str) -> Self {
        Format(Cow::Borrowed(s))
    }

    pub fn new(s: impl Into<String>) -> Self {
        Format(Cow::Owned(s.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&'static str> for Format {
    fn from(s: &'static str) -> Self {
        Format(Cow::Borrowed(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_and_custom_formats_compare_by_string() {
        assert_eq!(Format::JSON, Format::new("application/json"));
        assert_ne!(Format::JSON, Format::MSGPACK);
        assert_eq!(Format::from("text/plain").as_str(), "text/plain");
    }

    #[test]
    fn display_impl() {
        assert_eq!(Format::VALUE.to_string(), "application/x-modelcast-value");
    }
}
