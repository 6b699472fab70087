//! Error types for the core layer.

use crate::format::Format;
use crate::path::PathError;
use crate::value::ValueKind;

/// Errors raised by schema construction and by model operations.
///
/// Construction errors (see [`Error::is_construction`]) surface while a
/// schema, stack or capability is being declared. The rest are raised to
/// callers of `get_state`, `load` and friends.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A field name or path is not a valid identifier chain.
    #[error("invalid name: {0}")]
    InvalidName(#[from] PathError),

    /// A component already claimed by another stack was reused and cannot be copied.
    #[error("component {component:?} is already owned by another stack")]
    AlreadyOwned { component: String },

    /// Two primary bindings share a name.
    #[error("duplicate field {name:?}")]
    DuplicateField { name: String },

    /// An alias points at a name that is not bound in the same model.
    #[error("alias {alias:?} refers to unknown field {target:?}")]
    UnknownAliasTarget { alias: String, target: String },

    /// An alias chain loops back onto itself.
    #[error("alias {alias:?} forms a cycle")]
    AliasCycle { alias: String },

    /// A feature was declared with both an executable hook and a constant default.
    #[error("feature {feature:?} can't simultaneously hold a hook and a default value")]
    FeatureConflict { feature: String },

    /// A dependent feature names a prerequisite that nothing provides.
    #[error("feature {feature:?} requires {requires:?}, which is not provided")]
    MissingPrerequisite { feature: String, requires: String },

    /// A capability with this name is already registered.
    #[error("capability {name:?} is already registered")]
    DuplicateCapability { name: String },

    /// A field has no stored value, no default, and no fill value was supplied.
    #[error("missing required {kind} value for field {field:?}")]
    MissingValue { field: String, kind: String },

    /// A decoded payload is neither a sequence nor a mapping.
    #[error("unsupported state type: {kind}")]
    UnsupportedPayload { kind: ValueKind },

    /// Direct by-name access to a field the model does not bind.
    #[error("unknown field {name:?}")]
    UnknownField { name: String },

    /// Nested access through a leaf field.
    #[error("field {field:?} does not refer to a model")]
    NotAModel { field: String },

    /// A driver failed to decode a payload.
    #[error("decode error ({format}): {message}")]
    Decode { format: Format, message: String },

    /// A driver failed to encode a state.
    #[error("encode error ({format}): {message}")]
    Encode { format: Format, message: String },

    /// The driver does not handle this format.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(Format),

    #[error("{message}")]
    Other { message: String },
}

impl Error {
    pub fn decode(format: Format, message: impl Into<String>) -> Self {
        Error::Decode {
            format,
            message: message.into(),
        }
    }

    pub fn encode(format: Format, message: impl Into<String>) -> Self {
        Error::Encode {
            format,
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Error::Other {
            message: message.into(),
        }
    }

    /// Whether this error belongs to the fail-fast declaration family.
    pub fn is_construction(&self) -> bool {
        matches!(
            self,
            Error::InvalidName(_)
                | Error::AlreadyOwned { .. }
                | Error::DuplicateField { .. }
                | Error::UnknownAliasTarget { .. }
                | Error::AliasCycle { .. }
                | Error::FeatureConflict { .. }
                | Error::MissingPrerequisite { .. }
                | Error::DuplicateCapability { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;

    #[test]
    fn missing_value_names_field_and_kind() {
        let e = Error::MissingValue {
            field: "name".to_string(),
            kind: "string".to_string(),
        };
        let display = e.to_string();
        assert!(display.contains("\"name\""));
        assert!(display.contains("string"));
        assert!(!e.is_construction());
    }

    #[test]
    fn unsupported_payload_display() {
        let e = Error::UnsupportedPayload {
            kind: ValueKind::Integer,
        };
        assert_eq!(e.to_string(), "unsupported state type: integer");
    }

    #[test]
    fn decode_error_display() {
        let e = Error::decode(Format::JSON, "unexpected token");
        let display = e.to_string();
        assert!(display.contains("decode error"));
        assert!(display.contains("json"));
        assert!(display.contains("unexpected token"));
    }

    #[test]
    fn construction_family() {
        assert!(Error::AliasCycle {
            alias: "a".to_string()
        }
        .is_construction());
        assert!(Error::FeatureConflict {
            feature: "f".to_string()
        }
        .is_construction());
        assert!(!Error::other("boom").is_construction());
    }

    #[test]
    fn path_error_converts_and_is_source() {
        let e: Error = PathError::InvalidPath {
            message: "test".to_string(),
        }
        .into();
        assert!(matches!(e, Error::InvalidName(_)));
        assert!(StdError::source(&e).is_some());
    }

    #[test]
    fn other_error_display() {
        assert_eq!(Error::other("something went wrong").to_string(), "something went wrong");
    }
}
