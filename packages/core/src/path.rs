//! Field names and nested field paths.
//!
//! Every attribute name a model exposes must be a Unicode identifier, so a
//! schema can be mirrored by generated code in most languages. A `Path` is a
//! `/`-separated chain of such names used to reach through nested models,
//! e.g. `customer/address/street`.

use std::fmt;

/// Errors related to field name and path validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    /// A path component is not a valid identifier.
    InvalidComponent {
        component: String,
        position: usize,
        message: String,
    },
    /// The path string is invalid.
    InvalidPath { message: String },
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathError::InvalidComponent {
                component,
                position,
                message,
            } => {
                write!(
                    f,
                    "invalid field name '{}' at position {}: {}",
                    component, position, message
                )
            }
            PathError::InvalidPath { message } => {
                write!(f, "invalid field path: {}", message)
            }
        }
    }
}

impl std::error::Error for PathError {}

/// A validated chain of field names.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Path {
    pub components: Vec<String>,
}

impl Path {
    /// Parse a path string, validating components.
    ///
    /// Empty components are ignored, so `a//b/` and `a/b` are the same path.
    ///
    /// ```rust
    /// use modelcast_core::Path;
    ///
    /// let path = Path::parse("customer/address/street").unwrap();
    /// assert_eq!(path.len(), 3);
    /// assert_eq!(Path::parse("a/b/").unwrap(), Path::parse("a/b").unwrap());
    /// ```
    pub fn parse(s: &str) -> Result<Self, PathError> {
        let components: Vec<String> = s
            .split('/')
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();

        for (i, component) in components.iter().enumerate() {
            Self::validate_component(component, i)?;
        }

        Ok(Path { components })
    }

    /// A single-component path.
    pub fn field(name: &str) -> Result<Self, PathError> {
        Self::validate_name(name)?;
        Ok(Path {
            components: vec![name.to_string()],
        })
    }

    /// Check that `name` can be used as a field name.
    pub fn validate_name(name: &str) -> Result<(), PathError> {
        Self::validate_component(name, 0)
    }

    fn validate_component(component: &str, position: usize) -> Result<(), PathError> {
        let mut chars = component.chars();
        let Some(first) = chars.next() else {
            return Err(PathError::InvalidComponent {
                component: component.to_string(),
                position,
                message: "empty name".to_string(),
            });
        };

        // XID_Start, or an underscore followed by XID_Continue
        let valid_start = unicode_ident::is_xid_start(first)
            || (first == '_'
                && chars
                    .clone()
                    .next()
                    .is_some_and(unicode_ident::is_xid_continue));

        if !valid_start {
            return Err(PathError::InvalidComponent {
                component: component.to_string(),
                position,
                message: "must start with a letter or underscore followed by letter/digit"
                    .to_string(),
            });
        }

        for c in chars {
            if !unicode_ident::is_xid_continue(c) {
                return Err(PathError::InvalidComponent {
                    component: component.to_string(),
                    position,
                    message: format!("invalid character '{}' in identifier", c),
                });
            }
        }

        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.components.iter()
    }

    /// First component and the remaining path, if any.
    pub fn split_first(&self) -> Option<(&str, Path)> {
        let (head, rest) = self.components.split_first()?;
        Some((
            head.as_str(),
            Path {
                components: rest.to_vec(),
            },
        ))
    }

    /// Join this path with another.
    #[must_use]
    pub fn join(&self, other: &Path) -> Path {
        let mut components = self.components.clone();
        components.extend(other.components.iter().cloned());
        Path { components }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.components.join("/"))
    }
}

/// Build a path from a literal, panicking on invalid input.
///
/// ```rust
/// use modelcast_core::path;
///
/// let p = path!("customer/address");
/// assert_eq!(p.len(), 2);
/// ```
#[macro_export]
macro_rules! path {
    ($s:expr) => {
        $crate::Path::parse($s).expect("invalid path literal")
    };
}
