//! Library path identifiers.

use serde::{Deserialize, Serialize};

/// Errors produced when parsing a [`RelativePath`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// Path was empty
    #[error("path is empty")]
    Empty,

    /// Path begins or ends with a separator
    #[error("path must not start or end with '/': {0}")]
    Unanchored(String),

    /// Path contains an empty segment (`a//b`)
    #[error("path contains an empty segment: {0}")]
    EmptySegment(String),
}

/// Stable identifier of an item inside a library, e.g. `Fiction/Dune/part1.m4b`.
///
/// The path is only an identifier. Parent/child relationships are stored on
/// the items themselves, so moving an item does not change its path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RelativePath(String);

impl RelativePath {
    /// Parse and validate a path.
    pub fn new(path: impl Into<String>) -> Result<Self, PathError> {
        let path = path.into();
        if path.is_empty() {
            return Err(PathError::Empty);
        }
        if path.starts_with('/') || path.ends_with('/') {
            return Err(PathError::Unanchored(path));
        }
        if path.split('/').any(str::is_empty) {
            return Err(PathError::EmptySegment(path));
        }
        Ok(Self(path))
    }

    /// Build a path for a child named `name` under `self`.
    pub fn join(&self, name: &str) -> Result<Self, PathError> {
        Self::new(format!("{}/{}", self.0, name))
    }

    /// Last segment of the path.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Borrow as `&str`.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RelativePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for RelativePath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for RelativePath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RelativePath> for String {
    fn from(path: RelativePath) -> Self {
        path.0
    }
}

impl AsRef<str> for RelativePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
