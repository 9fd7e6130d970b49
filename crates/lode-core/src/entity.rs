//! Entity type identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier for a category of entity ("cow", "zombie", ...).
///
/// Used as the baseline cache key. The reserved [`EntityTypeTag::UNKNOWN`]
/// tag is never cached and never diffed.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityTypeTag(String);

impl EntityTypeTag {
    /// The reserved tag for entities whose type cannot be determined.
    pub const UNKNOWN: &'static str = "unknown";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The tag used for entities of undeterminable type.
    pub fn unknown() -> Self {
        Self(Self::UNKNOWN.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the reserved "unknown" tag.
    pub fn is_unknown(&self) -> bool {
        self.0 == Self::UNKNOWN
    }
}

impl fmt::Display for EntityTypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EntityTypeTag {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}
