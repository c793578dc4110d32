//! Identifier types for designs and tracked entities.

use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of a design document.
///
/// Links, registries and persisted files address documents only through this
/// identifier, never through references.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DesignId(Uuid);

impl DesignId {
    /// Generate a fresh random identifier
    pub fn random() -> Self {
        DesignId(Uuid::new_v4())
    }

    /// Wrap an existing UUID
    pub const fn from_uuid(uuid: Uuid) -> Self {
        DesignId(uuid)
    }

    /// The underlying UUID
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for DesignId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DesignId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(DesignId)
    }
}

impl From<Uuid> for DesignId {
    fn from(uuid: Uuid) -> Self {
        DesignId(uuid)
    }
}

/// Host-assigned reference to a live entity whose appearance is tracked.
///
/// The host decides the format (typically a name and world pair); the core
/// only needs it to be hashable and stable while the entity is observed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Create an entity reference
    pub fn new(id: impl Into<String>) -> Self {
        EntityId(id.into())
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        EntityId(s.to_string())
    }
}
