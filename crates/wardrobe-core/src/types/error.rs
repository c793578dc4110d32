//! Error types and handling for Wardrobe
//!
//! This module defines all error types raised inside the core. They never cross
//! the command boundary as panics: the command surface maps every variant to a
//! closed result code.

use thiserror::Error;
use crate::types::field::FieldId;
use crate::types::ids::{DesignId, EntityId};

/// Main result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the Wardrobe core
#[derive(Error, Debug)]
pub enum Error {
    /// The entity is locked with a key the caller did not present
    #[error("Entity {entity} is locked with a different key")]
    Locked {
        /// The locked entity
        entity: EntityId,
    },

    /// The host does not know the entity
    #[error("Entity not found: {0}")]
    ActorNotFound(EntityId),

    /// Malformed payload or missing document reference
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The wire version byte is unknown or from the future
    #[error("Unsupported wire version: {0}")]
    UnsupportedVersion(u8),

    /// The payload is shorter than its version requires
    #[error("Truncated payload for version {version}: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Claimed version
        version: u8,
        /// Minimum size for that version
        expected: usize,
        /// Actual size
        actual: usize,
    },

    /// Inserting the link would close a cycle
    #[error("Link from {owner} to {target} would create a cycle")]
    CycleRejected {
        /// Document that would own the link
        owner: DesignId,
        /// Document the link would point at
        target: DesignId,
    },

    /// The same (owner, target, position) link already exists
    #[error("Link from {owner} to {target} already exists")]
    DuplicateLink {
        /// Document owning the link
        owner: DesignId,
        /// Document the link points at
        target: DesignId,
    },

    /// A value or item does not belong to the field or slot it was given for
    #[error("Category mismatch for {field}: expected {expected}, got {actual}")]
    CategoryMismatch {
        /// Field that was addressed
        field: FieldId,
        /// Expected value kind
        expected: &'static str,
        /// Supplied value kind
        actual: &'static str,
    },

    /// The item is unknown to the host catalogue
    #[error("Item {0} is not valid")]
    ItemInvalid(u64),

    /// The document refuses mutation
    #[error("Design {0} is write protected")]
    WriteProtected(DesignId),

    /// Design file (de)serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Create an invalid state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Create an invalid state error for a document that does not exist
    pub fn missing_design(id: DesignId) -> Self {
        Self::InvalidState(format!("design {} does not exist", id))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<rmp_serde::encode::Error> for Error {
    fn from(err: rmp_serde::encode::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<rmp_serde::decode::Error> for Error {
    fn from(err: rmp_serde::decode::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
