//! # Wardrobe Core
//!
//! Core types and merge logic for appearance designs.
//! Nothing in this crate performs I/O: persistence, rendering and transport are
//! collaborators that consume the data contracts defined here.

#![warn(missing_docs)]

/// System constants
pub mod constants;

/// Type definitions for records, masks, identifiers and errors
pub mod types;

/// Host collaborator contracts
pub mod host;

/// Change notification streams
pub mod events;

/// Design documents, link graph and registry
pub mod design;

/// Live entity state, advisory locking and the merge engine
pub mod state;

/// Versioned wire codec with forward migration
pub mod codec;

// Re-export commonly used items
pub use types::{
    AppearanceRecord, ApplyMask, CategorySet, FieldCategory, FieldId, FieldValue, RestrictionScope,
};
pub use types::{EntityId, DesignId, Error, Result};
pub use design::{DesignDocument, DesignRegistry, LinkGraph, LinkPosition};
pub use state::{
    ApplyOutcome, ApplySettings, EntityLock, EntityState, MergeEngine, StateManager, StateSource,
};
pub use codec::{DecodedDesign, WireCodec};
pub use events::{DesignEvent, EventBus, StateEvent};
pub use host::{EntityHost, StaticHost};
