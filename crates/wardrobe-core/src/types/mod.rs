/// Type definitions for the Wardrobe system
///
/// This module contains all type definitions organized by category.

/// Identifier types
pub mod ids;
/// Field catalogue: slots, indices and the uniform FieldId
pub mod field;
/// The typed appearance aggregate
pub mod record;
/// Apply masks, category sets and restriction scopes
pub mod mask;
/// System-wide error types
pub mod error;

// Re-export commonly used types for convenience
pub use ids::{DesignId, EntityId};
pub use field::{
    CrestSlot, CustomizeIndex, EquipSlot, FieldCategory, FieldId, MetaIndex, ParameterFlag,
};
pub use record::{AppearanceRecord, FieldValue, ItemId, ParamValue, StainIds};
pub use mask::{ApplyMask, CategorySet, RestrictionScope};
pub use error::{Error, Result};
