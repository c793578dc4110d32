//! Live entity state
//!
//! Each observed entity owns an [`EntityState`]: the natural appearance the
//! host reports, the appearance currently shown, and who last wrote each field.
//! The [`MergeEngine`] folds resolved design layers into that state behind the
//! advisory [`EntityLock`]; the [`StateManager`] owns the per-entity mutexes
//! that give the key scheme real mutual exclusion.

/// Advisory key lock
pub mod lock;
/// Per-entity state and provenance
pub mod entity;
/// Layered merge of designs into entity state
pub mod merge;
/// Entity registry and lifecycle
pub mod manager;

#[cfg(test)]
mod tests;

pub use lock::EntityLock;
pub use entity::{EntitySnapshot, EntityState, MaterialValue, StateSource};
pub use merge::{ApplyOutcome, ApplySettings, DesignLayer, MergeEngine, MergePlan};
pub use manager::StateManager;
