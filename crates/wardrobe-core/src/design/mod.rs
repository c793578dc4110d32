//! Design documents, link graph and registry

/// Material color-row overrides
pub mod material;
/// Design document with single-slot undo
pub mod document;
/// Before/after link graph
pub mod links;
/// Persisted design format
pub mod file;
/// Document lifecycle and change events
pub mod registry;

#[cfg(test)]
mod tests;

pub use material::{ColorRow, MaterialDesign, MaterialEntry, MaterialKey};
pub use document::DesignDocument;
pub use links::{Link, LinkGraph, LinkPosition};
pub use file::{DesignFile, LinkRecord};
pub use registry::DesignRegistry;
