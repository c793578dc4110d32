//! Versioned wire codec
//!
//! Designs are shared as short text blobs. Every blob carries its layout
//! version, and older layouts are migrated forward on decode so callers only
//! ever see the current record and mask.

/// Packed payload layouts
pub mod versions;
/// Forward migration chain
pub mod migrate;
/// Blob encoding and decoding
pub mod wire;

#[cfg(test)]
mod tests;

pub use migrate::VersionedPayload;
pub use versions::{PayloadV1, PayloadV2, PayloadV3};
pub use wire::{DecodedDesign, WireCodec};
