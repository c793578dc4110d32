//! Global constants used throughout the Wardrobe codebase
//!
//! Compile-time constants shared across modules to keep the wire layout,
//! the field catalogue and the lock convention consistent.

/// Number of equipment slots (armor, accessories and both weapons)
pub const EQUIP_SLOT_COUNT: usize = 12;

/// Number of slots that can show a free company crest
pub const CREST_SLOT_COUNT: usize = 3;

/// Number of customization bytes in the host's customize array
pub const CUSTOMIZE_COUNT: usize = 26;

/// Number of meta toggles (hat, visor, weapon, wetness)
pub const META_COUNT: usize = 4;

/// Number of continuous customization parameters
pub const PARAMETER_COUNT: usize = 12;

/// Total number of addressable fields
///
/// This is the width of every ApplyMask and ProvenanceMap.
pub const FIELD_COUNT: usize =
    2 * EQUIP_SLOT_COUNT + CREST_SLOT_COUNT + CUSTOMIZE_COUNT + META_COUNT + PARAMETER_COUNT;

/// The master key. Never valid for acquiring a lock, always valid for releasing one.
pub const MASTER_KEY: u32 = 0;

/// Wire format version written by the encoder
pub const CURRENT_WIRE_VERSION: u8 = 3;

/// Oldest wire format version the decoder still understands
pub const OLDEST_WIRE_VERSION: u8 = 1;

/// Packed payload size of a version 1 blob
pub const WIRE_V1_LEN: usize = CUSTOMIZE_COUNT + 4 + EQUIP_SLOT_COUNT * 5 + 2 + 1;

/// Packed payload size of a version 2 blob
pub const WIRE_V2_LEN: usize = CUSTOMIZE_COUNT + 4 + EQUIP_SLOT_COUNT * 9 + 2 + 2 + 1 + 1;

/// Packed payload size of a version 3 blob
pub const WIRE_V3_LEN: usize =
    CUSTOMIZE_COUNT + 4 + EQUIP_SLOT_COUNT * 10 + 2 + 2 + 1 + 1 + PARAMETER_COUNT * 12 + 2;

/// Default upper bound for a decompressed wire payload
///
/// Blobs arrive from untrusted transports; anything past this is rejected
/// before it is parsed.
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 64 * 1024;

/// Default brotli quality used when encoding
pub const DEFAULT_COMPRESSION_QUALITY: u32 = 9;

/// Default brotli window size (log2) used when encoding
pub const DEFAULT_COMPRESSION_WINDOW: u32 = 22;

/// Internal buffer size for the brotli reader/writer
pub const COMPRESSION_BUFFER_SIZE: usize = 4096;

/// Current version of the persisted design file layout
pub const DESIGN_FILE_VERSION: u8 = 1;
