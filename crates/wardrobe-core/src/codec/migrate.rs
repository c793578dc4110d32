//! Forward migration between wire versions
//!
//! Each step is a pure function from one layout to the next. Decoding an old
//! blob parses it with its own layout and then walks the chain up to the
//! current version.

use crate::codec::versions::{PayloadV1, PayloadV2, PayloadV3};
use crate::constants::{
    CURRENT_WIRE_VERSION, OLDEST_WIRE_VERSION, WIRE_V1_LEN, WIRE_V2_LEN, WIRE_V3_LEN,
};
use crate::types::{Error, Result};

/// A parsed payload of any supported version
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VersionedPayload {
    /// Version 1
    V1(PayloadV1),
    /// Version 2
    V2(PayloadV2),
    /// Version 3
    V3(PayloadV3),
}

impl VersionedPayload {
    /// Parse `data` with the layout of `version`
    pub fn parse(version: u8, data: &[u8]) -> Result<Self> {
        match version {
            1 => Ok(Self::V1(PayloadV1::unpack(data)?)),
            2 => Ok(Self::V2(PayloadV2::unpack(data)?)),
            3 => Ok(Self::V3(PayloadV3::unpack(data)?)),
            _ => Err(Error::UnsupportedVersion(version)),
        }
    }

    /// Wire version of this payload
    pub fn version(&self) -> u8 {
        match self {
            Self::V1(_) => 1,
            Self::V2(_) => 2,
            Self::V3(_) => 3,
        }
    }

    /// Migrate to the current version.
    ///
    /// Also returns the legacy write-protection toggle when the chain dropped it.
    pub fn into_current(self) -> (PayloadV3, Option<bool>) {
        match self {
            Self::V1(payload) => Self::V2(migrate_v1_to_v2(payload)).into_current(),
            Self::V2(payload) => {
                let (next, write_protected) = migrate_v2_to_v3(payload);
                let (current, _) = Self::V3(next).into_current();
                (current, Some(write_protected))
            }
            Self::V3(payload) => (payload, None),
        }
    }
}

/// Whether `version` can be decoded
pub fn is_supported(version: u8) -> bool {
    (OLDEST_WIRE_VERSION..=CURRENT_WIRE_VERSION).contains(&version)
}

/// Packed payload length of a supported version
pub fn packed_len(version: u8) -> usize {
    match version {
        1 => WIRE_V1_LEN,
        2 => WIRE_V2_LEN,
        _ => WIRE_V3_LEN,
    }
}

/// Widen items to 64 bits and split dye apply bits from item apply bits.
///
/// Wetness did not exist and stays off and unapplied.
pub fn migrate_v1_to_v2(old: PayloadV1) -> PayloadV2 {
    PayloadV2 {
        customize: old.customize,
        customize_apply: old.customize_apply,
        items: old.items.map(u64::from),
        stains: old.stains,
        equip_apply: old.equip_apply,
        stain_apply: old.equip_apply,
        meta: [old.meta[0], old.meta[1], old.meta[2], false],
        meta_apply: [old.meta_apply[0], old.meta_apply[1], old.meta_apply[2], false],
        write_protected: old.write_protected,
    }
}

/// Add the second dye channel, crests and parameters, all unapplied.
///
/// The legacy write-protection flag has no place in the new layout and is
/// handed back separately.
pub fn migrate_v2_to_v3(old: PayloadV2) -> (PayloadV3, bool) {
    let next = PayloadV3 {
        customize: old.customize,
        customize_apply: old.customize_apply,
        items: old.items,
        stains: old.stains.map(|s| [s, 0]),
        equip_apply: old.equip_apply,
        stain_apply: old.stain_apply,
        meta: old.meta,
        meta_apply: old.meta_apply,
        crests: [false; 3],
        crest_apply: [false; 3],
        parameters: [[0.0; 3]; crate::constants::PARAMETER_COUNT],
        parameter_apply: 0,
    };
    (next, old.write_protected)
}
