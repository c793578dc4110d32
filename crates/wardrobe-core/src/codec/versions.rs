//! Packed payload layouts, one struct per wire version.
//!
//! All multi-byte values are little-endian. Apply bitfields use bit `i` for the
//! `i`-th entry of the matching catalogue enum.

use bytes::{Buf, BufMut};
use crate::constants::{
    CUSTOMIZE_COUNT, EQUIP_SLOT_COUNT, PARAMETER_COUNT, WIRE_V1_LEN, WIRE_V2_LEN, WIRE_V3_LEN,
};
use crate::types::{
    AppearanceRecord, ApplyMask, CrestSlot, CustomizeIndex, EquipSlot, Error, FieldId, ItemId,
    MetaIndex, ParamValue, ParameterFlag, Result, StainIds,
};

fn ensure_len(version: u8, data: &[u8], expected: usize) -> Result<()> {
    if data.len() < expected {
        return Err(Error::Truncated { version, expected, actual: data.len() });
    }
    Ok(())
}

fn bit(bits: u32, index: usize) -> bool {
    bits & (1 << index) != 0
}

fn flags_to_bits(flags: &[bool]) -> u32 {
    flags.iter().enumerate().fold(0, |bits, (i, on)| if *on { bits | (1 << i) } else { bits })
}

fn bits_to_flags<const N: usize>(bits: u32) -> [bool; N] {
    std::array::from_fn(|i| bit(bits, i))
}

/// Version 1: 32-bit items, one dye, three meta toggles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadV1 {
    /// Customize bytes
    pub customize: [u8; CUSTOMIZE_COUNT],
    /// Customize apply bits
    pub customize_apply: u32,
    /// Items per slot
    pub items: [u32; EQUIP_SLOT_COUNT],
    /// Dye per slot
    pub stains: [u8; EQUIP_SLOT_COUNT],
    /// Apply bits covering both item and dye
    pub equip_apply: u16,
    /// Hat, visor and weapon visibility
    pub meta: [bool; 3],
    /// Apply bits for `meta`
    pub meta_apply: [bool; 3],
    /// Legacy write protection, stored in the meta byte's top bit
    pub write_protected: bool,
}

impl PayloadV1 {
    /// Parse a packed payload
    pub fn unpack(data: &[u8]) -> Result<Self> {
        ensure_len(1, data, WIRE_V1_LEN)?;
        let mut buf = data;
        let mut customize = [0u8; CUSTOMIZE_COUNT];
        buf.copy_to_slice(&mut customize);
        let customize_apply = buf.get_u32_le();
        let mut items = [0u32; EQUIP_SLOT_COUNT];
        let mut stains = [0u8; EQUIP_SLOT_COUNT];
        for i in 0..EQUIP_SLOT_COUNT {
            items[i] = buf.get_u32_le();
            stains[i] = buf.get_u8();
        }
        let equip_apply = buf.get_u16_le();
        let meta_byte = buf.get_u8() as u32;
        Ok(Self {
            customize,
            customize_apply,
            items,
            stains,
            equip_apply,
            meta: bits_to_flags(meta_byte),
            meta_apply: bits_to_flags(meta_byte >> 4),
            write_protected: bit(meta_byte, 7),
        })
    }

    /// Write the packed form
    pub fn pack(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(WIRE_V1_LEN);
        buf.put_slice(&self.customize);
        buf.put_u32_le(self.customize_apply);
        for i in 0..EQUIP_SLOT_COUNT {
            buf.put_u32_le(self.items[i]);
            buf.put_u8(self.stains[i]);
        }
        buf.put_u16_le(self.equip_apply);
        let meta = flags_to_bits(&self.meta)
            | flags_to_bits(&self.meta_apply) << 4
            | (self.write_protected as u32) << 7;
        buf.put_u8(meta as u8);
        buf
    }
}

/// Version 2: 64-bit items, separate dye apply bits, wetness, flags byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadV2 {
    /// Customize bytes
    pub customize: [u8; CUSTOMIZE_COUNT],
    /// Customize apply bits
    pub customize_apply: u32,
    /// Items per slot
    pub items: [u64; EQUIP_SLOT_COUNT],
    /// Dye per slot
    pub stains: [u8; EQUIP_SLOT_COUNT],
    /// Item apply bits
    pub equip_apply: u16,
    /// Dye apply bits
    pub stain_apply: u16,
    /// Hat, visor, weapon and wetness
    pub meta: [bool; 4],
    /// Apply bits for `meta`
    pub meta_apply: [bool; 4],
    /// Legacy write protection, bit 0 of the flags byte
    pub write_protected: bool,
}

impl PayloadV2 {
    /// Parse a packed payload
    pub fn unpack(data: &[u8]) -> Result<Self> {
        ensure_len(2, data, WIRE_V2_LEN)?;
        let mut buf = data;
        let mut customize = [0u8; CUSTOMIZE_COUNT];
        buf.copy_to_slice(&mut customize);
        let customize_apply = buf.get_u32_le();
        let mut items = [0u64; EQUIP_SLOT_COUNT];
        let mut stains = [0u8; EQUIP_SLOT_COUNT];
        for i in 0..EQUIP_SLOT_COUNT {
            items[i] = buf.get_u64_le();
            stains[i] = buf.get_u8();
        }
        let equip_apply = buf.get_u16_le();
        let stain_apply = buf.get_u16_le();
        let meta_byte = buf.get_u8() as u32;
        let flags = buf.get_u8() as u32;
        Ok(Self {
            customize,
            customize_apply,
            items,
            stains,
            equip_apply,
            stain_apply,
            meta: bits_to_flags(meta_byte),
            meta_apply: bits_to_flags(meta_byte >> 4),
            write_protected: bit(flags, 0),
        })
    }

    /// Write the packed form
    pub fn pack(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(WIRE_V2_LEN);
        buf.put_slice(&self.customize);
        buf.put_u32_le(self.customize_apply);
        for i in 0..EQUIP_SLOT_COUNT {
            buf.put_u64_le(self.items[i]);
            buf.put_u8(self.stains[i]);
        }
        buf.put_u16_le(self.equip_apply);
        buf.put_u16_le(self.stain_apply);
        buf.put_u8((flags_to_bits(&self.meta) | flags_to_bits(&self.meta_apply) << 4) as u8);
        buf.put_u8(self.write_protected as u8);
        buf
    }
}

/// Version 3 (current): two dye channels, crests and parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PayloadV3 {
    /// Customize bytes
    pub customize: [u8; CUSTOMIZE_COUNT],
    /// Customize apply bits
    pub customize_apply: u32,
    /// Items per slot
    pub items: [u64; EQUIP_SLOT_COUNT],
    /// Both dye channels per slot
    pub stains: [[u8; 2]; EQUIP_SLOT_COUNT],
    /// Item apply bits
    pub equip_apply: u16,
    /// Dye apply bits
    pub stain_apply: u16,
    /// Hat, visor, weapon and wetness
    pub meta: [bool; 4],
    /// Apply bits for `meta`
    pub meta_apply: [bool; 4],
    /// Crest visibility
    pub crests: [bool; 3],
    /// Apply bits for `crests`
    pub crest_apply: [bool; 3],
    /// Continuous parameters
    pub parameters: [[f32; 3]; PARAMETER_COUNT],
    /// Parameter apply bits
    pub parameter_apply: u16,
}

impl PayloadV3 {
    /// Parse a packed payload
    pub fn unpack(data: &[u8]) -> Result<Self> {
        ensure_len(3, data, WIRE_V3_LEN)?;
        let mut buf = data;
        let mut customize = [0u8; CUSTOMIZE_COUNT];
        buf.copy_to_slice(&mut customize);
        let customize_apply = buf.get_u32_le();
        let mut items = [0u64; EQUIP_SLOT_COUNT];
        let mut stains = [[0u8; 2]; EQUIP_SLOT_COUNT];
        for i in 0..EQUIP_SLOT_COUNT {
            items[i] = buf.get_u64_le();
            stains[i] = [buf.get_u8(), buf.get_u8()];
        }
        let equip_apply = buf.get_u16_le();
        let stain_apply = buf.get_u16_le();
        let meta_byte = buf.get_u8() as u32;
        let crest_byte = buf.get_u8() as u32;
        let mut parameters = [[0f32; 3]; PARAMETER_COUNT];
        for parameter in parameters.iter_mut() {
            *parameter = [buf.get_f32_le(), buf.get_f32_le(), buf.get_f32_le()];
        }
        let parameter_apply = buf.get_u16_le();
        Ok(Self {
            customize,
            customize_apply,
            items,
            stains,
            equip_apply,
            stain_apply,
            meta: bits_to_flags(meta_byte),
            meta_apply: bits_to_flags(meta_byte >> 4),
            crests: bits_to_flags(crest_byte),
            crest_apply: bits_to_flags(crest_byte >> 4),
            parameters,
            parameter_apply,
        })
    }

    /// Write the packed form
    pub fn pack(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(WIRE_V3_LEN);
        buf.put_slice(&self.customize);
        buf.put_u32_le(self.customize_apply);
        for i in 0..EQUIP_SLOT_COUNT {
            buf.put_u64_le(self.items[i]);
            buf.put_slice(&self.stains[i]);
        }
        buf.put_u16_le(self.equip_apply);
        buf.put_u16_le(self.stain_apply);
        buf.put_u8((flags_to_bits(&self.meta) | flags_to_bits(&self.meta_apply) << 4) as u8);
        buf.put_u8((flags_to_bits(&self.crests) | flags_to_bits(&self.crest_apply) << 4) as u8);
        for parameter in &self.parameters {
            for component in parameter {
                buf.put_f32_le(*component);
            }
        }
        buf.put_u16_le(self.parameter_apply);
        buf
    }

    /// Pack a record and mask
    pub fn from_design(record: &AppearanceRecord, mask: ApplyMask) -> Self {
        let applied = |field: FieldId| mask.is_set(field);
        let customize_apply = CustomizeIndex::ALL
            .iter()
            .enumerate()
            .filter(|(_, c)| applied(FieldId::Customize(**c)))
            .fold(0u32, |bits, (i, _)| bits | 1 << i);
        let slot_bits = |f: fn(EquipSlot) -> FieldId| {
            EquipSlot::ALL
                .iter()
                .enumerate()
                .fold(0u16, |bits, (i, s)| if applied(f(*s)) { bits | 1 << i } else { bits })
        };
        let parameter_apply = ParameterFlag::ALL
            .iter()
            .enumerate()
            .filter(|(_, p)| applied(FieldId::Parameter(**p)))
            .fold(0u16, |bits, (i, _)| bits | 1 << i);

        Self {
            customize: *record.customize_bytes(),
            customize_apply,
            items: EquipSlot::ALL.map(|s| record.item(s).0),
            stains: EquipSlot::ALL.map(|s| record.stain(s).0),
            equip_apply: slot_bits(FieldId::Equipment),
            stain_apply: slot_bits(FieldId::Stain),
            meta: MetaIndex::ALL.map(|m| record.meta(m)),
            meta_apply: MetaIndex::ALL.map(|m| applied(FieldId::Meta(m))),
            crests: CrestSlot::ALL.map(|c| record.crest(c)),
            crest_apply: CrestSlot::ALL.map(|c| applied(FieldId::Crest(c))),
            parameters: ParameterFlag::ALL.map(|p| record.parameter(p).0),
            parameter_apply,
        }
    }

    /// Unpack into a record and mask
    pub fn into_design(self) -> (AppearanceRecord, ApplyMask) {
        let mut record = AppearanceRecord::default();
        let mut mask = ApplyMask::NONE;
        for (i, index) in CustomizeIndex::ALL.into_iter().enumerate() {
            record.set_customize(index, self.customize[i]);
            mask.set(FieldId::Customize(index), bit(self.customize_apply, i));
        }
        for (i, slot) in EquipSlot::ALL.into_iter().enumerate() {
            record.set_item(slot, ItemId(self.items[i]));
            record.set_stain(slot, StainIds(self.stains[i]));
            mask.set(FieldId::Equipment(slot), bit(self.equip_apply as u32, i));
            mask.set(FieldId::Stain(slot), bit(self.stain_apply as u32, i));
        }
        for (i, index) in MetaIndex::ALL.into_iter().enumerate() {
            record.set_meta(index, self.meta[i]);
            mask.set(FieldId::Meta(index), self.meta_apply[i]);
        }
        for (i, slot) in CrestSlot::ALL.into_iter().enumerate() {
            record.set_crest(slot, self.crests[i]);
            mask.set(FieldId::Crest(slot), self.crest_apply[i]);
        }
        for (i, flag) in ParameterFlag::ALL.into_iter().enumerate() {
            record.set_parameter(flag, ParamValue(self.parameters[i]));
            mask.set(FieldId::Parameter(flag), bit(self.parameter_apply as u32, i));
        }
        (record, mask)
    }
}
