//! The typed appearance aggregate.
//!
//! [`AppearanceRecord`] is a fixed-size value type: every field exists in every
//! record, access is O(1) through [`FieldId`], and equality is by value. It
//! holds no merge logic; masks and scopes live elsewhere.

use serde::{Deserialize, Serialize};
use crate::constants::{
    CREST_SLOT_COUNT, CUSTOMIZE_COUNT, EQUIP_SLOT_COUNT, META_COUNT, PARAMETER_COUNT,
};
use crate::types::error::{Error, Result};
use crate::types::field::{
    CrestSlot, CustomizeIndex, EquipSlot, FieldCategory, FieldId, MetaIndex, ParameterFlag,
};

/// Host item identifier; `0` is the empty slot
#[repr(transparent)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl ItemId {
    /// The empty slot
    pub const NOTHING: ItemId = ItemId(0);

    /// Whether this is the empty slot
    pub const fn is_nothing(self) -> bool {
        self.0 == 0
    }
}

/// Dye ids for both dye channels of an item; `0` is undyed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StainIds(pub [u8; 2]);

impl StainIds {
    /// Both channels undyed
    pub const NONE: StainIds = StainIds([0, 0]);

    /// A single dye in the first channel
    pub const fn single(stain: u8) -> Self {
        StainIds([stain, 0])
    }
}

/// Three-component parameter value. Scalars use component 0.
///
/// Equality is bitwise so that records stay `Eq` and a decoded record always
/// compares equal to the one that was encoded, NaN payloads included.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamValue(pub [f32; 3]);

impl ParamValue {
    /// All components zero
    pub const ZERO: ParamValue = ParamValue([0.0; 3]);

    /// A scalar parameter
    pub const fn scalar(value: f32) -> Self {
        ParamValue([value, 0.0, 0.0])
    }
}

impl PartialEq for ParamValue {
    fn eq(&self, other: &Self) -> bool {
        self.0.iter().zip(other.0.iter()).all(|(a, b)| a.to_bits() == b.to_bits())
    }
}

impl Eq for ParamValue {}

/// A single field value, tagged with its type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValue {
    /// Equipment item
    Item(ItemId),
    /// Dyes
    Stain(StainIds),
    /// Crest or meta toggle
    Flag(bool),
    /// Customize byte
    Customize(u8),
    /// Continuous parameter
    Parameter(ParamValue),
}

impl FieldValue {
    /// Human-readable type name, used in mismatch errors
    pub const fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Item(_) => "item",
            FieldValue::Stain(_) => "stain",
            FieldValue::Flag(_) => "flag",
            FieldValue::Customize(_) => "customize byte",
            FieldValue::Parameter(_) => "parameter",
        }
    }

    /// Type name a field expects
    pub const fn expected_for(field: FieldId) -> &'static str {
        match field.category() {
            FieldCategory::Equipment => "item",
            FieldCategory::Stain => "stain",
            FieldCategory::Crest | FieldCategory::Meta => "flag",
            FieldCategory::Customize => "customize byte",
            FieldCategory::Parameter => "parameter",
        }
    }
}

/// Fixed-size typed aggregate of all addressable fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppearanceRecord {
    equipment: [ItemId; EQUIP_SLOT_COUNT],
    stains: [StainIds; EQUIP_SLOT_COUNT],
    crests: [bool; CREST_SLOT_COUNT],
    customize: [u8; CUSTOMIZE_COUNT],
    meta: [bool; META_COUNT],
    parameters: [ParamValue; PARAMETER_COUNT],
}

impl Default for AppearanceRecord {
    fn default() -> Self {
        Self {
            equipment: [ItemId::NOTHING; EQUIP_SLOT_COUNT],
            stains: [StainIds::NONE; EQUIP_SLOT_COUNT],
            crests: [false; CREST_SLOT_COUNT],
            customize: [0; CUSTOMIZE_COUNT],
            // Hat and weapon are visible unless something hides them.
            meta: [true, false, true, false],
            parameters: [ParamValue::ZERO; PARAMETER_COUNT],
        }
    }
}

impl AppearanceRecord {
    /// Read a field
    pub fn get(&self, field: FieldId) -> FieldValue {
        match field {
            FieldId::Equipment(slot) => FieldValue::Item(self.equipment[slot.index()]),
            FieldId::Stain(slot) => FieldValue::Stain(self.stains[slot.index()]),
            FieldId::Crest(slot) => FieldValue::Flag(self.crests[slot.index()]),
            FieldId::Customize(index) => FieldValue::Customize(self.customize[index.index()]),
            FieldId::Meta(index) => FieldValue::Flag(self.meta[index.index()]),
            FieldId::Parameter(flag) => FieldValue::Parameter(self.parameters[flag.index()]),
        }
    }

    /// Write a field. Returns whether the stored value changed.
    ///
    /// Fails with [`Error::CategoryMismatch`] when the value type does not
    /// belong to the field's category; the record is left untouched.
    pub fn set(&mut self, field: FieldId, value: FieldValue) -> Result<bool> {
        let changed = match (field, value) {
            (FieldId::Equipment(slot), FieldValue::Item(item)) => self.set_item(slot, item),
            (FieldId::Stain(slot), FieldValue::Stain(stains)) => self.set_stain(slot, stains),
            (FieldId::Crest(slot), FieldValue::Flag(visible)) => self.set_crest(slot, visible),
            (FieldId::Customize(index), FieldValue::Customize(byte)) => {
                self.set_customize(index, byte)
            }
            (FieldId::Meta(index), FieldValue::Flag(on)) => self.set_meta(index, on),
            (FieldId::Parameter(flag), FieldValue::Parameter(param)) => {
                self.set_parameter(flag, param)
            }
            (field, value) => {
                return Err(Error::CategoryMismatch {
                    field,
                    expected: FieldValue::expected_for(field),
                    actual: value.type_name(),
                })
            }
        };
        Ok(changed)
    }

    /// Copy one field from another record. Returns whether it changed.
    pub fn copy_field(&mut self, field: FieldId, from: &AppearanceRecord) -> bool {
        match field {
            FieldId::Equipment(slot) => self.set_item(slot, from.item(slot)),
            FieldId::Stain(slot) => self.set_stain(slot, from.stain(slot)),
            FieldId::Crest(slot) => self.set_crest(slot, from.crest(slot)),
            FieldId::Customize(index) => self.set_customize(index, from.customize(index)),
            FieldId::Meta(index) => self.set_meta(index, from.meta(index)),
            FieldId::Parameter(flag) => self.set_parameter(flag, from.parameter(flag)),
        }
    }

    /// Whether one field holds the same value in both records
    pub fn field_eq(&self, other: &AppearanceRecord, field: FieldId) -> bool {
        self.get(field) == other.get(field)
    }

    /// Fields whose values differ between two snapshots, in index order
    pub fn diff<'a>(&'a self, other: &'a AppearanceRecord) -> impl Iterator<Item = FieldId> + 'a {
        FieldId::all().filter(move |field| !self.field_eq(other, *field))
    }

    /// Item in a slot
    pub fn item(&self, slot: EquipSlot) -> ItemId {
        self.equipment[slot.index()]
    }

    /// Dyes in a slot
    pub fn stain(&self, slot: EquipSlot) -> StainIds {
        self.stains[slot.index()]
    }

    /// Crest visibility
    pub fn crest(&self, slot: CrestSlot) -> bool {
        self.crests[slot.index()]
    }

    /// Customize byte
    pub fn customize(&self, index: CustomizeIndex) -> u8 {
        self.customize[index.index()]
    }

    /// The whole customize array
    pub fn customize_bytes(&self) -> &[u8; CUSTOMIZE_COUNT] {
        &self.customize
    }

    /// Meta toggle
    pub fn meta(&self, index: MetaIndex) -> bool {
        self.meta[index.index()]
    }

    /// Continuous parameter
    pub fn parameter(&self, flag: ParameterFlag) -> ParamValue {
        self.parameters[flag.index()]
    }

    /// Set an item; returns whether it changed
    pub fn set_item(&mut self, slot: EquipSlot, item: ItemId) -> bool {
        replace(&mut self.equipment[slot.index()], item)
    }

    /// Set dyes; returns whether they changed
    pub fn set_stain(&mut self, slot: EquipSlot, stains: StainIds) -> bool {
        replace(&mut self.stains[slot.index()], stains)
    }

    /// Set crest visibility; returns whether it changed
    pub fn set_crest(&mut self, slot: CrestSlot, visible: bool) -> bool {
        replace(&mut self.crests[slot.index()], visible)
    }

    /// Set a customize byte; returns whether it changed
    pub fn set_customize(&mut self, index: CustomizeIndex, value: u8) -> bool {
        replace(&mut self.customize[index.index()], value)
    }

    /// Set a meta toggle; returns whether it changed
    pub fn set_meta(&mut self, index: MetaIndex, on: bool) -> bool {
        replace(&mut self.meta[index.index()], on)
    }

    /// Set a parameter; returns whether it changed
    pub fn set_parameter(&mut self, flag: ParameterFlag, value: ParamValue) -> bool {
        replace(&mut self.parameters[flag.index()], value)
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_reports_change_only_once() {
        let mut record = AppearanceRecord::default();
        let head = FieldId::Equipment(EquipSlot::Head);
        assert!(record.set(head, FieldValue::Item(ItemId(42))).unwrap());
        assert!(!record.set(head, FieldValue::Item(ItemId(42))).unwrap());
        assert_eq!(record.get(head), FieldValue::Item(ItemId(42)));
    }

    #[test]
    fn set_rejects_wrong_value_type() {
        let mut record = AppearanceRecord::default();
        let before = record;
        let err = record
            .set(FieldId::Customize(CustomizeIndex::Race), FieldValue::Flag(true))
            .unwrap_err();
        assert!(matches!(err, Error::CategoryMismatch { .. }));
        assert_eq!(record, before);
    }

    #[test]
    fn diff_lists_changed_fields() {
        let base = AppearanceRecord::default();
        let mut other = base;
        other.set_stain(EquipSlot::Feet, StainIds::single(3));
        other.set_meta(MetaIndex::Wetness, true);
        let changed: Vec<FieldId> = base.diff(&other).collect();
        let expected = vec![FieldId::Stain(EquipSlot::Feet), FieldId::Meta(MetaIndex::Wetness)];
        assert_eq!(changed, expected);
    }

    #[test]
    fn parameters_compare_bitwise() {
        let nan = ParamValue([f32::NAN, 0.0, 0.0]);
        assert_eq!(nan, nan);
        assert_ne!(ParamValue::scalar(0.0), ParamValue::scalar(-0.0));
    }
}
