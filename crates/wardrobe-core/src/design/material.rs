//! Material color-row overrides
//!
//! Overrides are finer-grained than equipment fields: they recolor individual
//! rows of an item's material table and only make sense for the item that was
//! equipped when they were made.

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use crate::types::{EquipSlot, ParamValue};

/// Address of one color-table row
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MaterialKey {
    /// Equipment slot the material belongs to
    pub slot: EquipSlot,
    /// Material index on the item model
    pub material: u8,
    /// Row in the material's color table
    pub row: u8,
}

impl MaterialKey {
    /// Create a key
    pub const fn new(slot: EquipSlot, material: u8, row: u8) -> Self {
        Self { slot, material, row }
    }
}

/// Colors of one table row
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorRow {
    /// Diffuse color
    pub diffuse: ParamValue,
    /// Specular color
    pub specular: ParamValue,
    /// Emissive color
    pub emissive: ParamValue,
}

/// A design's override for one row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialEntry {
    /// Override colors
    pub value: ColorRow,
    /// Disabled entries are kept but never applied
    pub enabled: bool,
}

/// Material overrides stored in a design
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "Vec<(MaterialKey, MaterialEntry)>", from = "Vec<(MaterialKey, MaterialEntry)>")]
pub struct MaterialDesign {
    entries: BTreeMap<MaterialKey, MaterialEntry>,
}

impl MaterialDesign {
    /// No overrides
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry for a row
    pub fn get(&self, key: &MaterialKey) -> Option<&MaterialEntry> {
        self.entries.get(key)
    }

    /// Set (`Some`) or remove (`None`) a row. New rows start enabled.
    pub fn set(&mut self, key: MaterialKey, value: Option<ColorRow>) -> bool {
        match value {
            None => self.entries.remove(&key).is_some(),
            Some(value) => match self.entries.get_mut(&key) {
                Some(entry) if entry.value == value => false,
                Some(entry) => {
                    entry.value = value;
                    true
                }
                None => {
                    self.entries.insert(key, MaterialEntry { value, enabled: true });
                    true
                }
            },
        }
    }

    /// Enable or disable an existing row
    pub fn set_enabled(&mut self, key: &MaterialKey, enabled: bool) -> bool {
        match self.entries.get_mut(key) {
            Some(entry) if entry.enabled != enabled => {
                entry.enabled = enabled;
                true
            }
            _ => false,
        }
    }

    /// All rows
    pub fn iter(&self) -> impl Iterator<Item = (&MaterialKey, &MaterialEntry)> {
        self.entries.iter()
    }

    /// Rows that take part in a merge
    pub fn enabled(&self) -> impl Iterator<Item = (&MaterialKey, &ColorRow)> {
        self.entries.iter().filter(|(_, e)| e.enabled).map(|(k, e)| (k, &e.value))
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no rows
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<MaterialDesign> for Vec<(MaterialKey, MaterialEntry)> {
    fn from(design: MaterialDesign) -> Self {
        design.entries.into_iter().collect()
    }
}

impl From<Vec<(MaterialKey, MaterialEntry)>> for MaterialDesign {
    fn from(entries: Vec<(MaterialKey, MaterialEntry)>) -> Self {
        Self { entries: entries.into_iter().collect() }
    }
}
