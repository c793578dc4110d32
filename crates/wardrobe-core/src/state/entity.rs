//! Per-entity appearance state

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use crate::constants::FIELD_COUNT;
use crate::design::material::{ColorRow, MaterialKey};
use crate::state::lock::EntityLock;
use crate::types::{AppearanceRecord, CategorySet, EntityId, EquipSlot, FieldId, RestrictionScope};

/// Who last wrote a field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateSource {
    /// The host's natural appearance
    #[default]
    Game,
    /// A user action
    Manual,
    /// An automated rule
    Fixed,
    /// Another program through the command surface
    Ipc,
}

/// A material override currently shown on an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialValue {
    /// Colors
    pub value: ColorRow,
    /// Who applied it
    pub source: StateSource,
}

/// Mutable appearance state of one entity
#[derive(Debug, Clone)]
pub struct EntityState {
    id: EntityId,
    base: AppearanceRecord,
    current: AppearanceRecord,
    provenance: [StateSource; FIELD_COUNT],
    materials: BTreeMap<MaterialKey, MaterialValue>,
    lock: EntityLock,
}

impl EntityState {
    /// State for a freshly observed entity: current equals natural, everything from the game
    pub fn new(id: EntityId, natural: AppearanceRecord) -> Self {
        Self {
            id,
            base: natural,
            current: natural,
            provenance: [StateSource::Game; FIELD_COUNT],
            materials: BTreeMap::new(),
            lock: EntityLock::new(),
        }
    }

    /// Entity identifier
    pub fn id(&self) -> &EntityId {
        &self.id
    }

    /// Natural appearance as last reported by the host
    pub fn base_record(&self) -> &AppearanceRecord {
        &self.base
    }

    /// Appearance currently shown
    pub fn current_record(&self) -> &AppearanceRecord {
        &self.current
    }

    /// Who last wrote `field`
    pub fn source(&self, field: FieldId) -> StateSource {
        self.provenance[field.index()]
    }

    /// Fields not owned by the game, with their source
    pub fn overridden(&self) -> impl Iterator<Item = (FieldId, StateSource)> + '_ {
        FieldId::all()
            .map(|f| (f, self.provenance[f.index()]))
            .filter(|(_, s)| *s != StateSource::Game)
    }

    /// Material overrides currently shown
    pub fn materials(&self) -> &BTreeMap<MaterialKey, MaterialValue> {
        &self.materials
    }

    /// Lock state
    pub fn lock_state(&self) -> EntityLock {
        self.lock
    }

    /// Try to lock with `key`
    pub fn lock(&mut self, key: u32) -> bool {
        self.lock.lock(key)
    }

    /// Whether `key` may mutate this entity
    pub fn can_unlock(&self, key: u32) -> bool {
        self.lock.can_unlock(key)
    }

    /// Release the lock if `key` is allowed to
    pub fn unlock(&mut self, key: u32) -> bool {
        self.lock.unlock(key)
    }

    /// Whether anything would be lost by forgetting this entity
    pub fn is_customized(&self) -> bool {
        self.lock.is_locked()
            || !self.materials.is_empty()
            || self.provenance.iter().any(|s| *s != StateSource::Game)
    }

    /// Take a new natural appearance from the host.
    ///
    /// Fields still owned by the game follow it into the current record.
    /// Returns the categories of the current record that changed.
    pub fn observe_natural(&mut self, natural: AppearanceRecord) -> CategorySet {
        self.base = natural;
        let mut changed = CategorySet::empty();
        for field in FieldId::all() {
            let natural_owned = self.provenance[field.index()] == StateSource::Game;
            if natural_owned && self.current.copy_field(field, &natural) {
                changed |= CategorySet::of(field.category());
            }
        }
        changed
    }

    /// Snapshot for callers outside the core
    pub fn snapshot(&self) -> EntitySnapshot {
        EntitySnapshot {
            entity: self.id.clone(),
            base: self.base,
            current: self.current,
            sources: self.overridden().collect(),
            materials: self.materials.iter().map(|(k, v)| (*k, *v)).collect(),
            locked: self.lock.is_locked(),
        }
    }

    pub(crate) fn write_field(
        &mut self,
        field: FieldId,
        from: &AppearanceRecord,
        source: StateSource,
    ) -> bool {
        if !self.current.copy_field(field, from) {
            return false;
        }
        self.provenance[field.index()] = source;
        true
    }

    pub(crate) fn reset_provenance(&mut self, scope: RestrictionScope) {
        for field in FieldId::all().filter(|f| scope.allows(f.category())) {
            self.provenance[field.index()] = StateSource::Game;
        }
    }

    pub(crate) fn set_material(
        &mut self,
        key: MaterialKey,
        value: ColorRow,
        source: StateSource,
    ) -> bool {
        if self.materials.get(&key).is_some_and(|current| current.value == value) {
            return false;
        }
        self.materials.insert(key, MaterialValue { value, source });
        true
    }

    /// Drop overrides belonging to the item in `slot`. Returns how many were dropped.
    pub(crate) fn drop_slot_materials(&mut self, slot: EquipSlot) -> usize {
        let before = self.materials.len();
        self.materials.retain(|k, _| k.slot != slot);
        before - self.materials.len()
    }

    pub(crate) fn clear_materials(&mut self) -> bool {
        let had = !self.materials.is_empty();
        self.materials.clear();
        had
    }
}

/// Read-only copy of an entity's state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    /// Entity identifier
    pub entity: EntityId,
    /// Natural appearance
    pub base: AppearanceRecord,
    /// Shown appearance
    pub current: AppearanceRecord,
    /// Fields not owned by the game
    pub sources: Vec<(FieldId, StateSource)>,
    /// Material overrides
    pub materials: Vec<(MaterialKey, MaterialValue)>,
    /// Whether a key holds the lock
    pub locked: bool,
}
