//! Entity registry and lifecycle
//!
//! States are created lazily the first time an entity is addressed and live in
//! a `DashMap` of `Arc<Mutex<_>>`, so callers on different entities never
//! contend and callers on the same entity are serialized underneath the
//! advisory key.
//!
//! Lock order is map shard, then entity mutex, then the retained map. Moving a
//! state between the tracked and retained maps happens while the tracked
//! map's entry is held. Eviction empties the slot under the entity mutex, so a
//! caller that was waiting on an evicted slot looks the entity up again.

use std::sync::Arc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info, warn};
use crate::host::EntityHost;
use crate::state::entity::{EntitySnapshot, EntityState, StateSource};
use crate::state::merge::{ApplyOutcome, ApplySettings, DesignLayer, MergeEngine, MergePlan};
use crate::types::{
    AppearanceRecord, ApplyMask, CategorySet, EntityId, EquipSlot, Error, FieldId, FieldValue,
    ItemId, Result, StainIds,
};

/// A tracked state; `None` once evicted
pub(crate) type Slot = Arc<Mutex<Option<EntityState>>>;

/// Owner of every tracked entity state
pub struct StateManager<H: EntityHost> {
    host: Arc<H>,
    engine: MergeEngine,
    states: DashMap<EntityId, Slot>,
    retained: DashMap<EntityId, EntityState>,
    retain_on_evict: bool,
}

impl<H: EntityHost> StateManager<H> {
    /// Create a manager over a host
    pub fn new(host: Arc<H>, engine: MergeEngine, retain_on_evict: bool) -> Self {
        Self {
            host,
            engine,
            states: DashMap::new(),
            retained: DashMap::new(),
            retain_on_evict,
        }
    }

    /// The host collaborator
    pub fn host(&self) -> &Arc<H> {
        &self.host
    }

    /// The merge engine
    pub fn engine(&self) -> &MergeEngine {
        &self.engine
    }

    /// Number of tracked entities
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether no entity is tracked
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Number of evicted entities kept for later
    pub fn retained_len(&self) -> usize {
        self.retained.len()
    }

    /// Whether the entity is tracked
    pub fn is_tracked(&self, entity: &EntityId) -> bool {
        self.states.contains_key(entity)
    }

    pub(crate) fn entry(&self, entity: &EntityId) -> Result<Slot> {
        if let Some(slot) = self.states.get(entity) {
            return Ok(Arc::clone(slot.value()));
        }
        let natural = self
            .host
            .natural_appearance(entity)
            .ok_or_else(|| Error::ActorNotFound(entity.clone()))?;

        let slot = match self.states.entry(entity.clone()) {
            Entry::Occupied(occupied) => Arc::clone(occupied.get()),
            Entry::Vacant(vacant) => {
                let state = match self.retained.remove(entity) {
                    Some((_, mut state)) => {
                        state.observe_natural(natural);
                        debug!("Re-attached retained state for {}", entity);
                        state
                    }
                    None => EntityState::new(entity.clone(), natural),
                };
                Arc::clone(vacant.insert(Arc::new(Mutex::new(Some(state)))).value())
            }
        };
        Ok(slot)
    }

    /// Run `f` with exclusive access to an entity, creating its state if needed
    pub fn with_state<R>(
        &self,
        entity: &EntityId,
        f: impl FnOnce(&mut EntityState) -> Result<R>,
    ) -> Result<R> {
        loop {
            let slot = self.entry(entity)?;
            let mut guard = slot.lock();
            if let Some(state) = guard.as_mut() {
                return f(state);
            }
        }
    }

    /// Merge a plan into an entity
    pub fn apply(
        &self,
        entity: &EntityId,
        plan: &MergePlan,
        settings: &ApplySettings,
    ) -> Result<ApplyOutcome> {
        self.with_state(entity, |state| self.engine.apply_design(state, plan, settings))
    }

    /// Restore the natural appearance
    pub fn reset_state(&self, entity: &EntityId, key: u32) -> Result<ApplyOutcome> {
        self.with_state(entity, |state| self.engine.reset_state(state, key))
    }

    /// Restore natural equipment
    pub fn reset_equip(&self, entity: &EntityId, key: u32) -> Result<ApplyOutcome> {
        self.with_state(entity, |state| self.engine.reset_equip(state, key))
    }

    /// Restore natural customization
    pub fn reset_customize(&self, entity: &EntityId, key: u32) -> Result<ApplyOutcome> {
        self.with_state(entity, |state| self.engine.reset_customize(state, key))
    }

    /// The host reported a new natural appearance.
    ///
    /// Untracked entities are not created; the new appearance is picked up on
    /// first access instead.
    pub fn observe_external_change(
        &self,
        entity: &EntityId,
        natural: AppearanceRecord,
    ) -> CategorySet {
        let slot = self.states.get(entity).map(|slot| Arc::clone(slot.value()));
        let mut guard = slot.as_ref().map(|slot| slot.lock());
        let Some(state) = guard.as_mut().and_then(|guard| guard.as_mut()) else {
            if let Some(mut retained) = self.retained.get_mut(entity) {
                retained.observe_natural(natural);
            }
            return CategorySet::empty();
        };
        let changed = state.observe_natural(natural);
        if !changed.is_empty() {
            debug!("External change on {}: {:?}", entity, changed);
            self.engine.notify(entity, changed, StateSource::Game, true);
        }
        changed
    }

    /// Write a single field
    pub fn change_field(
        &self,
        entity: &EntityId,
        field: FieldId,
        value: FieldValue,
        source: StateSource,
        key: u32,
    ) -> Result<ApplyOutcome> {
        let mut record = AppearanceRecord::default();
        record.set(field, value)?;
        let plan = MergePlan::single(DesignLayer::from_record(record, ApplyMask::NONE.with(field)));
        let settings = ApplySettings {
            key,
            source,
            merge_links: false,
            ..ApplySettings::default()
        };
        self.apply(entity, &plan, &settings)
    }

    /// Equip an item (and optionally dyes), validated against the host catalogue
    pub fn change_item(
        &self,
        entity: &EntityId,
        slot: EquipSlot,
        item: ItemId,
        stains: Option<StainIds>,
        source: StateSource,
        key: u32,
    ) -> Result<ApplyOutcome> {
        if !item.is_nothing() {
            let info = self.host.item(item).ok_or(Error::ItemInvalid(item.0))?;
            if !info.fits(slot) {
                warn!("Item {} does not fit {:?}", item.0, slot);
                return Err(Error::CategoryMismatch {
                    field: FieldId::Equipment(slot),
                    expected: "item for this slot",
                    actual: "item for another slot",
                });
            }
        }

        let mut record = AppearanceRecord::default();
        record.set_item(slot, item);
        let mut mask = ApplyMask::NONE.with(FieldId::Equipment(slot));
        if let Some(stains) = stains {
            record.set_stain(slot, stains);
            mask = mask.with(FieldId::Stain(slot));
        }
        let plan = MergePlan::single(DesignLayer::from_record(record, mask));
        let settings = ApplySettings {
            key,
            source,
            merge_links: false,
            ..ApplySettings::default()
        };
        self.apply(entity, &plan, &settings)
    }

    /// Lock an entity. Returns whether the key now holds the lock.
    pub fn lock(&self, entity: &EntityId, key: u32) -> Result<bool> {
        self.with_state(entity, |state| Ok(state.lock(key)))
    }

    /// Unlock an entity. Returns whether the key was allowed to.
    pub fn unlock(&self, entity: &EntityId, key: u32) -> Result<bool> {
        self.with_state(entity, |state| Ok(state.unlock(key)))
    }

    /// Release every lock `key` may release, tracked or retained. Returns how many were released.
    pub fn unlock_all(&self, key: u32) -> usize {
        let mut released = 0;
        for entry in self.states.iter() {
            let mut guard = entry.value().lock();
            if let Some(state) = guard.as_mut() {
                if state.lock_state().is_locked() && state.unlock(key) {
                    released += 1;
                }
            }
        }
        for mut entry in self.retained.iter_mut() {
            if entry.lock_state().is_locked() && entry.unlock(key) {
                released += 1;
            }
        }
        info!("Released {} entity locks", released);
        released
    }

    /// Snapshot an entity's state if `key` may see it
    pub fn snapshot(&self, entity: &EntityId, key: u32) -> Result<EntitySnapshot> {
        self.with_state(entity, |state| {
            if !state.can_unlock(key) {
                return Err(Error::Locked { entity: entity.clone() });
            }
            Ok(state.snapshot())
        })
    }

    /// Stop tracking an entity.
    ///
    /// Locked or customized states are kept aside when retention is enabled and
    /// come back on the next access. Returns whether the state was retained.
    pub fn evict(&self, entity: &EntityId) -> bool {
        let Entry::Occupied(occupied) = self.states.entry(entity.clone()) else {
            return false;
        };
        let state = occupied.get().lock().take();
        let retained = match state {
            Some(state) if self.retain_on_evict && state.is_customized() => {
                debug!("Retaining state for {}", entity);
                self.retained.insert(entity.clone(), state);
                true
            }
            _ => false,
        };
        occupied.remove();
        retained
    }
}
