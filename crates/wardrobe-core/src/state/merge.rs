//! Layered merge of designs into entity state.
//!
//! A merge takes a [`MergePlan`] (the resolved layers of a design and its
//! links, in application order) and folds it into an [`EntityState`]:
//!
//! 1. The key must pass the entity's unlock check, otherwise nothing happens.
//! 2. Without `merge_links` only the owner layer is used.
//! 3. The selected layers are folded into one target, last writer wins, each
//!    layer limited to `layer.scope ∩ call scope`.
//! 4. Only fields whose target value differs from the current one are written.
//!    Changing an equipment slot first drops material overrides made for the
//!    old item when `reset_dependents` is set.
//! 5. Any change publishes one [`StateEvent`], plus a finalized one if requested.
//!
//! After the lock check no step can fail, so a refused merge never leaves a
//! partial write behind.

use std::collections::BTreeMap;
use tracing::{debug, warn};
use crate::design::document::DesignDocument;
use crate::design::material::{ColorRow, MaterialDesign, MaterialKey};
use crate::events::{EventBus, StateEvent};
use crate::state::entity::{EntityState, StateSource};
use crate::types::{
    AppearanceRecord, ApplyMask, CategorySet, DesignId, EntityId, Error, FieldCategory, FieldId,
    RestrictionScope, Result,
};

/// Per-call merge options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplySettings {
    /// Key presented to the entity lock
    pub key: u32,
    /// Categories this call may touch
    pub scope: RestrictionScope,
    /// Apply linked designs, not just the owner
    pub merge_links: bool,
    /// Drop overrides tied to values that get replaced
    pub reset_dependents: bool,
    /// Provenance recorded for written fields
    pub source: StateSource,
    /// Publish a finalized event after the change
    pub is_final: bool,
}

impl Default for ApplySettings {
    fn default() -> Self {
        Self {
            key: 0,
            scope: RestrictionScope::ALL,
            merge_links: true,
            reset_dependents: true,
            source: StateSource::Manual,
            is_final: true,
        }
    }
}

impl ApplySettings {
    /// Settings for a call coming through the command surface
    pub fn ipc(key: u32) -> Self {
        Self { key, source: StateSource::Ipc, ..Self::default() }
    }

    /// Same settings with another scope
    pub fn with_scope(self, scope: RestrictionScope) -> Self {
        Self { scope, ..self }
    }

    /// Same settings with another source
    pub fn with_source(self, source: StateSource) -> Self {
        Self { source, ..self }
    }
}

/// Result of a merge that passed the lock check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Something changed; the categories that did
    Success(CategorySet),
    /// Every addressed value already matched
    NothingDone,
}

impl ApplyOutcome {
    /// Whether anything changed
    pub fn is_success(&self) -> bool {
        matches!(self, ApplyOutcome::Success(_))
    }

    /// Categories that changed, empty for [`ApplyOutcome::NothingDone`]
    pub fn categories(&self) -> CategorySet {
        match self {
            ApplyOutcome::Success(categories) => *categories,
            ApplyOutcome::NothingDone => CategorySet::empty(),
        }
    }
}

/// One design's contribution to a merge
#[derive(Debug, Clone, PartialEq)]
pub struct DesignLayer {
    /// Originating design, `None` for synthetic layers
    pub design: Option<DesignId>,
    /// Values
    pub record: AppearanceRecord,
    /// Fields this layer writes
    pub mask: ApplyMask,
    /// Material overrides this layer writes
    pub materials: MaterialDesign,
    /// Categories this layer may write, after link narrowing
    pub scope: RestrictionScope,
    /// Drop every material override before writing
    pub reset_materials: bool,
}

impl DesignLayer {
    /// Layer for a stored design
    pub fn from_document(document: &DesignDocument, scope: RestrictionScope) -> Self {
        Self {
            design: Some(document.id()),
            record: *document.record(),
            mask: document.mask(),
            materials: document.materials().clone(),
            scope,
            reset_materials: false,
        }
    }

    /// Layer for a free-standing record, such as a decoded wire blob
    pub fn from_record(record: AppearanceRecord, mask: ApplyMask) -> Self {
        Self {
            design: None,
            record,
            mask,
            materials: MaterialDesign::new(),
            scope: RestrictionScope::ALL,
            reset_materials: false,
        }
    }
}

/// Ordered layers of one design application
#[derive(Debug, Clone, PartialEq)]
pub struct MergePlan {
    layers: Vec<DesignLayer>,
    owner: usize,
}

impl MergePlan {
    /// Plan with a single layer
    pub fn single(layer: DesignLayer) -> Self {
        Self { layers: vec![layer], owner: 0 }
    }

    /// Plan from resolved layers; `owner` indexes the design that was asked for
    pub fn new(layers: Vec<DesignLayer>, owner: usize) -> Result<Self> {
        if owner >= layers.len() {
            return Err(Error::invalid_state("merge plan owner is out of range"));
        }
        Ok(Self { layers, owner })
    }

    /// All layers in application order
    pub fn layers(&self) -> &[DesignLayer] {
        &self.layers
    }

    /// The layer of the design that was asked for
    pub fn owner(&self) -> &DesignLayer {
        &self.layers[self.owner]
    }

    fn selected(&self, merge_links: bool) -> &[DesignLayer] {
        if merge_links {
            &self.layers
        } else {
            std::slice::from_ref(&self.layers[self.owner])
        }
    }
}

/// Folds merge plans into entity state and reports changes
#[derive(Clone, Default)]
pub struct MergeEngine {
    events: EventBus<StateEvent>,
}

impl MergeEngine {
    /// Create an engine publishing on `events`
    pub fn new(events: EventBus<StateEvent>) -> Self {
        Self { events }
    }

    /// Open a subscription to state changes
    pub fn subscribe(&self) -> flume::Receiver<StateEvent> {
        self.events.subscribe()
    }

    /// Apply a plan to an entity
    pub fn apply_design(
        &self,
        state: &mut EntityState,
        plan: &MergePlan,
        settings: &ApplySettings,
    ) -> Result<ApplyOutcome> {
        if !state.can_unlock(settings.key) {
            warn!("Refused merge into {}: locked with a different key", state.id());
            return Err(Error::Locked { entity: state.id().clone() });
        }

        let layers = plan.selected(settings.merge_links);
        let target = MergeTarget::fold(state.current_record(), layers, settings);
        let changed = target.write_into(state, settings);

        if changed.is_empty() {
            debug!("Merge into {} changed nothing", state.id());
            return Ok(ApplyOutcome::NothingDone);
        }
        debug!("Merged into {}: {:?} from {:?}", state.id(), changed, settings.source);
        self.notify(state.id(), changed, settings.source, settings.is_final);
        Ok(ApplyOutcome::Success(changed))
    }

    /// Restore every field to the natural appearance and drop material overrides
    pub fn reset_state(&self, state: &mut EntityState, key: u32) -> Result<ApplyOutcome> {
        self.reset(state, key, RestrictionScope::ALL, true)
    }

    /// Restore items, dyes and crests and drop material overrides
    pub fn reset_equip(&self, state: &mut EntityState, key: u32) -> Result<ApplyOutcome> {
        self.reset(state, key, RestrictionScope::EQUIPMENT, true)
    }

    /// Restore customization bytes and parameters
    pub fn reset_customize(&self, state: &mut EntityState, key: u32) -> Result<ApplyOutcome> {
        self.reset(state, key, RestrictionScope::CUSTOMIZATION, false)
    }

    fn reset(
        &self,
        state: &mut EntityState,
        key: u32,
        scope: RestrictionScope,
        reset_materials: bool,
    ) -> Result<ApplyOutcome> {
        let mut layer = DesignLayer::from_record(*state.base_record(), ApplyMask::ALL);
        layer.scope = scope;
        layer.reset_materials = reset_materials;
        let settings = ApplySettings {
            key,
            scope,
            merge_links: false,
            reset_dependents: false,
            source: StateSource::Game,
            is_final: true,
        };
        let outcome = self.apply_design(state, &MergePlan::single(layer), &settings)?;
        state.reset_provenance(scope);
        Ok(outcome)
    }

    pub(crate) fn notify(
        &self,
        entity: &EntityId,
        categories: CategorySet,
        source: StateSource,
        is_final: bool,
    ) {
        let event = |finalized| StateEvent {
            entity: entity.clone(),
            categories,
            source,
            finalized,
        };
        self.events.publish(event(false));
        if is_final {
            self.events.publish(event(true));
        }
    }
}

/// Net effect of the selected layers
struct MergeTarget {
    record: AppearanceRecord,
    mask: ApplyMask,
    materials: BTreeMap<MaterialKey, ColorRow>,
    reset_materials: bool,
}

impl MergeTarget {
    fn fold(current: &AppearanceRecord, layers: &[DesignLayer], settings: &ApplySettings) -> Self {
        let mut target = Self {
            record: *current,
            mask: ApplyMask::NONE,
            materials: BTreeMap::new(),
            reset_materials: false,
        };
        for layer in layers {
            let scope = layer.scope.intersect(settings.scope);
            if layer.reset_materials {
                target.reset_materials = true;
                target.materials.clear();
            }
            for field in layer.mask.iter().filter(|f| scope.allows(f.category())) {
                target.record.copy_field(field, &layer.record);
                target.mask = target.mask.with(field);
            }
            if scope.allows(FieldCategory::Equipment) {
                for (key, row) in layer.materials.enabled() {
                    target.materials.insert(*key, *row);
                }
            }
        }
        target
    }

    fn write_into(&self, state: &mut EntityState, settings: &ApplySettings) -> CategorySet {
        let mut changed = CategorySet::empty();
        if self.reset_materials && state.clear_materials() {
            changed |= CategorySet::MATERIAL;
        }

        for field in self.mask.iter() {
            if state.current_record().field_eq(&self.record, field) {
                continue;
            }
            if settings.reset_dependents {
                if let FieldId::Equipment(slot) = field {
                    if state.drop_slot_materials(slot) > 0 {
                        changed |= CategorySet::MATERIAL;
                    }
                }
            }
            if state.write_field(field, &self.record, settings.source) {
                changed |= CategorySet::of(field.category());
            }
        }

        for (key, row) in &self.materials {
            if state.set_material(*key, *row, settings.source) {
                changed |= CategorySet::MATERIAL;
            }
        }
        changed
    }
}
