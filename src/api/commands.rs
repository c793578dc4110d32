//! Command surface
//!
//! [`Wardrobe`] ties the design registry, the entity state manager and the wire
//! codec together behind commands that never fail with an error: every
//! outcome is reported as a [`ResultCode`].

use std::sync::Arc;
use bitflags::bitflags;
use parking_lot::{RwLock, RwLockReadGuard};
use tracing::{debug, info, warn};
use wardrobe_core::state::{DesignLayer, EntitySnapshot, MergePlan};
use wardrobe_core::types::{EquipSlot, ItemId, StainIds};
use wardrobe_core::{
    ApplyMask, ApplyOutcome, ApplySettings, DesignEvent, DesignId, DesignRegistry, EntityHost,
    EntityId, MergeEngine, RestrictionScope, StateEvent, StateManager, StateSource, WireCodec,
};
use crate::api::result::ResultCode;
use crate::core::{Config, Result};
use crate::system::Metrics;

bitflags! {
    /// Options for applying and reverting
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ApplyFlags: u8 {
        /// Touch items, dyes and crests
        const EQUIPMENT = 1 << 0;
        /// Touch customization and parameters
        const CUSTOMIZATION = 1 << 1;
        /// Include linked designs
        const MERGE_LINKS = 1 << 2;
        /// Drop overrides tied to replaced values
        const RESET_DEPENDENTS = 1 << 3;
        /// Lock the entity with the key after a successful apply
        const LOCK = 1 << 4;
    }
}

impl Default for ApplyFlags {
    fn default() -> Self {
        ApplyFlags::EQUIPMENT
            | ApplyFlags::CUSTOMIZATION
            | ApplyFlags::MERGE_LINKS
            | ApplyFlags::RESET_DEPENDENTS
    }
}

impl ApplyFlags {
    /// Restriction scope selected by the category flags
    pub fn scope(self) -> RestrictionScope {
        match (self.contains(ApplyFlags::EQUIPMENT), self.contains(ApplyFlags::CUSTOMIZATION)) {
            (true, true) => RestrictionScope::ALL,
            (true, false) => RestrictionScope::EQUIPMENT,
            (false, true) => RestrictionScope::CUSTOMIZATION,
            (false, false) => RestrictionScope::NONE,
        }
    }
}

/// What to apply: a stored design or a shared blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DesignSource {
    /// A design in the registry, with its links
    Document(DesignId),
    /// An encoded design blob
    Blob(String),
}

/// The Wardrobe service
pub struct Wardrobe<H: EntityHost> {
    registry: RwLock<DesignRegistry>,
    design_events: flume::Receiver<DesignEvent>,
    states: StateManager<H>,
    codec: WireCodec,
    metrics: Option<&'static Metrics>,
}

impl<H: EntityHost> Wardrobe<H> {
    /// Create a service over a host
    pub fn new(host: Arc<H>, config: &Config) -> Self {
        let registry = DesignRegistry::new();
        let design_events = registry.subscribe();
        Self {
            registry: RwLock::new(registry),
            design_events,
            states: StateManager::new(host, MergeEngine::default(), config.state.retain_on_evict),
            codec: config.wire_codec(),
            metrics: if config.metrics.enabled { Metrics::global() } else { None },
        }
    }

    /// Read access to the design registry
    pub fn registry(&self) -> RwLockReadGuard<'_, DesignRegistry> {
        self.registry.read()
    }

    /// Edit designs under the registry write lock
    pub fn edit_designs<R>(
        &self,
        f: impl FnOnce(&mut DesignRegistry) -> wardrobe_core::Result<R>,
    ) -> Result<R> {
        let result = f(&mut self.registry.write());
        let mutations = self.design_events.try_iter().count();
        if let Some(metrics) = self.metrics {
            metrics.design_mutations.inc_by(mutations as u64);
        }
        Ok(result?)
    }

    /// Entity state manager
    pub fn states(&self) -> &StateManager<H> {
        &self.states
    }

    /// Wire codec
    pub fn codec(&self) -> &WireCodec {
        &self.codec
    }

    /// Store a shared blob as a new design.
    ///
    /// Blobs from before version 3 bring their write protection along.
    pub fn import_blob(&self, name: &str, blob: &str) -> Result<DesignId> {
        let decoded = self.codec.decode(blob).inspect_err(|_| self.count_decode_failure())?;
        self.count_migration(decoded.version);
        self.edit_designs(|registry| {
            let id = registry.create_from(name, decoded.record, decoded.mask);
            if decoded.legacy_write_protected == Some(true) {
                registry.set_write_protection(id, true)?;
            }
            Ok(id)
        })
    }

    /// Encode a stored design as a shareable blob
    pub fn export_blob(&self, id: DesignId) -> Result<String> {
        let registry = self.registry.read();
        let document = registry.get(id).ok_or_else(|| wardrobe_core::Error::missing_design(id))?;
        Ok(self.codec.encode(document.record(), document.mask())?)
    }

    fn finish(
        &self,
        command: &str,
        entity: Option<&EntityId>,
        result: wardrobe_core::Result<ResultCode>,
    ) -> ResultCode {
        let code = match result {
            Ok(code) => {
                debug!("{} on {:?}: {}", command, entity, code);
                code
            }
            Err(err) => {
                let code = ResultCode::from(&err);
                warn!("{} on {:?} failed: {} ({})", command, entity, err, code);
                code
            }
        };
        if let Some(metrics) = self.metrics {
            metrics.record_command(command, code.as_str());
        }
        code
    }

    fn count_decode_failure(&self) {
        if let Some(metrics) = self.metrics {
            metrics.decode_failures.inc();
        }
    }

    fn count_migration(&self, version: u8) {
        if version != wardrobe_core::constants::CURRENT_WIRE_VERSION {
            if let Some(metrics) = self.metrics {
                metrics.migrations.inc();
            }
        }
    }

    fn plan(&self, design: &DesignSource) -> wardrobe_core::Result<MergePlan> {
        match design {
            DesignSource::Document(id) => self.registry.read().merge_plan(*id),
            DesignSource::Blob(blob) => {
                let decoded = self.codec.decode(blob).inspect_err(|_| self.count_decode_failure())?;
                self.count_migration(decoded.version);
                Ok(MergePlan::single(DesignLayer::from_record(decoded.record, decoded.mask)))
            }
        }
    }

    /// Apply a design or blob to an entity
    pub fn apply_design_to_entity(
        &self,
        entity: &EntityId,
        design: &DesignSource,
        key: u32,
        flags: ApplyFlags,
    ) -> ResultCode {
        let result = self.plan(design).and_then(|plan| {
            let settings = ApplySettings {
                key,
                scope: flags.scope(),
                merge_links: flags.contains(ApplyFlags::MERGE_LINKS),
                reset_dependents: flags.contains(ApplyFlags::RESET_DEPENDENTS),
                source: StateSource::Ipc,
                is_final: true,
            };
            self.states.with_state(entity, |state| {
                let outcome = self.states.engine().apply_design(state, &plan, &settings)?;
                if flags.contains(ApplyFlags::LOCK) && key != 0 {
                    state.lock(key);
                }
                Ok(ResultCode::from(outcome))
            })
        });
        self.finish("apply_design", Some(entity), result)
    }

    /// Current state of an entity, if `key` may see it
    pub fn get_current_state(
        &self,
        entity: &EntityId,
        key: u32,
    ) -> (ResultCode, Option<EntitySnapshot>) {
        let mut snapshot = None;
        let result = self.states.snapshot(entity, key).map(|s| {
            snapshot = Some(s);
            ResultCode::Success
        });
        (self.finish("get_state", Some(entity), result), snapshot)
    }

    /// Current state of an entity as a shareable blob
    pub fn get_current_state_blob(
        &self,
        entity: &EntityId,
        key: u32,
    ) -> (ResultCode, Option<String>) {
        let mut blob = None;
        let result = self.states.snapshot(entity, key).and_then(|s| {
            blob = Some(self.codec.encode(&s.current, ApplyMask::ALL)?);
            Ok(ResultCode::Success)
        });
        (self.finish("get_state_blob", Some(entity), result), blob)
    }

    /// Restore the natural appearance in the categories selected by `flags`
    pub fn revert_entity(&self, entity: &EntityId, key: u32, flags: ApplyFlags) -> ResultCode {
        let equipment = flags.contains(ApplyFlags::EQUIPMENT);
        let customization = flags.contains(ApplyFlags::CUSTOMIZATION);
        let result = match (equipment, customization) {
            (true, true) => self.states.reset_state(entity, key),
            (true, false) => self.states.reset_equip(entity, key),
            (false, true) => self.states.reset_customize(entity, key),
            (false, false) => Ok(ApplyOutcome::NothingDone),
        };
        self.finish("revert", Some(entity), result.map(ResultCode::from))
    }

    /// Lock an entity with `key`
    pub fn lock(&self, entity: &EntityId, key: u32) -> ResultCode {
        let result = self
            .states
            .lock(entity, key)
            .map(|locked| if locked { ResultCode::Success } else { ResultCode::InvalidKey });
        self.finish("lock", Some(entity), result)
    }

    /// Unlock an entity with `key`
    pub fn unlock(&self, entity: &EntityId, key: u32) -> ResultCode {
        let result = self.states.with_state(entity, |state| {
            Ok(if !state.lock_state().is_locked() {
                ResultCode::NothingDone
            } else if state.unlock(key) {
                ResultCode::Success
            } else {
                ResultCode::InvalidKey
            })
        });
        self.finish("unlock", Some(entity), result)
    }

    /// Release every lock `key` may release. Returns how many were released.
    pub fn unlock_all(&self, key: u32) -> usize {
        let released = self.states.unlock_all(key);
        let code = if released > 0 { ResultCode::Success } else { ResultCode::NothingDone };
        self.finish("unlock_all", None, Ok(code));
        released
    }

    /// Equip an item on an entity
    pub fn set_item(
        &self,
        entity: &EntityId,
        slot: EquipSlot,
        item: ItemId,
        stains: Option<StainIds>,
        key: u32,
    ) -> ResultCode {
        let result = self
            .states
            .change_item(entity, slot, item, stains, StateSource::Ipc, key)
            .map(ResultCode::from);
        self.finish("set_item", Some(entity), result)
    }

    /// Identifier and name of every design, sorted by name
    pub fn list_documents(&self) -> Vec<(DesignId, String)> {
        self.registry
            .read()
            .list()
            .into_iter()
            .map(|d| (d.id(), d.name().to_string()))
            .collect()
    }

    /// Subscribe to entity state changes
    pub fn subscribe(&self) -> flume::Receiver<StateEvent> {
        self.states.engine().subscribe()
    }

    /// Subscribe to design changes
    pub fn subscribe_designs(&self) -> flume::Receiver<DesignEvent> {
        self.registry.read().subscribe()
    }

    /// Forget an entity the host no longer observes
    pub fn evict(&self, entity: &EntityId) {
        if self.states.evict(entity) {
            info!("Retained state for {}", entity);
        }
    }
}
