//! Host collaborator contracts
//!
//! The core never enumerates entities or items itself. The host supplies the
//! natural (unmodified) appearance of an entity it observes and describes the
//! items it knows about.

use std::collections::HashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use crate::types::{AppearanceRecord, EntityId, EquipSlot, ItemId};

/// Where an item can be worn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemSlotKind {
    /// Exactly one equipment slot
    Slot(EquipSlot),
    /// Either ring slot
    Ring,
}

/// Host description of an item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemInfo {
    /// Item identifier
    pub id: ItemId,
    /// Display name
    pub name: String,
    /// Slots it can be equipped in
    pub slot: ItemSlotKind,
}

impl ItemInfo {
    /// Whether the item can be equipped in `slot`
    pub fn fits(&self, slot: EquipSlot) -> bool {
        match self.slot {
            ItemSlotKind::Slot(own) => own == slot,
            ItemSlotKind::Ring => matches!(slot, EquipSlot::RFinger | EquipSlot::LFinger),
        }
    }
}

/// Contract the host application must honor
pub trait EntityHost: Send + Sync {
    /// Natural appearance of an observed entity; `None` when the host does not know it
    fn natural_appearance(&self, entity: &EntityId) -> Option<AppearanceRecord>;

    /// Catalogue lookup; `None` when the item does not exist
    fn item(&self, item: ItemId) -> Option<ItemInfo>;
}

/// In-memory host, for embedding without a live application and for tests
#[derive(Debug, Default)]
pub struct StaticHost {
    entities: RwLock<HashMap<EntityId, AppearanceRecord>>,
    items: RwLock<HashMap<ItemId, ItemInfo>>,
}

impl StaticHost {
    /// Create an empty host
    pub fn new() -> Self {
        Self::default()
    }

    /// Start observing an entity, or replace its natural appearance
    pub fn insert_entity(&self, entity: EntityId, natural: AppearanceRecord) {
        self.entities.write().insert(entity, natural);
    }

    /// Stop observing an entity
    pub fn remove_entity(&self, entity: &EntityId) -> Option<AppearanceRecord> {
        self.entities.write().remove(entity)
    }

    /// Register an item
    pub fn insert_item(&self, info: ItemInfo) {
        self.items.write().insert(info.id, info);
    }
}

impl EntityHost for StaticHost {
    fn natural_appearance(&self, entity: &EntityId) -> Option<AppearanceRecord> {
        self.entities.read().get(entity).copied()
    }

    fn item(&self, item: ItemId) -> Option<ItemInfo> {
        self.items.read().get(&item).cloned()
    }
}
