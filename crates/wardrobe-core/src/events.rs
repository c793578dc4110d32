//! Change notification streams
//!
//! Subscribers receive events through their own unbounded channel. Publishing
//! never blocks and silently drops subscribers whose receiver is gone.

use std::sync::Arc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use crate::state::StateSource;
use crate::types::{CategorySet, DesignId, EntityId, FieldCategory, FieldId};

/// Live state of an entity changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateEvent {
    /// Affected entity
    pub entity: EntityId,
    /// Categories that changed in this change group
    pub categories: CategorySet,
    /// Who caused the change
    pub source: StateSource,
    /// `false` for the live change, `true` for the follow-up once the change is final
    pub finalized: bool,
}

/// What happened to a design document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DesignChange {
    /// Created or imported
    Created,
    /// Deleted
    Deleted,
    /// Name changed
    Renamed,
    /// Description changed
    Description,
    /// Tags changed
    Tags,
    /// Quick design flag changed
    QuickDesign,
    /// Write protection toggled
    WriteProtection,
    /// A field value changed
    Field(FieldId),
    /// A field's apply flag changed
    Apply(FieldId),
    /// A whole category's apply flags changed
    ApplyCategory(FieldCategory),
    /// Another record was merged into the design
    Merged,
    /// The last record/mask change was undone
    Undo,
    /// Material overrides changed
    Material,
    /// Links were added, removed or reordered
    Links,
}

/// A design document changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignEvent {
    /// Affected design
    pub design: DesignId,
    /// Kind of change
    pub change: DesignChange,
}

/// Fan-out of events to any number of subscribers
pub struct EventBus<T> {
    subscribers: Arc<Mutex<Vec<flume::Sender<T>>>>,
}

impl<T: Clone> EventBus<T> {
    /// Create a bus without subscribers
    pub fn new() -> Self {
        Self { subscribers: Arc::new(Mutex::new(Vec::new())) }
    }

    /// Open a new subscription
    pub fn subscribe(&self) -> flume::Receiver<T> {
        let (tx, rx) = flume::unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Deliver an event to every live subscriber. Returns how many received it.
    pub fn publish(&self, event: T) -> usize {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        subscribers.len()
    }

    /// Number of subscribers that were alive at the last publish
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

impl<T: Clone> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for EventBus<T> {
    fn clone(&self) -> Self {
        Self { subscribers: Arc::clone(&self.subscribers) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropped_receivers_are_pruned() {
        let bus: EventBus<u32> = EventBus::new();
        let keep = bus.subscribe();
        let gone = bus.subscribe();
        drop(gone);
        assert_eq!(bus.publish(7), 1);
        assert_eq!(keep.try_recv(), Ok(7));
        assert_eq!(bus.subscriber_count(), 1);
    }
}
