//! Advisory key lock
//!
//! A lock is a single `u32` owner key. `0` means unlocked and doubles as the
//! master key: it can never acquire a lock but always passes the unlock check.
//! There is no handshake; a second locker with a different key simply fails.

use serde::{Deserialize, Serialize};
use crate::constants::MASTER_KEY;

/// Owner key guarding an entity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityLock {
    key: u32,
}

impl EntityLock {
    /// An unlocked lock
    pub const fn new() -> Self {
        Self { key: MASTER_KEY }
    }

    /// Current owner key, `0` when unlocked
    pub const fn key(&self) -> u32 {
        self.key
    }

    /// Whether any key holds the lock
    pub const fn is_locked(&self) -> bool {
        self.key != MASTER_KEY
    }

    /// Try to acquire the lock. Idempotent for the current owner.
    pub fn lock(&mut self, key: u32) -> bool {
        if key == MASTER_KEY {
            return false;
        }
        if self.key == MASTER_KEY {
            self.key = key;
            return true;
        }
        self.key == key
    }

    /// Whether `key` may mutate or release
    pub const fn can_unlock(&self, key: u32) -> bool {
        self.key == MASTER_KEY || self.key == key || key == MASTER_KEY
    }

    /// Release the lock if `key` is allowed to. Returns whether it was allowed.
    pub fn unlock(&mut self, key: u32) -> bool {
        if !self.can_unlock(key) {
            return false;
        }
        self.key = MASTER_KEY;
        true
    }
}
