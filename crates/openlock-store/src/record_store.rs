//! Lock record store: the source of truth for lock entities.
//!
//! Records are keyed by [`LockId`]. The store also owns the ID counter,
//! persisted alongside the records, so IDs are never reused. No business
//! rules live here: the lifecycle engine validates before it writes.

use std::collections::BTreeMap;

use openlock_types::{Lock, LockId, LockupError, Result};

/// Durable lock records plus the last allocated ID.
#[derive(Debug, Clone, Default)]
pub struct LockStore {
    /// All live locks by ID.
    locks: BTreeMap<LockId, Lock>,
    /// Highest ID ever allocated. `LockId::MIN` before the first lock.
    last_lock_id: LockId,
}

impl LockStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            locks: BTreeMap::new(),
            last_lock_id: LockId::MIN,
        }
    }

    /// Look up a lock by ID.
    ///
    /// # Errors
    /// Returns `LockNotFound` if no such lock is stored.
    pub fn get(&self, id: LockId) -> Result<&Lock> {
        self.locks.get(&id).ok_or(LockupError::LockNotFound(id))
    }

    #[must_use]
    pub fn contains(&self, id: LockId) -> bool {
        self.locks.contains_key(&id)
    }

    /// Insert or overwrite a lock. Returns the previous record, if any.
    pub fn set(&mut self, lock: Lock) -> Option<Lock> {
        self.locks.insert(lock.id, lock)
    }

    /// Remove a lock. Returns the removed record, if any.
    pub fn delete(&mut self, id: LockId) -> Option<Lock> {
        self.locks.remove(&id)
    }

    /// Allocate the next ID and persist it as the last allocated.
    ///
    /// # Errors
    /// Returns `Internal` if the 64-bit ID space is exhausted.
    pub fn next_id(&mut self) -> Result<LockId> {
        let id = self
            .last_lock_id
            .checked_next()
            .ok_or_else(|| LockupError::Internal("lock ID space exhausted".into()))?;
        self.last_lock_id = id;
        Ok(id)
    }

    /// Highest ID ever allocated.
    #[must_use]
    pub fn last_lock_id(&self) -> LockId {
        self.last_lock_id
    }

    /// Overwrite the ID counter. Used by genesis import and rollback.
    pub fn set_last_lock_id(&mut self, id: LockId) {
        self.last_lock_id = id;
    }

    /// Locks in ascending ID order.
    pub fn iter(&self) -> impl Iterator<Item = &Lock> {
        self.locks.values()
    }

    /// Number of live locks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
