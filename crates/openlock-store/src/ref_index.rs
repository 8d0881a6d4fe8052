//! Ordered lock reference index.
//!
//! Every stored lock has references in exactly one of two queues:
//! `NotUnlocking` (ordered by duration) or `Unlocking` (ordered by end
//! time). Each reference is registered under several scopes so callers can
//! walk "all unlocking locks before T" or "this owner's udym locks" without
//! touching the record store.
//!
//! ## Key layout
//!
//! ```text
//! (queue, scope, order_key, lock_id)
//! ```
//!
//! A `BTreeSet` over that tuple gives ascending order-key iteration inside
//! any `(queue, scope)` prefix. A per-lock registry remembers exactly which
//! keys were inserted, so removal does not depend on the lock's current
//! coins and is idempotent.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::{Bound, RangeBounds};

use openlock_types::{AccountId, Denom, Lock, LockId, OrderKey, RefQueue};
use tracing::debug;

/// The prefix a reference is filed under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub enum RefScope {
    /// Every lock in the queue.
    All,
    /// Locks owned by one account.
    Account(AccountId),
    /// Locks holding a denomination.
    Denom(Denom),
    /// Locks owned by one account that hold a denomination.
    AccountDenom(AccountId, Denom),
}

impl RefScope {
    /// The narrowest scope matching an optional owner and denomination.
    #[must_use]
    pub fn for_filter(owner: Option<AccountId>, denom: Option<&str>) -> Self {
        match (owner, denom) {
            (None, None) => Self::All,
            (Some(owner), None) => Self::Account(owner),
            (None, Some(denom)) => Self::Denom(denom.to_owned()),
            (Some(owner), Some(denom)) => Self::AccountDenom(owner, denom.to_owned()),
        }
    }
}

/// A single index entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct RefKey {
    pub queue: RefQueue,
    pub scope: RefScope,
    pub order_key: OrderKey,
    pub id: LockId,
}

/// Secondary ordered index over lock references.
#[derive(Debug, Clone, Default)]
pub struct RefIndex {
    keys: BTreeSet<RefKey>,
    registered: BTreeMap<LockId, BTreeSet<RefKey>>,
}

impl RefIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one reference. Returns `false` if it was already present.
    pub fn add_ref(&mut self, key: RefKey) -> bool {
        self.registered
            .entry(key.id)
            .or_default()
            .insert(key.clone());
        self.keys.insert(key)
    }

    /// Remove one reference. Absent keys are ignored.
    pub fn remove_ref(&mut self, key: &RefKey) -> bool {
        if let Some(set) = self.registered.get_mut(&key.id) {
            set.remove(key);
            if set.is_empty() {
                self.registered.remove(&key.id);
            }
        }
        self.keys.remove(key)
    }

    /// Register `lock` in its current queue under every scope it belongs
    /// to. Returns the keys that were actually inserted.
    pub fn add_lock_refs(&mut self, lock: &Lock) -> Vec<RefKey> {
        let queue = lock.ref_queue();
        let order_key = lock.order_key();
        let mut scopes = vec![RefScope::All, RefScope::Account(lock.owner)];
        for denom in lock.coins.denoms() {
            scopes.push(RefScope::Denom(denom.clone()));
            scopes.push(RefScope::AccountDenom(lock.owner, denom.clone()));
        }

        let added = self.insert_scopes(queue, order_key, lock.id, scopes);
        debug!(lock_id = %lock.id, %queue, refs = added.len(), "lock refs added");
        added
    }

    /// Register the denomination-scoped references for a denomination the
    /// lock has just started holding.
    pub fn add_denom_refs(&mut self, lock: &Lock, denom: &str) -> Vec<RefKey> {
        let scopes = vec![
            RefScope::Denom(denom.to_owned()),
            RefScope::AccountDenom(lock.owner, denom.to_owned()),
        ];
        self.insert_scopes(lock.ref_queue(), lock.order_key(), lock.id, scopes)
    }

    fn insert_scopes(
        &mut self,
        queue: RefQueue,
        order_key: OrderKey,
        id: LockId,
        scopes: Vec<RefScope>,
    ) -> Vec<RefKey> {
        scopes
            .into_iter()
            .map(|scope| RefKey {
                queue,
                scope,
                order_key,
                id,
            })
            .filter(|key| self.add_ref(key.clone()))
            .collect()
    }

    /// Remove every reference registered for `id` in `queue`. Returns the
    /// removed keys; empty if there were none.
    pub fn remove_lock_refs(&mut self, queue: RefQueue, id: LockId) -> Vec<RefKey> {
        let Some(set) = self.registered.get(&id) else {
            return Vec::new();
        };
        let doomed: Vec<RefKey> = set.iter().filter(|k| k.queue == queue).cloned().collect();
        for key in &doomed {
            self.remove_ref(key);
        }
        if !doomed.is_empty() {
            debug!(lock_id = %id, %queue, refs = doomed.len(), "lock refs removed");
        }
        doomed
    }

    /// Whether `id` has any reference in `queue`.
    #[must_use]
    pub fn contains_lock(&self, queue: RefQueue, id: LockId) -> bool {
        self.registered
            .get(&id)
            .is_some_and(|set| set.iter().any(|k| k.queue == queue))
    }

    /// Lock IDs in `(queue, scope)` whose order key lies in `range`, in
    /// ascending order-key order (ties by ID).
    ///
    /// The iterator borrows the index; collect it before mutating.
    pub fn iter<R>(
        &self,
        queue: RefQueue,
        scope: RefScope,
        range: R,
    ) -> impl Iterator<Item = LockId> + '_
    where
        R: RangeBounds<OrderKey>,
    {
        let start = range.start_bound().cloned();
        let end = range.end_bound().cloned();
        let lower = RefKey {
            queue,
            scope: scope.clone(),
            order_key: match start {
                Bound::Included(k) | Bound::Excluded(k) => k,
                Bound::Unbounded => queue.min_order_key(),
            },
            id: LockId::MIN,
        };

        self.keys
            .range(lower..)
            .take_while(move |k| {
                k.queue == queue
                    && k.scope == scope
                    && match end {
                        Bound::Included(max) => k.order_key <= max,
                        Bound::Excluded(max) => k.order_key < max,
                        Bound::Unbounded => true,
                    }
            })
            .filter(move |k| match start {
                Bound::Excluded(min) => k.order_key > min,
                _ => true,
            })
            .map(|k| k.id)
    }

    /// Total number of index entries across all queues and scopes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{DateTime, Utc};

    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    fn unlocking(mut lock: Lock, end_secs: i64) -> Lock {
        lock.end_time = Some(DateTime::<Utc>::UNIX_EPOCH + chrono::Duration::seconds(end_secs));
        lock
    }

    fn all(index: &RefIndex, queue: RefQueue) -> Vec<u64> {
        index.iter(queue, RefScope::All, ..).map(|id| id.0).collect()
    }

    #[test]
    fn registers_every_scope() {
        let owner = AccountId::new();
        let mut index = RefIndex::new();
        let added = index.add_lock_refs(&Lock::dummy(1, owner, "udym", 10, HOUR));
        // all, account, denom, account+denom
        assert_eq!(added.len(), 4);
        assert_eq!(index.len(), 4);
        assert!(index.contains_lock(RefQueue::NotUnlocking, LockId(1)));
        assert!(!index.contains_lock(RefQueue::Unlocking, LockId(1)));

        assert_eq!(index.add_lock_refs(&Lock::dummy(1, owner, "udym", 10, HOUR)).len(), 0);
    }

    #[test]
    fn orders_by_duration_then_id() {
        let owner = AccountId::new();
        let mut index = RefIndex::new();
        index.add_lock_refs(&Lock::dummy(3, owner, "udym", 1, HOUR * 2));
        index.add_lock_refs(&Lock::dummy(2, owner, "udym", 1, HOUR));
        index.add_lock_refs(&Lock::dummy(1, owner, "udym", 1, HOUR * 2));
        assert_eq!(all(&index, RefQueue::NotUnlocking), vec![2, 1, 3]);
    }

    #[test]
    fn max_order_key_bounds_iteration() {
        let owner = AccountId::new();
        let mut index = RefIndex::new();
        for (id, end) in [(1, 30), (2, 10), (3, 20), (4, 40)] {
            index.add_lock_refs(&unlocking(Lock::dummy(id, owner, "udym", 1, HOUR), end));
        }
        let cutoff = OrderKey::EndTime(DateTime::<Utc>::UNIX_EPOCH + chrono::Duration::seconds(30));
        let due: Vec<_> = index
            .iter(RefQueue::Unlocking, RefScope::All, ..=cutoff)
            .map(|id| id.0)
            .collect();
        assert_eq!(due, vec![2, 3, 1]);

        let strictly_before: Vec<_> = index
            .iter(RefQueue::Unlocking, RefScope::All, ..cutoff)
            .map(|id| id.0)
            .collect();
        assert_eq!(strictly_before, vec![2, 3]);
    }

    #[test]
    fn excluded_lower_bound_skips_equal_keys() {
        let owner = AccountId::new();
        let mut index = RefIndex::new();
        index.add_lock_refs(&Lock::dummy(1, owner, "udym", 1, HOUR));
        index.add_lock_refs(&Lock::dummy(2, owner, "udym", 1, HOUR * 2));
        let longer: Vec<_> = index
            .iter(
                RefQueue::NotUnlocking,
                RefScope::All,
                (Bound::Excluded(OrderKey::Duration(HOUR)), Bound::Unbounded),
            )
            .map(|id| id.0)
            .collect();
        assert_eq!(longer, vec![2]);
    }

    #[test]
    fn owner_and_denom_scopes() {
        let alice = AccountId::new();
        let bob = AccountId::new();
        let mut index = RefIndex::new();
        index.add_lock_refs(&Lock::dummy(1, alice, "udym", 1, HOUR));
        index.add_lock_refs(&Lock::dummy(2, bob, "udym", 1, HOUR));
        index.add_lock_refs(&Lock::dummy(3, alice, "uatom", 1, HOUR));

        let ids = |scope| -> Vec<u64> {
            index
                .iter(RefQueue::NotUnlocking, scope, ..)
                .map(|id| id.0)
                .collect()
        };
        assert_eq!(ids(RefScope::for_filter(Some(alice), None)), vec![1, 3]);
        assert_eq!(ids(RefScope::for_filter(None, Some("udym"))), vec![1, 2]);
        assert_eq!(ids(RefScope::for_filter(Some(alice), Some("uatom"))), vec![3]);
        assert!(ids(RefScope::for_filter(Some(bob), Some("uatom"))).is_empty());
    }

    #[test]
    fn removal_is_idempotent() {
        let owner = AccountId::new();
        let mut index = RefIndex::new();
        index.add_lock_refs(&Lock::dummy(1, owner, "udym", 1, HOUR));
        index.add_lock_refs(&Lock::dummy(2, owner, "udym", 1, HOUR));

        assert_eq!(index.remove_lock_refs(RefQueue::NotUnlocking, LockId(1)).len(), 4);
        assert!(index.remove_lock_refs(RefQueue::NotUnlocking, LockId(1)).is_empty());
        assert!(index.remove_lock_refs(RefQueue::Unlocking, LockId(2)).is_empty());

        let stale = RefKey {
            queue: RefQueue::NotUnlocking,
            scope: RefScope::All,
            order_key: OrderKey::Duration(HOUR),
            id: LockId(1),
        };
        assert!(!index.remove_ref(&stale));
        assert_eq!(all(&index, RefQueue::NotUnlocking), vec![2]);
    }

    #[test]
    fn queue_move_leaves_single_membership() {
        let owner = AccountId::new();
        let mut index = RefIndex::new();
        let lock = Lock::dummy(1, owner, "udym", 1, HOUR);
        index.add_lock_refs(&lock);

        index.remove_lock_refs(RefQueue::NotUnlocking, lock.id);
        index.add_lock_refs(&unlocking(lock, 3600));

        assert!(!index.contains_lock(RefQueue::NotUnlocking, LockId(1)));
        assert!(index.contains_lock(RefQueue::Unlocking, LockId(1)));
        assert!(all(&index, RefQueue::NotUnlocking).is_empty());
        assert_eq!(all(&index, RefQueue::Unlocking), vec![1]);
    }

    #[test]
    fn removal_tracks_registered_denoms() {
        let owner = AccountId::new();
        let mut index = RefIndex::new();
        let mut lock = Lock::dummy(1, owner, "udym", 1, HOUR);
        index.add_lock_refs(&lock);

        lock.coins = lock
            .coins
            .checked_add(&openlock_types::Coin::new("uatom", 5).into())
            .unwrap();
        assert_eq!(index.add_denom_refs(&lock, "uatom").len(), 2);

        // Removal catches the uatom refs even though they were added later.
        assert_eq!(index.remove_lock_refs(RefQueue::NotUnlocking, lock.id).len(), 6);
        assert!(index.is_empty());
    }
}
