//! Read-only queries.
//!
//! All enumeration goes through the reference index, so results come back
//! in queue order: not-unlocking locks by ascending duration, unlocking
//! locks by ascending end time, ties by ID.

use std::ops::Bound;
use std::time::Duration;

use chrono::{DateTime, Utc};
use openlock_store::RefScope;
use openlock_types::{
    AccountId, Coin, Coins, Lock, LockId, OrderKey, QueryCondition, RefQueue, Result,
};
use rust_decimal::Decimal;

use crate::engine::LockupEngine;
use crate::hooks::LockupHooks;
use crate::ledger::Ledger;

impl<L: Ledger, H: LockupHooks> LockupEngine<L, H> {
    /// # Errors
    /// `LockNotFound` if `id` is not stored.
    pub fn get_lock(&self, id: LockId) -> Result<&Lock> {
        self.locks.get(id)
    }

    /// Every stored lock in ID order.
    pub fn locks(&self) -> impl Iterator<Item = &Lock> {
        self.locks.iter()
    }

    /// Total of `query.denom` locked at a duration of at least
    /// `query.duration`, unlocking or not.
    #[must_use]
    pub fn period_locks_accumulation(&self, query: &QueryCondition) -> Decimal {
        self.accumulation.suffix_sum(&query.denom, query.duration)
    }

    /// Everything the escrow pool holds.
    #[must_use]
    pub fn module_balance(&self) -> Coins {
        self.ledger.pool_balances()
    }

    /// Coins that cannot be withdrawn at `now`: not-unlocking locks plus
    /// unlocking locks that have not matured.
    ///
    /// # Errors
    /// `AmountOverflow` if a denomination's total does not fit.
    pub fn module_locked_coins(&self, now: DateTime<Utc>) -> Result<Coins> {
        let locked = self.collect(RefQueue::NotUnlocking, RefScope::All, ..);
        let pending = self.collect(RefQueue::Unlocking, RefScope::All, after(now));
        sum_coins(locked.into_iter().chain(pending))
    }

    /// All locks of `owner`: not-unlocking first, then unlocking.
    #[must_use]
    pub fn account_locks(&self, owner: AccountId) -> Vec<&Lock> {
        let mut locks = self.collect(RefQueue::NotUnlocking, RefScope::Account(owner), ..);
        locks.extend(self.collect(RefQueue::Unlocking, RefScope::Account(owner), ..));
        locks
    }

    /// Coins of `owner` that cannot be withdrawn at `now`.
    pub fn account_locked_coins(&self, owner: AccountId, now: DateTime<Utc>) -> Result<Coins> {
        let locked = self.collect(RefQueue::NotUnlocking, RefScope::Account(owner), ..);
        let pending = self.collect(RefQueue::Unlocking, RefScope::Account(owner), after(now));
        sum_coins(locked.into_iter().chain(pending))
    }

    /// Coins of `owner` that are unlocking but not yet mature at `now`.
    pub fn account_unlocking_coins(&self, owner: AccountId, now: DateTime<Utc>) -> Result<Coins> {
        sum_coins(self.collect(RefQueue::Unlocking, RefScope::Account(owner), after(now)))
    }

    /// Coins of `owner` whose unlock has matured at `now`.
    pub fn account_unlockable_coins(&self, owner: AccountId, now: DateTime<Utc>) -> Result<Coins> {
        sum_coins(self.collect(
            RefQueue::Unlocking,
            RefScope::Account(owner),
            ..=OrderKey::EndTime(now),
        ))
    }

    /// Unlocking locks whose end time is at or before `time`.
    #[must_use]
    pub fn locks_unlocking_before(&self, time: DateTime<Utc>) -> Vec<&Lock> {
        self.collect(RefQueue::Unlocking, RefScope::All, ..=OrderKey::EndTime(time))
    }

    /// Locks holding `denom` with a duration of at least `duration`.
    #[must_use]
    pub fn locks_longer_than_duration(&self, denom: &str, duration: Duration) -> Vec<&Lock> {
        self.longer_than(RefScope::Denom(denom.to_owned()), duration)
    }

    /// `owner`'s locks holding `denom` with a duration of at least `duration`.
    #[must_use]
    pub fn account_locked_longer_duration_denom(
        &self,
        owner: AccountId,
        denom: &str,
        duration: Duration,
    ) -> Vec<&Lock> {
        self.longer_than(RefScope::AccountDenom(owner, denom.to_owned()), duration)
    }

    /// `owner`'s not-unlocking locks holding `denom` at exactly `duration`.
    #[must_use]
    pub fn account_locked_duration_not_unlocking_only(
        &self,
        owner: AccountId,
        denom: &str,
        duration: Duration,
    ) -> Vec<&Lock> {
        let key = OrderKey::Duration(duration);
        self.collect(
            RefQueue::NotUnlocking,
            RefScope::AccountDenom(owner, denom.to_owned()),
            key..=key,
        )
    }

    /// Whether `owner` has a not-unlocking `denom` lock at exactly `duration`.
    #[must_use]
    pub fn has_lock(&self, owner: AccountId, denom: &str, duration: Duration) -> bool {
        !self
            .account_locked_duration_not_unlocking_only(owner, denom, duration)
            .is_empty()
    }

    /// Whether `owner` has an unlocking `denom` lock at exactly `duration`.
    #[must_use]
    pub fn has_unlocking_lock(&self, owner: AccountId, denom: &str, duration: Duration) -> bool {
        self.collect(
            RefQueue::Unlocking,
            RefScope::AccountDenom(owner, denom.to_owned()),
            ..,
        )
        .iter()
        .any(|lock| lock.duration == duration)
    }

    pub(crate) fn account_lock_ids(&self, queue: RefQueue, owner: AccountId) -> Vec<LockId> {
        self.refs.iter(queue, RefScope::Account(owner), ..).collect()
    }

    /// Not-unlocking locks are ranged on the index; unlocking ones are
    /// keyed by end time, so their duration is filtered per lock.
    fn longer_than(&self, scope: RefScope, duration: Duration) -> Vec<&Lock> {
        let mut locks = self.collect(
            RefQueue::NotUnlocking,
            scope.clone(),
            OrderKey::Duration(duration)..,
        );
        locks.extend(
            self.collect(RefQueue::Unlocking, scope, ..)
                .into_iter()
                .filter(|lock| lock.duration >= duration),
        );
        locks
    }

    fn collect<R>(&self, queue: RefQueue, scope: RefScope, range: R) -> Vec<&Lock>
    where
        R: std::ops::RangeBounds<OrderKey>,
    {
        self.refs
            .iter(queue, scope, range)
            .filter_map(|id| self.locks.get(id).ok())
            .collect()
    }
}

/// End times strictly after `now`.
fn after(now: DateTime<Utc>) -> (Bound<OrderKey>, Bound<OrderKey>) {
    (Bound::Excluded(OrderKey::EndTime(now)), Bound::Unbounded)
}

fn sum_coins<'a>(locks: impl IntoIterator<Item = &'a Lock>) -> Result<Coins> {
    Coins::try_sum(locks.into_iter().flat_map(|lock| {
        lock.coins
            .iter()
            .map(|(denom, amount)| Coin::new(denom.clone(), *amount))
    }))
}
