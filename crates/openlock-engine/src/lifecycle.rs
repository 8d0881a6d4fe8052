//! Lock lifecycle operations.
//!
//! ```text
//! create_lock ──▶ LOCKED ──begin_unlock──▶ UNLOCKING ──unlock_matured_lock──▶ (deleted)
//!                   │  ▲                      ▲
//!     add_tokens ───┘  └── extend_lockup      └── begin_force_unlock_with_end_time
//! ```
//!
//! Every public operation is one atomic unit: validation runs first, and
//! any later failure (ledger, accumulation, hook) rolls back everything.
//! Partial unlocks split the requested coins into a new lock so the
//! remainder stays `Locked` under its original ID.

use std::time::Duration;

use chrono::{DateTime, Utc};
use openlock_types::{AccountId, Coin, Coins, Lock, LockId, LockupError, RefQueue, Result};
use tracing::{debug, info};

use crate::engine::{LockupEngine, maturity};
use crate::hooks::LockupHooks;
use crate::ledger::Ledger;

impl<L: Ledger, H: LockupHooks> LockupEngine<L, H> {
    /// Escrow `coins` from `owner` into a new `Locked` lock.
    ///
    /// # Errors
    /// - `InvalidCoins` / `InvalidDuration` on bad input
    /// - `TimeOverflow` if `now + duration` is not a representable time
    /// - `InsufficientBalance` if the escrow transfer fails (no ID is consumed)
    /// - any hook error
    pub fn create_lock(
        &mut self,
        owner: AccountId,
        coins: Coins,
        duration: Duration,
        now: DateTime<Utc>,
    ) -> Result<Lock> {
        self.atomic("create_lock", |e| {
            coins.validate()?;
            e.config.check_duration(duration)?;
            maturity(now, duration)?;

            e.escrow(owner, &coins)?;
            let id = e.allocate_id()?;
            let lock = Lock::new(id, owner, duration, None, coins, now);
            e.write_lock(lock.clone());
            e.add_refs(&lock);
            e.accumulate_coins(&lock.coins, duration)?;
            e.hooks.on_token_locked(&lock)?;

            info!(lock_id = %id, %owner, coins = %lock.coins, ?duration, "lock created");
            Ok(lock)
        })
    }

    /// Escrow one more coin into an existing lock owned by `owner`.
    ///
    /// # Errors
    /// `LockNotFound`, `NotLockOwner`, `InvalidCoins`, `InsufficientBalance`,
    /// `AmountOverflow`, or a hook error.
    pub fn add_tokens_to_lock(
        &mut self,
        id: LockId,
        owner: AccountId,
        coin: Coin,
        now: DateTime<Utc>,
    ) -> Result<Lock> {
        self.atomic("add_tokens_to_lock", |e| {
            e.add_tokens_inner(id, owner, coin, now)
        })
    }

    fn add_tokens_inner(
        &mut self,
        id: LockId,
        owner: AccountId,
        coin: Coin,
        now: DateTime<Utc>,
    ) -> Result<Lock> {
        let mut lock = self.load_lock(id)?;
        if lock.owner != owner {
            return Err(LockupError::NotLockOwner { lock_id: id, caller: owner });
        }
        coin.validate()?;

        let new_denom = !lock.coins.contains(&coin.denom);
        let added = Coins::from(coin);
        self.escrow(owner, &added)?;
        lock.coins = lock.coins.checked_add(&added)?;
        lock.updated_at = now;
        self.write_lock(lock.clone());
        if new_denom {
            for denom in added.denoms() {
                self.add_denom_refs(&lock, denom);
            }
        }
        self.accumulate_coins(&added, lock.duration)?;
        self.hooks.on_add_tokens(&lock, &added)?;

        info!(lock_id = %id, added = %added, total = %lock.coins, "tokens added to lock");
        Ok(lock)
    }

    /// Add `coin` to the owner's not-unlocking lock that already holds
    /// `coin.denom` at exactly `duration`. Returns that lock's ID.
    ///
    /// # Errors
    /// `NoMatchingLock` if no such lock exists, otherwise as
    /// [`Self::add_tokens_to_lock`].
    pub fn add_to_existing_lock(
        &mut self,
        owner: AccountId,
        coin: Coin,
        duration: Duration,
        now: DateTime<Utc>,
    ) -> Result<LockId> {
        self.atomic("add_to_existing_lock", |e| {
            let target = e
                .account_locked_duration_not_unlocking_only(owner, &coin.denom, duration)
                .first()
                .map(|lock| lock.id)
                .ok_or_else(|| LockupError::NoMatchingLock {
                    owner,
                    denom: coin.denom.clone(),
                    duration,
                })?;
            e.add_tokens_inner(target, owner, coin, now)?;
            Ok(target)
        })
    }

    /// Start unlocking `coins` of lock `id` (all of it if `coins` is empty or
    /// equal to the lock's balance). Returns the ID of the lock that is now
    /// unlocking: `id` itself, or a freshly split lock.
    ///
    /// # Errors
    /// `LockNotFound`, `AlreadyUnlocking`, `InvalidCoins`, `ExceedsLocked`,
    /// `TimeOverflow`, or a hook error.
    pub fn begin_unlock(&mut self, id: LockId, coins: &Coins, now: DateTime<Utc>) -> Result<LockId> {
        self.atomic("begin_unlock", |e| {
            let lock = e.load_lock(id)?;
            e.begin_unlock_inner(lock, coins, now)
        })
    }

    /// Begin unlocking every not-unlocking lock of `owner`, in ascending
    /// duration order. Returns the updated locks.
    ///
    /// # Errors
    /// Any error from [`Self::begin_unlock`]; nothing changes on error.
    pub fn begin_unlock_all_not_unlockings(
        &mut self,
        owner: AccountId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Lock>> {
        self.atomic("begin_unlock_all_not_unlockings", |e| {
            let ids = e.account_lock_ids(RefQueue::NotUnlocking, owner);
            let mut started = Vec::with_capacity(ids.len());
            for id in ids {
                let lock = e.load_lock(id)?;
                let unlocking = e.begin_unlock_inner(lock, &Coins::new(), now)?;
                started.push(e.load_lock(unlocking)?);
            }
            Ok(started)
        })
    }

    pub(crate) fn begin_unlock_inner(
        &mut self,
        lock: Lock,
        coins: &Coins,
        now: DateTime<Utc>,
    ) -> Result<LockId> {
        if lock.is_unlocking() {
            return Err(LockupError::AlreadyUnlocking(lock.id));
        }
        let partial = !coins.is_empty() && *coins != lock.coins;
        if partial {
            coins.validate()?;
            if !coins.is_all_lte(&lock.coins) {
                return Err(LockupError::ExceedsLocked(lock.id));
            }
        }

        let mut lock = if partial {
            self.split_lock(&lock, coins, false, now)?
        } else {
            lock
        };

        self.remove_refs(RefQueue::NotUnlocking, lock.id);
        let end_time = maturity(now, lock.duration)?;
        lock.end_time = Some(end_time);
        self.write_lock(lock.clone());
        self.add_refs(&lock);
        self.hooks.on_start_unlock(&lock)?;

        info!(lock_id = %lock.id, coins = %lock.coins, %end_time, "unlock started");
        Ok(lock.id)
    }

    /// Move lock `id` into the unlocking queue with an explicit end time,
    /// whatever its current state.
    ///
    /// # Errors
    /// `LockNotFound` or a hook error.
    pub fn begin_force_unlock_with_end_time(
        &mut self,
        id: LockId,
        end_time: DateTime<Utc>,
    ) -> Result<()> {
        self.atomic("begin_force_unlock_with_end_time", |e| {
            let mut lock = e.load_lock(id)?;
            e.remove_refs(lock.ref_queue(), id);
            lock.end_time = Some(end_time);
            e.write_lock(lock.clone());
            e.add_refs(&lock);
            e.hooks.on_start_unlock(&lock)?;

            info!(lock_id = %id, %end_time, "forced unlock start");
            Ok(())
        })
    }

    /// Split `coins` out of `lock` into a new lock with the same owner,
    /// duration and end time. The source keeps the remainder under its ID.
    ///
    /// Accumulation is untouched: the total at `lock.duration` is unchanged.
    pub(crate) fn split_lock(
        &mut self,
        lock: &Lock,
        coins: &Coins,
        allow_while_unlocking: bool,
        now: DateTime<Utc>,
    ) -> Result<Lock> {
        if lock.is_unlocking() && !allow_while_unlocking {
            return Err(LockupError::CannotSplitUnlocking(lock.id));
        }
        let remaining = lock
            .coins
            .checked_sub(coins)
            .ok_or(LockupError::ExceedsLocked(lock.id))?;
        if remaining.is_empty() {
            return Err(LockupError::Internal(format!(
                "split of {} would leave it empty",
                lock.id
            )));
        }

        let mut source = lock.clone();
        source.coins = remaining;
        // Re-register: the remainder may have dropped a denomination.
        self.remove_refs(source.ref_queue(), source.id);
        self.write_lock(source.clone());
        self.add_refs(&source);

        let id = self.allocate_id()?;
        let split = Lock::new(id, lock.owner, lock.duration, lock.end_time, coins.clone(), now);
        self.write_lock(split.clone());
        self.add_refs(&split);

        debug!(source = %lock.id, split = %id, coins = %coins, "lock split");
        Ok(split)
    }

    /// Finalize lock `id` once matured: return its coins and delete it.
    ///
    /// # Errors
    /// `LockNotFound`, `NotUnlocking`, `NotYetMature`, `InsufficientPool`,
    /// `AccumulationUnderflow` (fatal), or a hook error.
    pub fn unlock_matured_lock(&mut self, id: LockId, now: DateTime<Utc>) -> Result<()> {
        self.atomic("unlock_matured_lock", |e| {
            let lock = e.load_lock(id)?;
            let Some(end_time) = lock.end_time else {
                return Err(LockupError::NotUnlocking(id));
            };
            if now < end_time {
                return Err(LockupError::NotYetMature { lock_id: id, end_time });
            }
            e.finalize(lock)
        })
    }

    /// Return the coins to the owner, delete the record and its refs, and
    /// drop its accumulation contribution. The only path that deletes a lock.
    pub(crate) fn finalize(&mut self, lock: Lock) -> Result<()> {
        self.release(lock.owner, &lock.coins)?;
        self.delete_lock(lock.id)?;
        self.remove_refs(RefQueue::Unlocking, lock.id);
        self.remove_refs(RefQueue::NotUnlocking, lock.id);
        self.deaccumulate_coins(&lock.coins, lock.duration)?;
        self.hooks.on_token_unlocked(&lock)?;

        info!(lock_id = %lock.id, owner = %lock.owner, coins = %lock.coins, "lock finalized");
        Ok(())
    }

    /// Withdraw lock `id` immediately, ignoring its duration.
    ///
    /// A locked lock first enters the unlocking queue with `end_time = now`
    /// (firing the unlock-start hook), then is finalized in the same unit.
    /// Works whatever the lock's duration.
    ///
    /// # Errors
    /// As [`Self::begin_unlock`] and [`Self::unlock_matured_lock`], minus the
    /// maturity check.
    pub fn force_unlock(&mut self, id: LockId, now: DateTime<Utc>) -> Result<()> {
        self.atomic("force_unlock", |e| e.force_unlock_inner(id, now))
    }

    fn force_unlock_inner(&mut self, id: LockId, now: DateTime<Utc>) -> Result<()> {
        let mut lock = self.load_lock(id)?;
        if !lock.is_unlocking() {
            // Matures at `now`; the duration is never added.
            self.remove_refs(RefQueue::NotUnlocking, id);
            lock.end_time = Some(now);
            self.write_lock(lock.clone());
            self.add_refs(&lock);
            self.hooks.on_start_unlock(&lock)?;
            debug!(lock_id = %id, %now, "forced unlock start");
        }
        self.finalize(lock)
    }

    /// Force-unlock `coins` of lock `id`, splitting first if they are only
    /// part of it. Works on unlocking locks too.
    ///
    /// # Errors
    /// `LockNotFound`, `InvalidCoins`, `ExceedsLocked`, or as
    /// [`Self::force_unlock`].
    pub fn partial_force_unlock(
        &mut self,
        id: LockId,
        coins: &Coins,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.atomic("partial_force_unlock", |e| {
            let lock = e.load_lock(id)?;
            let partial = !coins.is_empty() && *coins != lock.coins;
            let target = if partial {
                coins.validate()?;
                if !coins.is_all_lte(&lock.coins) {
                    return Err(LockupError::ExceedsLocked(id));
                }
                e.split_lock(&lock, coins, true, now)?.id
            } else {
                id
            };
            e.force_unlock_inner(target, now)
        })
    }

    /// Raise the duration of a not-unlocking lock owned by `owner`.
    ///
    /// # Errors
    /// `LockNotFound`, `NotLockOwner`, `AlreadyUnlocking`, `InvalidDuration`,
    /// `DurationNotIncreasing`, `TimeOverflow` if `now + new_duration` is
    /// not representable, or a hook error.
    pub fn extend_lockup(
        &mut self,
        id: LockId,
        owner: AccountId,
        new_duration: Duration,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.atomic("extend_lockup", |e| {
            let mut lock = e.load_lock(id)?;
            if lock.owner != owner {
                return Err(LockupError::NotLockOwner { lock_id: id, caller: owner });
            }
            if lock.is_unlocking() {
                return Err(LockupError::AlreadyUnlocking(id));
            }
            let previous = lock.duration;
            if new_duration <= previous {
                return Err(LockupError::DurationNotIncreasing {
                    current: previous,
                    requested: new_duration,
                });
            }
            e.config.check_duration(new_duration)?;
            maturity(now, new_duration)?;

            e.remove_refs(RefQueue::NotUnlocking, id);
            e.deaccumulate_coins(&lock.coins, previous)?;
            e.accumulate_coins(&lock.coins, new_duration)?;
            lock.duration = new_duration;
            e.write_lock(lock.clone());
            e.add_refs(&lock);
            e.hooks.on_lockup_extend(&lock, previous)?;

            info!(lock_id = %id, from = ?previous, to = ?new_duration, "lockup extended");
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use openlock_types::LockupConfig;
    use rust_decimal::Decimal;

    use super::*;
    use crate::hooks::{FailingHooks, HookEvent, RecordingHooks};
    use crate::ledger::InMemoryLedger;

    const HOUR: Duration = Duration::from_secs(3600);

    fn t0() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + chrono::Duration::days(365)
    }

    fn dec(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    fn coins(pairs: &[(&str, i64)]) -> Coins {
        pairs.iter().map(|(d, a)| Coin::new(*d, dec(*a))).collect()
    }

    fn funded<H: LockupHooks>(hooks: H, owner: AccountId) -> LockupEngine<InMemoryLedger, H> {
        let mut ledger = InMemoryLedger::new();
        ledger.deposit(owner, "udym", dec(1_000));
        ledger.deposit(owner, "uatom", dec(1_000));
        LockupEngine::with_hooks(LockupConfig::default(), ledger, hooks).unwrap()
    }

    #[test]
    fn create_lock_escrows_and_accumulates() {
        let owner = AccountId::new();
        let mut eng = funded(RecordingHooks::default(), owner);
        let lock = eng
            .create_lock(owner, coins(&[("udym", 100)]), HOUR, t0())
            .unwrap();

        assert_eq!(lock.id, LockId(1));
        assert!(!lock.is_unlocking());
        assert_eq!(lock.updated_at, t0());
        assert_eq!(eng.accumulation().suffix_sum("udym", HOUR), dec(100));
        assert_eq!(eng.ledger().balance(owner, "udym"), dec(900));
        assert_eq!(eng.ledger().pool_balance("udym"), dec(100));
        assert!(eng.ref_index().contains_lock(RefQueue::NotUnlocking, lock.id));
        assert_eq!(eng.hooks().events, vec![HookEvent::TokenLocked(LockId(1))]);
    }

    #[test]
    fn create_lock_without_funds_consumes_nothing() {
        let owner = AccountId::new();
        let mut eng = funded(RecordingHooks::default(), owner);
        let err = eng
            .create_lock(owner, coins(&[("udym", 5_000)]), HOUR, t0())
            .unwrap_err();
        assert!(matches!(err, LockupError::InsufficientBalance { .. }));
        assert_eq!(eng.last_lock_id(), LockId(0));
        assert!(eng.accumulation().is_empty());
        assert!(eng.ref_index().is_empty());
        assert!(eng.hooks().events.is_empty());
    }

    #[test]
    fn create_lock_rejects_bad_input() {
        let owner = AccountId::new();
        let mut eng = funded(RecordingHooks::default(), owner);
        assert!(matches!(
            eng.create_lock(owner, Coins::new(), HOUR, t0()),
            Err(LockupError::InvalidCoins { .. })
        ));
        assert!(matches!(
            eng.create_lock(owner, coins(&[("udym", 1)]), Duration::ZERO, t0()),
            Err(LockupError::InvalidDuration { .. })
        ));
    }

    #[test]
    fn add_tokens_registers_new_denom() {
        let owner = AccountId::new();
        let mut eng = funded(RecordingHooks::default(), owner);
        let id = eng
            .create_lock(owner, coins(&[("udym", 100)]), HOUR, t0())
            .unwrap()
            .id;
        let later = t0() + chrono::Duration::minutes(5);
        let lock = eng
            .add_tokens_to_lock(id, owner, Coin::new("uatom", dec(7)), later)
            .unwrap();

        assert_eq!(lock.coins, coins(&[("udym", 100), ("uatom", 7)]));
        assert_eq!(lock.updated_at, later);
        assert_eq!(eng.accumulation().suffix_sum("uatom", HOUR), dec(7));
        let uatom_locks = eng.locks_longer_than_duration("uatom", HOUR);
        assert_eq!(uatom_locks.len(), 1);
        assert_eq!(
            eng.hooks().events.last(),
            Some(&HookEvent::AddTokens(id, coins(&[("uatom", 7)])))
        );
    }

    #[test]
    fn add_tokens_requires_owner() {
        let owner = AccountId::new();
        let stranger = AccountId::new();
        let mut eng = funded(RecordingHooks::default(), owner);
        let id = eng
            .create_lock(owner, coins(&[("udym", 100)]), HOUR, t0())
            .unwrap()
            .id;
        // Ownership is checked before the amount.
        let err = eng
            .add_tokens_to_lock(id, stranger, Coin::new("udym", dec(0)), t0())
            .unwrap_err();
        assert!(matches!(err, LockupError::NotLockOwner { .. }));
        assert!(matches!(
            eng.add_tokens_to_lock(LockId(9), owner, Coin::new("udym", dec(1)), t0()),
            Err(LockupError::LockNotFound(LockId(9)))
        ));
    }

    #[test]
    fn add_to_existing_lock_matches_exact_duration() {
        let owner = AccountId::new();
        let mut eng = funded(RecordingHooks::default(), owner);
        eng.create_lock(owner, coins(&[("udym", 10)]), HOUR, t0()).unwrap();
        let two_hours = eng
            .create_lock(owner, coins(&[("udym", 10)]), HOUR * 2, t0())
            .unwrap()
            .id;

        let id = eng
            .add_to_existing_lock(owner, Coin::new("udym", dec(5)), HOUR * 2, t0())
            .unwrap();
        assert_eq!(id, two_hours);
        assert_eq!(eng.get_lock(id).unwrap().coins.amount_of("udym"), dec(15));

        let err = eng
            .add_to_existing_lock(owner, Coin::new("udym", dec(5)), HOUR * 3, t0())
            .unwrap_err();
        assert!(matches!(err, LockupError::NoMatchingLock { .. }));
        assert!(eng.has_lock(owner, "udym", HOUR));
        assert!(!eng.has_lock(owner, "udym", HOUR * 3));
    }

    #[test]
    fn full_begin_unlock_keeps_id() {
        let owner = AccountId::new();
        let mut eng = funded(RecordingHooks::default(), owner);
        let id = eng
            .create_lock(owner, coins(&[("udym", 100)]), HOUR, t0())
            .unwrap()
            .id;
        let unlocking = eng.begin_unlock(id, &Coins::new(), t0()).unwrap();
        assert_eq!(unlocking, id);

        let lock = eng.get_lock(id).unwrap();
        assert_eq!(lock.end_time, Some(t0() + chrono::Duration::hours(1)));
        assert!(!eng.ref_index().contains_lock(RefQueue::NotUnlocking, id));
        assert!(eng.ref_index().contains_lock(RefQueue::Unlocking, id));
        assert!(eng.has_unlocking_lock(owner, "udym", HOUR));

        assert!(matches!(
            eng.begin_unlock(id, &Coins::new(), t0()),
            Err(LockupError::AlreadyUnlocking(_))
        ));
    }

    #[test]
    fn begin_unlock_with_exact_balance_is_full_unlock() {
        let owner = AccountId::new();
        let mut eng = funded(RecordingHooks::default(), owner);
        let id = eng
            .create_lock(owner, coins(&[("udym", 100)]), HOUR, t0())
            .unwrap()
            .id;
        assert_eq!(eng.begin_unlock(id, &coins(&[("udym", 100)]), t0()).unwrap(), id);
        assert_eq!(eng.last_lock_id(), id);
    }

    #[test]
    fn partial_begin_unlock_splits() {
        let owner = AccountId::new();
        let mut eng = funded(RecordingHooks::default(), owner);
        let id = eng
            .create_lock(owner, coins(&[("udym", 100)]), HOUR, t0())
            .unwrap()
            .id;
        let split = eng.begin_unlock(id, &coins(&[("udym", 60)]), t0()).unwrap();
        assert_eq!(split, LockId(2));

        let original = eng.get_lock(id).unwrap();
        assert!(!original.is_unlocking());
        assert_eq!(original.coins, coins(&[("udym", 40)]));

        let split_lock = eng.get_lock(split).unwrap();
        assert_eq!(split_lock.owner, owner);
        assert_eq!(split_lock.duration, HOUR);
        assert_eq!(split_lock.coins, coins(&[("udym", 60)]));
        assert!(split_lock.is_unlocking());
        assert_eq!(eng.accumulation().suffix_sum("udym", HOUR), dec(100));
    }

    #[test]
    fn begin_unlock_exceeding_balance_fails() {
        let owner = AccountId::new();
        let mut eng = funded(RecordingHooks::default(), owner);
        let id = eng
            .create_lock(owner, coins(&[("udym", 100)]), HOUR, t0())
            .unwrap()
            .id;
        for bad in [coins(&[("udym", 101)]), coins(&[("uatom", 1)])] {
            assert!(matches!(
                eng.begin_unlock(id, &bad, t0()),
                Err(LockupError::ExceedsLocked(_))
            ));
        }
        assert_eq!(eng.last_lock_id(), id);
    }

    #[test]
    fn split_refuses_unlocking_without_override() {
        let owner = AccountId::new();
        let mut eng = funded(RecordingHooks::default(), owner);
        let id = eng
            .create_lock(owner, coins(&[("udym", 100)]), HOUR, t0())
            .unwrap()
            .id;
        eng.begin_unlock(id, &Coins::new(), t0()).unwrap();
        let lock = eng.get_lock(id).unwrap().clone();

        let err = eng
            .atomic("test_split", |e| e.split_lock(&lock, &coins(&[("udym", 10)]), false, t0()))
            .unwrap_err();
        assert!(matches!(err, LockupError::CannotSplitUnlocking(_)));

        let split = eng
            .atomic("test_split", |e| e.split_lock(&lock, &coins(&[("udym", 10)]), true, t0()))
            .unwrap();
        assert_eq!(split.end_time, lock.end_time);
        assert!(eng.ref_index().contains_lock(RefQueue::Unlocking, split.id));
    }

    #[test]
    fn unlock_matured_lock_gates_on_time() {
        let owner = AccountId::new();
        let mut eng = funded(RecordingHooks::default(), owner);
        let id = eng
            .create_lock(owner, coins(&[("udym", 100)]), HOUR, t0())
            .unwrap()
            .id;
        assert!(matches!(
            eng.unlock_matured_lock(id, t0()),
            Err(LockupError::NotUnlocking(_))
        ));

        eng.begin_unlock(id, &Coins::new(), t0()).unwrap();
        let end = t0() + chrono::Duration::hours(1);
        assert!(matches!(
            eng.unlock_matured_lock(id, end - chrono::Duration::seconds(1)),
            Err(LockupError::NotYetMature { .. })
        ));

        eng.unlock_matured_lock(id, end).unwrap();
        assert!(eng.get_lock(id).is_err());
        assert_eq!(eng.ledger().balance(owner, "udym"), dec(1_000));
        assert!(eng.accumulation().is_empty());
        assert!(eng.ref_index().is_empty());
        assert_eq!(eng.hooks().events.last(), Some(&HookEvent::TokenUnlocked(id)));
    }

    #[test]
    fn force_unlock_skips_maturity() {
        let owner = AccountId::new();
        let mut eng = funded(RecordingHooks::default(), owner);
        let id = eng
            .create_lock(owner, coins(&[("udym", 100)]), HOUR, t0())
            .unwrap()
            .id;
        eng.force_unlock(id, t0()).unwrap();

        assert!(eng.get_lock(id).is_err());
        assert_eq!(eng.ledger().balance(owner, "udym"), dec(1_000));
        let events = &eng.hooks().events;
        assert_eq!(events[1], HookEvent::StartUnlock(id, t0()));
        assert_eq!(events[2], HookEvent::TokenUnlocked(id));
    }

    #[test]
    fn force_unlock_ignores_unrepresentable_maturity() {
        let owner = AccountId::new();
        let mut eng = funded(RecordingHooks::default(), owner);
        let id = eng
            .create_lock(owner, coins(&[("udym", 100)]), HOUR, t0())
            .unwrap()
            .id;
        // A lock loaded from a snapshot may carry any duration.
        let mut lock = eng.get_lock(id).unwrap().clone();
        let huge = Duration::from_secs(u64::MAX / 2);
        eng.deaccumulate_coins(&lock.coins, HOUR).unwrap();
        eng.accumulate_coins(&lock.coins, huge).unwrap();
        eng.remove_refs(RefQueue::NotUnlocking, id);
        lock.duration = huge;
        eng.write_lock(lock.clone());
        eng.add_refs(&lock);
        eng.journal.clear();

        assert!(matches!(
            eng.begin_unlock(id, &Coins::new(), t0()),
            Err(LockupError::TimeOverflow(_))
        ));
        eng.force_unlock(id, t0()).unwrap();

        assert!(eng.get_lock(id).is_err());
        assert_eq!(eng.ledger().balance(owner, "udym"), dec(1_000));
        assert!(eng.accumulation().is_empty());
        assert!(eng.ref_index().is_empty());
        eng.verify_conservation().unwrap();
    }

    #[test]
    fn partial_force_unlock_of_locked_lock_with_huge_duration() {
        let owner = AccountId::new();
        let mut eng = funded(RecordingHooks::default(), owner);
        let huge = Duration::from_secs(u64::MAX / 2);
        eng.ledger_mut().fund_pool("udym", dec(100));
        eng.initialize_all(vec![Lock::dummy(1, owner, "udym", 100, huge)])
            .unwrap();

        eng.partial_force_unlock(LockId(1), &coins(&[("udym", 40)]), t0())
            .unwrap();
        assert_eq!(eng.ledger().balance(owner, "udym"), dec(1_040));
        assert_eq!(eng.get_lock(LockId(1)).unwrap().coins, coins(&[("udym", 60)]));
        assert_eq!(eng.accumulation().suffix_sum("udym", huge), dec(60));
        eng.verify_conservation().unwrap();
        eng.verify_ref_index().unwrap();
    }

    #[test]
    fn unrepresentable_maturity_rejected_up_front() {
        let owner = AccountId::new();
        let mut eng = funded(RecordingHooks::default(), owner);
        let huge = Duration::from_secs(u64::MAX / 2);
        assert!(matches!(
            eng.create_lock(owner, coins(&[("udym", 100)]), huge, t0()),
            Err(LockupError::TimeOverflow(_))
        ));
        assert_eq!(eng.last_lock_id(), LockId(0));
        assert_eq!(eng.ledger().balance(owner, "udym"), dec(1_000));

        let id = eng
            .create_lock(owner, coins(&[("udym", 100)]), HOUR, t0())
            .unwrap()
            .id;
        assert!(matches!(
            eng.extend_lockup(id, owner, huge, t0()),
            Err(LockupError::TimeOverflow(_))
        ));
        assert_eq!(eng.get_lock(id).unwrap().duration, HOUR);
        assert_eq!(eng.accumulation().suffix_sum("udym", HOUR), dec(100));
    }

    #[test]
    fn partial_force_unlock_on_unlocking_lock() {
        let owner = AccountId::new();
        let mut eng = funded(RecordingHooks::default(), owner);
        let id = eng
            .create_lock(owner, coins(&[("udym", 100)]), HOUR, t0())
            .unwrap()
            .id;
        eng.begin_unlock(id, &Coins::new(), t0()).unwrap();
        eng.partial_force_unlock(id, &coins(&[("udym", 30)]), t0())
            .unwrap();

        let rest = eng.get_lock(id).unwrap();
        assert!(rest.is_unlocking());
        assert_eq!(rest.coins, coins(&[("udym", 70)]));
        assert_eq!(eng.ledger().balance(owner, "udym"), dec(930));
        assert_eq!(eng.accumulation().suffix_sum("udym", HOUR), dec(70));
        assert!(eng.get_lock(LockId(2)).is_err());
    }

    #[test]
    fn begin_force_unlock_with_end_time_requeues() {
        let owner = AccountId::new();
        let mut eng = funded(RecordingHooks::default(), owner);
        let id = eng
            .create_lock(owner, coins(&[("udym", 100)]), HOUR, t0())
            .unwrap()
            .id;
        let end = t0() + chrono::Duration::minutes(1);
        eng.begin_force_unlock_with_end_time(id, end).unwrap();
        assert_eq!(eng.get_lock(id).unwrap().end_time, Some(end));

        // Re-issuing moves the unlocking ref rather than duplicating it.
        let later = end + chrono::Duration::minutes(1);
        eng.begin_force_unlock_with_end_time(id, later).unwrap();
        assert_eq!(eng.locks_unlocking_before(later).len(), 1);
        assert!(eng.locks_unlocking_before(end).is_empty());
    }

    #[test]
    fn begin_unlock_all_not_unlockings() {
        let owner = AccountId::new();
        let mut eng = funded(RecordingHooks::default(), owner);
        eng.create_lock(owner, coins(&[("udym", 10)]), HOUR * 2, t0()).unwrap();
        eng.create_lock(owner, coins(&[("udym", 10)]), HOUR, t0()).unwrap();
        let started = eng.begin_unlock_all_not_unlockings(owner, t0()).unwrap();

        let ids: Vec<_> = started.iter().map(|l| l.id.0).collect();
        assert_eq!(ids, vec![2, 1]);
        assert!(started.iter().all(Lock::is_unlocking));
        assert!(eng.begin_unlock_all_not_unlockings(owner, t0()).unwrap().is_empty());
    }

    #[test]
    fn extend_moves_accumulation() {
        let owner = AccountId::new();
        let mut eng = funded(RecordingHooks::default(), owner);
        let id = eng
            .create_lock(owner, coins(&[("udym", 100)]), HOUR, t0())
            .unwrap()
            .id;
        eng.extend_lockup(id, owner, HOUR * 3, t0()).unwrap();

        assert_eq!(eng.get_lock(id).unwrap().duration, HOUR * 3);
        let tree = eng.accumulation().tree("udym").unwrap();
        assert_eq!(tree.get(HOUR), Decimal::ZERO);
        assert_eq!(tree.get(HOUR * 3), dec(100));
        assert_eq!(
            eng.hooks().events.last(),
            Some(&HookEvent::LockupExtend { id, from: HOUR, to: HOUR * 3 })
        );
        assert_eq!(eng.locks_longer_than_duration("udym", HOUR * 2).len(), 1);
    }

    #[test]
    fn extend_rejections() {
        let owner = AccountId::new();
        let stranger = AccountId::new();
        let mut eng = funded(RecordingHooks::default(), owner);
        let id = eng
            .create_lock(owner, coins(&[("udym", 100)]), HOUR, t0())
            .unwrap()
            .id;
        assert!(matches!(
            eng.extend_lockup(id, stranger, HOUR * 2, t0()),
            Err(LockupError::NotLockOwner { .. })
        ));
        assert!(matches!(
            eng.extend_lockup(id, owner, HOUR, t0()),
            Err(LockupError::DurationNotIncreasing { .. })
        ));
        eng.begin_unlock(id, &Coins::new(), t0()).unwrap();
        assert!(matches!(
            eng.extend_lockup(id, owner, HOUR * 2, t0()),
            Err(LockupError::AlreadyUnlocking(_))
        ));
    }

    #[test]
    fn failing_hook_rolls_back_split_unlock() {
        let owner = AccountId::new();
        let mut eng = funded(FailingHooks::on("on_start_unlock"), owner);
        let id = eng
            .create_lock(owner, coins(&[("udym", 100)]), HOUR, t0())
            .unwrap()
            .id;
        let root = eng.accumulation_root();

        let err = eng
            .begin_unlock(id, &coins(&[("udym", 60)]), t0())
            .unwrap_err();
        assert!(matches!(err, LockupError::HookFailed { hook: "on_start_unlock", .. }));

        assert_eq!(eng.last_lock_id(), id);
        let lock = eng.get_lock(id).unwrap();
        assert_eq!(lock.coins, coins(&[("udym", 100)]));
        assert!(!lock.is_unlocking());
        assert!(eng.ref_index().contains_lock(RefQueue::NotUnlocking, id));
        assert!(!eng.ref_index().contains_lock(RefQueue::Unlocking, LockId(2)));
        assert_eq!(eng.accumulation_root(), root);
    }

    #[test]
    fn failing_unlock_hook_keeps_coins_escrowed() {
        let owner = AccountId::new();
        let mut eng = funded(FailingHooks::on("on_token_unlocked"), owner);
        let id = eng
            .create_lock(owner, coins(&[("udym", 100)]), HOUR, t0())
            .unwrap()
            .id;
        eng.begin_unlock(id, &Coins::new(), t0()).unwrap();

        let end = t0() + chrono::Duration::hours(1);
        assert!(eng.unlock_matured_lock(id, end).is_err());
        assert!(eng.get_lock(id).is_ok());
        assert_eq!(eng.ledger().pool_balance("udym"), dec(100));
        assert_eq!(eng.accumulation().total("udym"), dec(100));

        eng.hooks_mut().armed = false;
        eng.unlock_matured_lock(id, end).unwrap();
        assert_eq!(eng.ledger().pool_balance("udym"), Decimal::ZERO);
    }
}
