//! The lockup engine and its journaled primitives.
//!
//! [`LockupEngine`] exclusively owns the record store, the reference index
//! and the accumulation trees. Public operations (see `lifecycle`, `sweep`
//! and `genesis`) are composed from the `pub(crate)` primitives below, each
//! of which records its inverse in the undo journal.

use std::time::Duration;

use chrono::{DateTime, Utc};
use openlock_accumulation::AccumulationIndex;
use openlock_store::{LockStore, RefIndex};
use openlock_types::{
    AccountId, Coins, Lock, LockId, LockupConfig, LockupError, RefQueue, Result,
};
use rust_decimal::Decimal;
use tracing::{error, warn};

use crate::hooks::{LockupHooks, NoopHooks};
use crate::journal::{Journal, Undo};
use crate::ledger::Ledger;

/// Single-writer lock lifecycle state machine.
///
/// Every mutation takes `&mut self`; the host serializes calls.
pub struct LockupEngine<L: Ledger, H: LockupHooks = NoopHooks> {
    pub(crate) config: LockupConfig,
    pub(crate) locks: LockStore,
    pub(crate) refs: RefIndex,
    pub(crate) accumulation: AccumulationIndex,
    pub(crate) ledger: L,
    pub(crate) hooks: H,
    pub(crate) journal: Journal,
}

impl<L: Ledger> LockupEngine<L, NoopHooks> {
    /// Engine without notification consumers.
    ///
    /// # Errors
    /// `Configuration` if `config` fails validation.
    pub fn new(config: LockupConfig, ledger: L) -> Result<Self> {
        Self::with_hooks(config, ledger, NoopHooks)
    }
}

impl<L: Ledger, H: LockupHooks> LockupEngine<L, H> {
    /// Engine that notifies `hooks` after every transition.
    ///
    /// # Errors
    /// `Configuration` if `config` fails validation.
    pub fn with_hooks(config: LockupConfig, ledger: L, hooks: H) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            locks: LockStore::new(),
            refs: RefIndex::new(),
            accumulation: AccumulationIndex::new(),
            ledger,
            hooks,
            journal: Journal::default(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &LockupConfig {
        &self.config
    }

    #[must_use]
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Mutable ledger access for funding accounts. Moving pool funds
    /// behind the engine's back breaks conservation.
    pub fn ledger_mut(&mut self) -> &mut L {
        &mut self.ledger
    }

    #[must_use]
    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }

    #[must_use]
    pub fn accumulation(&self) -> &AccumulationIndex {
        &self.accumulation
    }

    #[must_use]
    pub fn ref_index(&self) -> &RefIndex {
        &self.refs
    }

    /// Highest lock ID ever allocated.
    #[must_use]
    pub fn last_lock_id(&self) -> LockId {
        self.locks.last_lock_id()
    }

    /// Run `f` as one atomic unit.
    ///
    /// On `Err`, every mutation `f` journaled is undone before the error is
    /// returned. If any undo step itself fails, the fatal `Internal` error
    /// is returned instead of `f`'s error. Units nest: an inner failure unwinds only the inner unit,
    /// and the journal is discarded once the outermost unit succeeds.
    pub(crate) fn atomic<T>(
        &mut self,
        op: &'static str,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let mark = self.journal.len();
        match f(self) {
            Ok(value) => {
                if mark == 0 {
                    self.journal.clear();
                }
                Ok(value)
            }
            Err(e) => {
                let undone = self.journal.len() - mark;
                let failed = self.rollback_to(mark);
                if failed > 0 {
                    error!(op, undone, failed, error = %e, "rollback incomplete, state corrupted");
                    return Err(LockupError::Internal(format!(
                        "{op}: {failed} of {undone} rollback steps failed after: {e}"
                    )));
                }
                if e.is_fatal() {
                    error!(op, undone, error = %e, "fatal error, operation rolled back");
                } else {
                    warn!(op, undone, error = %e, "operation rolled back");
                }
                Err(e)
            }
        }
    }

    // -----------------------------------------------------------------
    // Journaled primitives
    // -----------------------------------------------------------------

    pub(crate) fn load_lock(&self, id: LockId) -> Result<Lock> {
        self.locks.get(id).cloned()
    }

    pub(crate) fn write_lock(&mut self, lock: Lock) {
        let id = lock.id;
        let previous = self.locks.set(lock);
        self.journal.push(Undo::LockWritten { id, previous });
    }

    pub(crate) fn delete_lock(&mut self, id: LockId) -> Result<Lock> {
        let lock = self.locks.delete(id).ok_or(LockupError::LockNotFound(id))?;
        self.journal.push(Undo::LockDeleted(lock.clone()));
        Ok(lock)
    }

    pub(crate) fn allocate_id(&mut self) -> Result<LockId> {
        let previous = self.locks.last_lock_id();
        let id = self.locks.next_id()?;
        self.journal.push(Undo::LastIdAdvanced(previous));
        Ok(id)
    }

    /// Raise the ID counter to at least `id`.
    pub(crate) fn bump_last_id(&mut self, id: LockId) {
        let previous = self.locks.last_lock_id();
        if id > previous {
            self.locks.set_last_lock_id(id);
            self.journal.push(Undo::LastIdAdvanced(previous));
        }
    }

    pub(crate) fn add_refs(&mut self, lock: &Lock) {
        let added = self.refs.add_lock_refs(lock);
        if !added.is_empty() {
            self.journal.push(Undo::RefsAdded(added));
        }
    }

    pub(crate) fn add_denom_refs(&mut self, lock: &Lock, denom: &str) {
        let added = self.refs.add_denom_refs(lock, denom);
        if !added.is_empty() {
            self.journal.push(Undo::RefsAdded(added));
        }
    }

    pub(crate) fn remove_refs(&mut self, queue: RefQueue, id: LockId) {
        let removed = self.refs.remove_lock_refs(queue, id);
        if !removed.is_empty() {
            self.journal.push(Undo::RefsRemoved(removed));
        }
    }

    pub(crate) fn accumulate(&mut self, denom: &str, duration: Duration, amount: Decimal) -> Result<()> {
        self.accumulation.increase(denom, duration, amount)?;
        self.journal.push(Undo::AccIncreased {
            denom: denom.to_string(),
            duration,
            amount,
        });
        Ok(())
    }

    pub(crate) fn deaccumulate(&mut self, denom: &str, duration: Duration, amount: Decimal) -> Result<()> {
        self.accumulation.decrease(denom, duration, amount)?;
        self.journal.push(Undo::AccDecreased {
            denom: denom.to_string(),
            duration,
            amount,
        });
        Ok(())
    }

    /// Add every coin of `coins` at `duration`.
    pub(crate) fn accumulate_coins(&mut self, coins: &Coins, duration: Duration) -> Result<()> {
        for (denom, amount) in coins {
            self.accumulate(denom, duration, *amount)?;
        }
        Ok(())
    }

    /// Remove every coin of `coins` at `duration`.
    pub(crate) fn deaccumulate_coins(&mut self, coins: &Coins, duration: Duration) -> Result<()> {
        for (denom, amount) in coins {
            self.deaccumulate(denom, duration, *amount)?;
        }
        Ok(())
    }

    pub(crate) fn escrow(&mut self, owner: AccountId, coins: &Coins) -> Result<()> {
        self.ledger.escrow(owner, coins)?;
        self.journal.push(Undo::Escrowed {
            owner,
            coins: coins.clone(),
        });
        Ok(())
    }

    pub(crate) fn release(&mut self, owner: AccountId, coins: &Coins) -> Result<()> {
        self.ledger.release(owner, coins)?;
        self.journal.push(Undo::Released {
            owner,
            coins: coins.clone(),
        });
        Ok(())
    }
}

/// `now + duration`, or `TimeOverflow` if it does not fit.
pub(crate) fn maturity(now: DateTime<Utc>, duration: Duration) -> Result<DateTime<Utc>> {
    chrono::Duration::from_std(duration)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .ok_or(LockupError::TimeOverflow(duration))
}

#[cfg(test)]
mod tests {
    use openlock_types::Coin;

    use super::*;
    use crate::ledger::InMemoryLedger;

    const HOUR: Duration = Duration::from_secs(3600);

    fn engine() -> LockupEngine<InMemoryLedger> {
        LockupEngine::new(LockupConfig::default(), InMemoryLedger::new()).unwrap()
    }

    #[test]
    fn rejects_invalid_config() {
        let config = LockupConfig {
            sweep_batch_limit: 0,
            ..LockupConfig::default()
        };
        assert!(matches!(
            LockupEngine::new(config, InMemoryLedger::new()),
            Err(LockupError::Configuration(_))
        ));
    }

    #[test]
    fn failed_unit_restores_every_primitive() {
        let mut eng = engine();
        let owner = AccountId::new();
        eng.ledger_mut().deposit(owner, "udym", Decimal::new(100, 0));
        let coins: Coins = Coin::new("udym", 100).into();

        let result: Result<()> = eng.atomic("test", |e| {
            e.escrow(owner, &coins)?;
            let id = e.allocate_id()?;
            let lock = Lock::new(id, owner, HOUR, None, coins.clone(), DateTime::<Utc>::UNIX_EPOCH);
            e.write_lock(lock.clone());
            e.add_refs(&lock);
            e.accumulate_coins(&coins, HOUR)?;
            Err(LockupError::Internal("boom".into()))
        });

        assert!(result.is_err());
        assert_eq!(eng.last_lock_id(), LockId(0));
        assert!(eng.locks.is_empty());
        assert!(eng.refs.is_empty());
        assert!(eng.accumulation.is_empty());
        assert_eq!(eng.ledger().balance(owner, "udym"), Decimal::new(100, 0));
        assert_eq!(eng.ledger().pool_balance("udym"), Decimal::ZERO);
        assert_eq!(eng.journal.len(), 0);
    }

    #[test]
    fn nested_failure_unwinds_inner_only() {
        let mut eng = engine();
        let outer: Result<()> = eng.atomic("outer", |e| {
            e.allocate_id()?;
            let inner: Result<()> = e.atomic("inner", |e| {
                e.allocate_id()?;
                Err(LockupError::Internal("inner".into()))
            });
            assert!(inner.is_err());
            Ok(())
        });
        assert!(outer.is_ok());
        assert_eq!(eng.last_lock_id(), LockId(1));
        assert_eq!(eng.journal.len(), 0);
    }

    #[test]
    fn failed_undo_step_is_fatal() {
        let mut eng = engine();
        let owner = AccountId::new();
        eng.ledger_mut().deposit(owner, "udym", Decimal::new(100, 0));
        let coins: Coins = Coin::new("udym", 100).into();

        let result: Result<()> = eng.atomic("test", |e| {
            e.escrow(owner, &coins)?;
            // Drain the pool outside the journal so undoing the escrow fails.
            e.ledger.release(owner, &coins)?;
            Err(LockupError::HookFailed {
                hook: "on_token_locked",
                reason: "rejected".into(),
            })
        });

        let err = result.unwrap_err();
        assert!(matches!(err, LockupError::Internal(_)));
        assert!(err.is_fatal());
        assert_eq!(eng.journal.len(), 0);
    }

    #[test]
    fn maturity_adds_duration() {
        let now = DateTime::<Utc>::UNIX_EPOCH;
        assert_eq!(
            maturity(now, HOUR).unwrap(),
            now + chrono::Duration::hours(1)
        );
        assert!(matches!(
            maturity(DateTime::<Utc>::MAX_UTC, HOUR),
            Err(LockupError::TimeOverflow(_))
        ));
    }
}
