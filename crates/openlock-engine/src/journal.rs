//! Undo journal.
//!
//! Every primitive mutation the engine performs pushes its inverse here.
//! When an operation fails part way, the entries recorded since the
//! operation began are replayed newest-first, restoring the record store,
//! reference index, accumulation trees, ID counter and ledger exactly.

use std::time::Duration;

use openlock_store::RefKey;
use openlock_types::{AccountId, Coins, Denom, Lock, LockId, Result};
use rust_decimal::Decimal;
use tracing::error;

use crate::engine::LockupEngine;
use crate::hooks::LockupHooks;
use crate::ledger::Ledger;

/// Inverse of one primitive mutation.
#[derive(Debug, Clone)]
pub(crate) enum Undo {
    /// A record was written; restore `previous` (or delete if there was none).
    LockWritten { id: LockId, previous: Option<Lock> },
    /// A record was deleted; write it back.
    LockDeleted(Lock),
    /// The ID counter moved; this is the old value.
    LastIdAdvanced(LockId),
    RefsAdded(Vec<RefKey>),
    RefsRemoved(Vec<RefKey>),
    AccIncreased {
        denom: Denom,
        duration: Duration,
        amount: Decimal,
    },
    AccDecreased {
        denom: Denom,
        duration: Duration,
        amount: Decimal,
    },
    Escrowed { owner: AccountId, coins: Coins },
    Released { owner: AccountId, coins: Coins },
}

#[derive(Debug, Default)]
pub(crate) struct Journal {
    entries: Vec<Undo>,
}

impl Journal {
    pub(crate) fn push(&mut self, undo: Undo) {
        self.entries.push(undo);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    /// Detach every entry recorded after `mark`, newest first.
    pub(crate) fn split_off_reversed(&mut self, mark: usize) -> Vec<Undo> {
        let mut tail = self.entries.split_off(mark);
        tail.reverse();
        tail
    }
}

impl<L: Ledger, H: LockupHooks> LockupEngine<L, H> {
    /// Undo everything recorded after `mark`. Returns how many inverse
    /// operations failed.
    ///
    /// A failed inverse is logged and skipped; the remaining entries are
    /// still applied. Any failure leaves state only partly restored.
    pub(crate) fn rollback_to(&mut self, mark: usize) -> usize {
        let mut failed = 0;
        for undo in self.journal.split_off_reversed(mark) {
            if let Err(e) = self.apply_undo(undo) {
                error!(error = %e, "rollback step failed");
                failed += 1;
            }
        }
        failed
    }

    fn apply_undo(&mut self, undo: Undo) -> Result<()> {
        match undo {
            Undo::LockWritten { id, previous } => match previous {
                Some(lock) => {
                    self.locks.set(lock);
                }
                None => {
                    self.locks.delete(id);
                }
            },
            Undo::LockDeleted(lock) => {
                self.locks.set(lock);
            }
            Undo::LastIdAdvanced(previous) => self.locks.set_last_lock_id(previous),
            Undo::RefsAdded(keys) => {
                for key in &keys {
                    self.refs.remove_ref(key);
                }
            }
            Undo::RefsRemoved(keys) => {
                for key in keys {
                    self.refs.add_ref(key);
                }
            }
            Undo::AccIncreased {
                denom,
                duration,
                amount,
            } => self.accumulation.decrease(&denom, duration, amount)?,
            Undo::AccDecreased {
                denom,
                duration,
                amount,
            } => self.accumulation.increase(&denom, duration, amount)?,
            Undo::Escrowed { owner, coins } => self.ledger.release(owner, &coins)?,
            Undo::Released { owner, coins } => self.ledger.escrow(owner, &coins)?,
        }
        Ok(())
    }
}
