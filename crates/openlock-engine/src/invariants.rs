//! Invariant checkers.
//!
//! Conservation, enforced per denomination:
//! ```text
//! Σ lock.coins[denom] == accumulation total(denom) == escrow pool(denom)
//! ```
//!
//! Queue membership: every stored lock has references in exactly the queue
//! its state dictates, and no reference points at a missing lock.
//!
//! A violation means the engine itself is broken. Both checks log at
//! `error` and return a fatal [`LockupError::ConservationViolation`].

use std::collections::BTreeMap;

use openlock_store::RefScope;
use openlock_types::{Denom, LockupError, RefQueue, Result};
use rust_decimal::Decimal;
use tracing::error;

use crate::engine::LockupEngine;
use crate::hooks::LockupHooks;
use crate::ledger::Ledger;

/// The three views of one denomination's escrowed total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DenomTotals {
    /// Sum over stored lock records.
    pub records: Decimal,
    /// Accumulation tree total.
    pub accumulated: Decimal,
    /// Ledger escrow pool balance.
    pub pool: Decimal,
}

impl DenomTotals {
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.records == self.accumulated && self.accumulated == self.pool
    }
}

impl<L: Ledger, H: LockupHooks> LockupEngine<L, H> {
    /// Per-denomination totals across records, accumulation and pool.
    #[must_use]
    pub fn conservation_report(&self) -> BTreeMap<Denom, DenomTotals> {
        let mut report: BTreeMap<Denom, DenomTotals> = BTreeMap::new();
        for lock in self.locks.iter() {
            for (denom, amount) in &lock.coins {
                report.entry(denom.clone()).or_default().records += *amount;
            }
        }
        for tree in self.accumulation.trees() {
            report.entry(tree.denom().to_owned()).or_default().accumulated = tree.total();
        }
        for (denom, amount) in &self.ledger.pool_balances() {
            report.entry(denom.clone()).or_default().pool = *amount;
        }
        report
    }

    /// # Errors
    /// `ConservationViolation` naming the first unbalanced denomination.
    pub fn verify_conservation(&self) -> Result<()> {
        for (denom, totals) in self.conservation_report() {
            if !totals.is_balanced() {
                let reason = format!(
                    "{denom}: records {} != accumulated {} != pool {}",
                    totals.records, totals.accumulated, totals.pool
                );
                error!(%denom, %reason, "conservation violated");
                return Err(LockupError::ConservationViolation { reason });
            }
        }
        Ok(())
    }

    /// # Errors
    /// `ConservationViolation` if a lock is in the wrong queue, in both, in
    /// neither, or a reference dangles.
    pub fn verify_ref_index(&self) -> Result<()> {
        let violation = |reason: String| -> Result<()> {
            error!(%reason, "reference index violated");
            Err(LockupError::ConservationViolation { reason })
        };

        for lock in self.locks.iter() {
            let expected = lock.ref_queue();
            let other = match expected {
                RefQueue::NotUnlocking => RefQueue::Unlocking,
                RefQueue::Unlocking => RefQueue::NotUnlocking,
            };
            if !self.refs.contains_lock(expected, lock.id) {
                return violation(format!("{} missing from {expected}", lock.id));
            }
            if self.refs.contains_lock(other, lock.id) {
                return violation(format!("{} also present in {other}", lock.id));
            }
        }

        for queue in [RefQueue::NotUnlocking, RefQueue::Unlocking] {
            if let Some(id) = self
                .refs
                .iter(queue, RefScope::All, ..)
                .find(|id| !self.locks.contains(*id))
            {
                return violation(format!("{queue} references deleted {id}"));
            }
        }
        Ok(())
    }
}
