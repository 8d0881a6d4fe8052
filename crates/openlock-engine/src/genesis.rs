//! Genesis import/export and accumulation rebuild.
//!
//! Bulk loads write records and references lock by lock, but collect the
//! accumulation contributions first and apply them in sorted
//! `(denomination, duration)` order. Two loads of the same snapshot
//! therefore build identical trees, which the accumulation root proves.
//!
//! The ledger is not touched: a snapshot's escrow is assumed to be in the
//! pool already.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use openlock_accumulation::{AccumulationIndex, compute_accumulation_root};
use openlock_types::{Denom, GenesisState, Lock, LockupError, Result};
use rust_decimal::Decimal;
use tracing::info;

use crate::engine::LockupEngine;
use crate::hooks::LockupHooks;
use crate::ledger::Ledger;

type DurationTotals = BTreeMap<Denom, BTreeMap<Duration, Decimal>>;

impl<L: Ledger, H: LockupHooks> LockupEngine<L, H> {
    /// Load `locks` into the record store, reference index and accumulation
    /// trees. The ID counter becomes `max(current, highest loaded ID)`.
    ///
    /// # Errors
    /// `DuplicateLock` if an ID repeats or is already stored,
    /// `InvalidCoins` / `InvalidDuration` for malformed locks,
    /// `AmountOverflow` if a bucket total overflows. Nothing is loaded on
    /// error.
    pub fn initialize_all(&mut self, locks: Vec<Lock>) -> Result<()> {
        self.atomic("initialize_all", |e| {
            let interval = e.config.genesis_progress_interval;
            let total = locks.len();
            let mut seen = BTreeSet::new();
            let mut totals = DurationTotals::new();

            for (i, lock) in locks.into_iter().enumerate() {
                if i % interval == 0 {
                    info!(loaded = i, total, cur_lock_id = %lock.id, "loading genesis locks");
                }
                if !seen.insert(lock.id) || e.locks.contains(lock.id) {
                    return Err(LockupError::DuplicateLock(lock.id));
                }
                lock.coins.validate()?;
                if lock.duration.is_zero() {
                    return Err(LockupError::InvalidDuration {
                        reason: format!("{} has a zero duration", lock.id),
                    });
                }

                add_totals(&mut totals, &lock)?;
                e.bump_last_id(lock.id);
                e.add_refs(&lock);
                e.write_lock(lock);
            }

            for (denom, durations) in &totals {
                info!(%denom, distinct_durations = durations.len(), "setting accumulation entries");
                for (duration, amount) in durations {
                    e.accumulate(denom, *duration, *amount)?;
                }
            }

            info!(total, last_lock_id = %e.locks.last_lock_id(), "genesis locks loaded");
            Ok(())
        })
    }

    /// Snapshot every lock plus the ID counter.
    #[must_use]
    pub fn export_genesis(&self) -> GenesisState {
        GenesisState {
            last_lock_id: self.locks.last_lock_id(),
            locks: self.locks.iter().cloned().collect(),
        }
    }

    /// Load a snapshot produced by [`Self::export_genesis`].
    ///
    /// # Errors
    /// As [`Self::initialize_all`].
    pub fn import_genesis(&mut self, genesis: GenesisState) -> Result<()> {
        self.atomic("import_genesis", |e| {
            e.bump_last_id(genesis.last_lock_id);
            e.initialize_all(genesis.locks)
        })
    }

    /// Throw the accumulation trees away and rebuild them from the record
    /// store, in sorted order.
    ///
    /// # Errors
    /// `AmountOverflow` if a bucket total overflows; the old trees are kept.
    pub fn rebuild_accumulation(&mut self) -> Result<()> {
        let mut totals = DurationTotals::new();
        for lock in self.locks.iter() {
            add_totals(&mut totals, lock)?;
        }

        let mut rebuilt = AccumulationIndex::new();
        for (denom, durations) in &totals {
            for (duration, amount) in durations {
                rebuilt.increase(denom, *duration, *amount)?;
            }
        }
        self.accumulation = rebuilt;
        info!(denoms = totals.len(), "accumulation rebuilt from records");
        Ok(())
    }

    /// SHA-256 over every accumulation entry.
    #[must_use]
    pub fn accumulation_root(&self) -> [u8; 32] {
        compute_accumulation_root(&self.accumulation)
    }

    /// [`Self::accumulation_root`] as lowercase hex.
    #[must_use]
    pub fn accumulation_root_hex(&self) -> String {
        hex::encode(self.accumulation_root())
    }
}

fn add_totals(totals: &mut DurationTotals, lock: &Lock) -> Result<()> {
    for (denom, amount) in &lock.coins {
        let slot = totals
            .entry(denom.clone())
            .or_default()
            .entry(lock.duration)
            .or_insert(Decimal::ZERO);
        *slot = slot
            .checked_add(*amount)
            .ok_or_else(|| LockupError::AmountOverflow {
                denom: denom.clone(),
            })?;
    }
    Ok(())
}
