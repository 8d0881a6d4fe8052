//! Maturity sweep.
//!
//! Walks the unlocking queue in ascending end-time order and finalizes
//! matured locks. Each lock is its own atomic unit, so an error stops the
//! sweep but keeps everything finalized before it. Finalized locks leave
//! the queue, which makes a later sweep resume where this one stopped.

use chrono::{DateTime, Utc};
use openlock_store::RefScope;
use openlock_types::{LockId, OrderKey, RefQueue, Result};
use tracing::{debug, info};

use crate::engine::LockupEngine;
use crate::hooks::LockupHooks;
use crate::ledger::Ledger;

impl<L: Ledger, H: LockupHooks> LockupEngine<L, H> {
    /// Finalize up to `batch_limit` locks with `end_time <= now`. Returns
    /// how many were finalized.
    ///
    /// # Errors
    /// The first finalization error. Locks finalized earlier in the call
    /// stay finalized.
    pub fn sweep(&mut self, now: DateTime<Utc>, batch_limit: usize) -> Result<usize> {
        let due: Vec<LockId> = self
            .refs
            .iter(RefQueue::Unlocking, RefScope::All, ..=OrderKey::EndTime(now))
            .take(batch_limit)
            .collect();

        let mut finalized = 0;
        for id in due {
            self.unlock_matured_lock(id, now)?;
            finalized += 1;
        }

        if finalized > 0 {
            info!(finalized, batch_limit, %now, "maturity sweep complete");
        } else {
            debug!(%now, "maturity sweep found nothing due");
        }
        Ok(finalized)
    }

    /// Sweep in batches of `sweep_batch_limit` until no matured lock is
    /// left. Returns the total finalized.
    ///
    /// # Errors
    /// As [`Self::sweep`].
    pub fn withdraw_all_matured(&mut self, now: DateTime<Utc>) -> Result<usize> {
        let limit = self.config.sweep_batch_limit;
        let mut total = 0;
        loop {
            let finalized = self.sweep(now, limit)?;
            total += finalized;
            if finalized < limit {
                return Ok(total);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use openlock_types::{AccountId, Coin, Coins, LockupConfig};
    use rust_decimal::Decimal;

    use super::*;
    use crate::hooks::FailingHooks;
    use crate::ledger::InMemoryLedger;

    const MINUTE: Duration = Duration::from_secs(60);

    fn t0() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + chrono::Duration::days(365)
    }

    fn udym(n: i64) -> Coins {
        Coin::new("udym", Decimal::new(n, 0)).into()
    }

    /// Five unlocking locks maturing at t0+1m .. t0+5m.
    fn staggered<H: LockupHooks>(hooks: H, config: LockupConfig) -> (LockupEngine<InMemoryLedger, H>, AccountId) {
        let owner = AccountId::new();
        let mut ledger = InMemoryLedger::new();
        ledger.deposit(owner, "udym", Decimal::new(1_000, 0));
        let mut eng = LockupEngine::with_hooks(config, ledger, hooks).unwrap();
        for minutes in (1..=5u32).rev() {
            let lock = eng.create_lock(owner, udym(10), MINUTE * minutes, t0()).unwrap();
            eng.begin_unlock(lock.id, &Coins::new(), t0()).unwrap();
        }
        (eng, owner)
    }

    #[test]
    fn sweep_finalizes_only_matured() {
        let (mut eng, owner) = staggered(crate::hooks::NoopHooks, LockupConfig::default());
        let n = eng.sweep(t0() + chrono::Duration::minutes(3), 100).unwrap();
        assert_eq!(n, 3);
        assert_eq!(eng.locks().count(), 2);
        assert_eq!(eng.ledger().balance(owner, "udym"), Decimal::new(980, 0));
        assert_eq!(eng.accumulation().total("udym"), Decimal::new(20, 0));
    }

    #[test]
    fn sweep_respects_batch_limit_and_resumes() {
        let (mut eng, _) = staggered(crate::hooks::NoopHooks, LockupConfig::default());
        let later = t0() + chrono::Duration::hours(1);
        assert_eq!(eng.sweep(later, 2).unwrap(), 2);
        // Earliest end times went first.
        let remaining: Vec<_> = eng.locks().map(|l| l.duration).collect();
        assert!(remaining.iter().all(|d| *d >= MINUTE * 3));
        assert_eq!(eng.sweep(later, 2).unwrap(), 2);
        assert_eq!(eng.sweep(later, 2).unwrap(), 1);
        assert_eq!(eng.sweep(later, 2).unwrap(), 0);
    }

    #[test]
    fn withdraw_all_matured_loops_batches() {
        let config = LockupConfig {
            sweep_batch_limit: 2,
            ..LockupConfig::default()
        };
        let (mut eng, owner) = staggered(crate::hooks::NoopHooks, config);
        let n = eng
            .withdraw_all_matured(t0() + chrono::Duration::hours(1))
            .unwrap();
        assert_eq!(n, 5);
        assert_eq!(eng.locks().count(), 0);
        assert_eq!(eng.ledger().balance(owner, "udym"), Decimal::new(1_000, 0));
    }

    #[test]
    fn sweep_error_keeps_earlier_finalizations() {
        let (mut eng, _) = staggered(FailingHooks::on("on_token_unlocked"), LockupConfig::default());
        eng.hooks_mut().armed = false;
        assert_eq!(eng.sweep(t0() + chrono::Duration::minutes(1), 10).unwrap(), 1);

        eng.hooks_mut().armed = true;
        assert!(eng.sweep(t0() + chrono::Duration::hours(1), 10).is_err());
        assert_eq!(eng.locks().count(), 4);
        eng.verify_conservation().unwrap();
    }
}
