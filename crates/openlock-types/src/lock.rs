//! # Lock: the escrow record
//!
//! A `Lock` commits a set of coins for a minimum duration. It is created
//! `Locked`, starts unlocking on request (which fixes its `end_time`), and
//! is finalized (deleted, coins returned) once `end_time` has passed.
//!
//! ## State Machine
//!
//! ```text
//!   ┌────────┐ begin unlock ┌───────────┐ now >= end_time ┌───────────┐
//!   │ LOCKED ├─────────────▶│ UNLOCKING ├────────────────▶│ FINALIZED │
//!   └────────┘              └───────────┘                 └───────────┘
//! ```
//!
//! `end_time` is `None` exactly when the lock is `Locked`. Force unlock
//! walks the same two edges in one step.

use std::{fmt, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, Coins, Denom, LockId};

/// The lifecycle state of a lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LockState {
    /// Coins escrowed, duration counting has not started.
    Locked,
    /// Unlock requested; matures at `end_time`.
    Unlocking,
    /// Coins returned and record deleted. Terminal.
    Finalized,
}

impl LockState {
    /// Can a lock in this state move to `target`?
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Locked, Self::Unlocking) | (Self::Unlocking, Self::Finalized)
        )
    }
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Locked => write!(f, "LOCKED"),
            Self::Unlocking => write!(f, "UNLOCKING"),
            Self::Finalized => write!(f, "FINALIZED"),
        }
    }
}

/// Which reference queue a lock currently sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum RefQueue {
    /// Locked locks, ordered by duration.
    NotUnlocking,
    /// Unlocking locks, ordered by end time.
    Unlocking,
}

impl RefQueue {
    /// The smallest order key that can appear in this queue.
    #[must_use]
    pub fn min_order_key(self) -> OrderKey {
        match self {
            Self::NotUnlocking => OrderKey::Duration(Duration::ZERO),
            Self::Unlocking => OrderKey::EndTime(DateTime::<Utc>::MIN_UTC),
        }
    }
}

impl fmt::Display for RefQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotUnlocking => write!(f, "NOT_UNLOCKING"),
            Self::Unlocking => write!(f, "UNLOCKING"),
        }
    }
}

/// Ordering key inside a reference queue: duration for `NotUnlocking`,
/// end time for `Unlocking`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum OrderKey {
    Duration(Duration),
    EndTime(DateTime<Utc>),
}

/// A single lock record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lock {
    /// Allocated at creation, never reused.
    pub id: LockId,
    /// Only the owner may add tokens or extend.
    pub owner: AccountId,
    /// Time needed to mature once unlocking starts.
    pub duration: Duration,
    /// Maturity timestamp. `None` while locked.
    pub end_time: Option<DateTime<Utc>>,
    /// Escrowed coins.
    pub coins: Coins,
    /// Creation time, or the last time tokens were added.
    pub updated_at: DateTime<Utc>,
}

impl Lock {
    #[must_use]
    pub fn new(
        id: LockId,
        owner: AccountId,
        duration: Duration,
        end_time: Option<DateTime<Utc>>,
        coins: Coins,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            owner,
            duration,
            end_time,
            coins,
            updated_at,
        }
    }

    #[must_use]
    pub fn is_unlocking(&self) -> bool {
        self.end_time.is_some()
    }

    /// `Locked` or `Unlocking`; a stored lock is never `Finalized`.
    #[must_use]
    pub fn state(&self) -> LockState {
        if self.is_unlocking() {
            LockState::Unlocking
        } else {
            LockState::Locked
        }
    }

    /// The reference queue this lock belongs in.
    #[must_use]
    pub fn ref_queue(&self) -> RefQueue {
        if self.is_unlocking() {
            RefQueue::Unlocking
        } else {
            RefQueue::NotUnlocking
        }
    }

    /// The order key for [`Self::ref_queue`].
    #[must_use]
    pub fn order_key(&self) -> OrderKey {
        match self.end_time {
            Some(end) => OrderKey::EndTime(end),
            None => OrderKey::Duration(self.duration),
        }
    }

    /// Unlocking and `now >= end_time`.
    #[must_use]
    pub fn is_mature(&self, now: DateTime<Utc>) -> bool {
        self.end_time.is_some_and(|end| now >= end)
    }
}

/// Dummy lock for testing. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
impl Lock {
    /// A locked single-denomination lock created at the UNIX epoch.
    pub fn dummy(id: u64, owner: AccountId, denom: &str, amount: i64, duration: Duration) -> Self {
        Self::new(
            LockId(id),
            owner,
            duration,
            None,
            std::iter::once(crate::Coin::new(denom, rust_decimal::Decimal::new(amount, 0)))
                .collect(),
            DateTime::<Utc>::UNIX_EPOCH,
        )
    }
}

/// Selects value locked in `denom` for at least `duration`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryCondition {
    pub denom: Denom,
    pub duration: Duration,
}

impl QueryCondition {
    #[must_use]
    pub fn new(denom: impl Into<Denom>, duration: Duration) -> Self {
        Self {
            denom: denom.into(),
            duration,
        }
    }
}
