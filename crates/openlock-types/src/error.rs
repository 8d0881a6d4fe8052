//! Error types for the OpenLock lockup engine.
//!
//! All errors use the `LK_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Lock state errors
//! - 2xx: Balance / amount errors
//! - 3xx: Accumulation index errors
//! - 4xx: Notification hook errors
//! - 8xx: Invariant errors
//! - 9xx: General / internal errors

use std::time::Duration;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{AccountId, Denom, LockId};

/// Central error enum for all OpenLock operations.
#[derive(Debug, Error)]
pub enum LockupError {
    // =================================================================
    // Lock State Errors (1xx)
    // =================================================================
    /// No lock with this ID exists in the record store.
    #[error("LK_ERR_100: Lock not found: {0}")]
    LockNotFound(LockId),

    /// The caller is not the owner of the lock.
    #[error("LK_ERR_101: Account {caller} is not the owner of {lock_id}")]
    NotLockOwner { lock_id: LockId, caller: AccountId },

    /// The lock has already started unlocking.
    #[error("LK_ERR_102: {0} is already unlocking")]
    AlreadyUnlocking(LockId),

    /// The lock has not started unlocking yet.
    #[error("LK_ERR_103: {0} has not started unlocking")]
    NotUnlocking(LockId),

    /// The lock is unlocking but its end time has not been reached.
    #[error("LK_ERR_104: {lock_id} is not mature until {end_time}")]
    NotYetMature {
        lock_id: LockId,
        end_time: chrono::DateTime<chrono::Utc>,
    },

    /// Extend requested a duration that is not strictly longer.
    #[error("LK_ERR_105: New duration {requested:?} must exceed current {current:?}")]
    DurationNotIncreasing {
        current: Duration,
        requested: Duration,
    },

    /// A split was attempted on an unlocking lock without the override.
    #[error("LK_ERR_106: Cannot split unlocking {0}")]
    CannotSplitUnlocking(LockId),

    /// The lock duration is zero or exceeds the configured maximum.
    #[error("LK_ERR_107: Invalid lock duration: {reason}")]
    InvalidDuration { reason: String },

    /// The coin set is empty, or contains a non-positive / fractional amount.
    #[error("LK_ERR_108: Invalid coins: {reason}")]
    InvalidCoins { reason: String },

    /// Two locks with the same ID were supplied to a bulk load.
    #[error("LK_ERR_109: Duplicate lock: {0}")]
    DuplicateLock(LockId),

    /// No not-unlocking lock of the owner matches the denomination and duration.
    #[error("LK_ERR_110: No lock of {owner} holds {denom} at exactly {duration:?}")]
    NoMatchingLock {
        owner: AccountId,
        denom: Denom,
        duration: Duration,
    },

    // =================================================================
    // Balance / Amount Errors (2xx)
    // =================================================================
    /// The requested coins exceed what the lock holds.
    #[error("LK_ERR_200: Requested coins exceed locked balance of {0}")]
    ExceedsLocked(LockId),

    /// The owner could not fund the escrow transfer.
    #[error("LK_ERR_201: Insufficient balance of {denom}: need {needed}, have {available}")]
    InsufficientBalance {
        denom: Denom,
        needed: Decimal,
        available: Decimal,
    },

    /// The escrow pool could not pay out a release.
    #[error("LK_ERR_202: Escrow pool short of {denom}: need {needed}, have {available}")]
    InsufficientPool {
        denom: Denom,
        needed: Decimal,
        available: Decimal,
    },

    /// An amount sum exceeded the representable range.
    #[error("LK_ERR_203: Amount overflow for {denom}")]
    AmountOverflow { denom: Denom },

    // =================================================================
    // Accumulation Errors (3xx)
    // =================================================================
    /// A decrease would take a duration bucket below zero.
    ///
    /// Never expected: it means the engine removed more value than it
    /// added. Treated as fatal.
    #[error(
        "LK_ERR_300: Accumulation underflow for {denom} at {duration:?}: \
         stored {stored}, decrease {requested}"
    )]
    AccumulationUnderflow {
        denom: Denom,
        duration: Duration,
        stored: Decimal,
        requested: Decimal,
    },

    // =================================================================
    // Hook Errors (4xx)
    // =================================================================
    /// A notification hook rejected the transition.
    #[error("LK_ERR_400: Hook {hook} failed: {reason}")]
    HookFailed { hook: &'static str, reason: String },

    // =================================================================
    // Invariant Errors (8xx)
    // =================================================================
    /// Record store, accumulation index and escrow pool disagree.
    #[error("LK_ERR_800: Conservation invariant violation: {reason}")]
    ConservationViolation { reason: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("LK_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("LK_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config file, bad values, etc.).
    #[error("LK_ERR_902: Configuration error: {0}")]
    Configuration(String),

    /// `now + duration` does not fit in a timestamp.
    #[error("LK_ERR_903: Timestamp overflow adding {0:?}")]
    TimeOverflow(Duration),
}

impl LockupError {
    /// Whether this error signals a corrupted invariant rather than a
    /// rejected request.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::AccumulationUnderflow { .. }
                | Self::ConservationViolation { .. }
                | Self::Internal(_)
        )
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, LockupError>;

impl From<serde_json::Error> for LockupError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
