//! Identifiers used throughout OpenLock.
//!
//! Lock IDs are dense, monotonically increasing integers allocated by the
//! record store. Accounts use UUIDv7 like every other OpenLock entity.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// LockId
// ---------------------------------------------------------------------------

/// Unique identifier of a lock. Never reused, even after the lock is deleted.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize,
)]
pub struct LockId(pub u64);

impl LockId {
    /// Smallest possible ID. Also the "no lock allocated yet" counter value.
    pub const MIN: Self = Self(0);
    /// Largest possible ID.
    pub const MAX: Self = Self(u64::MAX);

    /// The ID following this one, or `None` if the space is exhausted.
    #[must_use]
    pub fn checked_next(self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

impl fmt::Display for LockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lock:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// AccountId
// ---------------------------------------------------------------------------

/// Unique identifier for an account that owns locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct AccountId(pub Uuid);

impl AccountId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Type alias for value denominations (e.g., "udym", "uatom").
pub type Denom = String;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
