//! Snapshot of the full lockup state, used for genesis import and export.

use serde::{Deserialize, Serialize};

use crate::{Lock, LockId, Result};

/// Every stored lock plus the ID counter.
///
/// Accumulation trees and reference indices are derived data and are
/// rebuilt on import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisState {
    /// Highest ID ever allocated.
    pub last_lock_id: LockId,
    /// Locks in ascending ID order.
    pub locks: Vec<Lock>,
}

impl GenesisState {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
