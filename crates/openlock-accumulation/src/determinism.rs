//! Determinism verification for accumulation state.
//!
//! Replaying the same operations, or bulk-loading the same snapshot, must
//! leave every node with identical accumulation trees. The accumulation
//! root is a SHA-256 over all live entries that makes this cheap to check.

use sha2::{Digest, Sha256};

use crate::index::AccumulationIndex;

/// Compute the accumulation root over every denomination's entries.
///
/// Hashes, in denomination order then ascending duration:
/// - denomination bytes and entry count
/// - duration seconds and subsecond nanos
/// - normalized amount string (so `100` and `100.0` hash alike)
#[must_use]
pub fn compute_accumulation_root(index: &AccumulationIndex) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"openlock:accumulation_root:v1:");

    for tree in index.trees() {
        hasher.update((tree.denom().len() as u64).to_le_bytes());
        hasher.update(tree.denom().as_bytes());
        hasher.update((tree.len() as u64).to_le_bytes());
        for (duration, amount) in tree.iter() {
            hasher.update(duration.as_secs().to_le_bytes());
            hasher.update(duration.subsec_nanos().to_le_bytes());
            hasher.update(amount.normalize().to_string().as_bytes());
            hasher.update(b";");
        }
    }

    let result = hasher.finalize();
    let mut root = [0u8; 32];
    root.copy_from_slice(&result);
    root
}

/// Recompute the root and compare with `expected_root`.
#[must_use]
pub fn verify_accumulation_root(index: &AccumulationIndex, expected_root: &[u8; 32]) -> bool {
    compute_accumulation_root(index) == *expected_root
}
