//! # openlock-accumulation
//!
//! **Duration-bucketed accumulation index for OpenLock.**
//!
//! For every denomination, tracks how much value is locked at each lock
//! duration and answers "how much is locked for at least `d`" in
//! O(log n). Reward and weighting logic may query this every block, so
//! it never scans locks.
//!
//! - **Self-contained**: no storage backend, no range iteration required
//! - **Deterministic**: same entries -> same trees -> same state root
//! - **Strict**: decreasing past zero is an invariant violation, not a clamp

pub mod determinism;
pub mod index;
pub mod tree;

pub use determinism::{compute_accumulation_root, verify_accumulation_root};
pub use index::AccumulationIndex;
pub use tree::AccumulationTree;
