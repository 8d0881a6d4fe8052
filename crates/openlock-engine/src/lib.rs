//! # openlock-engine
//!
//! **Lifecycle plane**: the lock state machine that keeps the record store,
//! reference index and accumulation trees consistent.
//!
//! ## Architecture
//!
//! The [`LockupEngine`] exclusively owns lock state and talks to two
//! boundaries:
//! 1. **Ledger**: moves coins between owners and the escrow pool
//! 2. **LockupHooks**: observers notified after every transition
//!
//! Every public mutation runs as one atomic unit over an undo journal: it
//! either commits to all three stores (and the ledger) or leaves them
//! untouched.
//!
//! ## Lock Flow
//!
//! ```text
//! create_lock → LOCKED → begin_unlock → UNLOCKING → sweep / unlock_matured_lock → deleted
//!                 │                        ▲
//!                 └── force_unlock ────────┘ (finalized immediately)
//! ```

pub mod engine;
pub mod genesis;
pub mod hooks;
pub mod invariants;
mod journal;
pub mod ledger;
pub mod lifecycle;
pub mod queries;
pub mod sweep;
pub mod telemetry;

pub use engine::LockupEngine;
pub use hooks::{LockupHooks, NoopHooks};
pub use invariants::DenomTotals;
pub use ledger::{InMemoryLedger, Ledger};
pub use telemetry::init_tracing;

#[cfg(any(test, feature = "test-helpers"))]
pub use hooks::{FailingHooks, HookEvent, RecordingHooks};
