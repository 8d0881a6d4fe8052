//! # openlock-types
//!
//! Shared types, errors, and configuration for the **OpenLock** lockup engine.
//!
//! This crate is the leaf dependency of the workspace; every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`LockId`], [`AccountId`], [`Denom`]
//! - **Amounts**: [`Coin`], [`Coins`]
//! - **Lock model**: [`Lock`], [`LockState`], [`RefQueue`], [`OrderKey`], [`QueryCondition`]
//! - **Snapshots**: [`GenesisState`]
//! - **Configuration**: [`LockupConfig`], [`TelemetryConfig`]
//! - **Errors**: [`LockupError`] with `LK_ERR_` prefix codes
//! - **Constants**: system-wide limits and defaults

pub mod coins;
pub mod config;
pub mod constants;
pub mod error;
pub mod genesis;
pub mod ids;
pub mod lock;

// Re-export all primary types at crate root for ergonomic imports:
//   use openlock_types::{Lock, LockId, Coins, ...};

pub use coins::*;
pub use config::*;
pub use error::*;
pub use genesis::*;
pub use ids::*;
pub use lock::*;

// Constants are accessed via `openlock_types::constants::FOO`
// (not re-exported to avoid name collisions).
