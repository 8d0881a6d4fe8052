//! # openlock-store
//!
//! **Lock state plane**: the record store that owns every lock entity and
//! the ordered reference index that lets the engine enumerate locks by
//! queue, owner, denomination and maturity.
//!
//! ## Components
//!
//! 1. **LockStore**: `LockId -> Lock` records plus the persisted ID counter
//! 2. **RefIndex**: `(queue, scope, order_key, id)` ordered references
//!
//! Neither component validates business rules. The lifecycle engine is the
//! only writer and keeps the two consistent.

pub mod record_store;
pub mod ref_index;

pub use record_store::LockStore;
pub use ref_index::{RefIndex, RefKey, RefScope};
