//! System-wide constants for the OpenLock lockup engine.

/// Default maximum locks finalized by one sweep batch.
pub const DEFAULT_SWEEP_BATCH_LIMIT: usize = 1000;

/// Emit a progress log line every this many locks during genesis load.
pub const DEFAULT_GENESIS_PROGRESS_INTERVAL: usize = 25_000;

/// Default `tracing` filter directive.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "OpenLock";
