//! Configuration types for the OpenLock engine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{LockupError, Result, constants};

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockupConfig {
    /// Maximum locks finalized per sweep pass of `withdraw_all_matured`.
    pub sweep_batch_limit: usize,
    /// Progress-log cadence during genesis load.
    pub genesis_progress_interval: usize,
    /// Upper bound on lock durations, if any.
    pub max_lock_duration: Option<Duration>,
    /// Logging setup.
    pub telemetry: TelemetryConfig,
}

impl Default for LockupConfig {
    fn default() -> Self {
        Self {
            sweep_batch_limit: constants::DEFAULT_SWEEP_BATCH_LIMIT,
            genesis_progress_interval: constants::DEFAULT_GENESIS_PROGRESS_INTERVAL,
            max_lock_duration: None,
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl LockupConfig {
    /// Parse and validate a JSON config. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: Self =
            serde_json::from_str(json).map_err(|e| LockupError::Configuration(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sweep_batch_limit == 0 {
            return Err(LockupError::Configuration(
                "sweep_batch_limit must be > 0".into(),
            ));
        }
        if self.genesis_progress_interval == 0 {
            return Err(LockupError::Configuration(
                "genesis_progress_interval must be > 0".into(),
            ));
        }
        if self.max_lock_duration.is_some_and(|d| d.is_zero()) {
            return Err(LockupError::Configuration(
                "max_lock_duration must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Reject zero durations and durations above `max_lock_duration`.
    pub fn check_duration(&self, duration: Duration) -> Result<()> {
        if duration.is_zero() {
            return Err(LockupError::InvalidDuration {
                reason: "duration must be non-zero".into(),
            });
        }
        if let Some(max) = self.max_lock_duration {
            if duration > max {
                return Err(LockupError::InvalidDuration {
                    reason: format!("{duration:?} exceeds maximum {max:?}"),
                });
            }
        }
        Ok(())
    }
}

/// `tracing` subscriber settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// `EnvFilter` directive, used when `RUST_LOG` is unset.
    pub filter: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            filter: constants::DEFAULT_LOG_FILTER.to_string(),
            json: false,
        }
    }
}
