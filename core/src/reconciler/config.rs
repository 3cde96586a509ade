// Reconciler timing configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid reconciler configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Sweep timer period in milliseconds (default 2s)
    pub sweep_interval_ms: u64,
    /// Silence after which a course's live session is evicted (default 8s)
    pub ttl_ms: u64,
    /// Blacklist period after a spoof mismatch (default 60s)
    pub spoof_cooldown_ms: u64,
    /// Blacklist period after a TTL eviction (default 10s)
    pub expiry_cooldown_ms: u64,
    /// Bound of the observation channel between radio and reconciler
    pub channel_capacity: usize,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            sweep_interval_ms: 2_000,
            ttl_ms: 8_000,
            spoof_cooldown_ms: 60_000,
            expiry_cooldown_ms: 10_000,
            channel_capacity: 256,
        }
    }
}

impl ReconcilerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sweep_interval_ms == 0
            || self.ttl_ms == 0
            || self.spoof_cooldown_ms == 0
            || self.expiry_cooldown_ms == 0
        {
            return Err(ConfigError::Invalid("durations must be > 0".to_string()));
        }
        if self.sweep_interval_ms > self.ttl_ms {
            return Err(ConfigError::Invalid(
                "sweep interval must be <= ttl".to_string(),
            ));
        }
        if self.expiry_cooldown_ms > self.spoof_cooldown_ms {
            return Err(ConfigError::Invalid(
                "expiry cooldown must be <= spoof cooldown".to_string(),
            ));
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "channel capacity must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    pub fn spoof_cooldown(&self) -> Duration {
        Duration::from_millis(self.spoof_cooldown_ms)
    }

    pub fn expiry_cooldown(&self) -> Duration {
        Duration::from_millis(self.expiry_cooldown_ms)
    }
}
