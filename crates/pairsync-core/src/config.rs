//! Tunable intervals and timeouts for the client runtime.
//!
//! All waits in the runtime are bounded by values from this config: the
//! delayed-apply waiter, the entity-load wait during presence binding, and
//! the best-effort revert on disposal. Durations parse from human-readable
//! strings (`"100ms"`, `"30s"`) when loaded from TOML.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Runtime timing configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// How often the delayed-apply waiter polls for presence binding.
    #[serde(default = "default_ipc_poll_interval")]
    #[serde(with = "humantime_serde")]
    pub ipc_poll_interval: Duration,

    /// How long the delayed-apply waiter keeps polling before giving up.
    #[serde(default = "default_ipc_apply_timeout")]
    #[serde(with = "humantime_serde")]
    pub ipc_apply_timeout: Duration,

    /// How often the presence bind waits polls for entity load completion.
    #[serde(default = "default_entity_poll_interval")]
    #[serde(with = "humantime_serde")]
    pub entity_poll_interval: Duration,

    /// How long to wait for an entity to finish loading before applying
    /// overlays anyway.
    #[serde(default = "default_entity_load_timeout")]
    #[serde(with = "humantime_serde")]
    pub entity_load_timeout: Duration,

    /// Upper bound on the best-effort overlay revert during disposal.
    #[serde(default = "default_revert_timeout")]
    #[serde(with = "humantime_serde")]
    pub revert_timeout: Duration,
}

const fn default_ipc_poll_interval() -> Duration {
    Duration::from_millis(100)
}

const fn default_ipc_apply_timeout() -> Duration {
    Duration::from_secs(30)
}

const fn default_entity_poll_interval() -> Duration {
    Duration::from_millis(50)
}

const fn default_entity_load_timeout() -> Duration {
    Duration::from_secs(10)
}

const fn default_revert_timeout() -> Duration {
    Duration::from_secs(5)
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            ipc_poll_interval: default_ipc_poll_interval(),
            ipc_apply_timeout: default_ipc_apply_timeout(),
            entity_poll_interval: default_entity_poll_interval(),
            entity_load_timeout: default_entity_load_timeout(),
            revert_timeout: default_revert_timeout(),
        }
    }
}

impl SyncConfig {
    /// Parses a config from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the TOML is invalid.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::Parse)
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The TOML could not be parsed.
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
}
