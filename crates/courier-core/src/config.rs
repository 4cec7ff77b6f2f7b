//! Configuration value objects.
//!
//! Every field has a default, so an empty document deserializes into a
//! working configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Queue client and loop settings. Durations are whole seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct QueueConfig {
    /// Console logging when true, rolling log file otherwise.
    pub debug: bool,

    /// Pause before a supervisor restarts a crashed loop.
    pub auto_boot_time: u64,

    /// Promoter rest when the delay set is empty. Also the upper bound of a
    /// single wait for a not-yet-due entry.
    pub empty_rest_interval: u64,

    /// Delay applied when a failed message is re-queued.
    pub retry_wait_seconds: u64,

    /// Prepended to every derived store key.
    pub key_prefix: String,

    /// Topic used by `publish_method` / `publish_method_delayed`.
    pub default_topic: String,

    /// Tag delay-set members with a ULID so identical payloads stay distinct.
    pub tag_delayed_members: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            debug: true,
            auto_boot_time: 3,
            empty_rest_interval: 2,
            retry_wait_seconds: 5,
            key_prefix: String::new(),
            default_topic: "courier".to_string(),
            tag_delayed_members: true,
        }
    }
}

impl QueueConfig {
    pub fn auto_boot_time(&self) -> Duration {
        Duration::from_secs(self.auto_boot_time)
    }

    pub fn empty_rest_interval(&self) -> Duration {
        Duration::from_secs(self.empty_rest_interval)
    }
}

pub const DEFAULT_MAX_WORKERS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PoolConfig {
    pub max_workers: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct LoggingConfig {
    /// Default directive for the env filter; `RUST_LOG` still wins.
    pub level: String,

    /// Directory for the rolling log file (non-debug mode).
    pub dir: String,

    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: "runtime/logs".to_string(),
            file_prefix: "courier".to_string(),
        }
    }
}
