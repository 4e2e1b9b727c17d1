//! Stream session configuration.
//!
//! Loading (files, env) is the hosting process's concern; this crate only
//! defines the shape and the defaults.

use serde::{Deserialize, Serialize};

/// Configuration for the post stream session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSourceConfig {
    /// Identifier for this source (used in logs)
    #[serde(default = "default_name")]
    pub name: String,

    /// Initial reconnection delay (milliseconds)
    #[serde(default = "default_backoff_start_ms")]
    pub backoff_start_ms: u64,

    /// Reconnection delay ceiling (milliseconds)
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// Fixed cooldown applied when the source rate-limits us (milliseconds)
    #[serde(default = "default_rate_limit_cooldown_ms")]
    pub rate_limit_cooldown_ms: u64,

    /// Force a reconnect when the stream has been silent this long (milliseconds)
    #[serde(default = "default_watchdog_timeout_ms")]
    pub watchdog_timeout_ms: u64,

    /// Attempt link-preview enrichment for text-only posts
    #[serde(default)]
    pub unfurl_previews: bool,
}

fn default_name() -> String {
    "post-stream".to_string()
}

fn default_backoff_start_ms() -> u64 {
    2_000
}

fn default_backoff_max_ms() -> u64 {
    16_000
}

fn default_rate_limit_cooldown_ms() -> u64 {
    30_000
}

fn default_watchdog_timeout_ms() -> u64 {
    30_000
}

impl Default for StreamSourceConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            backoff_start_ms: default_backoff_start_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            rate_limit_cooldown_ms: default_rate_limit_cooldown_ms(),
            watchdog_timeout_ms: default_watchdog_timeout_ms(),
            unfurl_previews: false,
        }
    }
}
