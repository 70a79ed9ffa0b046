// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Client configuration.
//!
//! Configuration is read from a TOML file; every field has a default so an
//! empty file (or none at all) yields a working client:
//!
//! ```toml
//! url = "wss://sync.example.com/ws"
//! reconnect_attempts = 3
//! overflow_policy = "drop_oldest"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Directory name under the platform data dir.
const DATA_DIR_NAME: &str = "tether";
/// Durable store filename.
const STORE_FILE_NAME: &str = "queue.db";

/// What the outbound queue does when it is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Refuse the new message and report it to the caller.
    #[default]
    Reject,
    /// Evict the oldest queued message to make room.
    DropOldest,
}

/// Configuration for the sync client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// WebSocket URL of the server (`ws://` or `wss://`).
    pub url: String,
    /// Automatic reconnection tries before entering `Failed`.
    pub reconnect_attempts: u32,
    /// Base delay between reconnection attempts (milliseconds).
    pub reconnect_interval_ms: u64,
    /// Ceiling for the exponential backoff (milliseconds).
    pub max_reconnect_delay_ms: u64,
    /// Double the delay on each attempt when true, otherwise fixed.
    pub exponential_backoff: bool,
    /// Exclusive upper bound of the random jitter (milliseconds). 0 = none.
    pub reconnect_jitter_ms: u64,
    /// Time allowed for one connection attempt (milliseconds).
    pub connect_timeout_ms: u64,
    /// Outbound queue capacity.
    pub message_queue_size: usize,
    /// Behavior when the outbound queue is full.
    pub overflow_policy: OverflowPolicy,
    /// Send liveness probes and watch for acknowledgments.
    pub enable_heartbeat: bool,
    /// Interval between liveness probes (milliseconds).
    pub heartbeat_interval_ms: u64,
    /// Interval between staleness checks (milliseconds).
    ///
    /// The connection is considered dead after twice this long without
    /// any inbound frame.
    pub health_check_interval_ms: u64,
    /// Interval between durable queue snapshots (milliseconds).
    pub persist_interval_ms: u64,
    /// Key the queue snapshot is stored under.
    pub queue_store_key: String,
    /// Durable store location. Defaults to the platform data dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            url: "ws://localhost:7890".to_string(),
            reconnect_attempts: 5,
            reconnect_interval_ms: 1000,
            max_reconnect_delay_ms: 30_000,
            exponential_backoff: true,
            reconnect_jitter_ms: 1000,
            connect_timeout_ms: 10_000,
            message_queue_size: 100,
            overflow_policy: OverflowPolicy::Reject,
            enable_heartbeat: true,
            heartbeat_interval_ms: 30_000,
            health_check_interval_ms: 30_000,
            persist_interval_ms: 2000,
            queue_store_key: "outbound_queue".to_string(),
            store_path: None,
        }
    }
}

impl ClientConfig {
    /// Creates a default configuration pointed at `url`.
    pub fn with_url(url: impl Into<String>) -> Self {
        ClientConfig {
            url: url.into(),
            ..ClientConfig::default()
        }
    }

    /// Loads and validates configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::InvalidConfig(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ClientConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes the configuration to TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::InvalidConfig(format!("failed to serialize config: {}", e)))
    }

    /// Checks option values for consistency.
    pub fn validate(&self) -> Result<()> {
        if !(self.url.starts_with("ws://") || self.url.starts_with("wss://")) {
            return Err(Error::InvalidConfig(format!(
                "invalid url '{}': must start with ws:// or wss://",
                self.url
            )));
        }
        if self.message_queue_size == 0 {
            return Err(Error::InvalidConfig(
                "message_queue_size must be greater than 0".to_string(),
            ));
        }
        if self.reconnect_interval_ms == 0 {
            return Err(Error::InvalidConfig(
                "reconnect_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.connect_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "connect_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.max_reconnect_delay_ms < self.reconnect_interval_ms {
            return Err(Error::InvalidConfig(format!(
                "max_reconnect_delay_ms ({}) is less than reconnect_interval_ms ({})",
                self.max_reconnect_delay_ms, self.reconnect_interval_ms
            )));
        }
        if self.enable_heartbeat
            && (self.heartbeat_interval_ms == 0 || self.health_check_interval_ms == 0)
        {
            return Err(Error::InvalidConfig(
                "heartbeat intervals must be greater than 0 when enable_heartbeat is set"
                    .to_string(),
            ));
        }
        if self.persist_interval_ms == 0 {
            return Err(Error::InvalidConfig(
                "persist_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.queue_store_key.is_empty() {
            return Err(Error::InvalidConfig(
                "queue_store_key must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolved durable store location.
    pub fn resolved_store_path(&self) -> PathBuf {
        self.store_path.clone().unwrap_or_else(default_store_path)
    }
}

/// Default durable store location: `<data_local_dir>/tether/queue.db`.
pub fn default_store_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DATA_DIR_NAME)
        .join(STORE_FILE_NAME)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
