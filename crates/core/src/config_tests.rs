// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use super::*;
use tempfile::TempDir;
use yare::parameterized;

#[test]
fn empty_file_yields_defaults() {
    let config = ClientConfig::from_toml_str("").unwrap();
    assert_eq!(config, ClientConfig::default());
    assert_eq!(config.message_queue_size, 100);
    assert_eq!(config.overflow_policy, OverflowPolicy::Reject);
    assert_eq!(config.heartbeat_interval_ms, 30_000);
    assert_eq!(config.persist_interval_ms, 2000);
    assert_eq!(config.connect_timeout_ms, 10_000);
}

#[test]
fn partial_file_overrides_only_named_fields() {
    let config = ClientConfig::from_toml_str(
        r#"
        url = "wss://sync.example.com/ws"
        reconnect_attempts = 3
        reconnect_interval_ms = 100
        overflow_policy = "drop_oldest"
        "#,
    )
    .unwrap();

    assert_eq!(config.url, "wss://sync.example.com/ws");
    assert_eq!(config.reconnect_attempts, 3);
    assert_eq!(config.reconnect_interval_ms, 100);
    assert_eq!(config.overflow_policy, OverflowPolicy::DropOldest);
    assert!(config.exponential_backoff);
}

#[test]
fn load_from_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("tether.toml");
    std::fs::write(&path, "message_queue_size = 5\nenable_heartbeat = false\n").unwrap();

    let config = ClientConfig::load(&path).unwrap();
    assert_eq!(config.message_queue_size, 5);
    assert!(!config.enable_heartbeat);
}

#[test]
fn load_missing_file_fails() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nope.toml");
    let err = ClientConfig::load(&path).unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
    assert!(err.to_string().contains("failed to read"));
    assert!(err.to_string().contains("nope.toml"));
}

#[test]
fn unknown_overflow_policy_is_a_parse_error() {
    let err = ClientConfig::from_toml_str("overflow_policy = \"shrug\"").unwrap_err();
    assert!(matches!(err, Error::ConfigParse(_)));
}

#[test]
fn toml_roundtrip() {
    let config = ClientConfig {
        store_path: Some(PathBuf::from("/tmp/q.db")),
        ..ClientConfig::with_url("ws://127.0.0.1:9000")
    };
    let text = config.to_toml_string().unwrap();
    assert_eq!(ClientConfig::from_toml_str(&text).unwrap(), config);
}

#[parameterized(
    http_url = { "url = \"http://example.com\"", "ws://" },
    zero_queue = { "message_queue_size = 0", "message_queue_size" },
    zero_interval = { "reconnect_interval_ms = 0", "reconnect_interval_ms" },
    max_below_base = { "reconnect_interval_ms = 500\nmax_reconnect_delay_ms = 100", "max_reconnect_delay_ms" },
    zero_heartbeat = { "heartbeat_interval_ms = 0", "heartbeat" },
    zero_health_check = { "health_check_interval_ms = 0", "heartbeat" },
    zero_connect_timeout = { "connect_timeout_ms = 0", "connect_timeout_ms" },
    zero_persist = { "persist_interval_ms = 0", "persist_interval_ms" },
    empty_key = { "queue_store_key = \"\"", "queue_store_key" },
)]
fn invalid_configs(toml: &str, expected: &str) {
    let err = ClientConfig::from_toml_str(toml).unwrap_err();
    assert!(err.to_string().contains(expected), "{err}");
}

#[test]
fn zero_heartbeat_allowed_when_disabled() {
    let config =
        ClientConfig::from_toml_str("enable_heartbeat = false\nheartbeat_interval_ms = 0").unwrap();
    assert!(!config.enable_heartbeat);
}

#[test]
fn store_path_defaults_to_data_dir() {
    let config = ClientConfig::default();
    let path = config.resolved_store_path();
    assert!(path.ends_with("tether/queue.db"));

    let custom = ClientConfig {
        store_path: Some(PathBuf::from("/var/lib/app/q.db")),
        ..ClientConfig::default()
    };
    assert_eq!(custom.resolved_store_path(), PathBuf::from("/var/lib/app/q.db"));
}
