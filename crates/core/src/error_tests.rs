// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use yare::parameterized;

#[parameterized(
    invalid_config = { Error::InvalidConfig("message_queue_size must be > 0".into()), "message_queue_size" },
    reserved_ping = { Error::ReservedEvent("ping".into()), "'ping'" },
    reserved_hint = { Error::ReservedEvent("pong".into()), "hint" },
)]
fn error_display_contains(err: Error, expected: &str) {
    assert!(err.to_string().contains(expected));
}

#[test]
fn error_from_json() {
    let json_err = serde_json::from_str::<()>("invalid").unwrap_err();
    let err: Error = json_err.into();
    assert!(matches!(err, Error::Json(_)));
}

#[test]
fn error_from_toml() {
    let toml_err = toml::from_str::<toml::Table>("= nope").unwrap_err();
    let err: Error = toml_err.into();
    assert!(matches!(err, Error::ConfigParse(_)));
}
