// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket wire envelope shared by client and relay.
//!
//! Every frame in either direction is a JSON object:
//!
//! ```text
//! {"event": "task.created", "payload": {...}}
//! ```
//!
//! The payload is opaque at this layer; collaborators own its meaning.
//! The `ping`/`pong` pair is reserved for the heartbeat and never reaches
//! event consumers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Event name of a liveness probe.
pub const PING_EVENT: &str = "ping";

/// Event name of a liveness acknowledgment.
pub const PONG_EVENT: &str = "pong";

/// A single inbound or outbound unit on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    /// Name consumers subscribe to.
    pub event: String,
    /// Opaque JSON payload.
    #[serde(default)]
    pub payload: Value,
}

impl Envelope {
    /// Creates an envelope for the given event and payload.
    pub fn new(event: impl Into<String>, payload: Value) -> Self {
        Envelope {
            event: event.into(),
            payload,
        }
    }

    /// Creates a heartbeat probe stamped with the sender's wall clock.
    pub fn ping(ts_ms: i64) -> Self {
        Envelope::new(PING_EVENT, serde_json::json!({ "ts": ts_ms }))
    }

    /// Creates a heartbeat acknowledgment echoing the probe's payload.
    pub fn pong(payload: Value) -> Self {
        Envelope::new(PONG_EVENT, payload)
    }

    /// Returns true for the heartbeat pair.
    pub fn is_reserved(&self) -> bool {
        is_reserved(&self.event)
    }

    /// Serializes the envelope to JSON.
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes an envelope from JSON.
    pub fn from_json(s: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Returns true if `event` is one of the heartbeat names.
pub fn is_reserved(event: &str) -> bool {
    event == PING_EVENT || event == PONG_EVENT
}

/// Rejects reserved event names coming from collaborators.
pub fn ensure_not_reserved(event: &str) -> Result<()> {
    if is_reserved(event) {
        return Err(Error::ReservedEvent(event.to_string()));
    }
    Ok(())
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
