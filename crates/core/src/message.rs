// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Outbound messages held while the connection is down.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::protocol::Envelope;

/// An event waiting in the outbound queue.
///
/// The persisted queue is a JSON array of these records in FIFO order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueuedMessage {
    /// Event name.
    pub event: String,
    /// Opaque JSON payload.
    #[serde(default)]
    pub payload: Value,
    /// When the message entered the queue.
    pub enqueued_at: DateTime<Utc>,
}

impl QueuedMessage {
    /// Creates a record stamped with the current time.
    pub fn new(event: impl Into<String>, payload: Value) -> Self {
        Self::at(event, payload, Utc::now())
    }

    /// Creates a record with an explicit enqueue time.
    pub fn at(event: impl Into<String>, payload: Value, enqueued_at: DateTime<Utc>) -> Self {
        QueuedMessage {
            event: event.into(),
            payload,
            enqueued_at,
        }
    }

    /// Builds the wire envelope for this message.
    pub fn to_envelope(&self) -> Envelope {
        Envelope::new(self.event.clone(), self.payload.clone())
    }
}

impl From<Envelope> for QueuedMessage {
    fn from(envelope: Envelope) -> Self {
        QueuedMessage::new(envelope.event, envelope.payload)
    }
}
