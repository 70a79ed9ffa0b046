// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded outbound queue for events emitted while disconnected.
//!
//! Messages leave the queue strictly in insertion order, and only after the
//! transport has accepted them. The contents can be snapshotted to JSON for
//! the durable store and restored from it at startup.

use std::collections::VecDeque;

use tether_core::{OverflowPolicy, QueuedMessage};

/// Error type for queue operations.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// The queue is at capacity and the policy is to reject.
    #[error("outbound queue is full ({capacity} messages)\n  hint: raise message_queue_size or use overflow_policy = \"drop_oldest\"")]
    Full { capacity: usize },

    /// Snapshot could not be encoded or decoded.
    #[error("queue serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Outcome of a successful push.
#[derive(Debug, Clone, PartialEq)]
pub enum Pushed {
    /// The message was appended.
    Appended,
    /// The message was appended after evicting the oldest entry.
    Evicted(QueuedMessage),
}

/// FIFO buffer with a fixed capacity.
#[derive(Debug)]
pub struct OutboundQueue {
    messages: VecDeque<QueuedMessage>,
    capacity: usize,
    policy: OverflowPolicy,
    /// Set whenever contents change; cleared once persisted.
    dirty: bool,
}

impl OutboundQueue {
    /// Creates an empty queue. A capacity of zero is treated as one.
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        let capacity = capacity.max(1);
        OutboundQueue {
            messages: VecDeque::with_capacity(capacity),
            capacity,
            policy,
            dirty: false,
        }
    }

    /// Appends a message, applying the overflow policy when full.
    pub fn push(&mut self, message: QueuedMessage) -> QueueResult<Pushed> {
        if self.messages.len() < self.capacity {
            self.messages.push_back(message);
            self.dirty = true;
            return Ok(Pushed::Appended);
        }

        match self.policy {
            OverflowPolicy::Reject => Err(QueueError::Full {
                capacity: self.capacity,
            }),
            OverflowPolicy::DropOldest => {
                let evicted = self.messages.pop_front();
                self.messages.push_back(message);
                self.dirty = true;
                Ok(evicted.map_or(Pushed::Appended, Pushed::Evicted))
            }
        }
    }

    /// The next message to send, if any.
    pub fn front(&self) -> Option<&QueuedMessage> {
        self.messages.front()
    }

    /// Removes the next message. Call only after the transport accepted it.
    pub fn pop_front(&mut self) -> Option<QueuedMessage> {
        let message = self.messages.pop_front();
        if message.is_some() {
            self.dirty = true;
        }
        message
    }

    /// Iterates in send order.
    pub fn iter(&self) -> impl Iterator<Item = &QueuedMessage> {
        self.messages.iter()
    }

    /// Number of queued messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns true if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Maximum number of queued messages.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns true if the contents changed since the last snapshot.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Records that the current contents have been persisted.
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Serializes the contents as a JSON array in send order.
    pub fn snapshot_json(&self) -> QueueResult<String> {
        Ok(serde_json::to_string(&self.messages)?)
    }

    /// Replaces the contents with a persisted snapshot.
    ///
    /// If the snapshot holds more than `capacity` messages the overflow
    /// policy decides which survive: `reject` keeps the oldest, `drop_oldest`
    /// keeps the newest. Returns the number of messages restored.
    pub fn restore(&mut self, json: &str) -> QueueResult<usize> {
        let mut messages: VecDeque<QueuedMessage> = serde_json::from_str(json)?;
        let excess = messages.len().saturating_sub(self.capacity);
        if excess > 0 {
            match self.policy {
                OverflowPolicy::Reject => messages.truncate(self.capacity),
                OverflowPolicy::DropOldest => {
                    messages.drain(..excess);
                }
            }
            // Stored copy no longer matches
            self.dirty = true;
        } else {
            self.dirty = false;
        }
        self.messages = messages;
        Ok(self.messages.len())
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
