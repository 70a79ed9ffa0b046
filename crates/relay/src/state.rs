// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared relay state.
//!
//! The relay keeps no history. Every envelope a client publishes is fanned
//! out over a broadcast channel tagged with the publisher's id, so each
//! connection can skip its own traffic.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tether_core::Envelope;
use tokio::sync::broadcast;

/// Identifies one accepted connection.
pub type ClientId = u64;

/// An envelope on its way to every other client.
#[derive(Debug, Clone)]
pub struct Relayed {
    pub from: ClientId,
    pub envelope: Envelope,
}

/// Cheaply cloneable handle to the relay's shared state.
#[derive(Clone)]
pub struct RelayState {
    inner: Arc<RelayStateInner>,
}

struct RelayStateInner {
    broadcast_tx: broadcast::Sender<Relayed>,
    next_id: AtomicU64,
    connected: AtomicUsize,
}

impl RelayState {
    /// Creates relay state whose fan-out buffers `capacity` envelopes per
    /// client before slow clients start missing messages.
    pub fn new(capacity: usize) -> Self {
        let (broadcast_tx, _) = broadcast::channel(capacity.max(1));
        RelayState {
            inner: Arc::new(RelayStateInner {
                broadcast_tx,
                next_id: AtomicU64::new(1),
                connected: AtomicUsize::new(0),
            }),
        }
    }

    /// Assigns an id to a new connection.
    pub fn register(&self) -> ClientId {
        self.inner.connected.fetch_add(1, Ordering::Relaxed);
        self.inner.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Records that a connection ended.
    pub fn unregister(&self) {
        self.inner.connected.fetch_sub(1, Ordering::Relaxed);
    }

    /// Number of open connections.
    pub fn connected(&self) -> usize {
        self.inner.connected.load(Ordering::Relaxed)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Relayed> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Fans `envelope` out to every connection. Returns how many receivers
    /// it reached, including the sender's own (which discards it).
    pub fn publish(&self, from: ClientId, envelope: Envelope) -> usize {
        self.inner
            .broadcast_tx
            .send(Relayed { from, envelope })
            .unwrap_or(0)
    }
}
