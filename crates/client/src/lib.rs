// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! tether: real-time synchronization client.
//!
//! Maintains a persistent WebSocket connection, buffers outbound events
//! while offline, dispatches inbound events to subscribers, and coordinates
//! optimistic local updates against server confirmation.

pub mod cli;
pub mod error;
pub mod sync;

pub use error::{Error, Result};
pub use sync::{
    handler, CloseReason, CommitFailure, ConnectionManager, ConnectionState, Delivery,
    DispatchReport, DurableStore, EventDispatcher, Handler, HandlerError, ManualScheduler,
    MemoryStore, Notification, OptimisticCoordinator, Scheduler, SqliteStore, SyncClient,
    TokioScheduler, Transport, TransportError, UpdateId, UpdateStatus, WebSocketTransport,
};
pub use tether_core::{ClientConfig, Envelope, OverflowPolicy, QueuedMessage};
