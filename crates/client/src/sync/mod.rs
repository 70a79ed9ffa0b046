// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Real-time synchronization machinery.
//!
//! - [`transport`]: WebSocket transport behind a trait
//! - [`store`]: durable key/value persistence for the outbound queue
//! - [`scheduler`]: injectable timers with a virtual clock for tests
//! - [`queue`]: bounded FIFO of events waiting for a connection
//! - [`heartbeat`]: liveness bookkeeping
//! - [`dispatcher`]: event name to handler registry
//! - [`optimistic`]: speculative updates with rollback
//! - [`connection`]: the state machine tying these together
//! - [`client`]: cloneable handle running the state machine on a task

pub mod client;
pub mod connection;
pub mod dispatcher;
pub mod heartbeat;
pub mod optimistic;
pub mod queue;
pub mod scheduler;
pub mod store;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use client::SyncClient;
pub use connection::{CloseReason, ConnectionManager, ConnectionState, Delivery, Notification};
pub use dispatcher::{handler, DispatchReport, EventDispatcher, Handler, HandlerError};
pub use heartbeat::HeartbeatMonitor;
pub use optimistic::{CommitFailure, OptimisticCoordinator, UpdateId, UpdateStatus};
pub use queue::{OutboundQueue, Pushed, QueueError};
pub use scheduler::{ManualScheduler, Scheduler, TimerHandle, TokioScheduler};
pub use store::{DurableStore, MemoryStore, SqliteStore, StoreError};
pub use transport::{Transport, TransportError, WebSocketTransport};
