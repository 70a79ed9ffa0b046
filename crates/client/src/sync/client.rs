// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Cloneable handle to a running sync client.
//!
//! [`SyncClient::spawn`] moves a [`ConnectionManager`] onto its own task and
//! talks to it over a command channel. Subscriptions go straight to the
//! shared dispatcher, and state and notifications are observed through
//! channels, so none of those calls wait on the event loop.

use std::sync::Arc;

use serde_json::Value;
use tether_core::{ClientConfig, Envelope};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use super::connection::{Command, ConnectionManager, ConnectionState, Delivery, Notification};
use super::dispatcher::{handler, EventDispatcher, Handler, HandlerError};
use super::optimistic::{CommitFailure, OptimisticCoordinator};
use super::scheduler::{Scheduler, TokioScheduler};
use super::store::{DurableStore, SqliteStore};
use super::transport::{Transport, WebSocketTransport};
use crate::error::{Error, Result};

/// Buffered requests before callers wait on the event loop.
const COMMAND_CAPACITY: usize = 64;

/// Handle to a sync client running on a background task.
#[derive(Clone)]
pub struct SyncClient {
    commands: mpsc::Sender<Command>,
    dispatcher: Arc<EventDispatcher>,
    state: watch::Receiver<ConnectionState>,
    notify: broadcast::Sender<Notification>,
    optimistic: OptimisticCoordinator,
}

impl std::fmt::Debug for SyncClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncClient")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl SyncClient {
    /// Starts a client with the given collaborators.
    ///
    /// The queue is seeded from `store` before the task starts. The client
    /// stays `Disconnected` until [`connect`](Self::connect) is called.
    /// Must be called within a tokio runtime.
    pub fn spawn<T: Transport + 'static>(
        config: ClientConfig,
        transport: T,
        store: Box<dyn DurableStore>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Result<(Self, JoinHandle<()>)> {
        let dispatcher = Arc::new(EventDispatcher::new());
        let manager = ConnectionManager::new(
            config,
            transport,
            store,
            scheduler,
            Arc::clone(&dispatcher),
        )?;
        let (commands, rx) = mpsc::channel(COMMAND_CAPACITY);
        let client = SyncClient {
            commands,
            dispatcher,
            state: manager.state_watch(),
            notify: manager.notification_sender(),
            optimistic: OptimisticCoordinator::new(),
        };
        let task = tokio::spawn(manager.run(rx));
        Ok((client, task))
    }

    /// Starts a client over WebSocket, persisting to SQLite.
    pub fn open(config: ClientConfig) -> Result<(Self, JoinHandle<()>)> {
        config.validate()?;
        let store = SqliteStore::open(&config.resolved_store_path())?;
        Self::spawn(
            config,
            WebSocketTransport::new(),
            Box::new(store),
            Arc::new(TokioScheduler),
        )
    }

    /// Connects, or grants a fresh attempt budget after `Failed`.
    ///
    /// A failed first attempt is returned here; retries continue in the
    /// background and are reported through [`notifications`](Self::notifications).
    pub async fn connect(&self) -> Result<()> {
        self.request(|reply| Command::Connect { reply }).await?
    }

    /// Closes the connection. No automatic reconnect follows.
    pub async fn disconnect(&self) -> Result<()> {
        self.request(|reply| Command::Disconnect { reply }).await
    }

    /// Sends `event` now if connected, otherwise queues it.
    pub async fn emit(&self, event: &str, payload: Value) -> Result<Delivery> {
        let event = event.to_string();
        self.request(|reply| Command::Emit {
            event,
            payload,
            reply,
        })
        .await?
    }

    /// Applies a local change, then emits; rolls back if the emit fails.
    ///
    /// Queued delivery counts as success.
    pub async fn emit_optimistic<A, R>(
        &self,
        resource_key: &str,
        event: &str,
        payload: Value,
        apply: A,
        rollback: R,
    ) -> std::result::Result<Delivery, CommitFailure<Error>>
    where
        A: FnOnce(),
        R: FnOnce(),
    {
        self.optimistic
            .run(
                resource_key,
                apply,
                || self.emit(event, payload),
                rollback,
            )
            .await
    }

    /// Registers `handler` for `event`. Returns false if already registered.
    pub fn subscribe(&self, event: &str, handler: &Handler) -> Result<bool> {
        Ok(self.dispatcher.subscribe(event, handler)?)
    }

    /// Registers a closure and returns its handle for later removal.
    pub fn on<F>(&self, event: &str, f: F) -> Result<Handler>
    where
        F: Fn(&Envelope) -> std::result::Result<(), HandlerError> + Send + Sync + 'static,
    {
        let h = handler(f);
        self.subscribe(event, &h)?;
        Ok(h)
    }

    /// Removes one handler, or all handlers for `event` when `None`.
    pub fn unsubscribe(&self, event: &str, handler: Option<&Handler>) -> usize {
        self.dispatcher.unsubscribe(event, handler)
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn state_watch(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Waits until the client reaches `target`.
    pub async fn wait_for_state(&self, target: ConnectionState) -> Result<()> {
        let mut rx = self.state.clone();
        rx.wait_for(|state| *state == target)
            .await
            .map(|_| ())
            .map_err(|_| Error::ClientClosed)
    }

    pub fn notifications(&self) -> broadcast::Receiver<Notification> {
        self.notify.subscribe()
    }

    /// Number of messages waiting for a connection.
    pub async fn queue_len(&self) -> Result<usize> {
        self.request(|reply| Command::QueueLen { reply }).await
    }

    pub fn optimistic(&self) -> &OptimisticCoordinator {
        &self.optimistic
    }

    /// Disconnects, persists the queue and stops the event loop.
    ///
    /// Other clones of this handle get [`Error::ClientClosed`] afterwards.
    pub async fn shutdown(&self) -> Result<()> {
        self.request(|reply| Command::Shutdown { reply }).await
    }

    async fn request<R>(&self, make: impl FnOnce(oneshot::Sender<R>) -> Command) -> Result<R> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| Error::ClientClosed)?;
        rx.await.map_err(|_| Error::ClientClosed)
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
