// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Connection lifecycle, outbound queue and heartbeat.
//!
//! [`ConnectionManager`] owns the transport, the outbound queue and every
//! timer. It is driven from a single task: either [`ConnectionManager::run`]
//! or, in tests, direct calls plus [`ConnectionManager::process_timers`].
//! Timer callbacks never touch the manager; they post a timer event back
//! to it, and events from a timer that has since been re-armed or cancelled
//! are ignored.
//!
//! State machine:
//!
//! ```text
//! Disconnected --connect--> Connecting --open--> Connected
//! Connecting --error--> Reconnecting --timer--> (attempt) --open--> Connected
//! Connected --close (server, error, heartbeat)--> Reconnecting
//! Reconnecting --attempts exhausted--> Failed
//! any --disconnect--> Disconnected
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tether_core::protocol::ensure_not_reserved;
use tether_core::{BackoffPolicy, ClientConfig, Envelope, QueuedMessage, PING_EVENT, PONG_EVENT};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, info, trace, warn};

use super::dispatcher::EventDispatcher;
use super::heartbeat::HeartbeatMonitor;
use super::queue::{OutboundQueue, Pushed};
use super::scheduler::{Scheduler, TimerHandle};
use super::store::DurableStore;
use super::transport::{Transport, TransportError, TransportResult};
use crate::error::{Error, Result};

/// Capacity of the notification broadcast channel.
const NOTIFICATION_CAPACITY: usize = 64;

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    /// Reconnect attempts exhausted. Only an explicit `connect` leaves it.
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Why a connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The client called `disconnect`.
    UserRequested,
    /// The server closed the socket.
    ServerClosed,
    /// The transport reported an error.
    TransportError(String),
    /// No inbound traffic for twice the health-check interval.
    HeartbeatTimeout,
}

impl CloseReason {
    /// Returns true if the client should try to reconnect.
    pub fn is_reconnectable(&self) -> bool {
        !matches!(self, CloseReason::UserRequested)
    }
}

/// Lifecycle events broadcast to collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Connected,
    Disconnected { reason: CloseReason },
    Reconnecting { attempt: u32, delay: Duration },
    /// Attempts exhausted; the client is now `Failed`.
    ReconnectFailed { attempts: u32 },
    /// An emit hit a full queue. `evicted` names the dropped event, if any.
    QueueFull { event: String, evicted: Option<String> },
    HandlerFailed { event: String, error: String },
}

/// What happened to an emitted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Handed to the transport.
    Sent,
    /// Buffered until the next connection.
    Queued,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum TimerKind {
    Reconnect,
    Heartbeat,
    HealthCheck,
    Persist,
}

/// Posted by a timer callback when it fires.
#[derive(Debug, Clone, Copy)]
struct TimerEvent {
    kind: TimerKind,
    seq: u64,
}

struct ArmedTimer {
    seq: u64,
    _handle: TimerHandle,
}

fn is_live(timers: &HashMap<TimerKind, ArmedTimer>, event: TimerEvent) -> bool {
    timers
        .get(&event.kind)
        .is_some_and(|armed| armed.seq == event.seq)
}

/// Requests from a [`SyncClient`](super::client::SyncClient) handle.
pub(crate) enum Command {
    Connect {
        reply: oneshot::Sender<Result<()>>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
    Emit {
        event: String,
        payload: Value,
        reply: oneshot::Sender<Result<Delivery>>,
    },
    QueueLen {
        reply: oneshot::Sender<usize>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// A command that ends an in-flight connection attempt.
enum Interrupt {
    Disconnect(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
    /// Every handle was dropped.
    Closed,
}

enum Attempt {
    Finished(TransportResult<()>),
    Cancelled(Interrupt),
}

fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

/// Owns the connection state machine.
pub struct ConnectionManager<T: Transport> {
    config: ClientConfig,
    backoff: BackoffPolicy,
    transport: T,
    store: Box<dyn DurableStore>,
    scheduler: Arc<dyn Scheduler>,
    dispatcher: Arc<EventDispatcher>,
    queue: OutboundQueue,
    heartbeat: HeartbeatMonitor,
    state: ConnectionState,
    /// Reset when a connection opens or an explicit `connect` starts over.
    attempts: u32,
    timers: HashMap<TimerKind, ArmedTimer>,
    next_timer_seq: u64,
    timer_tx: mpsc::UnboundedSender<TimerEvent>,
    timer_rx: mpsc::UnboundedReceiver<TimerEvent>,
    state_tx: watch::Sender<ConnectionState>,
    notify_tx: broadcast::Sender<Notification>,
    /// Set while [`run`](Self::run) drives the manager.
    commands: Option<mpsc::Receiver<Command>>,
    shutdown_reply: Option<oneshot::Sender<()>>,
}

impl<T: Transport> ConnectionManager<T> {
    /// Creates a manager in `Disconnected`, seeding the queue from the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid or the store is unreadable.
    /// A corrupt persisted queue is logged and discarded.
    pub fn new(
        config: ClientConfig,
        transport: T,
        store: Box<dyn DurableStore>,
        scheduler: Arc<dyn Scheduler>,
        dispatcher: Arc<EventDispatcher>,
    ) -> Result<Self> {
        config.validate()?;

        let mut queue = OutboundQueue::new(config.message_queue_size, config.overflow_policy);
        if let Some(json) = store.load(&config.queue_store_key)? {
            match queue.restore(&json) {
                Ok(0) => {}
                Ok(restored) => info!(restored, "restored outbound queue"),
                Err(e) => warn!(error = %e, "discarding unreadable persisted queue"),
            }
        }

        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (notify_tx, _) = broadcast::channel(NOTIFICATION_CAPACITY);

        let mut manager = ConnectionManager {
            backoff: BackoffPolicy::from_config(&config),
            heartbeat: HeartbeatMonitor::new(millis(config.health_check_interval_ms)),
            config,
            transport,
            store,
            scheduler,
            dispatcher,
            queue,
            state: ConnectionState::Disconnected,
            attempts: 0,
            timers: HashMap::new(),
            next_timer_seq: 0,
            timer_tx,
            timer_rx,
            state_tx,
            notify_tx,
            commands: None,
            shutdown_reply: None,
        };
        manager.arm_every(
            TimerKind::Persist,
            millis(manager.config.persist_interval_ms),
        );
        Ok(manager)
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Consecutive failed attempts since the last successful open.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn queue(&self) -> &OutboundQueue {
        &self.queue
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Watches state transitions.
    pub fn state_watch(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Subscribes to lifecycle notifications.
    pub fn notifications(&self) -> broadcast::Receiver<Notification> {
        self.notify_tx.subscribe()
    }

    pub(crate) fn notification_sender(&self) -> broadcast::Sender<Notification> {
        self.notify_tx.clone()
    }

    /// Opens the connection from `Disconnected` or `Failed`.
    ///
    /// Starting from `Failed` grants a fresh attempt budget. In any other
    /// state this is a no-op. A failed attempt schedules a retry and is
    /// also returned to the caller. Each attempt is bounded by
    /// `connect_timeout_ms`; under [`run`](Self::run) a `disconnect` or
    /// shutdown command aborts it.
    pub async fn connect(&mut self) -> Result<()> {
        match self.state {
            ConnectionState::Disconnected | ConnectionState::Failed => {
                self.attempts = 0;
                self.attempt_connect().await
            }
            _ => Ok(()),
        }
    }

    /// Closes the connection without retrying.
    ///
    /// Cancels pending reconnect and heartbeat timers and snapshots the
    /// queue. Queued messages are kept for the next `connect`.
    pub async fn disconnect(&mut self) {
        self.disarm(TimerKind::Reconnect);
        self.stop_heartbeat();
        if self.transport.is_connected() {
            if let Err(e) = self.transport.disconnect().await {
                debug!(error = %e, "transport disconnect failed");
            }
        }
        if self.state != ConnectionState::Disconnected {
            info!("disconnected by client");
            self.set_state(ConnectionState::Disconnected);
            self.notify(Notification::Disconnected {
                reason: CloseReason::UserRequested,
            });
        }
        self.persist_queue();
    }

    /// Sends an event now if connected, otherwise queues it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Core`] for reserved event names and [`Error::Queue`]
    /// when the queue is full under the reject policy. A send that fails on
    /// a live connection is not an error: the connection is closed and the
    /// event is queued instead.
    pub async fn emit(&mut self, event: &str, payload: Value) -> Result<Delivery> {
        ensure_not_reserved(event)?;

        if self.state == ConnectionState::Connected {
            match self.transport.send(Envelope::new(event, payload.clone())).await {
                Ok(()) => {
                    trace!(event, "sent");
                    return Ok(Delivery::Sent);
                }
                Err(e @ TransportError::SerializationError(_)) => return Err(e.into()),
                Err(e) => {
                    warn!(event, error = %e, "send failed, queueing");
                    self.on_close(CloseReason::TransportError(e.to_string()));
                }
            }
        }

        self.enqueue(QueuedMessage::new(event, payload))
    }

    /// Handles every timer event that has already fired.
    ///
    /// Returns the number of events processed.
    pub async fn process_timers(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(event) = self.timer_rx.try_recv() {
            self.handle_timer(event).await;
            processed += 1;
        }
        processed
    }

    /// Waits for and handles one inbound frame. Does nothing unless connected.
    pub async fn process_inbound(&mut self) {
        if self.state != ConnectionState::Connected {
            return;
        }
        let frame = self.transport.recv().await;
        self.handle_inbound(frame).await;
    }

    /// Disconnects, stops every timer and writes a final queue snapshot.
    pub async fn shutdown(&mut self) {
        self.disconnect().await;
        self.timers.clear();
        self.persist_queue();
        debug!(queued = self.queue.len(), "connection manager stopped");
    }

    /// Event loop. Returns after a shutdown command or when every handle
    /// has been dropped.
    pub(crate) async fn run(mut self, commands: mpsc::Receiver<Command>) {
        self.commands = Some(commands);
        while let Some(commands) = self.commands.as_mut() {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => self.commands = None,
                },
                Some(event) = self.timer_rx.recv() => self.handle_timer(event).await,
                frame = self.transport.recv(), if self.state == ConnectionState::Connected => {
                    self.handle_inbound(frame).await;
                }
            }
        }
        self.shutdown().await;
        if let Some(reply) = self.shutdown_reply.take() {
            reply.send(()).ok();
        }
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect { reply } => {
                let result = self.connect().await;
                reply.send(result).ok();
            }
            Command::Disconnect { reply } => {
                self.disconnect().await;
                reply.send(()).ok();
            }
            Command::Emit {
                event,
                payload,
                reply,
            } => {
                let result = self.emit(&event, payload).await;
                reply.send(result).ok();
            }
            Command::QueueLen { reply } => {
                reply.send(self.queue.len()).ok();
            }
            Command::Shutdown { reply } => self.stop(reply),
        }
    }

    /// Ends the run loop; the reply is sent once shutdown completes.
    fn stop(&mut self, reply: oneshot::Sender<()>) {
        self.shutdown_reply = Some(reply);
        self.commands = None;
    }

    async fn attempt_connect(&mut self) -> Result<()> {
        if self.state != ConnectionState::Reconnecting {
            self.set_state(ConnectionState::Connecting);
        }
        let url = self.config.url.clone();
        let limit = millis(self.config.connect_timeout_ms);
        debug!(url = %url, attempt = self.attempts, "connecting");

        let outcome = {
            let connect = tokio::time::timeout(limit, self.transport.connect(&url));
            tokio::pin!(connect);
            loop {
                let Some(commands) = self.commands.as_mut() else {
                    break Attempt::Finished(flatten_timeout(connect.as_mut().await, &url, limit));
                };
                tokio::select! {
                    result = &mut connect => {
                        break Attempt::Finished(flatten_timeout(result, &url, limit));
                    }
                    command = commands.recv() => {
                        let interrupt = match command {
                            Some(command) => {
                                serve_while_connecting(command, &mut self.queue, &self.notify_tx)
                            }
                            None => Some(Interrupt::Closed),
                        };
                        if let Some(interrupt) = interrupt {
                            break Attempt::Cancelled(interrupt);
                        }
                    }
                    Some(event) = self.timer_rx.recv() => {
                        // Only the persist timer is armed while not connected
                        if event.kind == TimerKind::Persist && is_live(&self.timers, event) {
                            persist_snapshot(
                                &mut self.queue,
                                &*self.store,
                                &self.config.queue_store_key,
                            );
                        }
                    }
                }
            }
        };

        let result = match outcome {
            Attempt::Finished(result) => result,
            Attempt::Cancelled(interrupt) => {
                info!(url = %url, "connection attempt cancelled");
                match interrupt {
                    Interrupt::Disconnect(reply) => {
                        self.disconnect().await;
                        reply.send(()).ok();
                    }
                    Interrupt::Shutdown(reply) => self.stop(reply),
                    Interrupt::Closed => self.commands = None,
                }
                return Err(Error::Transport(TransportError::ConnectionFailed(format!(
                    "{url}: attempt cancelled"
                ))));
            }
        };

        match result {
            Ok(()) => {
                self.on_open().await;
                Ok(())
            }
            Err(e) => {
                warn!(url = %url, error = %e, "connection attempt failed");
                self.schedule_reconnect();
                Err(Error::Transport(e))
            }
        }
    }

    fn schedule_reconnect(&mut self) {
        self.disarm(TimerKind::Reconnect);
        if self.attempts >= self.config.reconnect_attempts {
            warn!(attempts = self.attempts, "reconnect attempts exhausted");
            self.set_state(ConnectionState::Failed);
            self.notify(Notification::ReconnectFailed {
                attempts: self.attempts,
            });
            return;
        }

        let delay = self.backoff.delay(self.attempts);
        self.attempts += 1;
        info!(
            attempt = self.attempts,
            max = self.config.reconnect_attempts,
            delay_ms = delay.as_millis() as u64,
            "scheduling reconnect"
        );
        self.set_state(ConnectionState::Reconnecting);
        self.notify(Notification::Reconnecting {
            attempt: self.attempts,
            delay,
        });
        self.arm_after(TimerKind::Reconnect, delay);
    }

    async fn on_open(&mut self) {
        self.disarm(TimerKind::Reconnect);
        self.attempts = 0;
        self.set_state(ConnectionState::Connected);
        info!(url = %self.config.url, queued = self.queue.len(), "connected");
        self.notify(Notification::Connected);

        self.flush_queue().await;
        if self.state == ConnectionState::Connected {
            self.start_heartbeat();
        }
    }

    /// Drains the queue in order. A message leaves the queue only after the
    /// transport accepted it.
    async fn flush_queue(&mut self) {
        let mut flushed = 0usize;
        while self.state == ConnectionState::Connected {
            let Some(envelope) = self.queue.front().map(QueuedMessage::to_envelope) else {
                break;
            };
            match self.transport.send(envelope).await {
                Ok(()) => {
                    self.queue.pop_front();
                    flushed += 1;
                }
                Err(TransportError::SerializationError(e)) => {
                    if let Some(dropped) = self.queue.pop_front() {
                        warn!(event = %dropped.event, error = %e, "dropping unencodable message");
                    }
                }
                Err(e) => {
                    warn!(error = %e, remaining = self.queue.len(), "flush interrupted");
                    self.on_close(CloseReason::TransportError(e.to_string()));
                }
            }
        }
        if flushed > 0 {
            debug!(flushed, remaining = self.queue.len(), "flushed outbound queue");
        }
    }

    fn on_close(&mut self, reason: CloseReason) {
        self.stop_heartbeat();
        info!(reason = ?reason, "connection closed");
        self.notify(Notification::Disconnected {
            reason: reason.clone(),
        });
        if reason.is_reconnectable() {
            self.schedule_reconnect();
        } else {
            self.set_state(ConnectionState::Disconnected);
        }
    }

    async fn handle_inbound(&mut self, frame: TransportResult<Option<Envelope>>) {
        match frame {
            Ok(Some(envelope)) => {
                self.heartbeat.record_ack(self.scheduler.now());
                match envelope.event.as_str() {
                    PING_EVENT => {
                        let pong = Envelope::pong(envelope.payload);
                        if let Err(e) = self.transport.send(pong).await {
                            self.on_close(CloseReason::TransportError(e.to_string()));
                        }
                    }
                    PONG_EVENT => trace!("pong"),
                    _ => self.dispatch(&envelope),
                }
            }
            Ok(None) => self.on_close(CloseReason::ServerClosed),
            Err(TransportError::SerializationError(e)) => {
                self.heartbeat.record_ack(self.scheduler.now());
                warn!(error = %e, "skipping malformed frame");
            }
            Err(e) => self.on_close(CloseReason::TransportError(e.to_string())),
        }
    }

    fn dispatch(&self, envelope: &Envelope) {
        debug!(event = %envelope.event, "dispatching");
        let report = self.dispatcher.dispatch(envelope);
        for (_, error) in report.failures {
            self.notify(Notification::HandlerFailed {
                event: envelope.event.clone(),
                error,
            });
        }
    }

    fn enqueue(&mut self, message: QueuedMessage) -> Result<Delivery> {
        enqueue_message(&mut self.queue, &self.notify_tx, message)
    }

    async fn handle_timer(&mut self, event: TimerEvent) {
        if !is_live(&self.timers, event) {
            trace!(kind = ?event.kind, "ignoring stale timer");
            return;
        }

        match event.kind {
            TimerKind::Reconnect => {
                self.timers.remove(&TimerKind::Reconnect);
                if self.state == ConnectionState::Reconnecting {
                    // Failure already scheduled the next retry
                    self.attempt_connect().await.ok();
                }
            }
            TimerKind::Heartbeat => self.send_ping().await,
            TimerKind::HealthCheck => self.check_health().await,
            TimerKind::Persist => self.persist_queue(),
        }
    }

    async fn send_ping(&mut self) {
        if self.state != ConnectionState::Connected {
            return;
        }
        let ping = Envelope::ping(Utc::now().timestamp_millis());
        if let Err(e) = self.transport.send(ping).await {
            warn!(error = %e, "heartbeat ping failed");
            self.on_close(CloseReason::TransportError(e.to_string()));
        }
    }

    async fn check_health(&mut self) {
        let now = self.scheduler.now();
        if self.state != ConnectionState::Connected || !self.heartbeat.is_stale(now) {
            return;
        }
        let silence_ms = self
            .heartbeat
            .silence(now)
            .map_or(0, |d| d.as_millis() as u64);
        warn!(silence_ms, "no traffic from server, closing connection");
        if let Err(e) = self.transport.disconnect().await {
            debug!(error = %e, "transport disconnect failed");
        }
        self.on_close(CloseReason::HeartbeatTimeout);
    }

    fn start_heartbeat(&mut self) {
        if !self.config.enable_heartbeat {
            return;
        }
        self.heartbeat.reset(self.scheduler.now());
        self.arm_every(
            TimerKind::Heartbeat,
            millis(self.config.heartbeat_interval_ms),
        );
        self.arm_every(
            TimerKind::HealthCheck,
            millis(self.config.health_check_interval_ms),
        );
    }

    fn stop_heartbeat(&mut self) {
        self.heartbeat.stop();
        self.disarm(TimerKind::Heartbeat);
        self.disarm(TimerKind::HealthCheck);
    }

    fn persist_queue(&mut self) {
        persist_snapshot(
            &mut self.queue,
            &*self.store,
            &self.config.queue_store_key,
        );
    }

    fn next_seq(&mut self) -> u64 {
        self.next_timer_seq += 1;
        self.next_timer_seq
    }

    fn arm_after(&mut self, kind: TimerKind, delay: Duration) {
        let seq = self.next_seq();
        let tx = self.timer_tx.clone();
        let handle = self.scheduler.after(
            delay,
            Box::new(move || {
                tx.send(TimerEvent { kind, seq }).ok();
            }),
        );
        self.timers.insert(
            kind,
            ArmedTimer {
                seq,
                _handle: handle,
            },
        );
    }

    fn arm_every(&mut self, kind: TimerKind, period: Duration) {
        let seq = self.next_seq();
        let tx = self.timer_tx.clone();
        let handle = self.scheduler.every(
            period,
            Box::new(move || {
                tx.send(TimerEvent { kind, seq }).ok();
            }),
        );
        self.timers.insert(
            kind,
            ArmedTimer {
                seq,
                _handle: handle,
            },
        );
    }

    /// Dropping the handle cancels the timer.
    fn disarm(&mut self, kind: TimerKind) {
        self.timers.remove(&kind);
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state == state {
            return;
        }
        debug!(from = %self.state, to = %state, "state change");
        self.state = state;
        self.state_tx.send_replace(state);
    }

    fn notify(&self, notification: Notification) {
        // No receivers is fine
        self.notify_tx.send(notification).ok();
    }
}

/// Answers a command that arrives while a connection attempt is in flight.
///
/// Returns the command back as an [`Interrupt`] if it ends the attempt.
fn serve_while_connecting(
    command: Command,
    queue: &mut OutboundQueue,
    notify_tx: &broadcast::Sender<Notification>,
) -> Option<Interrupt> {
    match command {
        // Already connecting
        Command::Connect { reply } => {
            reply.send(Ok(())).ok();
        }
        Command::Emit {
            event,
            payload,
            reply,
        } => {
            let result = ensure_not_reserved(&event)
                .map_err(Error::from)
                .and_then(|()| {
                    enqueue_message(queue, notify_tx, QueuedMessage::new(event, payload))
                });
            reply.send(result).ok();
        }
        Command::QueueLen { reply } => {
            reply.send(queue.len()).ok();
        }
        Command::Disconnect { reply } => return Some(Interrupt::Disconnect(reply)),
        Command::Shutdown { reply } => return Some(Interrupt::Shutdown(reply)),
    }
    None
}

fn flatten_timeout(
    result: std::result::Result<TransportResult<()>, tokio::time::error::Elapsed>,
    url: &str,
    limit: Duration,
) -> TransportResult<()> {
    result.unwrap_or_else(|_| {
        Err(TransportError::ConnectionFailed(format!(
            "{url}: timed out after {} ms",
            limit.as_millis()
        )))
    })
}

fn enqueue_message(
    queue: &mut OutboundQueue,
    notify_tx: &broadcast::Sender<Notification>,
    message: QueuedMessage,
) -> Result<Delivery> {
    let event = message.event.clone();
    match queue.push(message) {
        Ok(Pushed::Appended) => {
            debug!(event = %event, queued = queue.len(), "queued");
            Ok(Delivery::Queued)
        }
        Ok(Pushed::Evicted(old)) => {
            warn!(event = %event, evicted = %old.event, "queue full, dropped oldest");
            notify_tx
                .send(Notification::QueueFull {
                    event,
                    evicted: Some(old.event),
                })
                .ok();
            Ok(Delivery::Queued)
        }
        Err(e) => {
            warn!(event = %event, error = %e, "queue full, rejected");
            notify_tx
                .send(Notification::QueueFull {
                    event,
                    evicted: None,
                })
                .ok();
            Err(e.into())
        }
    }
}

/// Writes the queue to the store if it changed since the last write.
fn persist_snapshot(queue: &mut OutboundQueue, store: &dyn DurableStore, key: &str) {
    if !queue.is_dirty() {
        return;
    }
    let saved = queue
        .snapshot_json()
        .map_err(Error::from)
        .and_then(|json| store.save(key, &json).map_err(Error::from));
    match saved {
        Ok(()) => {
            queue.mark_clean();
            trace!(queued = queue.len(), "persisted outbound queue");
        }
        Err(e) => warn!(error = %e, "failed to persist outbound queue"),
    }
}

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;
