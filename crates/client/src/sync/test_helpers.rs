// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Scriptable in-memory transport for unit tests.

use std::sync::{Arc, Mutex};

use tether_core::Envelope;
use tokio::sync::mpsc;

use super::transport::{Transport, TransportError, TransportFuture};

/// Something the fake server does to the client.
#[derive(Debug)]
pub enum MockInbound {
    Frame(Envelope),
    Close,
    Error(String),
    Malformed(String),
}

#[derive(Debug, Default)]
struct MockState {
    connected: bool,
    sent: Vec<Envelope>,
    connect_attempts: u32,
    disconnects: u32,
    /// Connects left to refuse; `u32::MAX` refuses forever.
    fail_connects: u32,
    /// Sends left before the link breaks.
    sends_before_failure: Option<usize>,
    /// Connects never resolve, like a blackholed host.
    hang_connects: bool,
}

/// Transport half handed to the code under test.
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    inbound: mpsc::UnboundedReceiver<MockInbound>,
}

/// Test-side handle for scripting and inspecting the transport.
#[derive(Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
    inbound: mpsc::UnboundedSender<MockInbound>,
}

pub fn mock_transport() -> (MockTransport, MockHandle) {
    let state = Arc::new(Mutex::new(MockState::default()));
    let (tx, rx) = mpsc::unbounded_channel();
    (
        MockTransport {
            state: Arc::clone(&state),
            inbound: rx,
        },
        MockHandle { state, inbound: tx },
    )
}

fn lock(state: &Mutex<MockState>) -> std::sync::MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(|p| p.into_inner())
}

impl MockHandle {
    pub fn fail_all_connects(&self) {
        lock(&self.state).fail_connects = u32::MAX;
    }

    pub fn fail_next_connects(&self, n: u32) {
        lock(&self.state).fail_connects = n;
    }

    pub fn hang_connects(&self) {
        lock(&self.state).hang_connects = true;
    }

    pub fn fail_sends_after(&self, n: usize) {
        lock(&self.state).sends_before_failure = Some(n);
    }

    pub fn allow_sends(&self) {
        lock(&self.state).sends_before_failure = None;
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.state).connected
    }

    pub fn sent(&self) -> Vec<Envelope> {
        lock(&self.state).sent.clone()
    }

    pub fn sent_events(&self) -> Vec<String> {
        lock(&self.state)
            .sent
            .iter()
            .map(|e| e.event.clone())
            .collect()
    }

    pub fn clear_sent(&self) {
        lock(&self.state).sent.clear();
    }

    pub fn connect_attempts(&self) -> u32 {
        lock(&self.state).connect_attempts
    }

    pub fn disconnects(&self) -> u32 {
        lock(&self.state).disconnects
    }

    pub fn push(&self, envelope: Envelope) {
        self.inbound.send(MockInbound::Frame(envelope)).ok();
    }

    pub fn push_malformed(&self, raw: &str) {
        self.inbound
            .send(MockInbound::Malformed(raw.to_string()))
            .ok();
    }

    pub fn close(&self) {
        self.inbound.send(MockInbound::Close).ok();
    }

    pub fn error(&self, message: &str) {
        self.inbound
            .send(MockInbound::Error(message.to_string()))
            .ok();
    }
}

impl Transport for MockTransport {
    fn connect(&mut self, url: &str) -> TransportFuture<'_, ()> {
        let url = url.to_string();
        Box::pin(async move {
            let hang = {
                let mut state = lock(&self.state);
                state.connect_attempts += 1;
                state.hang_connects
            };
            if hang {
                return std::future::pending().await;
            }
            let mut state = lock(&self.state);
            if state.fail_connects > 0 {
                if state.fail_connects != u32::MAX {
                    state.fail_connects -= 1;
                }
                return Err(TransportError::ConnectionFailed(format!(
                    "{url}: connection refused"
                )));
            }
            state.connected = true;
            Ok(())
        })
    }

    fn disconnect(&mut self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            let mut state = lock(&self.state);
            state.connected = false;
            state.disconnects += 1;
            Ok(())
        })
    }

    fn send(&mut self, envelope: Envelope) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            let mut state = lock(&self.state);
            if !state.connected {
                return Err(TransportError::ConnectionClosed);
            }
            match state.sends_before_failure {
                Some(0) => {
                    state.connected = false;
                    return Err(TransportError::SendFailed("broken pipe".to_string()));
                }
                Some(ref mut left) => *left -= 1,
                None => {}
            }
            state.sent.push(envelope);
            Ok(())
        })
    }

    fn recv(&mut self) -> TransportFuture<'_, Option<Envelope>> {
        Box::pin(async move {
            if !lock(&self.state).connected {
                return Err(TransportError::ConnectionClosed);
            }
            let Some(inbound) = self.inbound.recv().await else {
                return std::future::pending().await;
            };
            match inbound {
                MockInbound::Frame(envelope) => Ok(Some(envelope)),
                MockInbound::Close => {
                    lock(&self.state).connected = false;
                    Ok(None)
                }
                MockInbound::Error(message) => {
                    lock(&self.state).connected = false;
                    Err(TransportError::ReceiveFailed(message))
                }
                MockInbound::Malformed(raw) => Err(TransportError::SerializationError(raw)),
            }
        })
    }

    fn is_connected(&self) -> bool {
        lock(&self.state).connected
    }
}
