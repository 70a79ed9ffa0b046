// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Test server utilities and relay behavior tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tether_core::Envelope;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::server;
use crate::state::RelayState;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A relay running on a random port.
struct TestServer {
    addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    state: RelayState,
}

impl TestServer {
    async fn start() -> Self {
        let state = RelayState::new(64);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let serving = state.clone();
        tokio::spawn(async move {
            tokio::select! {
                result = server::serve(listener, serving) => {
                    if let Err(e) = result {
                        eprintln!("Test server error: {}", e);
                    }
                }
                _ = shutdown_rx => {}
            }
        });

        TestServer {
            addr,
            shutdown_tx,
            state,
        }
    }

    fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    async fn connect(&self) -> Client {
        let (ws, _) = connect_async(&self.ws_url()).await.unwrap();
        ws
    }

    /// Waits until the relay has registered `n` connections.
    async fn wait_for_clients(&self, n: usize) {
        timeout(Duration::from_secs(5), async {
            while self.state.connected() != n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("clients should register");
    }

    fn shutdown(self) {
        self.shutdown_tx.send(()).ok();
    }
}

async fn send(ws: &mut Client, envelope: &Envelope) {
    let json = envelope.to_json().unwrap();
    ws.send(Message::Text(json.into())).await.unwrap();
}

async fn next_envelope(ws: &mut Client) -> Envelope {
    loop {
        let msg = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .unwrap();
        if let Message::Text(text) = msg {
            return Envelope::from_json(&text).unwrap();
        }
    }
}

#[tokio::test]
async fn ping_is_answered_with_pong() {
    let server = TestServer::start().await;
    let mut ws = server.connect().await;

    send(&mut ws, &Envelope::ping(1234)).await;

    let reply = next_envelope(&mut ws).await;
    assert_eq!(reply, Envelope::pong(json!({"ts": 1234})));
    server.shutdown();
}

#[tokio::test]
async fn envelopes_fan_out_to_other_clients_only() {
    let server = TestServer::start().await;
    let mut alice = server.connect().await;
    let mut bob = server.connect().await;
    let mut carol = server.connect().await;
    server.wait_for_clients(3).await;

    let update = Envelope::new("task.updated", json!({"id": 1}));
    send(&mut alice, &update).await;

    assert_eq!(next_envelope(&mut bob).await, update);
    assert_eq!(next_envelope(&mut carol).await, update);

    // Alice sees her own ping reply first, never her own update
    send(&mut alice, &Envelope::ping(0)).await;
    assert_eq!(next_envelope(&mut alice).await.event, "pong");
    server.shutdown();
}

#[tokio::test]
async fn malformed_frames_do_not_close_connection() {
    let server = TestServer::start().await;
    let mut ws = server.connect().await;

    ws.send(Message::Text("{not json".into())).await.unwrap();
    send(&mut ws, &Envelope::ping(5)).await;

    assert_eq!(next_envelope(&mut ws).await.event, "pong");
    server.shutdown();
}

#[tokio::test]
async fn disconnect_unregisters_client() {
    let server = TestServer::start().await;
    let mut ws = server.connect().await;
    server.wait_for_clients(1).await;

    ws.close(None).await.unwrap();
    server.wait_for_clients(0).await;
    server.shutdown();
}

#[test]
fn pong_frames_are_swallowed() {
    let state = RelayState::new(4);
    let mut rx = state.subscribe();
    let reply = server::handle_client_text(r#"{"event":"pong","payload":{}}"#, 1, &state);
    assert!(reply.is_none());
    assert!(rx.try_recv().is_err());
}

#[test]
fn regular_frames_are_published_with_sender() {
    let state = RelayState::new(4);
    let mut rx = state.subscribe();
    let reply = server::handle_client_text(r#"{"event":"note.added","payload":[1]}"#, 7, &state);
    assert!(reply.is_none());

    let relayed = rx.try_recv().unwrap();
    assert_eq!(relayed.from, 7);
    assert_eq!(relayed.envelope, Envelope::new("note.added", json!([1])));
}

#[test]
fn missing_payload_defaults_to_null() {
    let state = RelayState::new(4);
    let reply = server::handle_client_text(r#"{"event":"ping"}"#, 1, &state);
    assert_eq!(reply, Some(Envelope::pong(serde_json::Value::Null)));
}
