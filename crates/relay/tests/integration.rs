// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Integration tests driving real sync clients through the relay binary.

#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tether::{
    ClientConfig, ConnectionState, Delivery, MemoryStore, SyncClient, TokioScheduler,
    WebSocketTransport,
};
use tokio::sync::mpsc;
use tokio::time::timeout;

/// Spawns the relay process and kills it on drop.
struct RelayProcess {
    child: Child,
    port: u16,
}

impl RelayProcess {
    fn spawn() -> Self {
        // Reserve a free port, then hand it to the relay
        let port = TcpListener::bind("127.0.0.1:0")
            .and_then(|l| l.local_addr())
            .map(|a| a.port())
            .expect("find free port");

        let child = Command::new(env!("CARGO_BIN_EXE_tether-relay"))
            .arg("--bind")
            .arg(format!("127.0.0.1:{}", port))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn relay process");

        RelayProcess { child, port }
    }

    fn ws_url(&self) -> String {
        format!("ws://127.0.0.1:{}", self.port)
    }
}

impl Drop for RelayProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn config(url: &str) -> ClientConfig {
    ClientConfig {
        url: url.to_string(),
        // The relay may still be starting; keep retrying quickly
        reconnect_attempts: 50,
        reconnect_interval_ms: 100,
        max_reconnect_delay_ms: 400,
        reconnect_jitter_ms: 50,
        enable_heartbeat: false,
        ..ClientConfig::default()
    }
}

fn client(config: ClientConfig) -> SyncClient {
    let (client, _task) = SyncClient::spawn(
        config,
        WebSocketTransport::new(),
        Box::new(MemoryStore::new()),
        Arc::new(TokioScheduler),
    )
    .expect("spawn client");
    client
}

async fn connect(client: &SyncClient) {
    // A refused first attempt keeps retrying in the background
    let _ = client.connect().await;
    timeout(
        Duration::from_secs(10),
        client.wait_for_state(ConnectionState::Connected),
    )
    .await
    .expect("client should connect to relay")
    .unwrap();
}

fn collect(client: &SyncClient, event: &str) -> mpsc::UnboundedReceiver<Value> {
    let (tx, rx) = mpsc::unbounded_channel();
    client
        .on(event, move |envelope| {
            tx.send(envelope.payload.clone())?;
            Ok(())
        })
        .unwrap();
    rx
}

async fn next(rx: &mut mpsc::UnboundedReceiver<Value>) -> Value {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("handler dropped")
}

#[tokio::test]
async fn events_flow_between_clients() {
    let relay = RelayProcess::spawn();
    let alice = client(config(&relay.ws_url()));
    let bob = client(config(&relay.ws_url()));
    let mut bob_inbox = collect(&bob, "task.created");
    let mut alice_inbox = collect(&alice, "task.created");

    connect(&alice).await;
    connect(&bob).await;

    let delivery = alice
        .emit("task.created", json!({"id": 1, "title": "Write tests"}))
        .await
        .unwrap();
    assert_eq!(delivery, Delivery::Sent);

    assert_eq!(
        next(&mut bob_inbox).await,
        json!({"id": 1, "title": "Write tests"})
    );
    // The relay never echoes to the sender
    assert!(
        timeout(Duration::from_millis(200), alice_inbox.recv())
            .await
            .is_err()
    );

    alice.shutdown().await.unwrap();
    bob.shutdown().await.unwrap();
}

#[tokio::test]
async fn offline_events_arrive_in_order_after_connect() {
    let relay = RelayProcess::spawn();
    let bob = client(config(&relay.ws_url()));
    let mut inbox = collect(&bob, "step");
    connect(&bob).await;

    let alice = client(config(&relay.ws_url()));
    for i in 0..3 {
        let delivery = alice.emit("step", json!(i)).await.unwrap();
        assert_eq!(delivery, Delivery::Queued);
    }
    assert_eq!(alice.queue_len().await.unwrap(), 3);

    connect(&alice).await;

    for i in 0..3 {
        assert_eq!(next(&mut inbox).await, json!(i));
    }
    assert_eq!(alice.queue_len().await.unwrap(), 0);
}

#[tokio::test]
async fn heartbeat_keeps_idle_connection_open() {
    let relay = RelayProcess::spawn();
    let alice = client(ClientConfig {
        enable_heartbeat: true,
        heartbeat_interval_ms: 100,
        health_check_interval_ms: 150,
        ..config(&relay.ws_url())
    });
    let mut notes = alice.notifications();
    connect(&alice).await;

    tokio::time::sleep(Duration::from_millis(1000)).await;

    assert_eq!(alice.state(), ConnectionState::Connected);
    while let Ok(note) = notes.try_recv() {
        assert!(
            !matches!(note, tether::Notification::Disconnected { .. }),
            "unexpected disconnect: {note:?}"
        );
    }
}
