// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use super::*;
use crate::sync::test_helpers::mock_transport;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

/// Accepts one WebSocket connection and echoes text frames back.
async fn echo_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        while let Some(Ok(msg)) = ws.next().await {
            match msg {
                Message::Text(_) => {
                    if ws.send(msg).await.is_err() {
                        break;
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });
    format!("ws://{}", addr)
}

#[tokio::test]
async fn websocket_round_trip() {
    let url = echo_server().await;
    let mut transport = WebSocketTransport::new();
    assert!(!transport.is_connected());

    transport.connect(&url).await.unwrap();
    assert!(transport.is_connected());

    let envelope = Envelope::new("task.created", json!({"id": 1}));
    transport.send(envelope.clone()).await.unwrap();
    assert_eq!(transport.recv().await.unwrap(), Some(envelope));

    transport.disconnect().await.unwrap();
    assert!(!transport.is_connected());
}

#[tokio::test]
async fn websocket_connect_failure() {
    // Bind then drop to get a port nobody listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut transport = WebSocketTransport::new();
    let err = transport
        .connect(&format!("ws://{}", addr))
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::ConnectionFailed(_)));
    assert!(!transport.is_connected());
}

#[tokio::test]
async fn websocket_requires_connection() {
    let mut transport = WebSocketTransport::new();
    let send = transport.send(Envelope::new("x", json!(null))).await;
    assert!(matches!(send, Err(TransportError::ConnectionClosed)));
    let recv = transport.recv().await;
    assert!(matches!(recv, Err(TransportError::ConnectionClosed)));
}

#[tokio::test]
async fn mock_connect_failures_are_counted() {
    let (mut transport, handle) = mock_transport();
    handle.fail_next_connects(1);

    assert!(transport.connect("ws://mock").await.is_err());
    assert!(transport.connect("ws://mock").await.is_ok());
    assert_eq!(handle.connect_attempts(), 2);
    assert!(handle.is_connected());
}

#[tokio::test]
async fn mock_scripted_inbound() {
    let (mut transport, handle) = mock_transport();
    transport.connect("ws://mock").await.unwrap();

    handle.push(Envelope::new("a", json!(1)));
    handle.push_malformed("{bad");
    handle.close();

    assert_eq!(
        transport.recv().await.unwrap(),
        Some(Envelope::new("a", json!(1)))
    );
    assert!(matches!(
        transport.recv().await,
        Err(TransportError::SerializationError(_))
    ));
    assert_eq!(transport.recv().await.unwrap(), None);
    assert!(!transport.is_connected());
}
