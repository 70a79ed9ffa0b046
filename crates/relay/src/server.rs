// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket server implementation.
//!
//! Accepts connections, answers heartbeat probes, and fans every other
//! envelope out to the remaining clients.

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use tether_core::{Envelope, PING_EVENT, PONG_EVENT};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::state::{ClientId, RelayState, Relayed};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Run the WebSocket server on the given address.
pub async fn run(addr: SocketAddr, state: RelayState) -> Result<(), BoxError> {
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on: {}", listener.local_addr()?);
    serve(listener, state).await
}

/// Accepts connections from an already bound listener.
pub(crate) async fn serve(listener: TcpListener, state: RelayState) -> Result<(), BoxError> {
    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let state = state.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, state).await {
                error!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }
}

/// Handle a single WebSocket connection.
pub(crate) async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: RelayState,
) -> Result<(), BoxError> {
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    // Subscribe before registering so a registered client misses nothing
    let broadcast_rx = state.subscribe();
    let client_id = state.register();
    info!(client_id, connected = state.connected(), "New WebSocket connection from: {}", peer_addr);

    let result = relay_frames(ws_stream, broadcast_rx, client_id, peer_addr, &state).await;

    state.unregister();
    info!(client_id, connected = state.connected(), "Connection closed: {}", peer_addr);
    result
}

async fn relay_frames(
    ws_stream: tokio_tungstenite::WebSocketStream<TcpStream>,
    mut broadcast_rx: broadcast::Receiver<Relayed>,
    client_id: ClientId,
    peer_addr: SocketAddr,
    state: &RelayState,
) -> Result<(), BoxError> {
    let (mut ws_sink, mut ws_stream) = ws_stream.split();

    loop {
        tokio::select! {
            msg = ws_stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = handle_client_text(&text, client_id, state) {
                            ws_sink.send(Message::Text(reply.to_json()?.into())).await?;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("Client {} disconnected", peer_addr);
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        ws_sink.send(Message::Pong(data)).await?;
                    }
                    Some(Ok(_)) => {
                        // Binary and protocol pongs carry nothing for us
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket error from {}: {}", peer_addr, e);
                        break;
                    }
                    None => {
                        info!("Client {} stream ended", peer_addr);
                        break;
                    }
                }
            }

            relayed = broadcast_rx.recv() => {
                match relayed {
                    Ok(relayed) if relayed.from == client_id => {}
                    Ok(relayed) => {
                        let json = relayed.envelope.to_json()?;
                        if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                            warn!("Failed to send broadcast to {}: {}", peer_addr, e);
                            break;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        warn!("Client {} lagged by {} messages", peer_addr, n);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    Ok(())
}

/// Process one text frame and return the reply for the sender, if any.
///
/// Malformed frames are logged and dropped; they do not end the connection.
pub(crate) fn handle_client_text(
    text: &str,
    client_id: ClientId,
    state: &RelayState,
) -> Option<Envelope> {
    let envelope = match Envelope::from_json(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(client_id, error = %e, "Ignoring malformed frame");
            return None;
        }
    };

    match envelope.event.as_str() {
        PING_EVENT => Some(Envelope::pong(envelope.payload)),
        PONG_EVENT => None,
        _ => {
            debug!(client_id, event = %envelope.event, "Relaying");
            state.publish(client_id, envelope);
            None
        }
    }
}
