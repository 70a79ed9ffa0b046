// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Command-line interface for the `tether` binary.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::sync::{
    ConnectionState, Delivery, DurableStore, MemoryStore, SqliteStore, SyncClient,
    TokioScheduler, TransportError, WebSocketTransport,
};
use tether_core::ClientConfig;

#[derive(Parser, Debug)]
#[command(name = "tether")]
#[command(about = "Real-time sync client: watch and send events over WebSocket")]
pub struct Cli {
    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print incoming events as JSON lines until interrupted
    Watch {
        #[command(flatten)]
        conn: ConnectionArgs,

        /// Event names to subscribe to
        #[arg(required = true)]
        events: Vec<String>,
    },

    /// Send one event, queueing it durably if the server is unreachable
    Send {
        #[command(flatten)]
        conn: ConnectionArgs,

        /// Event name
        event: String,

        /// JSON payload
        #[arg(default_value = "null")]
        payload: String,
    },

    /// Print the effective configuration as TOML
    Config {
        #[command(flatten)]
        conn: ConnectionArgs,
    },
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Default)]
pub struct ConnectionArgs {
    /// Configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Server URL, overriding the configuration file
    #[arg(short, long)]
    pub url: Option<String>,

    /// Keep the outbound queue in memory only
    #[arg(long)]
    pub no_persist: bool,
}

impl ConnectionArgs {
    /// Builds the effective configuration.
    pub fn load(&self) -> Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::load(path)?,
            None => ClientConfig::default(),
        };
        if let Some(url) = &self.url {
            config.url = url.clone();
        }
        config.validate()?;
        Ok(config)
    }

    fn start(&self, config: ClientConfig) -> Result<(SyncClient, JoinHandle<()>)> {
        let store: Box<dyn DurableStore> = if self.no_persist {
            Box::new(MemoryStore::new())
        } else {
            Box::new(SqliteStore::open(&config.resolved_store_path())?)
        };
        SyncClient::spawn(
            config,
            WebSocketTransport::new(),
            store,
            Arc::new(TokioScheduler),
        )
    }
}

/// Parses a JSON payload argument.
pub fn parse_payload(raw: &str) -> Result<Value> {
    serde_json::from_str(raw).map_err(|e| Error::Core(e.into()))
}

/// Runs a parsed command.
pub async fn run(command: Command) -> Result<()> {
    match command {
        Command::Watch { conn, events } => watch(&conn, &events).await,
        Command::Send {
            conn,
            event,
            payload,
        } => send(&conn, &event, &payload).await,
        Command::Config { conn } => {
            print!("{}", conn.load()?.to_toml_string()?);
            Ok(())
        }
    }
}

async fn watch(conn: &ConnectionArgs, events: &[String]) -> Result<()> {
    let config = conn.load()?;
    let (client, task) = conn.start(config)?;

    for event in events {
        client.on(event, |envelope| {
            println!("{}", envelope.to_json()?);
            Ok(())
        })?;
    }

    let mut notes = client.notifications();
    tokio::spawn(async move {
        while let Ok(note) = notes.recv().await {
            info!(?note, "connection");
        }
    });

    if let Err(e) = client.connect().await {
        warn!(error = %e, "initial connection failed, retrying");
    }

    let outcome = tokio::select! {
        _ = tokio::signal::ctrl_c() => Ok(()),
        reached = client.wait_for_state(ConnectionState::Failed) => reached.and(Err(
            Error::Transport(TransportError::ConnectionFailed(
                "reconnect attempts exhausted".to_string(),
            )),
        )),
    };

    client.shutdown().await?;
    task.await.ok();
    outcome
}

async fn send(conn: &ConnectionArgs, event: &str, raw_payload: &str) -> Result<()> {
    let payload = parse_payload(raw_payload)?;
    let config = conn.load()?;
    let (client, task) = conn.start(config)?;

    // Queued first so the connect flush delivers it
    client.emit(event, payload).await?;
    if let Err(e) = client.connect().await {
        warn!(error = %e, "initial connection failed, retrying");
    }

    let mut states = client.state_watch();
    let reached = states
        .wait_for(|s| matches!(s, ConnectionState::Connected | ConnectionState::Failed))
        .await
        .map(|s| *s)
        .map_err(|_| Error::ClientClosed)?;

    let pending = client.queue_len().await?;
    client.shutdown().await?;
    task.await.ok();

    match (reached, pending) {
        (ConnectionState::Connected, 0) => {
            println!("{}", delivery_label(Delivery::Sent));
            Ok(())
        }
        _ if conn.no_persist => Err(Error::Transport(TransportError::ConnectionFailed(
            format!("{pending} message(s) undelivered"),
        ))),
        _ => {
            println!("{} ({pending} pending)", delivery_label(Delivery::Queued));
            Ok(())
        }
    }
}

fn delivery_label(delivery: Delivery) -> &'static str {
    match delivery {
        Delivery::Sent => "sent",
        Delivery::Queued => "queued",
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
