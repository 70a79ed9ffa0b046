// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! tether-relay: WebSocket relay for tether sync clients.
//!
//! Every envelope a client sends is forwarded to every other connected
//! client. Heartbeat probes are answered directly.

mod server;
#[cfg(test)]
mod server_tests;
mod state;

use clap::Parser;
use std::net::SocketAddr;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// tether-relay: fan-out relay for tether sync clients
#[derive(Parser, Debug)]
#[command(name = "tether-relay")]
#[command(about = "WebSocket relay that fans events out to connected tether clients")]
struct Args {
    /// Address to bind the server to
    #[arg(short, long, default_value = "0.0.0.0:7890")]
    bind: SocketAddr,

    /// Envelopes buffered per client before a slow client misses messages
    #[arg(long, default_value = "1024")]
    buffer: usize,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting tether-relay");
    info!("  Bind address: {}", args.bind);
    info!("  Buffer: {}", args.buffer);

    let state = state::RelayState::new(args.buffer);

    tokio::select! {
        result = server::run(args.bind, state) => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }

    Ok(())
}
