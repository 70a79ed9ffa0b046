// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! tether-core: Shared primitives for the tether sync client.
//!
//! This crate provides the wire envelope, the queued-message record, the
//! reconnect backoff policy and the client configuration. It carries no
//! async runtime so both the client and the relay can depend on it.

pub mod backoff;
pub mod config;
pub mod error;
pub mod message;
pub mod protocol;

pub use backoff::BackoffPolicy;
pub use config::{ClientConfig, OverflowPolicy};
pub use error::{Error, Result};
pub use message::QueuedMessage;
pub use protocol::{Envelope, PING_EVENT, PONG_EVENT};
