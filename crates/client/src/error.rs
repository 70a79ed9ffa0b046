// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

use crate::sync::{QueueError, StoreError, TransportError};

/// All possible errors that can occur in the tether client.
#[derive(Debug, Error)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Core(#[from] tether_core::Error),

    #[error("sync client has shut down")]
    ClientClosed,
}

/// Result type for tether client operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
