// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Event dispatch to registered handlers.
//!
//! Handlers for an event form a set keyed by `Arc` identity: subscribing the
//! same handler twice is a no-op. A handler that returns an error or panics
//! is isolated; the remaining handlers still run.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

use tether_core::protocol::ensure_not_reserved;
use tether_core::Envelope;
use tracing::warn;

/// Error returned by a handler.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// A shared event handler.
pub type Handler = Arc<dyn Fn(&Envelope) -> Result<(), HandlerError> + Send + Sync>;

/// Wraps a closure as a [`Handler`].
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&Envelope) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn same_handler(a: &Handler, b: &Handler) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// Result of dispatching one envelope.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    /// Number of handlers invoked.
    pub invoked: usize,
    /// Index and message of each handler that failed.
    pub failures: Vec<(usize, String)>,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Registry of handlers keyed by event name.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: RwLock<HashMap<String, Vec<Handler>>>,
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let events: Vec<String> = match self.handlers.read() {
            Ok(map) => map.keys().cloned().collect(),
            Err(_) => Vec::new(),
        };
        f.debug_struct("EventDispatcher")
            .field("events", &events)
            .finish()
    }
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for `event`.
    ///
    /// Returns `Ok(false)` if the handler was already registered.
    ///
    /// # Errors
    ///
    /// Returns [`tether_core::Error::ReservedEvent`] for heartbeat event names.
    pub fn subscribe(&self, event: &str, handler: &Handler) -> tether_core::Result<bool> {
        ensure_not_reserved(event)?;
        let mut map = self
            .handlers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let entry = map.entry(event.to_string()).or_default();
        if entry.iter().any(|h| same_handler(h, handler)) {
            return Ok(false);
        }
        entry.push(Arc::clone(handler));
        Ok(true)
    }

    /// Removes one handler, or every handler when `handler` is `None`.
    ///
    /// Returns the number of handlers removed.
    pub fn unsubscribe(&self, event: &str, handler: Option<&Handler>) -> usize {
        let mut map = self
            .handlers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(entry) = map.get_mut(event) else {
            return 0;
        };
        let before = entry.len();
        match handler {
            Some(target) => entry.retain(|h| !same_handler(h, target)),
            None => entry.clear(),
        }
        let removed = before - entry.len();
        if entry.is_empty() {
            map.remove(event);
        }
        removed
    }

    /// Number of handlers registered for `event`.
    pub fn handler_count(&self, event: &str) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(event)
            .map_or(0, Vec::len)
    }

    /// Invokes every handler for the envelope's event, in registration order.
    pub fn dispatch(&self, envelope: &Envelope) -> DispatchReport {
        // Snapshot so handlers can (un)subscribe without deadlocking
        let handlers: Vec<Handler> = self
            .handlers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&envelope.event)
            .cloned()
            .unwrap_or_default();

        let mut report = DispatchReport::default();
        for (index, h) in handlers.iter().enumerate() {
            report.invoked += 1;
            let outcome = catch_unwind(AssertUnwindSafe(|| h(envelope)));
            let message = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(panic) => panic_message(panic.as_ref()),
            };
            warn!(event = %envelope.event, index, error = %message, "event handler failed");
            report.failures.push((index, message));
        }
        report
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("handler panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("handler panicked: {s}")
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
