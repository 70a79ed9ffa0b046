// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Liveness tracking for an open connection.
//!
//! The monitor only does bookkeeping. The connection manager arms the ping
//! and health-check timers and asks the monitor whether the link has gone
//! silent for too long.

use std::time::Duration;

use tokio::time::Instant;

/// Tracks the time of the last inbound frame.
#[derive(Debug, Clone)]
pub struct HeartbeatMonitor {
    health_check_interval: Duration,
    last_ack: Option<Instant>,
}

impl HeartbeatMonitor {
    pub fn new(health_check_interval: Duration) -> Self {
        HeartbeatMonitor {
            health_check_interval,
            last_ack: None,
        }
    }

    /// Starts monitoring, counting from `now`.
    pub fn reset(&mut self, now: Instant) {
        self.last_ack = Some(now);
    }

    /// Records evidence that the peer is alive.
    ///
    /// Ignored while stopped so a late frame cannot revive a closed link.
    pub fn record_ack(&mut self, now: Instant) {
        if self.last_ack.is_some() {
            self.last_ack = Some(now);
        }
    }

    /// Stops monitoring. A stopped monitor is never stale.
    pub fn stop(&mut self) {
        self.last_ack = None;
    }

    /// Returns true while monitoring.
    pub fn is_running(&self) -> bool {
        self.last_ack.is_some()
    }

    /// Time since the last ack, or `None` when stopped.
    pub fn silence(&self, now: Instant) -> Option<Duration> {
        self.last_ack
            .map(|last| now.saturating_duration_since(last))
    }

    /// Returns true once silence exceeds twice the health-check interval.
    pub fn is_stale(&self, now: Instant) -> bool {
        self.silence(now)
            .is_some_and(|silence| silence > self.health_check_interval.saturating_mul(2))
    }
}

#[cfg(test)]
#[path = "heartbeat_tests.rs"]
mod tests;
