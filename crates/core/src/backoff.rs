// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Reconnect delay computation.
//!
//! Attempt `n` (0-indexed) waits `min(base * 2^n, max)` when exponential,
//! otherwise `base`, plus a random jitter in `[0, max_jitter)` so many
//! clients sharing a backend do not reconnect in lockstep.

use std::time::Duration;

use rand::Rng;

use crate::config::ClientConfig;

/// Default upper bound (exclusive) of the random jitter.
pub const DEFAULT_MAX_JITTER: Duration = Duration::from_millis(1000);

/// Backoff parameters for reconnection attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Ceiling for the exponential part.
    pub max_delay: Duration,
    /// Double the delay on each attempt when true.
    pub exponential: bool,
    /// Exclusive upper bound of the added jitter.
    pub max_jitter: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy {
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            exponential: true,
            max_jitter: DEFAULT_MAX_JITTER,
        }
    }
}

impl BackoffPolicy {
    /// Builds the policy described by a client configuration.
    pub fn from_config(config: &ClientConfig) -> Self {
        BackoffPolicy {
            base_delay: Duration::from_millis(config.reconnect_interval_ms),
            max_delay: Duration::from_millis(config.max_reconnect_delay_ms),
            exponential: config.exponential_backoff,
            max_jitter: Duration::from_millis(config.reconnect_jitter_ms),
        }
    }

    /// Deterministic delay for attempt `n`, without jitter.
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        if !self.exponential {
            return self.base_delay;
        }
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Delay for attempt `n` with the given jitter, clamped below `max_jitter`.
    pub fn delay_with_jitter(&self, attempt: u32, jitter: Duration) -> Duration {
        let jitter = if self.max_jitter.is_zero() {
            Duration::ZERO
        } else {
            jitter.min(self.max_jitter - Duration::from_nanos(1))
        };
        self.base_delay_for(attempt).saturating_add(jitter)
    }

    /// Delay for attempt `n` with a freshly drawn random jitter.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.delay_with_jitter(attempt, self.random_jitter())
    }

    /// Upper bound on any delay this policy can produce.
    pub fn ceiling(&self) -> Duration {
        let longest = if self.exponential {
            self.max_delay.max(self.base_delay)
        } else {
            self.base_delay
        };
        longest.saturating_add(self.max_jitter)
    }

    fn random_jitter(&self) -> Duration {
        let bound = self.max_jitter.as_millis() as u64;
        if bound == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..bound))
    }
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod tests;
