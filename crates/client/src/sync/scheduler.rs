// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Injectable timers.
//!
//! Reconnect delays, heartbeat probes, health checks and queue snapshots all
//! go through a [`Scheduler`]. Production code uses [`TokioScheduler`];
//! tests substitute [`ManualScheduler`], a virtual clock advanced by hand.
//!
//! Callbacks run outside the connection manager. They only post an event
//! back to its loop, so every state transition stays on that loop.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// One-shot timer callback.
pub type OnceTask = Box<dyn FnOnce() + Send>;

/// Periodic timer callback.
pub type RepeatTask = Box<dyn FnMut() + Send>;

/// Smallest period accepted by [`Scheduler::every`].
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Cancels its timer when cancelled explicitly or dropped.
#[derive(Debug)]
pub struct TimerHandle {
    token: CancellationToken,
}

impl TimerHandle {
    fn new(token: CancellationToken) -> Self {
        TimerHandle { token }
    }

    /// Stops the timer. A callback already running is not interrupted.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns true once the timer has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Source of time and timers.
pub trait Scheduler: Send + Sync {
    /// Current instant on this scheduler's clock.
    fn now(&self) -> Instant;

    /// Runs `task` once after `delay`.
    fn after(&self, delay: Duration, task: OnceTask) -> TimerHandle;

    /// Runs `task` every `period`, first after one full period.
    fn every(&self, period: Duration, task: RepeatTask) -> TimerHandle;
}

/// Scheduler backed by tokio timers.
///
/// Each timer is a spawned task, so this must be used from within a tokio
/// runtime. Honors tokio's paused clock in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn after(&self, delay: Duration, task: OnceTask) -> TimerHandle {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancelled.cancelled() => {}
                _ = tokio::time::sleep(delay) => task(),
            }
        });
        TimerHandle::new(token)
    }

    fn every(&self, period: Duration, mut task: RepeatTask) -> TimerHandle {
        let period = period.max(MIN_PERIOD);
        let token = CancellationToken::new();
        let cancelled = token.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    _ = interval.tick() => task(),
                }
            }
        });
        TimerHandle::new(token)
    }
}

enum ManualTask {
    Once(OnceTask),
    Repeat(RepeatTask, Duration),
}

struct ManualTimer {
    seq: u64,
    due: Duration,
    token: CancellationToken,
    task: ManualTask,
}

#[derive(Default)]
struct ManualState {
    elapsed: Duration,
    next_seq: u64,
    timers: Vec<ManualTimer>,
}

/// Virtual clock for deterministic tests.
///
/// Time only moves when [`advance`](ManualScheduler::advance) is called.
/// Due timers fire in due order (ties in creation order); periodic timers
/// re-arm themselves until cancelled.
pub struct ManualScheduler {
    origin: Instant,
    state: Mutex<ManualState>,
}

impl ManualScheduler {
    /// Creates a virtual clock starting at the current instant.
    pub fn new() -> Self {
        ManualScheduler {
            origin: Instant::now(),
            state: Mutex::new(ManualState::default()),
        }
    }

    /// Time elapsed on the virtual clock.
    pub fn elapsed(&self) -> Duration {
        self.lock().elapsed
    }

    /// Number of live (uncancelled) timers.
    pub fn pending(&self) -> usize {
        self.lock()
            .timers
            .iter()
            .filter(|t| !t.token.is_cancelled())
            .count()
    }

    /// Moves the clock forward by `by`, firing every timer that comes due.
    pub fn advance(&self, by: Duration) {
        let target = self.lock().elapsed.saturating_add(by);

        while let Some(timer) = self.take_next_due(target) {
            match timer.task {
                ManualTask::Once(task) => task(),
                ManualTask::Repeat(mut task, period) => {
                    task();
                    if !timer.token.is_cancelled() {
                        let mut state = self.lock();
                        state.timers.push(ManualTimer {
                            seq: timer.seq,
                            due: timer.due.saturating_add(period),
                            token: timer.token,
                            task: ManualTask::Repeat(task, period),
                        });
                    }
                }
            }
        }

        self.lock().elapsed = target;
    }

    fn take_next_due(&self, target: Duration) -> Option<ManualTimer> {
        let mut state = self.lock();
        state.timers.retain(|t| !t.token.is_cancelled());
        let index = state
            .timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due <= target)
            .min_by_key(|(_, t)| (t.due, t.seq))
            .map(|(i, _)| i)?;
        let timer = state.timers.swap_remove(index);
        state.elapsed = state.elapsed.max(timer.due);
        Some(timer)
    }

    fn schedule(&self, delay: Duration, task: ManualTask) -> TimerHandle {
        let token = CancellationToken::new();
        let mut state = self.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        let due = state.elapsed.saturating_add(delay);
        state.timers.push(ManualTimer {
            seq,
            due,
            token: token.clone(),
            task,
        });
        TimerHandle::new(token)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ManualScheduler {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn after(&self, delay: Duration, task: OnceTask) -> TimerHandle {
        self.schedule(delay, ManualTask::Once(task))
    }

    fn every(&self, period: Duration, task: RepeatTask) -> TimerHandle {
        let period = period.max(MIN_PERIOD);
        self.schedule(period, ManualTask::Repeat(task, period))
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
