// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Optimistic update coordination.
//!
//! An update applies a local mutation immediately, then awaits the server
//! round-trip. Success keeps the mutation; failure runs the matching
//! rollback. Updates sharing a resource key run one at a time, while updates
//! on different keys interleave freely.
//!
//! If the caller drops the future after `apply` has run but before the
//! commit resolves, the rollback still runs. Local state therefore never
//! keeps a mutation the server did not confirm.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

/// Finished updates kept for `status` lookups.
const HISTORY_LIMIT: usize = 256;

/// Identifier assigned to each optimistic update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UpdateId(u64);

impl UpdateId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for UpdateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of an optimistic update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    /// Applied locally, awaiting commit.
    Pending,
    /// Confirmed by the server.
    Committed,
    /// Commit failed or was abandoned; local state restored.
    RolledBack,
}

/// A rejected commit. The rollback has already run.
#[derive(Debug)]
pub struct CommitFailure<E> {
    pub id: UpdateId,
    pub resource_key: String,
    pub source: E,
}

impl<E: fmt::Display> fmt::Display for CommitFailure<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "update {} on '{}' rolled back: {}",
            self.id, self.resource_key, self.source
        )
    }
}

impl<E: std::error::Error + 'static> std::error::Error for CommitFailure<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

#[derive(Default)]
struct Statuses {
    by_id: HashMap<UpdateId, UpdateStatus>,
    finished: VecDeque<UpdateId>,
}

#[derive(Default)]
struct Inner {
    next_id: AtomicU64,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    statuses: Mutex<Statuses>,
}

impl Inner {
    fn begin(&self) -> UpdateId {
        let id = UpdateId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.statuses
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .by_id
            .insert(id, UpdateStatus::Pending);
        id
    }

    fn finish(&self, id: UpdateId, status: UpdateStatus) {
        let mut statuses = self.statuses.lock().unwrap_or_else(|p| p.into_inner());
        statuses.by_id.insert(id, status);
        statuses.finished.push_back(id);
        while statuses.finished.len() > HISTORY_LIMIT {
            if let Some(old) = statuses.finished.pop_front() {
                statuses.by_id.remove(&old);
            }
        }
    }
}

/// Holds a key's lock entry alive; prunes it when the last holder leaves.
struct KeyLease {
    inner: Arc<Inner>,
    key: String,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for KeyLease {
    fn drop(&mut self) {
        let mut locks = self.inner.locks.lock().unwrap_or_else(|p| p.into_inner());
        // One reference in the map, one in this lease
        if Arc::strong_count(&self.lock) <= 2 {
            locks.remove(&self.key);
        }
    }
}

/// Runs the rollback if dropped while still armed.
struct RollbackGuard<R: FnOnce()> {
    inner: Arc<Inner>,
    id: UpdateId,
    rollback: Option<R>,
}

impl<R: FnOnce()> RollbackGuard<R> {
    fn commit(mut self) {
        self.rollback = None;
        self.inner.finish(self.id, UpdateStatus::Committed);
    }

    fn roll_back(mut self) {
        self.fire();
    }

    fn fire(&mut self) {
        if let Some(rollback) = self.rollback.take() {
            rollback();
            self.inner.finish(self.id, UpdateStatus::RolledBack);
        }
    }
}

impl<R: FnOnce()> Drop for RollbackGuard<R> {
    fn drop(&mut self) {
        if self.rollback.is_some() {
            warn!(id = %self.id, "optimistic update abandoned, rolling back");
            self.fire();
        }
    }
}

/// Coordinates speculative local mutations against server confirmation.
#[derive(Clone, Default)]
pub struct OptimisticCoordinator {
    inner: Arc<Inner>,
}

impl fmt::Debug for OptimisticCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptimisticCoordinator")
            .field("active_keys", &self.active_keys())
            .finish()
    }
}

impl OptimisticCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a local mutation, then commits it or rolls it back.
    ///
    /// `apply` runs once the key is free. `commit` is called after `apply`
    /// and its future is awaited. On `Err` the `rollback` closure runs before
    /// this returns. Updates are never retried.
    ///
    /// # Errors
    ///
    /// Returns [`CommitFailure`] carrying the commit's error.
    pub async fn run<A, C, Fut, R, T, E>(
        &self,
        resource_key: &str,
        apply: A,
        commit: C,
        rollback: R,
    ) -> Result<T, CommitFailure<E>>
    where
        A: FnOnce(),
        C: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: FnOnce(),
    {
        let lease = self.lease(resource_key);
        let _permit = Arc::clone(&lease.lock).lock_owned().await;

        let id = self.inner.begin();
        debug!(%id, key = resource_key, "applying optimistic update");
        apply();

        let guard = RollbackGuard {
            inner: Arc::clone(&self.inner),
            id,
            rollback: Some(rollback),
        };

        match commit().await {
            Ok(value) => {
                guard.commit();
                debug!(%id, key = resource_key, "optimistic update committed");
                Ok(value)
            }
            Err(source) => {
                guard.roll_back();
                warn!(%id, key = resource_key, "optimistic update rolled back");
                Err(CommitFailure {
                    id,
                    resource_key: resource_key.to_string(),
                    source,
                })
            }
        }
    }

    /// Status of a recent update. Old finished updates are forgotten.
    pub fn status(&self, id: UpdateId) -> Option<UpdateStatus> {
        self.inner
            .statuses
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .by_id
            .get(&id)
            .copied()
    }

    /// Number of updates applied but not yet resolved.
    pub fn pending_count(&self) -> usize {
        self.inner
            .statuses
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .by_id
            .values()
            .filter(|s| **s == UpdateStatus::Pending)
            .count()
    }

    /// Number of resource keys with a running or waiting update.
    pub fn active_keys(&self) -> usize {
        self.inner
            .locks
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .len()
    }

    fn lease(&self, key: &str) -> KeyLease {
        let mut locks = self.inner.locks.lock().unwrap_or_else(|p| p.into_inner());
        let lock = Arc::clone(locks.entry(key.to_string()).or_default());
        KeyLease {
            inner: Arc::clone(&self.inner),
            key: key.to_string(),
            lock,
        }
    }
}

#[cfg(test)]
#[path = "optimistic_tests.rs"]
mod tests;
