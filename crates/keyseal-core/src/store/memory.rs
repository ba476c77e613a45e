#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

//! In-memory session store for single-process deployments.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use uuid::Uuid;

use super::{SessionStore, StoreError};
use crate::{clock::unix_millis_now, session::Session};

struct StoredEntry {
    session: Session,
    expires_at_ms: u64,
}

/// In-memory session store backed by a keyed map.
///
/// Expired entries are evicted lazily on `get` and in bulk by [`sweep`]
/// (or the background task spawned by [`spawn_sweeper`]). Atomicity of the
/// counter and watermark operations comes from the single process-wide
/// mutex - this backend is NOT correct across multiple OS processes.
///
/// [`sweep`]: MemorySessionStore::sweep
/// [`spawn_sweeper`]: MemorySessionStore::spawn_sweeper
///
/// # Panics
///
/// Operations panic if the internal mutex is poisoned (a thread panicked
/// while holding the lock).
#[derive(Clone)]
pub struct MemorySessionStore {
    inner: Arc<Mutex<HashMap<Uuid, StoredEntry>>>,
    ttl_ms: u64,
}

impl MemorySessionStore {
    /// Create an empty store whose sessions expire after `ttl_ms`.
    #[must_use]
    pub fn new(ttl_ms: u64) -> Self {
        Self { inner: Arc::new(Mutex::new(HashMap::new())), ttl_ms }
    }

    /// Number of live (stored, possibly expired-but-unswept) sessions.
    #[allow(clippy::expect_used)]
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.inner.lock().expect("Mutex poisoned").len()
    }

    /// Evict every expired session, returning the eviction count.
    #[allow(clippy::expect_used)]
    pub fn sweep(&self) -> usize {
        let now_ms = unix_millis_now();
        let mut inner = self.inner.lock().expect("Mutex poisoned");

        let before = inner.len();
        inner.retain(|_, entry| now_ms < entry.expires_at_ms);
        let evicted = before - inner.len();

        if evicted > 0 {
            tracing::debug!(evicted, "swept expired sessions");
        }

        evicted
    }

    /// Spawn a background task sweeping expired sessions every `period`.
    ///
    /// The task runs until the returned handle is aborted or the runtime
    /// shuts down.
    pub fn spawn_sweeper(&self, period: Duration) -> tokio::task::JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // First tick completes immediately; skip it so the sweep cadence
            // starts one period from now.
            interval.tick().await;
            loop {
                interval.tick().await;
                store.sweep();
            }
        })
    }
}

impl SessionStore for MemorySessionStore {
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    fn get(&self, id: &Uuid) -> Result<Option<Session>, StoreError> {
        let now_ms = unix_millis_now();
        let mut inner = self.inner.lock().expect("Mutex poisoned");

        match inner.get(id) {
            Some(entry) if now_ms >= entry.expires_at_ms => {
                // Lazy eviction: expired reads as absent and is removed.
                inner.remove(id);
                Ok(None)
            },
            Some(entry) => Ok(Some(entry.session.clone())),
            None => Ok(None),
        }
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    fn put(&self, session: &Session) -> Result<(), StoreError> {
        let expires_at_ms = unix_millis_now() + self.ttl_ms;
        let mut inner = self.inner.lock().expect("Mutex poisoned");

        let mut record = session.clone();
        // Preserve a concurrently-advanced counter: put never winds back.
        if let Some(existing) = inner.get(&session.session_id) {
            record.request_count = record.request_count.max(existing.session.request_count);
            record.last_seq = record.last_seq.max(existing.session.last_seq);
        }

        inner.insert(session.session_id, StoredEntry { session: record, expires_at_ms });

        Ok(())
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    fn delete(&self, id: &Uuid) -> Result<(), StoreError> {
        // Dropping the entry zeroizes its key material.
        self.inner.lock().expect("Mutex poisoned").remove(id);
        Ok(())
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    fn increment_request_count(&self, id: &Uuid) -> Result<u64, StoreError> {
        let now_ms = unix_millis_now();
        let mut inner = self.inner.lock().expect("Mutex poisoned");

        let Some(entry) = inner.get_mut(id) else {
            return Err(StoreError::SessionNotFound);
        };
        if now_ms >= entry.expires_at_ms {
            inner.remove(id);
            return Err(StoreError::SessionNotFound);
        }

        entry.session.request_count += 1;
        Ok(entry.session.request_count)
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    fn advance_last_seq(&self, id: &Uuid, seq: u64) -> Result<(), StoreError> {
        let now_ms = unix_millis_now();
        let mut inner = self.inner.lock().expect("Mutex poisoned");

        let Some(entry) = inner.get_mut(id) else {
            return Err(StoreError::SessionNotFound);
        };
        if now_ms >= entry.expires_at_ms {
            inner.remove(id);
            return Err(StoreError::SessionNotFound);
        }

        if seq <= entry.session.last_seq {
            return Err(StoreError::ReplayConflict { seq, watermark: entry.session.last_seq });
        }

        entry.session.last_seq = seq;
        Ok(())
    }
}
