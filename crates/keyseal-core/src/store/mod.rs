//! Session persistence abstraction.
//!
//! Trait-based abstraction over session storage with two backends: an
//! in-memory map for single-process deployments and a durable redb store
//! whose counter and watermark operations are transactional, so multiple
//! server processes sharing the database stay correct under concurrency.
//!
//! The trait is synchronous (no async) to keep protocol logic free of a
//! runtime dependency; async callers wrap operations as needed.

mod memory;
mod redb;

use thiserror::Error;
use uuid::Uuid;

pub use self::{memory::MemorySessionStore, redb::RedbSessionStore};
use crate::session::Session;

/// Errors from session storage operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The session is absent or expired. The caller must re-handshake.
    #[error("session not found")]
    SessionNotFound,

    /// A compare-and-swap on the replay watermark lost: the sequence
    /// number is not greater than the stored watermark.
    #[error("sequence {seq} not greater than watermark {watermark}")]
    ReplayConflict {
        /// Sequence number that was offered.
        seq: u64,
        /// Watermark already persisted.
        watermark: u64,
    },

    /// Underlying storage access failed. May be transient.
    #[error("storage I/O error: {0}")]
    Io(String),

    /// A stored record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Storage abstraction owning session lifetime.
///
/// Must be `Clone` (handed to multiple protocol entry points), `Send +
/// Sync` (thread-safe), and synchronous. Implementations share internal
/// state via `Arc`, so clones observe the same sessions.
///
/// Expiry is the store's responsibility: an expired session reads as
/// absent everywhere, and no operation ever exposes a partially-populated
/// record.
pub trait SessionStore: Clone + Send + Sync + 'static {
    /// Load a session snapshot.
    ///
    /// Returns `None` for unknown or expired sessions; expired records are
    /// evicted lazily. Backends with a separate counter key re-sync
    /// `request_count` so the snapshot carries the latest cross-process
    /// count even when the record itself is stale.
    fn get(&self, id: &Uuid) -> Result<Option<Session>, StoreError>;

    /// Insert or replace a session, refreshing its TTL.
    ///
    /// An existing request counter and replay watermark survive the write;
    /// `put` never winds either back.
    fn put(&self, session: &Session) -> Result<(), StoreError>;

    /// Delete a session and its counter. Idempotent.
    fn delete(&self, id: &Uuid) -> Result<(), StoreError>;

    /// Atomically increment the session's request counter.
    ///
    /// Returns the new count. MUST be a true atomic increment, not a
    /// read-modify-write, so concurrent requests for one session across
    /// processes never lose updates.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SessionNotFound`] if the session is absent or
    /// expired.
    fn increment_request_count(&self, id: &Uuid) -> Result<u64, StoreError>;

    /// Atomically advance the replay watermark to `seq`.
    ///
    /// Compare-and-swap: succeeds only when `seq` is strictly greater than
    /// the stored `last_seq`. Two concurrent accepts of the same sequence
    /// number cannot both succeed.
    ///
    /// # Errors
    ///
    /// - [`StoreError::SessionNotFound`] if the session is absent/expired
    /// - [`StoreError::ReplayConflict`] if `seq` is not greater than the
    ///   stored watermark
    fn advance_last_seq(&self, id: &Uuid, seq: u64) -> Result<(), StoreError>;
}
