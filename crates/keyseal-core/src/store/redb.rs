//! Redb-backed durable session store.
//!
//! Two keys per session, mirroring the wire contract: a primary record
//! (JSON session snapshot with base64url key material) and a separate
//! counter entry backing the atomic request count. Both carry the same
//! expiry stamp and are deleted together. Counter increments and replay
//! watermark advancement each run inside a single write transaction, so
//! they stay correct when several server processes share the database.

use std::{path::Path, sync::Arc};

use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{SessionStore, StoreError};
use crate::{clock::unix_millis_now, session::Session};

/// Table: sessions
/// Key: session UUID bytes [16 bytes]
/// Value: JSON-encoded `StoredRecord`
const SESSIONS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("sessions");

/// Table: counters
/// Key: session UUID bytes [16 bytes]
/// Value: `[expires_at_ms: 8 bytes BE][count: 8 bytes BE]`
const COUNTERS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("counters");

/// Primary session record as persisted.
#[derive(Serialize, Deserialize)]
struct StoredRecord {
    expires_at_ms: u64,
    session: Session,
}

/// Durable session store backed by redb.
///
/// Thread-safe through redb's internal locking. Clone is cheap (`Arc`).
#[derive(Clone)]
pub struct RedbSessionStore {
    db: Arc<Database>,
    ttl_ms: u64,
}

impl RedbSessionStore {
    /// Open or create a redb database at the given path.
    ///
    /// Creates the SESSIONS and COUNTERS tables if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` if the database cannot be opened or created.
    pub fn open(path: impl AsRef<Path>, ttl_ms: u64) -> Result<Self, StoreError> {
        let db = Database::create(path.as_ref()).map_err(io_err)?;

        let txn = db.begin_write().map_err(io_err)?;
        {
            let _ = txn.open_table(SESSIONS).map_err(io_err)?;
            let _ = txn.open_table(COUNTERS).map_err(io_err)?;
        }
        txn.commit().map_err(io_err)?;

        Ok(Self { db: Arc::new(db), ttl_ms })
    }

    /// Remove both keys for an expired or deleted session.
    fn remove_both(&self, id: &Uuid) -> Result<(), StoreError> {
        let txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut sessions = txn.open_table(SESSIONS).map_err(io_err)?;
            let mut counters = txn.open_table(COUNTERS).map_err(io_err)?;
            let _ = sessions.remove(id.as_bytes().as_slice()).map_err(io_err)?;
            let _ = counters.remove(id.as_bytes().as_slice()).map_err(io_err)?;
        }
        txn.commit().map_err(io_err)?;
        Ok(())
    }
}

impl SessionStore for RedbSessionStore {
    fn get(&self, id: &Uuid) -> Result<Option<Session>, StoreError> {
        let now_ms = unix_millis_now();

        let record = {
            let txn = self.db.begin_read().map_err(io_err)?;
            let sessions = txn.open_table(SESSIONS).map_err(io_err)?;

            let Some(value) = sessions.get(id.as_bytes().as_slice()).map_err(io_err)? else {
                return Ok(None);
            };

            let mut record: StoredRecord = serde_json::from_slice(value.value())
                .map_err(|e| StoreError::Serialization(e.to_string()))?;

            if now_ms < record.expires_at_ms {
                // Re-sync the request count from the counter key: the
                // snapshot may be stale relative to concurrent increments.
                let counters = txn.open_table(COUNTERS).map_err(io_err)?;
                if let Some(counter) = counters.get(id.as_bytes().as_slice()).map_err(io_err)? {
                    let (_, count) = decode_counter(counter.value())?;
                    record.session.request_count = record.session.request_count.max(count);
                }
            }

            record
        };

        if now_ms >= record.expires_at_ms {
            // Lazy eviction outside the read transaction.
            self.remove_both(id)?;
            return Ok(None);
        }

        Ok(Some(record.session))
    }

    fn put(&self, session: &Session) -> Result<(), StoreError> {
        let expires_at_ms = unix_millis_now() + self.ttl_ms;

        let txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut sessions = txn.open_table(SESSIONS).map_err(io_err)?;
            let mut counters = txn.open_table(COUNTERS).map_err(io_err)?;

            // Keep an existing counter's value: put refreshes its TTL but
            // never winds the count back past concurrent increments.
            let existing_count =
                match counters.get(session.session_id.as_bytes().as_slice()).map_err(io_err)? {
                    Some(value) => Some(decode_counter(value.value())?.1),
                    None => None,
                };
            let count = existing_count.map_or(session.request_count, |existing| {
                existing.max(session.request_count)
            });

            // Same for the replay watermark: a stale snapshot (a rotation
            // racing an acceptance) must not wind last_seq back.
            let existing_last_seq =
                match sessions.get(session.session_id.as_bytes().as_slice()).map_err(io_err)? {
                    Some(value) => Some(
                        serde_json::from_slice::<StoredRecord>(value.value())
                            .map_err(|e| StoreError::Serialization(e.to_string()))?
                            .session
                            .last_seq,
                    ),
                    None => None,
                };

            let mut record =
                StoredRecord { expires_at_ms, session: session.clone() };
            record.session.request_count = count;
            if let Some(last_seq) = existing_last_seq {
                record.session.last_seq = record.session.last_seq.max(last_seq);
            }

            let bytes = serde_json::to_vec(&record)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;

            let _ = sessions
                .insert(session.session_id.as_bytes().as_slice(), bytes.as_slice())
                .map_err(io_err)?;
            let _ = counters
                .insert(
                    session.session_id.as_bytes().as_slice(),
                    encode_counter(expires_at_ms, count).as_slice(),
                )
                .map_err(io_err)?;
        }
        txn.commit().map_err(io_err)?;

        Ok(())
    }

    fn delete(&self, id: &Uuid) -> Result<(), StoreError> {
        self.remove_both(id)
    }

    fn increment_request_count(&self, id: &Uuid) -> Result<u64, StoreError> {
        let now_ms = unix_millis_now();

        let txn = self.db.begin_write().map_err(io_err)?;
        let new_count = {
            let mut counters = txn.open_table(COUNTERS).map_err(io_err)?;

            let (expires_at_ms, count) =
                match counters.get(id.as_bytes().as_slice()).map_err(io_err)? {
                    Some(value) => decode_counter(value.value())?,
                    None => return Err(StoreError::SessionNotFound),
                };

            if now_ms >= expires_at_ms {
                return Err(StoreError::SessionNotFound);
            }

            let new_count = count + 1;
            let _ = counters
                .insert(
                    id.as_bytes().as_slice(),
                    encode_counter(expires_at_ms, new_count).as_slice(),
                )
                .map_err(io_err)?;
            new_count
        };
        txn.commit().map_err(io_err)?;

        Ok(new_count)
    }

    fn advance_last_seq(&self, id: &Uuid, seq: u64) -> Result<(), StoreError> {
        let now_ms = unix_millis_now();

        let txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut sessions = txn.open_table(SESSIONS).map_err(io_err)?;

            let mut record = match sessions.get(id.as_bytes().as_slice()).map_err(io_err)? {
                Some(value) => serde_json::from_slice::<StoredRecord>(value.value())
                    .map_err(|e| StoreError::Serialization(e.to_string()))?,
                None => return Err(StoreError::SessionNotFound),
            };

            if now_ms >= record.expires_at_ms {
                return Err(StoreError::SessionNotFound);
            }

            if seq <= record.session.last_seq {
                return Err(StoreError::ReplayConflict {
                    seq,
                    watermark: record.session.last_seq,
                });
            }

            record.session.last_seq = seq;
            let bytes = serde_json::to_vec(&record)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            let _ = sessions.insert(id.as_bytes().as_slice(), bytes.as_slice()).map_err(io_err)?;
        }
        txn.commit().map_err(io_err)?;

        Ok(())
    }
}

fn io_err(err: impl std::fmt::Display) -> StoreError {
    StoreError::Io(err.to_string())
}

/// Encode a counter entry: `[expires_at_ms BE][count BE]`.
fn encode_counter(expires_at_ms: u64, count: u64) -> [u8; 16] {
    let mut value = [0u8; 16];
    value[..8].copy_from_slice(&expires_at_ms.to_be_bytes());
    value[8..].copy_from_slice(&count.to_be_bytes());
    value
}

/// Decode a counter entry back to `(expires_at_ms, count)`.
fn decode_counter(value: &[u8]) -> Result<(u64, u64), StoreError> {
    if value.len() != 16 {
        return Err(StoreError::Serialization(format!(
            "counter value must be 16 bytes, got {}",
            value.len()
        )));
    }
    let expires_at_ms = u64::from_be_bytes(value[..8].try_into().map_err(|_| {
        StoreError::Serialization("counter expiry bytes".to_string())
    })?);
    let count = u64::from_be_bytes(
        value[8..].try_into().map_err(|_| StoreError::Serialization("counter bytes".to_string()))?,
    );
    Ok((expires_at_ms, count))
}
