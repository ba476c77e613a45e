//! Periodic whole-key rotation.
//!
//! Rotation bounds the damage of a key compromise: after the configured
//! interval (or request volume), the session's symmetric keys are
//! re-derived from the retained key pairs under a fresh random HKDF salt.
//! The replay watermark and request counter deliberately survive rotation
//! so replay protection and volume tracking are continuous across key
//! generations.

use keyseal_crypto::{PublicKey, derive_session_keys};
use rand_core::{OsRng, RngCore};
use uuid::Uuid;
use zeroize::Zeroize;

use crate::{
    clock::unix_millis_now,
    config::ProtocolConfig,
    error::ProtocolError,
    session::Session,
    store::SessionStore,
};

/// Whether a session's keys are due for rotation at `now_ms`.
///
/// True when the rotation interval has elapsed since the last rotation,
/// or when the request count has reached the configured volume threshold
/// (if any).
#[must_use]
pub fn needs_rotation(session: &Session, config: &ProtocolConfig, now_ms: u64) -> bool {
    if now_ms.saturating_sub(session.last_rotated_at_ms) >= config.rotation_interval_ms {
        return true;
    }

    config
        .rotation_volume_threshold
        .is_some_and(|threshold| session.request_count >= threshold)
}

/// Rotate a session's keys in place.
///
/// Re-runs the ECDH + HKDF derivation over the session's existing client
/// public key and server private key - no new handshake round-trip - with
/// a fresh random 32-byte salt, then persists the updated session.
/// `last_seq` and `request_count` are untouched.
///
/// A store write failure propagates; the session must never silently stay
/// on old keys without the caller knowing.
///
/// # Errors
///
/// - [`ProtocolError::SessionNotFound`] if the session is absent/expired
/// - [`ProtocolError::Store`] if persisting the rotated session fails
pub fn rotate_session_keys<S: SessionStore>(
    store: &S,
    session_id: &Uuid,
) -> Result<(), ProtocolError> {
    let Some(mut session) = store.get(session_id)? else {
        return Err(ProtocolError::SessionNotFound);
    };

    let mut salt = [0u8; 32];
    OsRng.fill_bytes(&mut salt);

    let keys = derive_session_keys(
        &session.server_private_key,
        &PublicKey::from_bytes(session.client_public_key),
        Some(&salt),
    );
    salt.zeroize();

    session.encryption_key = keys.encryption_key;
    session.mac_key = keys.mac_key;
    session.last_rotated_at_ms = unix_millis_now();

    store.put(&session)?;

    tracing::info!(session_id = %session.session_id, "session keys rotated");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{session::test_session, store::MemorySessionStore};

    #[test]
    fn rotation_due_after_interval_elapses() {
        let config = ProtocolConfig { rotation_interval_ms: 1_000, ..Default::default() };
        let mut session = test_session();
        session.last_rotated_at_ms = 10_000;

        assert!(!needs_rotation(&session, &config, 10_500));
        assert!(needs_rotation(&session, &config, 11_000));
        assert!(needs_rotation(&session, &config, 20_000));
    }

    #[test]
    fn rotation_due_at_volume_threshold() {
        let config = ProtocolConfig {
            rotation_interval_ms: u64::MAX,
            rotation_volume_threshold: Some(100),
            ..Default::default()
        };
        let mut session = test_session();
        session.last_rotated_at_ms = 0;

        session.request_count = 99;
        assert!(!needs_rotation(&session, &config, 1));

        session.request_count = 100;
        assert!(needs_rotation(&session, &config, 1));
    }

    #[test]
    fn no_volume_threshold_means_time_only() {
        let config =
            ProtocolConfig { rotation_interval_ms: u64::MAX, ..Default::default() };
        let mut session = test_session();
        session.request_count = u64::MAX - 1;

        assert!(!needs_rotation(&session, &config, u64::MAX - 1));
    }

    #[test]
    fn clock_regression_does_not_trigger_rotation() {
        let config = ProtocolConfig { rotation_interval_ms: 1_000, ..Default::default() };
        let mut session = test_session();
        session.last_rotated_at_ms = 10_000;

        // now before last_rotated_at: saturating arithmetic, no rotation.
        assert!(!needs_rotation(&session, &config, 9_000));
    }

    #[test]
    fn rotation_replaces_keys_and_preserves_counters() {
        let store = MemorySessionStore::new(60_000);
        let mut session = test_session();
        session.request_count = 41;
        session.last_seq = 17;
        store.put(&session).unwrap();

        let old_encryption_key = session.encryption_key;
        let old_mac_key = session.mac_key;

        rotate_session_keys(&store, &session.session_id).unwrap();

        let rotated = store.get(&session.session_id).unwrap().unwrap();
        assert_ne!(rotated.encryption_key, old_encryption_key);
        assert_ne!(rotated.mac_key, old_mac_key);
        assert_eq!(rotated.request_count, 41);
        assert_eq!(rotated.last_seq, 17);
        assert!(rotated.last_rotated_at_ms >= session.last_rotated_at_ms);
    }

    #[test]
    fn consecutive_rotations_produce_distinct_keys() {
        // Same key pairs both times; only the fresh salt differs.
        let store = MemorySessionStore::new(60_000);
        let session = test_session();
        store.put(&session).unwrap();

        rotate_session_keys(&store, &session.session_id).unwrap();
        let first = store.get(&session.session_id).unwrap().unwrap().encryption_key;

        rotate_session_keys(&store, &session.session_id).unwrap();
        let second = store.get(&session.session_id).unwrap().unwrap().encryption_key;

        assert_ne!(first, second);
    }

    #[test]
    fn rotating_unknown_session_fails() {
        let store = MemorySessionStore::new(60_000);
        let result = rotate_session_keys(&store, &Uuid::new_v4());
        assert_eq!(result, Err(ProtocolError::SessionNotFound));
    }
}
