//! The protocol facade external callers use.
//!
//! Callers pass plaintext in and ciphertext out (or vice versa),
//! addressed by session identifier; key material never crosses this
//! boundary. The manager owns the ordering the protocol depends on: the
//! replay watermark and request counter are persisted through the store's
//! atomic operations before a message counts as accepted.

use uuid::Uuid;

use crate::{
    clock::unix_millis_now,
    config::ProtocolConfig,
    envelope::{EncryptedEnvelope, decrypt_envelope, encrypt_envelope},
    error::ProtocolError,
    handshake::{HandshakeRequest, HandshakeResponse, establish_session},
    ratchet::{needs_rotation, rotate_session_keys},
    session::Session,
    store::SessionStore,
};

/// Protocol entry points bound to a session store and configuration.
#[derive(Clone)]
pub struct SessionManager<S: SessionStore> {
    store: S,
    config: ProtocolConfig,
}

impl<S: SessionStore> SessionManager<S> {
    /// Create a manager over the given store and configuration.
    pub fn new(store: S, config: ProtocolConfig) -> Self {
        Self { store, config }
    }

    /// The active configuration.
    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// The underlying session store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Establish a session from a client's handshake request.
    ///
    /// See [`establish_session`].
    pub fn handle_handshake(
        &self,
        request: &HandshakeRequest,
    ) -> Result<HandshakeResponse, ProtocolError> {
        establish_session(&self.store, &self.config, &request.client_public_key)
    }

    /// Load a session snapshot, if present and unexpired.
    pub fn session(&self, session_id: &Uuid) -> Result<Option<Session>, ProtocolError> {
        Ok(self.store.get(session_id)?)
    }

    /// Encrypt an outgoing plaintext for the given session.
    ///
    /// Atomically advances the session's request counter and uses the new
    /// count as the envelope sequence number, so concurrent senders on one
    /// session never collide on a sequence number.
    pub fn process_outgoing(
        &self,
        session_id: &Uuid,
        plaintext: &[u8],
    ) -> Result<EncryptedEnvelope, ProtocolError> {
        let Some(session) = self.store.get(session_id)? else {
            return Err(ProtocolError::SessionNotFound);
        };

        let seq = self.store.increment_request_count(session_id)?;

        Ok(encrypt_envelope(&session, seq, plaintext))
    }

    /// Decrypt and accept an incoming envelope for the given session.
    ///
    /// Runs the replay gate, then the integrity gate, then persists the
    /// watermark through the store's compare-and-swap - only after all
    /// three does the plaintext leave this function. A concurrent accept
    /// of the same sequence number loses the CAS and is reported as
    /// [`ProtocolError::ReplayDetected`].
    pub fn process_incoming(
        &self,
        session_id: &Uuid,
        envelope: &EncryptedEnvelope,
    ) -> Result<Vec<u8>, ProtocolError> {
        let Some(session) = self.store.get(session_id)? else {
            return Err(ProtocolError::SessionNotFound);
        };

        let plaintext = match decrypt_envelope(&session, envelope) {
            Ok(plaintext) => plaintext,
            Err(err @ ProtocolError::ReplayDetected { .. }) => {
                tracing::warn!(
                    session_id = %session_id,
                    seq = envelope.seq,
                    watermark = session.last_seq,
                    "replayed envelope rejected"
                );
                return Err(err);
            },
            Err(err @ ProtocolError::DecryptionFailed) => {
                tracing::warn!(session_id = %session_id, "envelope failed authentication");
                return Err(err);
            },
            Err(err) => return Err(err),
        };

        // Persist the watermark before the plaintext is considered
        // accepted; losing the CAS means another handler beat us to this
        // sequence number.
        if let Err(err) = self.store.advance_last_seq(session_id, envelope.seq) {
            if matches!(err, crate::store::StoreError::ReplayConflict { .. }) {
                tracing::warn!(
                    session_id = %session_id,
                    seq = envelope.seq,
                    "concurrent acceptance lost watermark race"
                );
            }
            return Err(err.into());
        }

        let _ = self.store.increment_request_count(session_id)?;

        Ok(plaintext)
    }

    /// Rotate the session's keys now. See [`rotate_session_keys`].
    pub fn rotate_session_keys(&self, session_id: &Uuid) -> Result<(), ProtocolError> {
        rotate_session_keys(&self.store, session_id)
    }

    /// Rotate the session's keys if a rotation trigger has fired.
    ///
    /// Returns whether a rotation happened.
    pub fn rotate_if_needed(&self, session_id: &Uuid) -> Result<bool, ProtocolError> {
        let Some(session) = self.store.get(session_id)? else {
            return Err(ProtocolError::SessionNotFound);
        };

        if !needs_rotation(&session, &self.config, unix_millis_now()) {
            return Ok(false);
        }

        rotate_session_keys(&self.store, session_id)?;
        Ok(true)
    }

    /// Delete a session. Idempotent; key material is zeroized on drop.
    pub fn delete_session(&self, session_id: &Uuid) -> Result<(), ProtocolError> {
        self.store.delete(session_id)?;
        tracing::info!(session_id = %session_id, "session deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use keyseal_crypto::{KeyPair, encode_public_key};

    use super::*;
    use crate::store::MemorySessionStore;

    fn manager() -> SessionManager<MemorySessionStore> {
        let config = ProtocolConfig::default();
        SessionManager::new(MemorySessionStore::new(config.session_ttl_ms), config)
    }

    fn established(manager: &SessionManager<MemorySessionStore>) -> Uuid {
        let client = KeyPair::generate();
        let request =
            HandshakeRequest { client_public_key: encode_public_key(client.public_key()) };
        manager.handle_handshake(&request).unwrap().session_id
    }

    #[test]
    fn malformed_handshake_request_is_rejected() {
        let manager = manager();
        let request = HandshakeRequest { client_public_key: "not a key".to_string() };

        assert_eq!(
            manager.handle_handshake(&request).err(),
            Some(ProtocolError::InvalidHandshakeRequest)
        );
    }

    #[test]
    fn outgoing_then_incoming_roundtrip() {
        let manager = manager();
        let id = established(&manager);

        let envelope = manager.process_outgoing(&id, b"hello").unwrap();
        assert_eq!(envelope.seq, 1);

        let plaintext = manager.process_incoming(&id, &envelope).unwrap();
        assert_eq!(plaintext, b"hello");

        let session = manager.session(&id).unwrap().unwrap();
        assert_eq!(session.last_seq, 1);
    }

    #[test]
    fn sequence_numbers_increase_per_message() {
        let manager = manager();
        let id = established(&manager);

        let first = manager.process_outgoing(&id, b"one").unwrap();
        let second = manager.process_outgoing(&id, b"two").unwrap();

        assert_eq!(first.seq, 1);
        assert_eq!(second.seq, 2);
    }

    #[test]
    fn replaying_an_accepted_envelope_is_rejected() {
        let manager = manager();
        let id = established(&manager);

        let envelope = manager.process_outgoing(&id, b"once only").unwrap();

        manager.process_incoming(&id, &envelope).unwrap();

        let replay = manager.process_incoming(&id, &envelope);
        assert_eq!(
            replay,
            Err(ProtocolError::ReplayDetected { seq: envelope.seq, watermark: envelope.seq })
        );
    }

    #[test]
    fn watermark_tracks_latest_accepted_seq() {
        let manager = manager();
        let id = established(&manager);

        // Incoming acceptance also advances the request counter, so
        // sequence numbers over a full roundtrip loop are strictly
        // increasing but not contiguous.
        let mut last_seq = 0;
        for _ in 0..5 {
            let envelope = manager.process_outgoing(&id, b"msg").unwrap();
            assert!(envelope.seq > last_seq);
            manager.process_incoming(&id, &envelope).unwrap();
            last_seq = envelope.seq;
        }

        let session = manager.session(&id).unwrap().unwrap();
        assert_eq!(session.last_seq, last_seq);
    }

    #[test]
    fn unknown_session_is_rejected_everywhere() {
        let manager = manager();
        let id = Uuid::new_v4();

        assert_eq!(
            manager.process_outgoing(&id, b"x").err(),
            Some(ProtocolError::SessionNotFound)
        );
        assert_eq!(manager.rotate_if_needed(&id).err(), Some(ProtocolError::SessionNotFound));
    }

    #[test]
    fn rotation_keeps_replay_state() {
        let manager = manager();
        let id = established(&manager);

        let envelope = manager.process_outgoing(&id, b"before rotation").unwrap();
        manager.process_incoming(&id, &envelope).unwrap();

        manager.rotate_session_keys(&id).unwrap();

        // The already-accepted sequence number stays burned.
        let replay = manager.process_incoming(&id, &envelope);
        assert!(matches!(replay, Err(ProtocolError::ReplayDetected { .. })));
    }

    #[test]
    fn messages_sealed_under_old_keys_fail_after_rotation() {
        let manager = manager();
        let id = established(&manager);

        let stale = manager.process_outgoing(&id, b"sealed pre-rotation").unwrap();
        manager.rotate_session_keys(&id).unwrap();

        let result = manager.process_incoming(&id, &stale);
        assert_eq!(result, Err(ProtocolError::DecryptionFailed));
    }

    #[test]
    fn rotate_if_needed_is_a_no_op_before_triggers() {
        let manager = manager();
        let id = established(&manager);

        assert!(!manager.rotate_if_needed(&id).unwrap());
    }

    #[test]
    fn rotate_if_needed_fires_on_volume_threshold() {
        let manager = SessionManager::new(
            MemorySessionStore::new(60_000),
            ProtocolConfig { rotation_volume_threshold: Some(2), ..Default::default() },
        );
        let id = established(&manager);

        let before = manager.session(&id).unwrap().unwrap().encryption_key;

        let first = manager.process_outgoing(&id, b"1").unwrap();
        manager.process_incoming(&id, &first).unwrap();

        assert!(manager.rotate_if_needed(&id).unwrap());
        let after = manager.session(&id).unwrap().unwrap().encryption_key;
        assert_ne!(before, after);
    }

    #[test]
    fn deleted_session_requires_new_handshake() {
        let manager = manager();
        let id = established(&manager);

        manager.delete_session(&id).unwrap();

        assert_eq!(
            manager.process_outgoing(&id, b"x").err(),
            Some(ProtocolError::SessionNotFound)
        );
    }
}
