//! Session establishment.
//!
//! Two states only: handshaking (transient, exists for the duration of
//! the call) and established (a persisted [`Session`]). Key rotation
//! later mutates an established session in place; it is not a state
//! transition.

use keyseal_crypto::{KeyPair, decode_public_key, derive_session_keys, encode_public_key};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    clock::unix_millis_now,
    config::ProtocolConfig,
    error::ProtocolError,
    session::Session,
    store::SessionStore,
};

/// Handshake request payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandshakeRequest {
    /// Client's X25519 public key, URL-safe base64 (32 bytes decoded).
    pub client_public_key: String,
}

/// Handshake response payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandshakeResponse {
    /// Identifier the client uses to address the session from now on.
    pub session_id: Uuid,
    /// Server's ephemeral X25519 public key, URL-safe base64.
    pub server_public_key: String,
    /// How often the server rotates session keys, for client awareness.
    pub rotation_interval_ms: u64,
}

/// Establish a session from a client's base64url public key.
///
/// Generates a fresh ephemeral server key pair (one per handshake, never
/// reused across sessions), derives the shared keys, and persists the new
/// session with `request_count = 0` and `last_seq = 0`. Exactly one store
/// write; no other side effects.
///
/// # Errors
///
/// - [`ProtocolError::InvalidHandshakeRequest`] if the client key is not
///   valid base64url or does not decode to 32 bytes
/// - [`ProtocolError::Store`] if persisting the session fails
pub fn establish_session<S: SessionStore>(
    store: &S,
    config: &ProtocolConfig,
    client_public_key_b64: &str,
) -> Result<HandshakeResponse, ProtocolError> {
    let client_public = decode_public_key(client_public_key_b64)
        .map_err(|_| ProtocolError::InvalidHandshakeRequest)?;

    let server_pair = KeyPair::generate();
    let keys =
        derive_session_keys(server_pair.private_key(), &client_public, config.hkdf_salt.as_ref());

    let now_ms = unix_millis_now();
    let session = Session {
        session_id: Uuid::new_v4(),
        encryption_key: keys.encryption_key,
        mac_key: keys.mac_key,
        created_at_ms: now_ms,
        last_rotated_at_ms: now_ms,
        request_count: 0,
        last_seq: 0,
        client_public_key: *client_public.as_bytes(),
        server_public_key: *server_pair.public_key().as_bytes(),
        server_private_key: *server_pair.private_key(),
    };

    store.put(&session)?;

    tracing::info!(session_id = %session.session_id, "session established");

    Ok(HandshakeResponse {
        session_id: session.session_id,
        server_public_key: encode_public_key(server_pair.public_key()),
        rotation_interval_ms: config.rotation_interval_ms,
    })
}
