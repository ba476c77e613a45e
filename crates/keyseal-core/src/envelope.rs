//! Wire envelope codec and the snapshot-pure encrypt/decrypt path.
//!
//! An [`EncryptedEnvelope`] is constructed once per outgoing message and
//! consumed once per incoming message; it is never persisted. The
//! functions here operate on a [`Session`] snapshot plus the envelope -
//! persisting the resulting watermark/counter mutations back through the
//! store is the caller's job (see [`crate::manager::SessionManager`]).

use keyseal_crypto::{NONCE_SIZE, TAG_SIZE};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::{error::ProtocolError, session::Session};

/// A wire-transmissible authenticated envelope.
///
/// Binary fields travel as URL-safe base64 in the JSON wire form;
/// [`serialize_envelope`] and [`parse_envelope`] round-trip losslessly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    /// Ciphertext (plaintext encrypted under the session encryption key,
    /// including the embedded AEAD tag).
    #[serde(with = "crate::b64::vec")]
    pub ciphertext: Vec<u8>,

    /// Fresh 24-byte nonce drawn for this envelope alone.
    #[serde(with = "crate::b64::array")]
    pub nonce: [u8; NONCE_SIZE],

    /// Outer HMAC-SHA256 tag over the sequence number, nonce, and
    /// ciphertext.
    #[serde(with = "crate::b64::array")]
    pub tag: [u8; TAG_SIZE],

    /// Sender-assigned sequence number; the replay-protection input.
    pub seq: u64,
}

/// Encrypt a plaintext under a session snapshot at the given sequence
/// number.
///
/// Draws a fresh random nonce from the OS RNG on every call; nonce reuse
/// under one key is a critical failure, so the nonce is never caller- or
/// counter-derived here.
#[must_use]
pub fn encrypt_envelope(session: &Session, seq: u64, plaintext: &[u8]) -> EncryptedEnvelope {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);

    let sealed = keyseal_crypto::seal(&session.derived_keys(), seq, &nonce, plaintext);

    EncryptedEnvelope { ciphertext: sealed.ciphertext, nonce, tag: sealed.tag, seq }
}

/// Decrypt an envelope against a session snapshot.
///
/// Two gates, in order:
///
/// 1. Replay gate - the sequence number must be strictly greater than the
///    session's watermark, else [`ProtocolError::ReplayDetected`].
/// 2. Integrity gate - the tag must verify and the ciphertext decrypt,
///    else [`ProtocolError::DecryptionFailed`] (tamper vs. key mismatch is
///    not revealed).
///
/// On success the caller MUST persist `last_seq = envelope.seq` and
/// advance the request counter before treating the message as accepted;
/// skipping that reopens the replay window.
pub fn decrypt_envelope(
    session: &Session,
    envelope: &EncryptedEnvelope,
) -> Result<Vec<u8>, ProtocolError> {
    if envelope.seq <= session.last_seq {
        return Err(ProtocolError::ReplayDetected {
            seq: envelope.seq,
            watermark: session.last_seq,
        });
    }

    keyseal_crypto::open(
        &session.derived_keys(),
        envelope.seq,
        &envelope.nonce,
        &envelope.ciphertext,
        &envelope.tag,
    )
    .map_err(|_| ProtocolError::DecryptionFailed)
}

/// Serialize an envelope to its JSON wire form.
pub fn serialize_envelope(envelope: &EncryptedEnvelope) -> Result<String, ProtocolError> {
    serde_json::to_string(envelope).map_err(|e| ProtocolError::InvalidEnvelope(e.to_string()))
}

/// Parse an envelope from its JSON wire form.
///
/// # Errors
///
/// Returns [`ProtocolError::InvalidEnvelope`] if the input is not valid
/// JSON or any binary field fails to decode.
pub fn parse_envelope(wire: &str) -> Result<EncryptedEnvelope, ProtocolError> {
    serde_json::from_str(wire).map_err(|e| ProtocolError::InvalidEnvelope(e.to_string()))
}
