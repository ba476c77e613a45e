//! The session record: one per established handshake.

use keyseal_crypto::DerivedKeys;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// An established encryption session.
///
/// Created by the handshake, mutated in place by the envelope path (the
/// replay watermark and request counter) and by the key ratchet (wholesale
/// key replacement). The session store exclusively owns its lifetime.
///
/// Key material is base64url-encoded when serialized and zeroized when the
/// record is dropped.
///
/// # Invariants
///
/// - `session_id` is unique across the store's lifetime and never reused
/// - `encryption_key` and `mac_key` are always exactly 32 bytes
/// - `last_seq` and `request_count` never decrease
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Session {
    /// Opaque unique identifier, generated at handshake time.
    #[zeroize(skip)]
    pub session_id: Uuid,

    /// Current 32-byte encryption key. Replaced wholesale on rotation.
    #[serde(with = "crate::b64::array")]
    pub encryption_key: [u8; 32],

    /// Current 32-byte MAC key. Replaced wholesale on rotation.
    #[serde(with = "crate::b64::array")]
    pub mac_key: [u8; 32],

    /// Handshake timestamp (unix millis); used for TTL expiry.
    pub created_at_ms: u64,

    /// Timestamp of the last key rotation (unix millis).
    pub last_rotated_at_ms: u64,

    /// Count of processed requests; drives volume-based rotation and
    /// outgoing sequence numbers. Never decreases.
    pub request_count: u64,

    /// Highest envelope sequence number accepted so far - the replay
    /// protection watermark. Never decreases.
    pub last_seq: u64,

    /// Client's public key, retained for key re-derivation and audit.
    #[serde(with = "crate::b64::array")]
    pub client_public_key: [u8; 32],

    /// Server's ephemeral public key for this session.
    #[serde(with = "crate::b64::array")]
    pub server_public_key: [u8; 32],

    /// Server's ephemeral private key. Must never leave the trust boundary.
    #[serde(with = "crate::b64::array")]
    pub server_private_key: [u8; 32],
}

impl Session {
    /// Snapshot of the current symmetric keys for envelope operations.
    #[must_use]
    pub fn derived_keys(&self) -> DerivedKeys {
        DerivedKeys { encryption_key: self.encryption_key, mac_key: self.mac_key }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key material stays out of logs and debug output.
        f.debug_struct("Session")
            .field("session_id", &self.session_id)
            .field("created_at_ms", &self.created_at_ms)
            .field("last_rotated_at_ms", &self.last_rotated_at_ms)
            .field("request_count", &self.request_count)
            .field("last_seq", &self.last_seq)
            .finish_non_exhaustive()
    }
}

/// Fixed-value session fixture for store and codec tests.
#[cfg(test)]
pub(crate) fn test_session() -> Session {
    Session {
        session_id: Uuid::new_v4(),
        encryption_key: [1u8; 32],
        mac_key: [2u8; 32],
        created_at_ms: 1_000,
        last_rotated_at_ms: 1_000,
        request_count: 0,
        last_seq: 0,
        client_public_key: [3u8; 32],
        server_public_key: [4u8; 32],
        server_private_key: [5u8; 32],
    }
}
