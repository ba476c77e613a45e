//! Error types for the Keyseal protocol layer.
//!
//! Every variant is terminal for the operation in progress: nothing here
//! is retried automatically. Retry policy (re-handshake on
//! [`ProtocolError::SessionNotFound`], hard rejection on the security
//! gates) belongs to the caller. No error in a security gate is ever
//! swallowed.

use thiserror::Error;

use crate::store::StoreError;

/// Errors surfaced by the protocol entry points.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The handshake payload is missing or carries a malformed public key.
    #[error("invalid handshake request")]
    InvalidHandshakeRequest,

    /// The session is absent or expired; the caller must re-handshake.
    #[error("session not found")]
    SessionNotFound,

    /// An envelope's sequence number is not greater than the session's
    /// watermark. A hard reject - potentially an attack, never silently
    /// dropped.
    #[error("replay detected: sequence {seq} not greater than watermark {watermark}")]
    ReplayDetected {
        /// Sequence number the envelope carried.
        seq: u64,
        /// Watermark the session had already accepted.
        watermark: u64,
    },

    /// Envelope authentication or decryption failed. Whether the envelope
    /// was tampered with or the keys mismatch is not revealed.
    #[error("decryption failed")]
    DecryptionFailed,

    /// An envelope could not be parsed from its wire form.
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),

    /// Storage failure underneath a protocol operation.
    #[error("store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for ProtocolError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::SessionNotFound => Self::SessionNotFound,
            StoreError::ReplayConflict { seq, watermark } => Self::ReplayDetected { seq, watermark },
            other => Self::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_not_found_maps_to_protocol_not_found() {
        let err: ProtocolError = StoreError::SessionNotFound.into();
        assert_eq!(err, ProtocolError::SessionNotFound);
    }

    #[test]
    fn replay_conflict_maps_to_replay_detected() {
        let err: ProtocolError = StoreError::ReplayConflict { seq: 3, watermark: 5 }.into();
        assert_eq!(err, ProtocolError::ReplayDetected { seq: 3, watermark: 5 });
    }

    #[test]
    fn io_errors_stay_wrapped() {
        let err: ProtocolError = StoreError::Io("disk full".to_string()).into();
        assert_eq!(err, ProtocolError::Store(StoreError::Io("disk full".to_string())));
    }
}
