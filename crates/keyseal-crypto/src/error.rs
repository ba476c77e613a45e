//! Error types for Keyseal cryptographic operations.

use thiserror::Error;

/// Errors that can occur during key handling and envelope operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Key material is not the expected length.
    ///
    /// Always a validation failure on caller-supplied input. Never
    /// retryable without fixing the input.
    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength {
        /// Required key length in bytes.
        expected: usize,
        /// Length that was actually supplied.
        actual: usize,
    },

    /// Input is not valid URL-safe base64.
    #[error("invalid base64url encoding")]
    InvalidEncoding,

    /// Envelope authentication or decryption failed.
    ///
    /// A tampered envelope and a key mismatch are deliberately
    /// indistinguishable; the error carries no cause detail.
    #[error("decryption failed")]
    DecryptionFailed,
}
