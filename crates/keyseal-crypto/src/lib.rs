//! Keyseal Cryptographic Primitives
//!
//! Building blocks for the Keyseal session protocol. Pure functions with
//! no I/O and no clock; where randomness matters for determinism (envelope
//! nonces), callers provide it.
//!
//! # Key Lifecycle
//!
//! A client and server each hold an X25519 key pair. Their ECDH shared
//! secret is expanded with HKDF-SHA256 into two independent 32-byte keys:
//! one for encryption, one for authentication. Those keys seal and open
//! message envelopes until the session's ratchet replaces them wholesale.
//!
//! ```text
//! X25519 ECDH Shared Secret
//!        │
//!        ▼
//! HKDF-SHA256 → encryption key ‖ MAC key
//!        │
//!        ▼
//! XChaCha20-Poly1305 + HMAC-SHA256 → sealed envelope
//! ```
//!
//! # Security
//!
//! - Encrypt-then-authenticate: the outer HMAC binds the sequence number,
//!   nonce, and ciphertext, and is verified in constant time before any
//!   decryption is attempted
//! - Derived keys are bound to a protocol revision string; a revision bump
//!   invalidates cross-version key reuse
//! - Private keys, shared secrets, and derived keys are zeroized on drop

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod derivation;
pub mod envelope;
pub mod error;
pub mod keys;

pub use derivation::{DerivedKeys, derive_session_keys, derive_shared_keys};
pub use envelope::{NONCE_SIZE, SealedPayload, TAG_SIZE, open, seal};
pub use error::CryptoError;
pub use keys::{KEY_SIZE, KeyPair, PublicKey, decode_public_key, encode_public_key};
