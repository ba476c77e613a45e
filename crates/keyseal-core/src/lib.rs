//! Keyseal protocol core.
//!
//! End-to-end session encryption between a client and a server: X25519
//! handshake, authenticated message envelopes with replay protection, and
//! periodic key rotation, backed by a pluggable session store.
//!
//! # Architecture
//!
//! - [`SessionManager`]: the facade external callers use - handshake in,
//!   plaintext/ciphertext through, addressed by session ID
//! - [`store::SessionStore`]: persistence abstraction owning session
//!   lifetime, with in-memory ([`store::MemorySessionStore`]) and durable
//!   ([`store::RedbSessionStore`]) backends
//! - [`envelope`]: wire codec and the snapshot-pure encrypt/decrypt path
//! - [`ratchet`]: time- and volume-triggered whole-key rotation
//!
//! Callers never touch key material directly. A session is either fully
//! established (persisted) or absent; there are no partial states.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod clock;
pub mod config;
pub mod envelope;
pub mod error;
pub mod handshake;
pub mod manager;
pub mod ratchet;
pub mod session;
pub mod store;

pub(crate) mod b64;

pub use config::ProtocolConfig;
pub use envelope::{EncryptedEnvelope, parse_envelope, serialize_envelope};
pub use error::ProtocolError;
pub use handshake::{HandshakeRequest, HandshakeResponse};
pub use manager::SessionManager;
pub use session::Session;
pub use store::{MemorySessionStore, RedbSessionStore, SessionStore, StoreError};
