//! X25519 key pairs and the public-key wire codec.
//!
//! Keys cross the network boundary as URL-safe base64 (no padding) and are
//! raw 32-byte X25519 scalars/points everywhere else.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand_core::OsRng;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;

/// Size in bytes of X25519 public and private keys.
pub const KEY_SIZE: usize = 32;

/// An X25519 public key (32 bytes).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublicKey([u8; KEY_SIZE]);

impl PublicKey {
    /// Import from raw bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl TryFrom<&[u8]> for PublicKey {
    type Error = CryptoError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; KEY_SIZE] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyLength { expected: KEY_SIZE, actual: bytes.len() })?;
        Ok(Self(bytes))
    }
}

/// An X25519 key pair. The private half is zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyPair {
    #[zeroize(skip)]
    public: PublicKey,
    private: [u8; KEY_SIZE],
}

impl KeyPair {
    /// Generate a fresh key pair from the OS RNG with RFC 7748 clamping.
    ///
    /// Infallible: RNG failure aborts the process rather than handing out
    /// weak key material.
    #[must_use]
    pub fn generate() -> Self {
        let secret = x25519_dalek::StaticSecret::random_from_rng(OsRng);
        let public = x25519_dalek::PublicKey::from(&secret);

        Self { public: PublicKey(*public.as_bytes()), private: secret.to_bytes() }
    }

    /// Public half of the pair.
    #[must_use]
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Raw private key bytes.
    ///
    /// # Security
    ///
    /// The returned bytes are the raw private scalar. They must never leave
    /// the trust boundary.
    #[must_use]
    pub fn private_key(&self) -> &[u8; KEY_SIZE] {
        &self.private
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print private key material, even in debug output.
        f.debug_struct("KeyPair").field("public", &self.public).finish_non_exhaustive()
    }
}

/// Encode a public key as URL-safe base64 without padding.
#[must_use]
pub fn encode_public_key(key: &PublicKey) -> String {
    URL_SAFE_NO_PAD.encode(key.as_bytes())
}

/// Decode a URL-safe base64 public key.
///
/// # Errors
///
/// - [`CryptoError::InvalidEncoding`] if the input is not valid base64url
/// - [`CryptoError::InvalidKeyLength`] if the decoded key is not 32 bytes
pub fn decode_public_key(encoded: &str) -> Result<PublicKey, CryptoError> {
    let bytes = URL_SAFE_NO_PAD.decode(encoded).map_err(|_| CryptoError::InvalidEncoding)?;
    PublicKey::try_from(bytes.as_slice())
}
