//! ECDH shared-secret computation and HKDF-SHA256 key expansion.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{
    error::CryptoError,
    keys::{KEY_SIZE, PublicKey},
};

/// Info string binding derived keys to this protocol revision.
///
/// Bumping the revision invalidates cross-version key reuse: keys derived
/// under a different revision never match, even for the same key pairs.
const PROTOCOL_INFO: &[u8] = b"keyseal/v1/session-keys";

/// Default HKDF salt: 32 zero bytes.
///
/// Deployments SHOULD override this with a per-deployment random salt to
/// avoid key-derivation correlation across tenants.
const ZERO_SALT: [u8; 32] = [0u8; 32];

/// Symmetric keys expanded from an ECDH shared secret.
///
/// The two keys are independent HKDF outputs: compromise of one does not
/// reveal the other. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKeys {
    /// 32-byte XChaCha20-Poly1305 encryption key.
    pub encryption_key: [u8; 32],
    /// 32-byte HMAC-SHA256 authentication key.
    pub mac_key: [u8; 32],
}

/// Derive session keys from raw key material, validating lengths.
///
/// Computes the X25519 shared secret between `local_private` and
/// `remote_public`, then expands it with HKDF-SHA256 into a 64-byte output
/// split into the encryption key and the MAC key.
///
/// ECDH symmetry holds: `derive_shared_keys(a_priv, b_pub, salt)` equals
/// `derive_shared_keys(b_priv, a_pub, salt)`.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidKeyLength`] if either input is not exactly
/// 32 bytes.
pub fn derive_shared_keys(
    local_private: &[u8],
    remote_public: &[u8],
    salt: Option<&[u8; 32]>,
) -> Result<DerivedKeys, CryptoError> {
    let mut private: [u8; KEY_SIZE] = local_private.try_into().map_err(|_| {
        CryptoError::InvalidKeyLength { expected: KEY_SIZE, actual: local_private.len() }
    })?;
    let public = PublicKey::try_from(remote_public)?;

    let keys = derive_session_keys(&private, &public, salt);
    private.zeroize();

    Ok(keys)
}

/// Derive session keys from already-validated key material.
///
/// Same derivation as [`derive_shared_keys`] without the length checks;
/// infallible because the inputs are fixed-size arrays.
#[must_use]
pub fn derive_session_keys(
    local_private: &[u8; KEY_SIZE],
    remote_public: &PublicKey,
    salt: Option<&[u8; 32]>,
) -> DerivedKeys {
    let secret = x25519_dalek::StaticSecret::from(*local_private);
    let shared = secret.diffie_hellman(&x25519_dalek::PublicKey::from(*remote_public.as_bytes()));

    let salt = salt.unwrap_or(&ZERO_SALT);
    let hkdf = Hkdf::<Sha256>::new(Some(salt), shared.as_bytes());

    let mut okm = [0u8; 64];
    let Ok(()) = hkdf.expand(PROTOCOL_INFO, &mut okm) else {
        unreachable!("64 bytes is a valid HKDF-SHA256 output length");
    };

    let mut encryption_key = [0u8; 32];
    let mut mac_key = [0u8; 32];
    encryption_key.copy_from_slice(&okm[..32]);
    mac_key.copy_from_slice(&okm[32..]);
    okm.zeroize();

    DerivedKeys { encryption_key, mac_key }
}
