//! Envelope seal/open primitives.
//!
//! Encrypt-then-authenticate: the plaintext is encrypted with
//! XChaCha20-Poly1305 under the encryption key, then an HMAC-SHA256 tag
//! under the MAC key binds the sequence number, nonce, and ciphertext
//! together. The tag is verified in constant time before any decryption
//! is attempted.
//!
//! All functions are pure - the nonce must be provided by the caller and
//! MUST be drawn fresh from a secure RNG for every seal under a given key.
//! Nonce reuse under the same key breaks confidentiality.

use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit},
};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{derivation::DerivedKeys, error::CryptoError};

type HmacSha256 = Hmac<Sha256>;

/// XChaCha20 nonce size (24 bytes).
pub const NONCE_SIZE: usize = 24;

/// HMAC-SHA256 tag size (32 bytes).
pub const TAG_SIZE: usize = 32;

/// Ciphertext and authentication tag produced by [`seal`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedPayload {
    /// Ciphertext including the embedded 16-byte Poly1305 tag.
    pub ciphertext: Vec<u8>,
    /// Outer HMAC-SHA256 tag over `seq || nonce || ciphertext`.
    pub tag: [u8; TAG_SIZE],
}

/// Seal a plaintext into an authenticated payload.
///
/// The sequence number is authenticated but not encrypted; it travels in
/// the clear alongside the payload so the receiver can run the replay gate
/// before touching key material.
#[must_use]
pub fn seal(
    keys: &DerivedKeys,
    seq: u64,
    nonce: &[u8; NONCE_SIZE],
    plaintext: &[u8],
) -> SealedPayload {
    let cipher = XChaCha20Poly1305::new((&keys.encryption_key).into());

    let Ok(ciphertext) = cipher.encrypt(XNonce::from_slice(nonce), plaintext) else {
        unreachable!("XChaCha20-Poly1305 encryption cannot fail with valid inputs");
    };

    let tag = authenticate(&keys.mac_key, seq, nonce, &ciphertext);

    SealedPayload { ciphertext, tag }
}

/// Open a sealed payload, verifying authenticity before decrypting.
///
/// # Errors
///
/// Returns [`CryptoError::DecryptionFailed`] if the HMAC tag does not
/// verify or the ciphertext does not decrypt. The two causes are
/// indistinguishable by design.
pub fn open(
    keys: &DerivedKeys,
    seq: u64,
    nonce: &[u8; NONCE_SIZE],
    ciphertext: &[u8],
    tag: &[u8; TAG_SIZE],
) -> Result<Vec<u8>, CryptoError> {
    // Constant-time comparison via the Mac trait.
    mac_over(&keys.mac_key, seq, nonce, ciphertext)
        .verify_slice(tag)
        .map_err(|_| CryptoError::DecryptionFailed)?;

    let cipher = XChaCha20Poly1305::new((&keys.encryption_key).into());
    cipher
        .decrypt(XNonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed)
}

/// Compute the outer HMAC-SHA256 tag.
fn authenticate(
    mac_key: &[u8; 32],
    seq: u64,
    nonce: &[u8; NONCE_SIZE],
    ciphertext: &[u8],
) -> [u8; TAG_SIZE] {
    let result = mac_over(mac_key, seq, nonce, ciphertext).finalize().into_bytes();

    let mut tag = [0u8; TAG_SIZE];
    tag.copy_from_slice(&result);
    tag
}

fn mac_over(mac_key: &[u8; 32], seq: u64, nonce: &[u8; NONCE_SIZE], ciphertext: &[u8]) -> HmacSha256 {
    let mut mac = new_mac(mac_key);
    mac.update(&seq.to_be_bytes());
    mac.update(nonce);
    mac.update(ciphertext);
    mac
}

fn new_mac(mac_key: &[u8; 32]) -> HmacSha256 {
    // Qualified call: the aead KeyInit trait also provides new_from_slice.
    let Ok(mac) = <HmacSha256 as Mac>::new_from_slice(mac_key) else {
        unreachable!("HMAC-SHA256 accepts any key size");
    };
    mac
}

#[cfg(test)]
mod tests {
    use proptest::prelude::{ProptestConfig, any, proptest};

    use super::*;

    fn test_keys() -> DerivedKeys {
        let mut encryption_key = [0u8; 32];
        let mut mac_key = [0u8; 32];
        for (i, byte) in encryption_key.iter_mut().enumerate() {
            *byte = i as u8;
        }
        for (i, byte) in mac_key.iter_mut().enumerate() {
            *byte = (i + 100) as u8;
        }
        DerivedKeys { encryption_key, mac_key }
    }

    #[test]
    fn seal_open_roundtrip() {
        let keys = test_keys();
        let plaintext = b"hello";
        let nonce = [0xAB; NONCE_SIZE];

        let sealed = seal(&keys, 5, &nonce, plaintext);
        let opened = open(&keys, 5, &nonce, &sealed.ciphertext, &sealed.tag).unwrap();

        assert_eq!(opened, plaintext);
    }

    #[test]
    fn seal_open_empty_plaintext() {
        let keys = test_keys();
        let nonce = [0x00; NONCE_SIZE];

        let sealed = seal(&keys, 1, &nonce, b"");
        let opened = open(&keys, 1, &nonce, &sealed.ciphertext, &sealed.tag).unwrap();

        assert_eq!(opened, b"");
    }

    #[test]
    fn ciphertext_is_plaintext_plus_poly1305_tag() {
        let keys = test_keys();
        let plaintext = b"sixteen byte msg";
        let nonce = [0x01; NONCE_SIZE];

        let sealed = seal(&keys, 1, &nonce, plaintext);

        assert_eq!(sealed.ciphertext.len(), plaintext.len() + 16);
    }

    #[test]
    fn tampered_ciphertext_is_rejected() {
        let keys = test_keys();
        let nonce = [0x02; NONCE_SIZE];

        let mut sealed = seal(&keys, 1, &nonce, b"original message");
        sealed.ciphertext[0] ^= 0xFF;

        let result = open(&keys, 1, &nonce, &sealed.ciphertext, &sealed.tag);
        assert_eq!(result, Err(CryptoError::DecryptionFailed));
    }

    #[test]
    fn tampered_tag_is_rejected() {
        let keys = test_keys();
        let nonce = [0x03; NONCE_SIZE];

        let mut sealed = seal(&keys, 1, &nonce, b"original message");
        sealed.tag[0] ^= 0x01;

        let result = open(&keys, 1, &nonce, &sealed.ciphertext, &sealed.tag);
        assert_eq!(result, Err(CryptoError::DecryptionFailed));
    }

    #[test]
    fn wrong_sequence_number_is_rejected() {
        // The tag binds the sequence number; opening under a different seq
        // must fail even with the right keys and nonce.
        let keys = test_keys();
        let nonce = [0x04; NONCE_SIZE];

        let sealed = seal(&keys, 5, &nonce, b"message");

        let result = open(&keys, 6, &nonce, &sealed.ciphertext, &sealed.tag);
        assert_eq!(result, Err(CryptoError::DecryptionFailed));
    }

    #[test]
    fn wrong_mac_key_is_rejected() {
        let keys = test_keys();
        let nonce = [0x05; NONCE_SIZE];

        let sealed = seal(&keys, 1, &nonce, b"message");

        let mut wrong = test_keys();
        wrong.mac_key[0] ^= 0xFF;

        let result = open(&wrong, 1, &nonce, &sealed.ciphertext, &sealed.tag);
        assert_eq!(result, Err(CryptoError::DecryptionFailed));
    }

    #[test]
    fn wrong_encryption_key_is_rejected() {
        // Same MAC key, different encryption key: the outer tag verifies but
        // the AEAD layer must still reject. Cause is not distinguishable.
        let keys = test_keys();
        let nonce = [0x06; NONCE_SIZE];

        let sealed = seal(&keys, 1, &nonce, b"message");

        let mut wrong = test_keys();
        wrong.encryption_key[0] ^= 0xFF;
        // Recompute the outer tag so only the inner layer fails.
        let forged_tag = authenticate(&wrong.mac_key, 1, &nonce, &sealed.ciphertext);

        let result = open(&wrong, 1, &nonce, &sealed.ciphertext, &forged_tag);
        assert_eq!(result, Err(CryptoError::DecryptionFailed));
    }

    #[test]
    fn different_nonces_produce_different_ciphertexts() {
        let keys = test_keys();

        let a = seal(&keys, 1, &[0x00; NONCE_SIZE], b"message");
        let b = seal(&keys, 1, &[0xFF; NONCE_SIZE], b"message");

        assert_ne!(a.ciphertext, b.ciphertext);
        assert_ne!(a.tag, b.tag);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn roundtrip_for_arbitrary_plaintext(
            plaintext in proptest::collection::vec(any::<u8>(), 0..2048),
            seq in any::<u64>(),
            nonce in any::<[u8; NONCE_SIZE]>(),
        ) {
            let keys = test_keys();
            let sealed = seal(&keys, seq, &nonce, &plaintext);
            let opened = open(&keys, seq, &nonce, &sealed.ciphertext, &sealed.tag).unwrap();
            assert_eq!(opened, plaintext);
        }
    }
}
