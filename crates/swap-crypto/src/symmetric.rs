//! AES-256-GCM sealing for secrets at rest.
//!
//! Reference: spec §4.1 "seal(secret, hashlock)... AES-256-GCM or
//! equivalent; random IV per record; ciphertext stored with IV and
//! auth tag." Grounded in the teacher's `shared-crypto::symmetric`
//! module, adapted from XChaCha20-Poly1305 to AES-256-GCM per spec.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use zeroize::Zeroize;

use crate::errors::CryptoError;

/// GCM tag length in bytes.
pub const TAG_LEN: usize = 16;
/// GCM IV (nonce) length in bytes.
pub const IV_LEN: usize = 12;

/// A process-scoped 256-bit encryption key.
///
/// Derived from configuration (`secret.encryptionKey`, spec §6) and
/// never logged or serialized in full.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct SecretKey([u8; 32]);

impl SecretKey {
    /// Construct from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse from a hex-encoded 32-byte string, as carried in
    /// `secret.encryptionKey`.
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(s).map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(CryptoError::InvalidKeyLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Generate a random key (useful for tests and ephemeral runs).
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
        Self(bytes)
    }
}

/// Encrypt `plaintext` with a fresh random IV.
///
/// Returns `(ciphertext, iv, tag)` matching the shape persisted in
/// `swap_types::EncryptedSecret`.
///
/// # Errors
///
/// Returns [`CryptoError::EncryptionFailed`] if the underlying AEAD
/// operation fails.
pub fn encrypt(key: &SecretKey, plaintext: &[u8]) -> Result<(Vec<u8>, [u8; IV_LEN], [u8; TAG_LEN]), CryptoError> {
    let cipher = Aes256Gcm::new(key.0.as_ref().into());
    let mut iv = [0u8; IV_LEN];
    rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut iv);

    let mut combined = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    // `aes-gcm` appends the tag to the ciphertext; split it back out so
    // the caller can store ciphertext/iv/tag as three distinct fields.
    if combined.len() < TAG_LEN {
        return Err(CryptoError::EncryptionFailed("ciphertext shorter than tag".into()));
    }
    let tag_bytes = combined.split_off(combined.len() - TAG_LEN);
    let mut tag = [0u8; TAG_LEN];
    tag.copy_from_slice(&tag_bytes);

    Ok((combined, iv, tag))
}

/// Decrypt a ciphertext produced by [`encrypt`].
///
/// # Errors
///
/// Returns [`CryptoError::DecryptionFailed`] if the tag does not
/// authenticate (tampering, wrong key, or wrong IV).
pub fn decrypt(
    key: &SecretKey,
    ciphertext: &[u8],
    iv: &[u8; IV_LEN],
    tag: &[u8; TAG_LEN],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new(key.0.as_ref().into());
    let mut combined = Vec::with_capacity(ciphertext.len() + TAG_LEN);
    combined.extend_from_slice(ciphertext);
    combined.extend_from_slice(tag);

    cipher
        .decrypt(Nonce::from_slice(iv), combined.as_slice())
        .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let key = SecretKey::generate();
        let plaintext = [0xABu8; 32];

        let (ciphertext, iv, tag) = encrypt(&key, &plaintext).unwrap();
        let decrypted = decrypt(&key, &ciphertext, &iv, &tag).unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn wrong_key_fails() {
        let key1 = SecretKey::generate();
        let key2 = SecretKey::generate();
        let plaintext = b"secret material";

        let (ciphertext, iv, tag) = encrypt(&key1, plaintext).unwrap();
        assert!(decrypt(&key2, &ciphertext, &iv, &tag).is_err());
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let key = SecretKey::generate();
        let plaintext = b"secret material";

        let (mut ciphertext, iv, tag) = encrypt(&key, plaintext).unwrap();
        ciphertext[0] ^= 0xFF;
        assert!(decrypt(&key, &ciphertext, &iv, &tag).is_err());
    }

    #[test]
    fn tampered_tag_fails() {
        let key = SecretKey::generate();
        let plaintext = b"secret material";

        let (ciphertext, iv, mut tag) = encrypt(&key, plaintext).unwrap();
        tag[0] ^= 0xFF;
        assert!(decrypt(&key, &ciphertext, &iv, &tag).is_err());
    }

    #[test]
    fn key_from_hex_rejects_wrong_length() {
        assert!(SecretKey::from_hex("ab").is_err());
    }
}
