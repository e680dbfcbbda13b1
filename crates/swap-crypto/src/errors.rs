//! Crypto error types.

use thiserror::Error;

/// Cryptographic operation errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Encryption failed.
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// Decryption failed (includes auth tag mismatch).
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    /// Invalid key length.
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected key length in bytes.
        expected: usize,
        /// Actual key length in bytes.
        actual: usize,
    },

    /// Invalid private key bytes.
    #[error("invalid private key")]
    InvalidPrivateKey,

    /// Invalid public key bytes.
    #[error("invalid public key")]
    InvalidPublicKey,

    /// Signature verification failed.
    #[error("signature verification failed")]
    SignatureVerificationFailed,

    /// Invalid signature format.
    #[error("invalid signature format")]
    InvalidSignatureFormat,
}
