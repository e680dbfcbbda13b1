//! The at-rest representation of a sealed HTLC secret.
//!
//! Reference: spec §3 "Auxiliary entities", §4.1.

use serde::{Deserialize, Serialize};

/// An encrypted secret keyed by hashlock in the secret store.
///
/// Reference: spec §3, §4.1. `ciphertext`/`iv`/`tag` are the
/// AES-256-GCM output; see `swap-crypto::symmetric`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EncryptedSecret {
    /// AES-256-GCM ciphertext.
    pub ciphertext: Vec<u8>,
    /// 96-bit IV, unique per record.
    pub iv: [u8; 12],
    /// 128-bit authentication tag.
    pub tag: [u8; 16],
    /// Creation timestamp (unix seconds).
    pub created_at: u64,
    /// TTL deadline (unix seconds); reveal after this fails with
    /// `SecretExpired`.
    pub expires_at: u64,
    /// One-shot reveal flag.
    pub used: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_unused() {
        let es = EncryptedSecret {
            ciphertext: vec![1, 2, 3],
            iv: [0u8; 12],
            tag: [0u8; 16],
            created_at: 0,
            expires_at: 100,
            used: false,
        };
        assert!(!es.used);
    }
}
