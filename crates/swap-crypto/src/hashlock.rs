//! Hashlock digest function.
//!
//! Reference: spec §9 "Hashlock digest parity (open question)" —
//! resolved in favor of Keccak-256, enforced identically by
//! `SecretStore`, the chain A factory, and the chain B HTLC.

use sha3::{Digest, Keccak256};

/// Compute the Keccak-256 digest of `data`.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&result);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        let a = keccak256(b"swap-secret");
        let b = keccak256(b"swap-secret");
        assert_eq!(a, b);
    }

    #[test]
    fn different_inputs_differ() {
        assert_ne!(keccak256(b"a"), keccak256(b"b"));
    }

    #[test]
    fn known_vector_empty_input() {
        // Keccak-256("") per the canonical test vector.
        let expected = hex::decode("c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470").unwrap();
        assert_eq!(keccak256(b"").to_vec(), expected);
    }
}
