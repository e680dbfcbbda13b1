//! secp256k1 signing for chain A (EVM) transactions.
//!
//! Grounded in the teacher's `shared-crypto::ecdsa` module.

use k256::ecdsa::{
    signature::{Signer, Verifier},
    Signature, SigningKey, VerifyingKey,
};
use zeroize::Zeroize;

use crate::errors::CryptoError;

/// A secp256k1 keypair used to sign chain A transactions.
#[derive(Clone)]
pub struct Secp256k1KeyPair {
    signing_key: SigningKey,
}

impl Secp256k1KeyPair {
    /// Load from a 32-byte private key.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, CryptoError> {
        let signing_key = SigningKey::from_bytes(bytes.into()).map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self { signing_key })
    }

    /// Parse from a hex-encoded private key, with or without a `0x`
    /// prefix, matching `chainA.signerKey` (spec §6).
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|_| CryptoError::InvalidPrivateKey)?;
        if bytes.len() != 32 {
            return Err(CryptoError::InvalidKeyLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        let result = Self::from_bytes(&arr);
        arr.zeroize();
        result
    }

    /// Derive the public key.
    pub fn public_key(&self) -> Secp256k1PublicKey {
        Secp256k1PublicKey(*VerifyingKey::from(&self.signing_key).to_encoded_point(true).as_bytes())
    }

    /// Derive the 20-byte EVM address (Keccak-256 of the uncompressed
    /// public key, last 20 bytes).
    pub fn evm_address(&self) -> [u8; 20] {
        let uncompressed = VerifyingKey::from(&self.signing_key).to_encoded_point(false);
        // Skip the 0x04 prefix byte.
        let hash = crate::hashlock::keccak256(&uncompressed.as_bytes()[1..]);
        let mut addr = [0u8; 20];
        addr.copy_from_slice(&hash[12..]);
        addr
    }

    /// Sign a message digest (RFC 6979 deterministic nonce).
    pub fn sign(&self, message: &[u8]) -> Secp256k1Signature {
        let sig: Signature = self.signing_key.sign(message);
        let mut bytes = [0u8; 64];
        bytes.copy_from_slice(&sig.to_bytes());
        Secp256k1Signature(bytes)
    }
}

/// A compressed secp256k1 public key (33 bytes).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Secp256k1PublicKey([u8; 33]);

impl Secp256k1PublicKey {
    /// Raw compressed bytes.
    pub fn as_bytes(&self) -> &[u8; 33] {
        &self.0
    }

    /// Verify a signature produced over `message`.
    pub fn verify(&self, message: &[u8], signature: &Secp256k1Signature) -> Result<(), CryptoError> {
        let verifying_key = VerifyingKey::from_sec1_bytes(&self.0).map_err(|_| CryptoError::InvalidPublicKey)?;
        let sig = Signature::from_slice(&signature.0).map_err(|_| CryptoError::InvalidSignatureFormat)?;
        verifying_key
            .verify(message, &sig)
            .map_err(|_| CryptoError::SignatureVerificationFailed)
    }
}

/// A 64-byte `r || s` ECDSA signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Secp256k1Signature([u8; 64]);

impl Secp256k1Signature {
    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> Secp256k1KeyPair {
        Secp256k1KeyPair::from_bytes(&[0x11u8; 32]).unwrap()
    }

    #[test]
    fn sign_and_verify_roundtrip() {
        let key = test_key();
        let message = b"order-hash-bytes-stand-in";
        let sig = key.sign(message);
        assert!(key.public_key().verify(message, &sig).is_ok());
    }

    #[test]
    fn tampered_message_fails_verification() {
        let key = test_key();
        let sig = key.sign(b"original");
        assert!(key.public_key().verify(b"tampered", &sig).is_err());
    }

    #[test]
    fn evm_address_is_deterministic() {
        let key = test_key();
        assert_eq!(key.evm_address(), key.evm_address());
    }

    #[test]
    fn from_hex_accepts_0x_prefix() {
        let valid = "0x".to_string() + &"11".repeat(32);
        assert!(Secp256k1KeyPair::from_hex(&valid).is_ok());
    }

    #[test]
    fn from_hex_rejects_wrong_length() {
        assert!(Secp256k1KeyPair::from_hex("0x1234").is_err());
    }
}
