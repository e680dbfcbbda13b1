//! The `SecretStore`: secret generation, sealing at rest, and
//! one-time reveal.
//!
//! Reference: spec §4.1. Grounded in the teacher's
//! `qc-15-cross-chain::algorithms::secret` module (random generation,
//! hashlock digest, constant-time-ish verify), adapted from a pure
//! function module to a stateful store because this spec requires
//! encryption at rest and a one-shot reveal flag that the teacher's
//! in-memory `HTLC.secret: Option<Secret>` field does not model.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use rand::RngCore;
use swap_crypto::{decrypt, encrypt, keccak256, SecretKey};
use swap_types::{EncryptedSecret, OrchestratorError};
use tracing::{debug, warn};

/// Lower bound imposed on caller-supplied TTLs; prevents a
/// misconfigured `secret.ttlSeconds` from sealing secrets that expire
/// before the swap can plausibly complete.
pub const MIN_SECRET_TTL_SECONDS: u64 = 60;

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs()
}

/// First 4 bytes of a hashlock, hex-encoded — the only form a secret's
/// identity may appear in diagnostics (spec §4.1 "Plaintext is never
/// logged; all diagnostics identify secrets only by hashlock prefix").
pub fn hashlock_prefix(hashlock: &[u8; 32]) -> String {
    hex::encode(&hashlock[..4])
}

/// Policy applied to a `reveal` call against an already-used secret.
///
/// Reference: spec §4.1 "implementation chooses one policy but must
/// not allow a *different* secret to be returned."
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplayPolicy {
    /// Return the same plaintext bytes again.
    ReturnSameBytes,
    /// Fail with [`OrchestratorError::SecretAlreadyUsed`].
    Reject,
}

/// Generates, seals, and reveals HTLC secrets.
///
/// One process-scoped [`SecretKey`] encrypts every record; the key is
/// resolved from `secret.encryptionKey` configuration (spec §6) and
/// never derived per-secret.
pub struct SecretStore {
    key: SecretKey,
    ttl_seconds: u64,
    replay_policy: ReplayPolicy,
    records: RwLock<HashMap<[u8; 32], EncryptedSecret>>,
}

impl SecretStore {
    /// Construct a store with the given process-scoped key and
    /// default TTL (spec §6 `secret.ttlSeconds`).
    pub fn new(key: SecretKey, ttl_seconds: u64) -> Self {
        Self {
            key,
            ttl_seconds: ttl_seconds.max(MIN_SECRET_TTL_SECONDS),
            replay_policy: ReplayPolicy::ReturnSameBytes,
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Override the one-shot replay policy (default `ReturnSameBytes`).
    pub fn with_replay_policy(mut self, policy: ReplayPolicy) -> Self {
        self.replay_policy = policy;
        self
    }

    /// Generate a fresh 32-byte secret and its Keccak-256 hashlock.
    ///
    /// Reference: spec §4.1 `generate()`. The digest algorithm is
    /// fixed to Keccak-256 per spec §9's resolution of the hashlock
    /// digest parity open question.
    pub fn generate(&self) -> ([u8; 32], [u8; 32]) {
        let mut secret = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut secret);
        let hashlock = keccak256(&secret);
        (secret, hashlock)
    }

    /// Seal `secret` at rest under `hashlock`, encrypting with a fresh
    /// random IV.
    ///
    /// Reference: spec §4.1 `seal(secret, hashlock)`.
    pub fn seal(&self, secret: &[u8; 32], hashlock: [u8; 32]) -> Result<(), OrchestratorError> {
        let (ciphertext, iv, tag) =
            encrypt(&self.key, secret).map_err(|e| OrchestratorError::Internal(e.to_string()))?;

        let now = now_unix();
        let record = EncryptedSecret {
            ciphertext,
            iv,
            tag,
            created_at: now,
            expires_at: now + self.ttl_seconds,
            used: false,
        };

        debug!(hashlock_prefix = %hashlock_prefix(&hashlock), "secret sealed");
        self.records.write().insert(hashlock, record);
        Ok(())
    }

    /// Reveal the secret sealed under `hashlock`, exactly once in the
    /// observable sense described by spec §4.1.
    ///
    /// Errors: [`OrchestratorError::SecretNotFound`] if no record
    /// exists, [`OrchestratorError::SecretExpired`] if past TTL,
    /// [`OrchestratorError::SecretAlreadyUsed`] if the one-shot flag is
    /// set and the configured [`ReplayPolicy`] is `Reject`.
    pub fn reveal(&self, hashlock: [u8; 32]) -> Result<[u8; 32], OrchestratorError> {
        let prefix = hashlock_prefix(&hashlock);
        let mut records = self.records.write();
        let record = records.get_mut(&hashlock).ok_or_else(|| OrchestratorError::SecretNotFound {
            hashlock_prefix: prefix.clone(),
        })?;

        let now = now_unix();
        if now > record.expires_at {
            warn!(hashlock_prefix = %prefix, "reveal attempted on expired secret");
            return Err(OrchestratorError::SecretExpired { hashlock_prefix: prefix });
        }

        if record.used && self.replay_policy == ReplayPolicy::Reject {
            return Err(OrchestratorError::SecretAlreadyUsed { hashlock_prefix: prefix });
        }

        let plaintext = decrypt(&self.key, &record.ciphertext, &record.iv, &record.tag)
            .map_err(|e| OrchestratorError::Internal(e.to_string()))?;
        if plaintext.len() != 32 {
            return Err(OrchestratorError::Internal("sealed secret has unexpected length".into()));
        }

        let was_used = record.used;
        record.used = true;
        drop(records);

        if !was_used {
            debug!(hashlock_prefix = %prefix, "secret revealed for the first time");
        } else {
            debug!(hashlock_prefix = %prefix, "secret re-revealed under ReturnSameBytes policy");
        }

        let mut out = [0u8; 32];
        out.copy_from_slice(&plaintext);
        Ok(out)
    }

    /// Whether `hashlock`'s secret has already been revealed.
    pub fn is_used(&self, hashlock: &[u8; 32]) -> bool {
        self.records.read().get(hashlock).map(|r| r.used).unwrap_or(false)
    }

    /// Constant-time-equivalent verification that `candidate` hashes
    /// to `hashlock`.
    ///
    /// Reference: spec §4.1 `verify(candidateSecret, hashlock)`.
    pub fn verify(candidate: &[u8; 32], hashlock: &[u8; 32]) -> bool {
        use subtle::ConstantTimeEq;
        keccak256(candidate).ct_eq(hashlock).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SecretStore {
        SecretStore::new(SecretKey::generate(), 3600)
    }

    #[test]
    fn generate_produces_matching_hashlock() {
        let store = store();
        let (secret, hashlock) = store.generate();
        assert!(SecretStore::verify(&secret, &hashlock));
    }

    #[test]
    fn verify_rejects_wrong_secret() {
        let store = store();
        let (_, hashlock) = store.generate();
        let wrong = [0xEEu8; 32];
        assert!(!SecretStore::verify(&wrong, &hashlock));
    }

    #[test]
    fn seal_then_reveal_roundtrips() {
        let store = store();
        let (secret, hashlock) = store.generate();
        store.seal(&secret, hashlock).unwrap();

        let revealed = store.reveal(hashlock).unwrap();
        assert_eq!(revealed, secret);
        assert!(store.is_used(&hashlock));
    }

    #[test]
    fn reveal_unknown_hashlock_not_found() {
        let store = store();
        let err = store.reveal([0x42u8; 32]).unwrap_err();
        assert!(matches!(err, OrchestratorError::SecretNotFound { .. }));
    }

    #[test]
    fn reveal_expired_secret_fails() {
        let store = SecretStore::new(SecretKey::generate(), MIN_SECRET_TTL_SECONDS);
        let (secret, hashlock) = store.generate();
        store.seal(&secret, hashlock).unwrap();

        // Force expiry without sleeping the test.
        {
            let mut records = store.records.write();
            let record = records.get_mut(&hashlock).unwrap();
            record.expires_at = 0;
        }

        let err = store.reveal(hashlock).unwrap_err();
        assert!(matches!(err, OrchestratorError::SecretExpired { .. }));
    }

    #[test]
    fn reveal_twice_under_return_same_bytes_policy_matches() {
        let store = store();
        let (secret, hashlock) = store.generate();
        store.seal(&secret, hashlock).unwrap();

        let first = store.reveal(hashlock).unwrap();
        let second = store.reveal(hashlock).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn reveal_twice_under_reject_policy_fails_second_time() {
        let store = SecretStore::new(SecretKey::generate(), 3600).with_replay_policy(ReplayPolicy::Reject);
        let (secret, hashlock) = store.generate();
        store.seal(&secret, hashlock).unwrap();

        assert!(store.reveal(hashlock).is_ok());
        let err = store.reveal(hashlock).unwrap_err();
        assert!(matches!(err, OrchestratorError::SecretAlreadyUsed { .. }));
    }

    #[test]
    fn hashlock_prefix_is_four_bytes_hex() {
        let hashlock = [0xABu8; 32];
        assert_eq!(hashlock_prefix(&hashlock), "abababab");
    }
}
