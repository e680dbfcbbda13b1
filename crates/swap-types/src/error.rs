//! The orchestrator error taxonomy.
//!
//! Reference: spec §7. These are *kinds*, not per-component types —
//! every crate that can fail maps its internal errors onto this enum
//! at its public boundary, the way the teacher's `CrossChainError`
//! (qc-15-cross-chain) is the single error type its ports return.

use thiserror::Error;

/// Orchestrator-wide error taxonomy.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Malformed input, unknown chain, invalid address/account format,
    /// timelock invariant violation.
    #[error("validation error: {0}")]
    Validation(String),

    /// Session limit reached.
    #[error("capacity exceeded: {active}/{max} active sessions")]
    CapacityExceeded {
        /// Current number of active sessions.
        active: usize,
        /// Configured maximum.
        max: usize,
    },

    /// State-machine violation.
    #[error("illegal transition: {from} -> {to}")]
    IllegalTransition {
        /// The status the session was in.
        from: String,
        /// The status the caller attempted to transition to.
        to: String,
    },

    /// Unknown session, unknown HTLC, missing escrow.
    #[error("not found: {0}")]
    NotFound(String),

    /// Signer balance or attached deposit below requirement.
    #[error("insufficient funds: need {required}, have {available}")]
    InsufficientFunds {
        /// Amount required (smallest unit, decimal string to stay
        /// arbitrary-precision-agnostic).
        required: String,
        /// Amount available.
        available: String,
    },

    /// Transport or node error; retryable with back-off.
    #[error("rpc failure: {0}")]
    RpcFailure(String),

    /// On-chain revert, with decoded reason when available; not
    /// retryable.
    #[error("chain rejection: {0}")]
    ChainRejection(String),

    /// No record exists for the presented hashlock.
    #[error("secret not found for hashlock prefix {hashlock_prefix}")]
    SecretNotFound {
        /// First 4 bytes of the hashlock, hex-encoded, for diagnostics
        /// without ever logging the secret itself.
        hashlock_prefix: String,
    },

    /// Past the secret's TTL.
    #[error("secret expired for hashlock prefix {hashlock_prefix}")]
    SecretExpired {
        /// Hashlock prefix (see [`OrchestratorError::SecretNotFound`]).
        hashlock_prefix: String,
    },

    /// The one-shot reveal flag was already set and the configured
    /// policy forbids returning the secret again.
    #[error("secret already used for hashlock prefix {hashlock_prefix}")]
    SecretAlreadyUsed {
        /// Hashlock prefix (see [`OrchestratorError::SecretNotFound`]).
        hashlock_prefix: String,
    },

    /// No signing key configured for the given chain.
    #[error("write operations unavailable on {chain}: no signing key configured")]
    WriteOperationsUnavailable {
        /// The chain that lacks a signer.
        chain: String,
    },

    /// Deadline exceeded.
    #[error("operation timed out after {elapsed_ms}ms (deadline {deadline_ms}ms)")]
    OperationTimeout {
        /// Milliseconds actually elapsed.
        elapsed_ms: u64,
        /// Configured deadline in milliseconds.
        deadline_ms: u64,
    },

    /// Everything else; surfaces opaquely to callers.
    #[error("internal error: {0}")]
    Internal(String),
}

impl OrchestratorError {
    /// True if retrying the same operation later might succeed.
    ///
    /// Reference: spec §7 "Propagation policy" — RPC failures are
    /// retried locally with back-off; validation, chain rejection,
    /// and state-machine errors are surfaced immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(self, OrchestratorError::RpcFailure(_) | OrchestratorError::OperationTimeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_failure_is_retryable() {
        assert!(OrchestratorError::RpcFailure("timeout".into()).is_retryable());
    }

    #[test]
    fn chain_rejection_is_not_retryable() {
        assert!(!OrchestratorError::ChainRejection("revert: bad hashlock".into()).is_retryable());
    }

    #[test]
    fn illegal_transition_message_contains_states() {
        let err = OrchestratorError::IllegalTransition {
            from: "source_locked".into(),
            to: "completed".into(),
        };
        assert!(err.to_string().contains("source_locked"));
        assert!(err.to_string().contains("completed"));
    }
}
