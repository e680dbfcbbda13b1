//! The orchestrator's configuration surface.
//!
//! Reference: spec §6 "Configuration surface (recognized options)".
//! Grounded in the `config` crate layering pattern used elsewhere in
//! the pack (`Dclock24-MSB`'s `config = "0.13"` dependency): defaults,
//! then an optional file, then environment overrides.

use serde::{Deserialize, Serialize};

/// Chain A (EVM) connection and contract configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChainAConfig {
    /// JSON-RPC endpoint URL.
    pub rpc_url: String,
    /// EIP-155 chain id.
    pub chain_id: u64,
    /// Escrow factory contract address.
    pub factory_address: [u8; 20],
    /// Hex-encoded signer private key. Absent means read-only mode.
    pub signer_key: Option<String>,
}

/// Chain B (non-EVM) connection and contract configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChainBConfig {
    /// Network identifier (e.g. `"testnet"`, `"mainnet"`).
    pub network_id: String,
    /// Primary RPC endpoint.
    pub rpc_url: String,
    /// Secondary RPC endpoint used on primary failure.
    pub backup_rpc_url: Option<String>,
    /// HTLC contract account identifier.
    pub htlc_contract: String,
    /// Signer account identifier. Absent means read-only mode.
    pub account_id: Option<String>,
    /// Signer private key, loaded from a filesystem credential store
    /// taking precedence over this field when both are present
    /// (spec §4.6 "Credential model").
    pub private_key: Option<String>,
}

/// Session lifecycle configuration.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Maximum concurrently active sessions.
    pub max_active: usize,
    /// Default session retention window (seconds) after creation.
    pub timeout_seconds: u64,
    /// Interval between `SessionStore::sweep()` runs.
    pub cleanup_interval_ms: u64,
}

/// Timelock offset configuration, relative seconds from session
/// creation time.
///
/// Reference: spec §4.4, §6.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct TimelockConfig {
    /// Offset to `srcWithdrawal`.
    pub src_withdrawal_offset: u64,
    /// Offset to `srcPublicWithdrawal`.
    pub src_public_withdrawal_offset: u64,
    /// Offset to `srcCancellation`.
    pub src_cancellation_offset: u64,
    /// Offset to `dstWithdrawal`.
    pub dst_withdrawal_offset: u64,
    /// Offset to `dstCancellation`.
    pub dst_cancellation_offset: u64,
    /// How far in the past `deployedAt` values are backdated.
    pub deployed_backdate_seconds: u64,
}

/// Chain monitoring configuration.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Chain B poll interval (milliseconds).
    pub poll_interval_ms: u64,
    /// Confirmations required before an observation is trusted.
    pub confirmation_depth: u64,
    /// Max retry attempts before giving up on an RPC call.
    pub max_retries: u32,
    /// Exponential back-off base (milliseconds).
    pub backoff_base_ms: u64,
    /// Bound on waiting for both legs to lock (spec §4.8 step 4,
    /// "bounded by `waitForBothLockedTimeout`, default 10 min").
    pub wait_for_both_locked_timeout_ms: u64,
}

/// Secret store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SecretConfig {
    /// Default secret TTL (seconds).
    pub ttl_seconds: u64,
    /// Hex-encoded 32-byte AES-256-GCM key. In production this is
    /// resolved from a KMS/secret-manager, not a config file.
    pub encryption_key: String,
}

/// The complete configuration surface.
///
/// Reference: spec §6.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Chain A settings.
    pub chain_a: ChainAConfig,
    /// Chain B settings.
    pub chain_b: ChainBConfig,
    /// Session settings.
    pub session: SessionConfig,
    /// Timelock offsets.
    pub timelocks: TimelockConfig,
    /// Monitoring settings.
    pub monitor: MonitorConfig,
    /// Secret store settings.
    pub secret: SecretConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_active: 10_000,
            timeout_seconds: 24 * 3600,
            cleanup_interval_ms: 60_000,
        }
    }
}

impl Default for TimelockConfig {
    fn default() -> Self {
        // Defaults chosen so the safety margin in spec §4.4
        // (`dstCancellation < srcWithdrawal`) always holds for any
        // session created with no per-request overrides.
        Self {
            src_withdrawal_offset: 3 * 3600,
            src_public_withdrawal_offset: 4 * 3600,
            src_cancellation_offset: 5 * 3600,
            dst_withdrawal_offset: 30 * 60,
            dst_cancellation_offset: 2 * 3600,
            deployed_backdate_seconds: 10,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5_000,
            confirmation_depth: 6,
            max_retries: 5,
            backoff_base_ms: 500,
            wait_for_both_locked_timeout_ms: 10 * 60 * 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timelock_offsets_satisfy_safety_margin() {
        let t = TimelockConfig::default();
        // dst_cancellation (absolute) must land before src_withdrawal.
        assert!(t.dst_cancellation_offset < t.src_withdrawal_offset);
    }

    #[test]
    fn default_session_config_has_positive_capacity() {
        assert!(SessionConfig::default().max_active > 0);
    }

    #[test]
    fn default_wait_for_both_locked_timeout_is_ten_minutes() {
        assert_eq!(MonitorConfig::default().wait_for_both_locked_timeout_ms, 10 * 60 * 1000);
    }
}
