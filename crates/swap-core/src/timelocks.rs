//! Deriving a session's seven timelock offsets from configuration.
//!
//! Reference: spec §4.4, §6 `timelocks.*Offset`.

use swap_types::{TimelockConfig, Timelocks};

/// Compute absolute timelocks for a session created at `now` from the
/// configured relative offsets.
///
/// Reference: spec §4.4 "computed at session creation time" and the
/// safety invariant `dstCancellation < srcWithdrawal`, which
/// [`TimelockConfig::default`] is constructed to always satisfy; a
/// caller-overridden config is still validated by
/// [`crate::session_store::SessionStore::create`] before being
/// persisted.
pub fn compute(config: &TimelockConfig, now: u64) -> Timelocks {
    Timelocks {
        src_deployed_at: now.saturating_sub(config.deployed_backdate_seconds),
        src_withdrawal: now + config.src_withdrawal_offset,
        src_public_withdrawal: now + config.src_public_withdrawal_offset,
        src_cancellation: now + config.src_cancellation_offset,
        dst_deployed_at: now.saturating_sub(config.deployed_backdate_seconds),
        dst_withdrawal: now + config.dst_withdrawal_offset,
        dst_cancellation: now + config.dst_cancellation_offset,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computed_timelocks_satisfy_safety_margin() {
        let config = TimelockConfig::default();
        let timelocks = compute(&config, 1_000_000);
        assert!(timelocks.satisfies_safety_margin());
    }

    #[test]
    fn deployed_at_is_backdated() {
        let config = TimelockConfig::default();
        let timelocks = compute(&config, 1_000_000);
        assert!(timelocks.src_deployed_at < 1_000_000);
        assert!(timelocks.dst_deployed_at < 1_000_000);
    }
}
