//! Chain B (non-EVM) integration.
//!
//! Reference: spec §4.6. Grounded in the NEAR HTLC contract shape from
//! `other_examples/90e93861_...fusion-plus-htlc-src-types.rs` (the
//! `HTLC`/`HTLCState` fields this adapter's JSON-RPC calls populate and
//! read back) and in the teacher's read/write adapter split
//! (`qc-15-cross-chain::adapters::chain_client`).

pub mod http;
pub mod types;

pub use http::{HttpChainBClient, MockChainBClient};
pub use types::{HtlcState, DstHtlc};

use async_trait::async_trait;
use swap_types::OrchestratorError;

/// Outbound port to the non-EVM destination chain.
///
/// Reference: spec §4.6 "Required operations". Chain B exposes no
/// push-subscription primitive in this design (spec §4.7); state is
/// observed by polling [`ChainBClient::get_htlc`].
#[async_trait]
pub trait ChainBClient: Send + Sync {
    /// Create a new HTLC locking `amount` of `token` for `receiver`,
    /// released by revealing the preimage of `hashlock` before
    /// `timelock` (unix seconds). Returns the HTLC's on-chain
    /// identifier and the submitting transaction hash.
    async fn create_htlc(
        &self,
        receiver: &str,
        token: &str,
        amount: primitive_types::U256,
        hashlock: [u8; 32],
        timelock: u64,
        order_hash: [u8; 32],
    ) -> Result<(String, String), OrchestratorError>;

    /// Withdraw `htlc_id` by presenting `secret`. Returns the
    /// submitting transaction hash.
    async fn withdraw_htlc(&self, htlc_id: &str, secret: &[u8; 32]) -> Result<String, OrchestratorError>;

    /// Refund `htlc_id` after its timelock has elapsed. Returns the
    /// submitting transaction hash.
    async fn refund_htlc(&self, htlc_id: &str) -> Result<String, OrchestratorError>;

    /// Read the current on-chain state of `htlc_id`.
    async fn get_htlc(&self, htlc_id: &str) -> Result<DstHtlc, OrchestratorError>;

    /// Current finalized block height, used to gate the
    /// `monitor.confirmationDepth` check before an observation is
    /// trusted (spec §6).
    async fn current_block(&self) -> Result<u64, OrchestratorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_create_then_withdraw_roundtrips() {
        let client = MockChainBClient::new();
        let hashlock = [0x07u8; 32];
        let (htlc_id, _tx) = client
            .create_htlc("bob.testnet", "native", primitive_types::U256::from(5_000u64), hashlock, 9_999, [0x01u8; 32])
            .await
            .unwrap();

        let htlc = client.get_htlc(&htlc_id).await.unwrap();
        assert_eq!(htlc.state, HtlcState::Active);

        let secret = [0x22u8; 32];
        client.withdraw_htlc(&htlc_id, &secret).await.unwrap();
        let htlc = client.get_htlc(&htlc_id).await.unwrap();
        assert_eq!(htlc.state, HtlcState::Withdrawn);
    }
}
