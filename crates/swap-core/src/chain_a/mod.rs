//! Chain A (EVM) integration.
//!
//! Reference: spec §4.5. Grounded in the teacher's outbound-port split
//! (`qc-15-cross-chain::ports::outbound::ExternalChainClient` /
//! `adapters::chain_client::HttpChainClient`) and in
//! `Dclock24-MSB::cross_chain_atomic_proof`'s `ethers` usage pattern
//! for the concrete EVM adapter.

pub mod evm;
pub mod types;

pub use evm::{EvmChainAClient, MockChainAClient};
pub use types::{ChainAEvent, SrcImmutables};

use async_trait::async_trait;
use swap_types::OrchestratorError;
use tokio::sync::mpsc;

/// Outbound port to the EVM-compatible source chain.
///
/// Reference: spec §4.5 "Required operations". Every method maps
/// one-to-one onto an `ExecutionStep::function` name used by
/// [`crate::executor::CrossChainExecutor`] and [`crate::ledger::ExecutionLedger`].
#[async_trait]
pub trait ChainAClient: Send + Sync {
    /// Ensure the factory holds at least `amount` allowance over
    /// `token` from the maker, approving the difference if not.
    ///
    /// Reference: spec §4.5 "ensures allowance ≥ amount before
    /// submit". A no-op for native-asset swaps; the executor only
    /// calls this for ERC-20-like source tokens. Returns the
    /// approval transaction hash, or `None` if the existing allowance
    /// already covered `amount` and no transaction was submitted.
    async fn ensure_allowance(&self, token: [u8; 20], amount: primitive_types::U256) -> Result<Option<String>, OrchestratorError>;

    /// Deploy a new source escrow clone via the factory, funding it
    /// from the maker's balance. Returns the escrow's deployed address
    /// and the deployment transaction hash.
    async fn create_src_escrow(&self, immutables: &SrcImmutables) -> Result<(String, String), OrchestratorError>;

    /// Withdraw from `escrow_address` using the revealed `secret`.
    /// Returns the withdrawal transaction hash.
    async fn withdraw_src_escrow(&self, escrow_address: &str, secret: &[u8; 32]) -> Result<String, OrchestratorError>;

    /// Cancel `escrow_address`, returning funds to the maker. Returns
    /// the cancellation transaction hash.
    async fn cancel_src_escrow(&self, escrow_address: &str) -> Result<String, OrchestratorError>;

    /// Read back the on-chain immutables for `escrow_address`, used to
    /// cross-check what the executor submitted against what the
    /// contract actually stored.
    async fn get_immutables(&self, escrow_address: &str) -> Result<SrcImmutables, OrchestratorError>;

    /// Current confirmed block height.
    async fn current_block(&self) -> Result<u64, OrchestratorError>;

    /// Subscribe to factory/escrow events from `from_block` onward.
    /// The returned receiver yields events in chain order; the caller
    /// (`EventMonitor`) is responsible for deduplication across
    /// reconnects.
    async fn subscribe_events(&self, from_block: u64) -> Result<mpsc::Receiver<ChainAEvent>, OrchestratorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_create_then_withdraw_roundtrips() {
        let client = MockChainAClient::new();
        let immutables = types::tests::sample_immutables();

        let (address, _tx) = client.create_src_escrow(&immutables).await.unwrap();
        let fetched = client.get_immutables(&address).await.unwrap();
        assert_eq!(fetched.hashlock, immutables.hashlock);

        let secret = [0x11u8; 32];
        let tx = client.withdraw_src_escrow(&address, &secret).await.unwrap();
        assert!(!tx.is_empty());
    }
}
