//! Chain A wire/domain types.
//!
//! Reference: spec §4.5, §3.

use serde::{Deserialize, Serialize};

/// The immutable parameters bound to a source-chain escrow at
/// creation time. Mirrors the tuple the teacher's `HTLCContract::deploy`
/// (qc-15-cross-chain) passes, extended with the fields a cross-chain
/// escrow factory needs beyond a single-chain HTLC (safety deposit,
/// the four source-side timelock offsets).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SrcImmutables {
    /// Deterministic order hash binding this escrow to its session.
    pub order_hash: [u8; 32],
    /// `H(secret)`.
    pub hashlock: [u8; 32],
    /// Maker EVM address (funds the escrow).
    pub maker: [u8; 20],
    /// Taker EVM address, or [`swap_types::Principal::PLACEHOLDER`]
    /// when the real taker is non-EVM (spec §9).
    pub taker: [u8; 20],
    /// ERC-20 token address, or the zero address for native ETH.
    pub token: [u8; 20],
    /// Escrowed amount, smallest unit.
    pub amount: primitive_types::U256,
    /// Resolver safety deposit, smallest unit.
    pub safety_deposit: primitive_types::U256,
    /// Deploy timestamp (backdated slightly, spec §4.4).
    pub deployed_at: u64,
    /// Earliest maker-secret withdrawal.
    pub withdrawal: u64,
    /// Earliest public (any-holder-of-secret) withdrawal.
    pub public_withdrawal: u64,
    /// Earliest maker cancellation.
    pub cancellation: u64,
}

/// Events surfaced from chain A's escrow factory and escrow clones.
///
/// Reference: spec §4.7 "Chain A: push-based, driven by contract
/// events."
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChainAEvent {
    /// A new source escrow was deployed.
    SrcEscrowCreated {
        /// The escrow's deployed address.
        escrow_address: String,
        /// Order hash bound to the escrow.
        order_hash: [u8; 32],
        /// The originating transaction hash.
        tx_hash: String,
        /// Block the event was included in.
        block_number: u64,
    },
    /// A source escrow was withdrawn from (secret revealed on-chain).
    SrcEscrowWithdrawn {
        /// Which escrow.
        escrow_address: String,
        /// The secret revealed by the withdrawal calldata.
        secret: [u8; 32],
        /// The originating transaction hash.
        tx_hash: String,
        /// Block the event was included in.
        block_number: u64,
    },
    /// A source escrow was cancelled (refunded to maker).
    SrcEscrowCancelled {
        /// Which escrow.
        escrow_address: String,
        /// The originating transaction hash.
        tx_hash: String,
        /// Block the event was included in.
        block_number: u64,
    },
}

impl ChainAEvent {
    /// The block number this event was observed at, used by
    /// [`crate::event_monitor::EventMonitor`] to advance its
    /// replay cursor.
    pub fn block_number(&self) -> u64 {
        match self {
            ChainAEvent::SrcEscrowCreated { block_number, .. }
            | ChainAEvent::SrcEscrowWithdrawn { block_number, .. }
            | ChainAEvent::SrcEscrowCancelled { block_number, .. } => *block_number,
        }
    }

    /// A stable dedup key: `(tx_hash, variant discriminant)`. Reorgs
    /// that re-emit the same transaction under a new block number
    /// still collapse to the same key only when the tx hash itself is
    /// unchanged, which is the common case for a finalized-depth replay
    /// window (spec §6 `monitor.confirmationDepth`).
    pub fn dedup_key(&self) -> String {
        match self {
            ChainAEvent::SrcEscrowCreated { tx_hash, .. } => format!("created:{tx_hash}"),
            ChainAEvent::SrcEscrowWithdrawn { tx_hash, .. } => format!("withdrawn:{tx_hash}"),
            ChainAEvent::SrcEscrowCancelled { tx_hash, .. } => format!("cancelled:{tx_hash}"),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub fn sample_immutables() -> SrcImmutables {
        SrcImmutables {
            order_hash: [0x01u8; 32],
            hashlock: [0x02u8; 32],
            maker: [0xAAu8; 20],
            taker: [0xBBu8; 20],
            token: [0u8; 20],
            amount: primitive_types::U256::from(1_000_000u64),
            safety_deposit: primitive_types::U256::from(1_000u64),
            deployed_at: 0,
            withdrawal: 1_000,
            public_withdrawal: 1_500,
            cancellation: 2_000,
        }
    }

    #[test]
    fn dedup_key_distinguishes_variants_on_same_tx() {
        let created = ChainAEvent::SrcEscrowCreated {
            escrow_address: "0xescrow".into(),
            order_hash: [0u8; 32],
            tx_hash: "0xabc".into(),
            block_number: 10,
        };
        let withdrawn = ChainAEvent::SrcEscrowWithdrawn {
            escrow_address: "0xescrow".into(),
            secret: [0u8; 32],
            tx_hash: "0xabc".into(),
            block_number: 11,
        };
        assert_ne!(created.dedup_key(), withdrawn.dedup_key());
    }
}
