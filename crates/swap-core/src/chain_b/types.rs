//! Chain B wire/domain types.
//!
//! Reference: spec §4.6, §3. Field shape grounded in the NEAR
//! HTLC contract (`other_examples/90e93861_...fusion-plus-htlc-src-types.rs`):
//! `sender`/`receiver`/`token`/`amount`/`hashlock`/`timelock`/`secret`/`state`.

use serde::{Deserialize, Serialize};

/// Lifecycle of a destination-chain HTLC.
///
/// Reference: the NEAR contract's `HTLCState` enum, narrowed: this
/// orchestrator never observes `Expired` as distinct from `Active`
/// past `timelock` — it derives "refundable" from wall-clock time
/// against `timelock` itself (spec §4.6).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HtlcState {
    /// Locked, not yet withdrawn or refunded.
    Active,
    /// Withdrawn by the receiver with the correct secret.
    Withdrawn,
    /// Refunded to the sender after `timelock` elapsed.
    Refunded,
}

/// A destination-chain HTLC snapshot.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DstHtlc {
    /// On-chain identifier.
    pub htlc_id: String,
    /// Sender (maker) account id.
    pub sender: String,
    /// Receiver (taker) account id.
    pub receiver: String,
    /// Token/contract identifier, or `"native"`.
    pub token: String,
    /// Locked amount, smallest unit.
    pub amount: primitive_types::U256,
    /// `H(secret)`, 32 bytes.
    pub hashlock: [u8; 32],
    /// Unix timestamp after which refund becomes possible.
    pub timelock: u64,
    /// Revealed secret, once withdrawn.
    pub secret: Option<[u8; 32]>,
    /// Current lifecycle state.
    pub state: HtlcState,
    /// Linked source-chain order hash, carried for cross-referencing.
    pub order_hash: [u8; 32],
}
