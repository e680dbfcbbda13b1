//! The `Session` entity and its state machine.
//!
//! Reference: spec §3 (data model), §4.3 (state machine).

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chain::{ChainId, Principal, TokenRef};

/// Opaque session identifier, unique across the process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Generate a new random session id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The swap lifecycle. Edges not listed in [`SessionStatus::can_transition_to`]
/// are illegal.
///
/// Reference: spec §4.3.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    /// Created, secret/hashlock allocated, nothing on-chain yet.
    Initialized,
    /// The executor has claimed the session and begun the sequence.
    Executing,
    /// Submitting the source-chain escrow deploy transaction.
    SourceLocking,
    /// Source-chain escrow deployed and confirmed.
    SourceLocked,
    /// Submitting the destination-chain HTLC create transaction.
    DestinationLocking,
    /// Both escrows locked; awaiting secret reveal.
    BothLocked,
    /// The secret is being revealed on the destination chain.
    RevealingSecret,
    /// Both sides withdrawn; swap succeeded.
    Completed,
    /// Cooperative cancellation in progress (pre-lock abort).
    Cancelling,
    /// Cancelled before any on-chain state existed.
    Cancelled,
    /// A step failed in a way that leaves no recoverable path forward.
    Failed,
    /// A timeout boundary was crossed; refund flow will follow.
    Timeout,
    /// Refund transactions are in flight.
    Refunding,
    /// Refund confirmed on the chain(s) holding locked funds.
    Refunded,
}

impl SessionStatus {
    /// Terminal statuses never transition further.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::Completed
                | SessionStatus::Cancelled
                | SessionStatus::Failed
                | SessionStatus::Refunded
        )
    }

    /// Validate a proposed transition against the table in spec §4.3.
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        matches!(
            (self, next),
            (Initialized, Executing)
                | (Initialized, Cancelled)
                | (Executing, SourceLocking)
                | (Executing, Cancelled)
                | (Executing, Failed)
                | (SourceLocking, SourceLocked)
                | (SourceLocking, Failed)
                | (SourceLocked, DestinationLocking)
                | (SourceLocked, Cancelling)
                | (SourceLocked, Timeout)
                | (DestinationLocking, BothLocked)
                | (DestinationLocking, Failed)
                | (BothLocked, RevealingSecret)
                | (BothLocked, Timeout)
                | (RevealingSecret, Completed)
                | (RevealingSecret, Failed)
                | (Cancelling, Refunding)
                | (Cancelling, Cancelled)
                | (Timeout, Refunding)
                | (Refunding, Refunded)
        )
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionStatus::Initialized => "initialized",
            SessionStatus::Executing => "executing",
            SessionStatus::SourceLocking => "source_locking",
            SessionStatus::SourceLocked => "source_locked",
            SessionStatus::DestinationLocking => "destination_locking",
            SessionStatus::BothLocked => "both_locked",
            SessionStatus::RevealingSecret => "revealing_secret",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelling => "cancelling",
            SessionStatus::Cancelled => "cancelled",
            SessionStatus::Failed => "failed",
            SessionStatus::Timeout => "timeout",
            SessionStatus::Refunding => "refunding",
            SessionStatus::Refunded => "refunded",
        };
        write!(f, "{s}")
    }
}

/// The seven timelock offsets carried by every session.
///
/// Reference: spec §4.4. All values are absolute unix timestamps
/// (seconds) computed at session creation time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timelocks {
    /// Slightly in the past; ensures `now >= deployed_at` at
    /// contract-side checks.
    pub src_deployed_at: u64,
    /// Earliest moment maker-side secret-withdraw is allowed on A.
    pub src_withdrawal: u64,
    /// After which anyone holding the secret may withdraw on A.
    pub src_public_withdrawal: u64,
    /// After which maker may cancel the A-side escrow.
    pub src_cancellation: u64,
    /// Analogous deploy timestamp for B.
    pub dst_deployed_at: u64,
    /// Earliest B-side withdraw.
    pub dst_withdrawal: u64,
    /// After which B-side may be refunded.
    pub dst_cancellation: u64,
}

impl Timelocks {
    /// The cross-chain safety invariant: the destination chain's
    /// cancellation deadline must fall strictly before the source
    /// chain's withdrawal window opens.
    ///
    /// Reference: spec §3 invariants, §4.4 "Safety invariant".
    pub fn satisfies_safety_margin(&self) -> bool {
        self.dst_cancellation < self.src_withdrawal
    }
}

/// Status of an [`ExecutionStep`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStepStatus {
    /// Queued, not yet attempted.
    Pending,
    /// In flight.
    Executing,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
}

/// One entry in the per-session execution ledger.
///
/// Reference: spec §4.10. Immutable once `status` reaches `Completed`
/// or `Failed`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutionStep {
    /// The operation this step represents, e.g. `createSrcEscrow`.
    pub function: String,
    /// Which chain/contract the operation targets.
    pub contract: ChainId,
    /// A human-readable summary of the parameters passed (never the
    /// raw secret).
    pub params: String,
    /// Current status.
    pub status: ExecutionStepStatus,
    /// Transaction reference once submitted.
    pub tx_ref: Option<String>,
    /// Escrow/HTLC reference produced by this step, if any.
    pub escrow_ref: Option<String>,
    /// Opaque result summary on success.
    pub result: Option<String>,
    /// Error message on failure.
    pub error: Option<String>,
    /// Gas used, for EVM-side steps.
    pub gas_used: Option<u64>,
    /// Unix timestamp this step last changed status.
    pub timestamp: u64,
}

impl ExecutionStep {
    /// Construct a new step in the `Pending` status.
    pub fn new(function: impl Into<String>, contract: ChainId, params: impl Into<String>, now: u64) -> Self {
        Self {
            function: function.into(),
            contract,
            params: params.into(),
            status: ExecutionStepStatus::Pending,
            tx_ref: None,
            escrow_ref: None,
            result: None,
            error: None,
            gas_used: None,
            timestamp: now,
        }
    }
}

/// The central per-swap entity.
///
/// Reference: spec §3.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    /// Opaque identifier, unique across the process.
    pub id: SessionId,
    /// Current lifecycle status.
    pub status: SessionStatus,
    /// Source chain (always [`ChainId::ChainA`] in the current design).
    pub source_chain: ChainId,
    /// Destination chain (always [`ChainId::ChainB`]).
    pub destination_chain: ChainId,
    /// Token transferred on the source chain.
    pub source_token: TokenRef,
    /// Token transferred on the destination chain.
    pub destination_token: TokenRef,
    /// Amount on the source chain, smallest unit (arbitrary precision).
    pub source_amount: U256,
    /// Amount on the destination chain, smallest unit.
    pub destination_amount: U256,
    /// Maker (holds source assets).
    pub maker: Principal,
    /// Taker (holds destination assets).
    pub taker: Principal,
    /// Slippage tolerance in basis points.
    pub slippage_tolerance_bps: u16,
    /// `H(secret)`, 32 bytes.
    pub hashlock: [u8; 32],
    /// Deterministic 32-byte identifier derived from `id`.
    pub order_hash: [u8; 32],
    /// Populated once the A-side escrow is deployed.
    pub src_escrow_address: Option<[u8; 20]>,
    /// Populated once the B-side HTLC is created.
    pub dst_htlc_handle: Option<String>,
    /// The secret, once revealed. Only populated in "client-completes-A"
    /// mode where the external taker needs it to submit their own
    /// withdraw (spec §9).
    pub revealed_secret: Option<[u8; 32]>,
    /// Creation timestamp (unix seconds).
    pub created_at: u64,
    /// Last mutation timestamp.
    pub updated_at: u64,
    /// Retention/garbage-collection deadline.
    pub expiration_time: u64,
    /// Ordered execution history (mirrors the authoritative
    /// `ExecutionLedger` entry-for-entry).
    pub steps: Vec<ExecutionStep>,
    /// The seven timelock offsets for this swap.
    pub timelocks: Timelocks,
}

impl Session {
    /// True if a src escrow may legally be present given the current
    /// status, per the invariant in spec §3.
    pub fn status_allows_src_escrow(&self) -> bool {
        matches!(
            self.status,
            SessionStatus::SourceLocked
                | SessionStatus::DestinationLocking
                | SessionStatus::BothLocked
                | SessionStatus::RevealingSecret
                | SessionStatus::Completed
                | SessionStatus::Cancelling
                | SessionStatus::Refunding
                | SessionStatus::Refunded
                | SessionStatus::Failed
        )
    }

    /// True if a dst HTLC handle may legally be present given the
    /// current status, per the invariant in spec §3.
    pub fn status_allows_dst_htlc(&self) -> bool {
        matches!(
            self.status,
            SessionStatus::BothLocked
                | SessionStatus::RevealingSecret
                | SessionStatus::Completed
                | SessionStatus::Refunding
                | SessionStatus::Refunded
                | SessionStatus::Failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_timelocks(dst_cancel_before_src_withdraw: bool) -> Timelocks {
        Timelocks {
            src_deployed_at: 100,
            src_withdrawal: 1_000,
            src_public_withdrawal: 1_500,
            src_cancellation: 2_000,
            dst_deployed_at: 100,
            dst_withdrawal: 200,
            dst_cancellation: if dst_cancel_before_src_withdraw { 900 } else { 1_100 },
        }
    }

    #[test]
    fn safety_margin_holds_when_dst_cancel_before_src_withdraw() {
        assert!(sample_timelocks(true).satisfies_safety_margin());
    }

    #[test]
    fn safety_margin_violated_when_dst_cancel_after_src_withdraw() {
        assert!(!sample_timelocks(false).satisfies_safety_margin());
    }

    #[test]
    fn state_machine_matches_spec_table() {
        use SessionStatus::*;
        let edges = [
            (Initialized, Executing),
            (Initialized, Cancelled),
            (Executing, SourceLocking),
            (Executing, Cancelled),
            (Executing, Failed),
            (SourceLocking, SourceLocked),
            (SourceLocking, Failed),
            (SourceLocked, DestinationLocking),
            (SourceLocked, Cancelling),
            (SourceLocked, Timeout),
            (DestinationLocking, BothLocked),
            (DestinationLocking, Failed),
            (BothLocked, RevealingSecret),
            (BothLocked, Timeout),
            (RevealingSecret, Completed),
            (RevealingSecret, Failed),
            (Cancelling, Refunding),
            (Cancelling, Cancelled),
            (Timeout, Refunding),
            (Refunding, Refunded),
        ];
        for (from, to) in edges {
            assert!(from.can_transition_to(to), "{from} -> {to} should be legal");
        }
    }

    #[test]
    fn illegal_transition_rejected() {
        assert!(!SessionStatus::SourceLocked.can_transition_to(SessionStatus::Completed));
        assert!(!SessionStatus::Initialized.can_transition_to(SessionStatus::Completed));
    }

    #[test]
    fn terminal_statuses() {
        assert!(SessionStatus::Completed.is_terminal());
        assert!(SessionStatus::Cancelled.is_terminal());
        assert!(SessionStatus::Failed.is_terminal());
        assert!(SessionStatus::Refunded.is_terminal());
        assert!(!SessionStatus::BothLocked.is_terminal());
    }

    #[test]
    fn session_id_display_roundtrip() {
        let id = SessionId::new();
        let s = id.to_string();
        assert_eq!(s, id.0.to_string());
    }
}
