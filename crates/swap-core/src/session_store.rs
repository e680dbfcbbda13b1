//! The `SessionStore`: authoritative session state, indexed access,
//! and transition validation.
//!
//! Reference: spec §4.2. Grounded in the teacher's in-memory adapter
//! pattern (`qc-15-cross-chain::adapters::chain_client::HttpChainClient`,
//! `adapters::htlc_contract::InMemoryHTLCContract`): a `parking_lot::RwLock`
//! guarding a `HashMap`, with index maps kept alongside the primary
//! table. Per-session serialization (spec §5) is achieved by always
//! locking the whole table for mutation, a conservative superset of
//! "a mutex keyed by session id" appropriate for the in-process
//! default implementation named in spec §6 ("the default in-process
//! implementation must expose the same semantics as any external
//! one").

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use swap_crypto::keccak256;
use swap_types::{
    ChainId, OrchestratorError, Principal, Session, SessionId, SessionStatus, TokenRef, Timelocks,
};
use tracing::{debug, info};

use crate::secret_store::SecretStore;

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs()
}

/// Which side of a swap an escrow/HTLC reference belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EscrowSide {
    /// Chain A (EVM) escrow.
    Src,
    /// Chain B (non-EVM) HTLC.
    Dst,
}

/// Parameters accepted by [`SessionStore::create`].
///
/// Reference: spec §3 "Session" fields that are caller-supplied
/// rather than derived.
#[derive(Clone, Debug)]
pub struct CreateSessionParams {
    /// Source chain (conventionally always [`ChainId::ChainA`]).
    pub source_chain: ChainId,
    /// Destination chain (conventionally always [`ChainId::ChainB`]).
    pub destination_chain: ChainId,
    /// Token transferred on the source chain.
    pub source_token: TokenRef,
    /// Token transferred on the destination chain.
    pub destination_token: TokenRef,
    /// Source amount, smallest unit.
    pub source_amount: primitive_types::U256,
    /// Destination amount, smallest unit.
    pub destination_amount: primitive_types::U256,
    /// Maker (holds source assets).
    pub maker: Principal,
    /// Taker (holds destination assets).
    pub taker: Principal,
    /// Slippage tolerance in basis points.
    pub slippage_tolerance_bps: u16,
    /// Timelocks computed by the caller (typically via
    /// `crate::timelocks::compute`), already validated against the
    /// safety margin in spec §4.4.
    pub timelocks: Timelocks,
    /// Session retention window, added to `created_at` to produce
    /// `expiration_time`.
    pub retention_seconds: u64,
}

/// Optional filter for [`SessionStore::list`].
#[derive(Clone, Debug, Default)]
pub struct SessionFilter {
    /// Restrict to sessions in this status.
    pub status: Option<SessionStatus>,
    /// Restrict to sessions whose maker/taker carries this chain-B
    /// account string (simple substring-free exact match).
    pub non_evm_principal: Option<String>,
}

impl SessionFilter {
    fn matches(&self, session: &Session) -> bool {
        if let Some(status) = self.status {
            if session.status != status {
                return false;
            }
        }
        if let Some(principal) = &self.non_evm_principal {
            let matches_maker = matches!(&session.maker, Principal::NonEvm(s) if s == principal);
            let matches_taker = matches!(&session.taker, Principal::NonEvm(s) if s == principal);
            if !matches_maker && !matches_taker {
                return false;
            }
        }
        true
    }
}

struct Indices {
    by_order_hash: HashMap<[u8; 32], SessionId>,
}

/// Authoritative in-process session state.
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, Session>>,
    indices: RwLock<Indices>,
    max_active: usize,
    secret_store: std::sync::Arc<SecretStore>,
}

/// Compute the deterministic order hash bound to a session id.
///
/// Reference: spec §3 "`orderHash` — a 32-byte digest derived
/// deterministically from `id`."
pub fn derive_order_hash(id: SessionId) -> [u8; 32] {
    keccak256(id.0.as_bytes())
}

impl SessionStore {
    /// Construct an empty store with the given capacity and secret
    /// store (used to allocate secrets on `create`).
    pub fn new(max_active: usize, secret_store: std::sync::Arc<SecretStore>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            indices: RwLock::new(Indices { by_order_hash: HashMap::new() }),
            max_active,
            secret_store,
        }
    }

    fn active_count(sessions: &HashMap<SessionId, Session>) -> usize {
        sessions.values().filter(|s| !s.status.is_terminal()).count()
    }

    /// Allocate a session id and secret/hashlock, derive the order
    /// hash, seed timelocks, and persist in status `Initialized`.
    ///
    /// Reference: spec §4.2 `create(params)`.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::CapacityExceeded`] if `|active| >=
    /// max_active`; [`OrchestratorError::Validation`] if
    /// `params.timelocks` violates the safety margin of spec §4.4.
    pub fn create(&self, params: CreateSessionParams) -> Result<Session, OrchestratorError> {
        if !params.timelocks.satisfies_safety_margin() {
            return Err(OrchestratorError::Validation(
                "dstCancellation must be strictly before srcWithdrawal".into(),
            ));
        }

        let mut sessions = self.sessions.write();
        let active = Self::active_count(&sessions);
        if active >= self.max_active {
            return Err(OrchestratorError::CapacityExceeded { active, max: self.max_active });
        }

        let id = SessionId::new();
        let order_hash = derive_order_hash(id);

        {
            let indices = self.indices.read();
            if indices.by_order_hash.contains_key(&order_hash) {
                return Err(OrchestratorError::Validation("order hash collision".into()));
            }
        }

        let (secret, hashlock) = self.secret_store.generate();
        self.secret_store.seal(&secret, hashlock)?;

        let now = now_unix();
        let session = Session {
            id,
            status: SessionStatus::Initialized,
            source_chain: params.source_chain,
            destination_chain: params.destination_chain,
            source_token: params.source_token,
            destination_token: params.destination_token,
            source_amount: params.source_amount,
            destination_amount: params.destination_amount,
            maker: params.maker,
            taker: params.taker,
            slippage_tolerance_bps: params.slippage_tolerance_bps,
            hashlock,
            order_hash,
            src_escrow_address: None,
            dst_htlc_handle: None,
            revealed_secret: None,
            created_at: now,
            updated_at: now,
            expiration_time: now + params.retention_seconds,
            steps: Vec::new(),
            timelocks: params.timelocks,
        };

        sessions.insert(id, session.clone());
        self.indices.write().by_order_hash.insert(order_hash, id);

        info!(session_id = %id, "session created");
        Ok(session)
    }

    /// Look up a session by id.
    pub fn get(&self, id: SessionId) -> Result<Session, OrchestratorError> {
        self.sessions
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| OrchestratorError::NotFound(format!("session {id}")))
    }

    /// Look up a session by its derived order hash.
    pub fn get_by_order_hash(&self, hash: [u8; 32]) -> Result<Session, OrchestratorError> {
        let id = {
            let indices = self.indices.read();
            *indices
                .by_order_hash
                .get(&hash)
                .ok_or_else(|| OrchestratorError::NotFound(format!("order hash {}", hex::encode(hash))))?
        };
        self.get(id)
    }

    /// List sessions matching `filter`.
    pub fn list(&self, filter: &SessionFilter) -> Vec<Session> {
        self.sessions.read().values().filter(|s| filter.matches(s)).cloned().collect()
    }

    /// Validate and apply a state transition.
    ///
    /// Reference: spec §4.2 `transition(id, newStatus)`, §4.3.
    pub fn transition(&self, id: SessionId, new_status: SessionStatus) -> Result<Session, OrchestratorError> {
        let mut sessions = self.sessions.write();
        let session = sessions
            .get_mut(&id)
            .ok_or_else(|| OrchestratorError::NotFound(format!("session {id}")))?;

        if !session.status.can_transition_to(new_status) {
            return Err(OrchestratorError::IllegalTransition {
                from: session.status.to_string(),
                to: new_status.to_string(),
            });
        }

        debug!(session_id = %id, from = %session.status, to = %new_status, "session transition");
        session.status = new_status;
        session.updated_at = now_unix();
        Ok(session.clone())
    }

    /// One-time set of the escrow/HTLC reference for `side`.
    ///
    /// Reference: spec §4.2 `attachEscrow(id, side, ref)`.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::Validation`] if the reference is already
    /// set (one-time semantics).
    pub fn attach_escrow(&self, id: SessionId, side: EscrowSide, reference: String) -> Result<Session, OrchestratorError> {
        let mut sessions = self.sessions.write();
        let session = sessions
            .get_mut(&id)
            .ok_or_else(|| OrchestratorError::NotFound(format!("session {id}")))?;

        match side {
            EscrowSide::Src => {
                if session.src_escrow_address.is_some() {
                    return Err(OrchestratorError::Validation("src escrow already attached".into()));
                }
                let bytes = hex::decode(reference.trim_start_matches("0x"))
                    .map_err(|e| OrchestratorError::Validation(format!("invalid src escrow address: {e}")))?;
                if bytes.len() != 20 {
                    return Err(OrchestratorError::Validation("src escrow address must be 20 bytes".into()));
                }
                let mut addr = [0u8; 20];
                addr.copy_from_slice(&bytes);
                session.src_escrow_address = Some(addr);
            }
            EscrowSide::Dst => {
                if session.dst_htlc_handle.is_some() {
                    return Err(OrchestratorError::Validation("dst HTLC already attached".into()));
                }
                session.dst_htlc_handle = Some(reference);
            }
        }
        session.updated_at = now_unix();
        Ok(session.clone())
    }

    /// Set the session's revealed-secret field (client-completes-A
    /// mode, spec §9).
    pub fn set_revealed_secret(&self, id: SessionId, secret: [u8; 32]) -> Result<Session, OrchestratorError> {
        let mut sessions = self.sessions.write();
        let session = sessions
            .get_mut(&id)
            .ok_or_else(|| OrchestratorError::NotFound(format!("session {id}")))?;
        session.revealed_secret = Some(secret);
        session.updated_at = now_unix();
        Ok(session.clone())
    }

    /// Append an execution step snapshot to the session's `steps`
    /// mirror (the authoritative ledger lives in
    /// [`crate::ledger::ExecutionLedger`]; this keeps `Session::steps`
    /// in sync for callers that only hold a `SessionStore` handle).
    pub fn push_step(&self, id: SessionId, step: swap_types::ExecutionStep) -> Result<(), OrchestratorError> {
        let mut sessions = self.sessions.write();
        let session = sessions
            .get_mut(&id)
            .ok_or_else(|| OrchestratorError::NotFound(format!("session {id}")))?;
        session.steps.push(step);
        session.updated_at = now_unix();
        Ok(())
    }

    /// Update the most recently appended step in place.
    pub fn update_last_step(&self, id: SessionId, step: swap_types::ExecutionStep) -> Result<(), OrchestratorError> {
        let mut sessions = self.sessions.write();
        let session = sessions
            .get_mut(&id)
            .ok_or_else(|| OrchestratorError::NotFound(format!("session {id}")))?;
        if let Some(last) = session.steps.last_mut() {
            *last = step;
        } else {
            session.steps.push(step);
        }
        session.updated_at = now_unix();
        Ok(())
    }

    /// Delegate a reveal to the backing [`SecretStore`].
    ///
    /// Reference: spec §4.2 `reveal(id) -> secret`.
    pub fn reveal(&self, id: SessionId) -> Result<[u8; 32], OrchestratorError> {
        let hashlock = self.get(id)?.hashlock;
        self.secret_store.reveal(hashlock)
    }

    /// Delete terminal sessions whose `expiration_time` has elapsed.
    ///
    /// Reference: spec §4.2 `sweep()`, §3 "Terminal sessions are
    /// garbage-collected by a periodic sweep."
    pub fn sweep(&self) -> usize {
        let now = now_unix();
        let mut sessions = self.sessions.write();
        let mut indices = self.indices.write();

        let expired: Vec<SessionId> = sessions
            .values()
            .filter(|s| s.status.is_terminal() && now >= s.expiration_time)
            .map(|s| s.id)
            .collect();

        for id in &expired {
            if let Some(session) = sessions.remove(id) {
                indices.by_order_hash.remove(&session.order_hash);
            }
        }

        if !expired.is_empty() {
            info!(count = expired.len(), "swept expired terminal sessions");
        }
        expired.len()
    }

    /// Current count of non-terminal sessions.
    pub fn active_len(&self) -> usize {
        Self::active_count(&self.sessions.read())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use swap_crypto::SecretKey;

    fn store(max_active: usize) -> SessionStore {
        let secrets = Arc::new(SecretStore::new(SecretKey::generate(), 3600));
        SessionStore::new(max_active, secrets)
    }

    fn valid_timelocks() -> Timelocks {
        Timelocks {
            src_deployed_at: 0,
            src_withdrawal: 1_000,
            src_public_withdrawal: 1_500,
            src_cancellation: 2_000,
            dst_deployed_at: 0,
            dst_withdrawal: 100,
            dst_cancellation: 500,
        }
    }

    fn params() -> CreateSessionParams {
        CreateSessionParams {
            source_chain: ChainId::ChainA,
            destination_chain: ChainId::ChainB,
            source_token: TokenRef::Native,
            destination_token: TokenRef::Native,
            source_amount: primitive_types::U256::from(1_000_000u64),
            destination_amount: primitive_types::U256::from(2_000_000u64),
            maker: Principal::Evm([1u8; 20]),
            taker: Principal::NonEvm("alice.testnet".into()),
            slippage_tolerance_bps: 50,
            timelocks: valid_timelocks(),
            retention_seconds: 86_400,
        }
    }

    #[test]
    fn create_then_get_roundtrips() {
        let store = store(10);
        let session = store.create(params()).unwrap();
        let fetched = store.get(session.id).unwrap();
        assert_eq!(fetched.id, session.id);
        assert_eq!(fetched.status, SessionStatus::Initialized);
    }

    #[test]
    fn create_rejects_unsafe_timelocks() {
        let store = store(10);
        let mut p = params();
        p.timelocks.dst_cancellation = p.timelocks.src_withdrawal; // not strictly before
        let err = store.create(p).unwrap_err();
        assert!(matches!(err, OrchestratorError::Validation(_)));
    }

    #[test]
    fn create_rejects_over_capacity() {
        let store = store(1);
        store.create(params()).unwrap();
        let err = store.create(params()).unwrap_err();
        assert!(matches!(err, OrchestratorError::CapacityExceeded { .. }));
    }

    #[test]
    fn get_by_order_hash_matches_get_by_id() {
        let store = store(10);
        let session = store.create(params()).unwrap();
        let by_hash = store.get_by_order_hash(session.order_hash).unwrap();
        assert_eq!(by_hash.id, session.id);
    }

    #[test]
    fn transition_rejects_illegal_edge() {
        let store = store(10);
        let session = store.create(params()).unwrap();
        let err = store.transition(session.id, SessionStatus::Completed).unwrap_err();
        assert!(matches!(err, OrchestratorError::IllegalTransition { .. }));
        // Session unchanged.
        assert_eq!(store.get(session.id).unwrap().status, SessionStatus::Initialized);
    }

    #[test]
    fn transition_applies_legal_edge() {
        let store = store(10);
        let session = store.create(params()).unwrap();
        let updated = store.transition(session.id, SessionStatus::Executing).unwrap();
        assert_eq!(updated.status, SessionStatus::Executing);
    }

    #[test]
    fn attach_escrow_is_one_time() {
        let store = store(10);
        let session = store.create(params()).unwrap();
        store.attach_escrow(session.id, EscrowSide::Src, hex::encode([0xABu8; 20])).unwrap();
        let err = store.attach_escrow(session.id, EscrowSide::Src, hex::encode([0xCDu8; 20])).unwrap_err();
        assert!(matches!(err, OrchestratorError::Validation(_)));
    }

    #[test]
    fn reveal_delegates_to_secret_store() {
        let store = store(10);
        let session = store.create(params()).unwrap();
        let revealed = store.reveal(session.id).unwrap();
        assert_eq!(swap_crypto::keccak256(&revealed), session.hashlock);
    }

    #[test]
    fn sweep_removes_expired_terminal_sessions_only() {
        let store = store(10);
        let session = store.create(params()).unwrap();

        // Force terminal + already-expired without waiting on the
        // real clock.
        {
            let mut sessions = store.sessions.write();
            let s = sessions.get_mut(&session.id).unwrap();
            s.status = SessionStatus::Cancelled;
            s.expiration_time = 0;
        }

        let removed = store.sweep();
        assert_eq!(removed, 1);
        assert!(store.get(session.id).is_err());
    }

    #[test]
    fn sweep_keeps_non_terminal_sessions() {
        let store = store(10);
        let session = store.create(params()).unwrap();
        {
            let mut sessions = store.sessions.write();
            sessions.get_mut(&session.id).unwrap().expiration_time = 0;
        }
        let removed = store.sweep();
        assert_eq!(removed, 0);
        assert!(store.get(session.id).is_ok());
    }

    #[test]
    fn order_hash_is_deterministic_from_id() {
        let id = SessionId::new();
        assert_eq!(derive_order_hash(id), derive_order_hash(id));
    }
}
