//! `EventMonitor`: unifies chain A's push-based events and chain B's
//! poll-based state into one stream the executor reacts to.
//!
//! Reference: spec §4.7. Chain A is push-based (contract events);
//! chain B exposes no subscription primitive so its HTLCs are polled
//! at `monitor.pollIntervalMs` (spec §6). Both sides are only trusted
//! once `monitor.confirmationDepth` has elapsed, and chain A
//! re-delivers are deduplicated by `ChainAEvent::dedup_key` to survive
//! reorg replay within the confirmation window.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use swap_types::{OrchestratorError, SessionId};
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};
use tracing::{debug, warn};

use crate::chain_a::{ChainAClient, ChainAEvent};
use crate::chain_b::{ChainBClient, HtlcState};

/// A unified, session-scoped observation.
///
/// Reference: spec §4.7 "the monitor emits a single unified event
/// stream regardless of which chain produced the underlying change."
#[derive(Clone, Debug)]
pub enum MonitorEvent {
    /// Chain A's escrow for `session_id` was deployed and has reached
    /// `monitor.confirmationDepth`.
    SrcEscrowConfirmed { session_id: SessionId, escrow_address: String, tx_hash: String },
    /// Chain A's escrow for `session_id` was withdrawn from, revealing
    /// the secret on-chain.
    SrcEscrowWithdrawn { session_id: SessionId, secret: [u8; 32], tx_hash: String },
    /// Chain A's escrow for `session_id` was cancelled.
    SrcEscrowCancelled { session_id: SessionId, tx_hash: String },
    /// Chain B's HTLC for `session_id` transitioned to `Withdrawn`.
    DstHtlcWithdrawn { session_id: SessionId, secret: [u8; 32] },
    /// Chain B's HTLC for `session_id` transitioned to `Refunded`.
    DstHtlcRefunded { session_id: SessionId },
}

impl MonitorEvent {
    /// The session this observation concerns.
    pub fn session_id(&self) -> SessionId {
        match self {
            MonitorEvent::SrcEscrowConfirmed { session_id, .. }
            | MonitorEvent::SrcEscrowWithdrawn { session_id, .. }
            | MonitorEvent::SrcEscrowCancelled { session_id, .. }
            | MonitorEvent::DstHtlcWithdrawn { session_id, .. }
            | MonitorEvent::DstHtlcRefunded { session_id } => *session_id,
        }
    }
}

struct Watched {
    order_hash_to_session: HashMap<[u8; 32], SessionId>,
    escrow_to_session: HashMap<String, SessionId>,
    htlc_to_session: HashMap<String, SessionId>,
}

/// Drives chain A's event subscription and chain B's polling loop,
/// publishing [`MonitorEvent`]s to a single downstream channel.
pub struct EventMonitor {
    chain_a: Arc<dyn ChainAClient>,
    chain_b: Arc<dyn ChainBClient>,
    poll_interval: Duration,
    confirmation_depth: u64,
    watched: RwLock<Watched>,
    seen: Mutex<HashSet<String>>,
    sender: mpsc::Sender<MonitorEvent>,
    receiver: Mutex<Option<mpsc::Receiver<MonitorEvent>>>,
    last_known_dst_state: Mutex<HashMap<String, HtlcState>>,
}

impl EventMonitor {
    /// Construct a monitor. `poll_interval` governs chain B polling;
    /// `confirmation_depth` gates when a chain A observation is
    /// trusted.
    pub fn new(chain_a: Arc<dyn ChainAClient>, chain_b: Arc<dyn ChainBClient>, poll_interval: Duration, confirmation_depth: u64) -> Self {
        let (sender, receiver) = mpsc::channel(256);
        Self {
            chain_a,
            chain_b,
            poll_interval,
            confirmation_depth,
            watched: RwLock::new(Watched {
                order_hash_to_session: HashMap::new(),
                escrow_to_session: HashMap::new(),
                htlc_to_session: HashMap::new(),
            }),
            seen: Mutex::new(HashSet::new()),
            sender,
            receiver: Mutex::new(Some(receiver)),
            last_known_dst_state: Mutex::new(HashMap::new()),
        }
    }

    /// Take the receiving end of the unified event stream. Call once.
    pub fn subscribe(&self) -> Option<mpsc::Receiver<MonitorEvent>> {
        self.receiver.lock().take()
    }

    /// Register a session's order hash before its src escrow exists,
    /// so the `SrcEscrowCreated` event (keyed by order hash) can be
    /// attributed to a session.
    pub fn watch_order_hash(&self, order_hash: [u8; 32], session_id: SessionId) {
        self.watched.write().order_hash_to_session.insert(order_hash, session_id);
    }

    /// Register a deployed src escrow address for withdraw/cancel
    /// event attribution.
    pub fn watch_escrow(&self, escrow_address: String, session_id: SessionId) {
        self.watched.write().escrow_to_session.insert(escrow_address, session_id);
    }

    /// Register a created dst HTLC id for state-transition polling.
    pub fn watch_htlc(&self, htlc_id: String, session_id: SessionId) {
        self.watched.write().htlc_to_session.insert(htlc_id.clone(), session_id);
        self.last_known_dst_state.lock().insert(htlc_id, HtlcState::Active);
    }

    /// Stop watching `session_id`'s escrow/HTLC identifiers (spec §4.9
    /// "cancellations on session completion").
    pub fn unwatch_session(&self, session_id: SessionId) {
        let mut watched = self.watched.write();
        watched.order_hash_to_session.retain(|_, s| *s != session_id);
        watched.escrow_to_session.retain(|_, s| *s != session_id);
        watched.htlc_to_session.retain(|_, s| *s != session_id);
    }

    /// Run the chain A subscription loop until the channel closes.
    /// Intended to be spawned as a background task.
    pub async fn run_chain_a(&self, from_block: u64) -> Result<(), OrchestratorError> {
        let mut events = self.chain_a.subscribe_events(from_block).await?;
        while let Some(event) = events.recv().await {
            self.handle_chain_a_event(event).await;
        }
        Ok(())
    }

    async fn handle_chain_a_event(&self, event: ChainAEvent) {
        let key = event.dedup_key();
        if !self.seen.lock().insert(key) {
            return;
        }

        let current_block = match self.chain_a.current_block().await {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, "failed to read chain A block height");
                return;
            }
        };
        if current_block.saturating_sub(event.block_number()) < self.confirmation_depth {
            debug!(block = event.block_number(), current_block, "chain A event below confirmation depth, deferring");
            return;
        }

        let monitor_event = match event {
            ChainAEvent::SrcEscrowCreated { escrow_address, order_hash, tx_hash, .. } => {
                let session_id = {
                    let watched = self.watched.read();
                    watched.order_hash_to_session.get(&order_hash).copied()
                };
                let Some(session_id) = session_id else {
                    debug!(order_hash = %hex::encode(order_hash), "src escrow created for unwatched order hash");
                    return;
                };
                self.watch_escrow(escrow_address.clone(), session_id);
                MonitorEvent::SrcEscrowConfirmed { session_id, escrow_address, tx_hash }
            }
            ChainAEvent::SrcEscrowWithdrawn { escrow_address, secret, tx_hash, .. } => {
                let session_id = self.watched.read().escrow_to_session.get(&escrow_address).copied();
                let Some(session_id) = session_id else { return };
                MonitorEvent::SrcEscrowWithdrawn { session_id, secret, tx_hash }
            }
            ChainAEvent::SrcEscrowCancelled { escrow_address, tx_hash, .. } => {
                let session_id = self.watched.read().escrow_to_session.get(&escrow_address).copied();
                let Some(session_id) = session_id else { return };
                MonitorEvent::SrcEscrowCancelled { session_id, tx_hash }
            }
        };

        let _ = self.sender.send(monitor_event).await;
    }

    /// Run the chain B polling loop until `shutdown` resolves.
    /// Intended to be spawned as a background task.
    pub async fn run_chain_b(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut ticker = interval(self.poll_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.poll_chain_b().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }

    async fn poll_chain_b(&self) {
        let htlc_ids: Vec<(String, SessionId)> = {
            let watched = self.watched.read();
            watched.htlc_to_session.iter().map(|(k, v)| (k.clone(), *v)).collect()
        };

        for (htlc_id, session_id) in htlc_ids {
            let htlc = match self.chain_b.get_htlc(&htlc_id).await {
                Ok(h) => h,
                Err(e) => {
                    warn!(%htlc_id, error = %e, "chain B poll failed");
                    continue;
                }
            };

            let previous = {
                let mut last = self.last_known_dst_state.lock();
                let previous = last.get(&htlc_id).copied();
                last.insert(htlc_id.clone(), htlc.state);
                previous
            };
            if previous == Some(htlc.state) {
                continue;
            }

            let event = match htlc.state {
                HtlcState::Withdrawn => htlc.secret.map(|secret| MonitorEvent::DstHtlcWithdrawn { session_id, secret }),
                HtlcState::Refunded => Some(MonitorEvent::DstHtlcRefunded { session_id }),
                HtlcState::Active => None,
            };

            if let Some(event) = event {
                let _ = self.sender.send(event).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain_a::MockChainAClient;
    use crate::chain_b::MockChainBClient;

    fn monitor() -> EventMonitor {
        EventMonitor::new(Arc::new(MockChainAClient::new()), Arc::new(MockChainBClient::new()), Duration::from_millis(10), 0)
    }

    #[tokio::test]
    async fn chain_b_withdrawn_transition_emits_event() {
        let chain_b = Arc::new(MockChainBClient::new());
        let monitor = EventMonitor::new(Arc::new(MockChainAClient::new()), chain_b.clone(), Duration::from_millis(10), 0);
        let mut rx = monitor.subscribe().unwrap();

        let session_id = SessionId::new();
        let secret = [0x33u8; 32];
        let hashlock = swap_crypto::keccak256(&secret);
        let (htlc_id, _) = chain_b
            .create_htlc("bob.testnet", "native", primitive_types::U256::from(1u64), hashlock, 9_999, [0u8; 32])
            .await
            .unwrap();
        monitor.watch_htlc(htlc_id.clone(), session_id);

        chain_b.withdraw_htlc(&htlc_id, &secret).await.unwrap();
        monitor.poll_chain_b().await;

        let event = rx.try_recv().unwrap();
        match event {
            MonitorEvent::DstHtlcWithdrawn { session_id: sid, secret: s } => {
                assert_eq!(sid, session_id);
                assert_eq!(s, secret);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unwatch_session_stops_future_polling() {
        let monitor = monitor();
        let session_id = SessionId::new();
        monitor.watch_htlc("htlc-1".into(), session_id);
        monitor.unwatch_session(session_id);
        assert!(monitor.watched.read().htlc_to_session.is_empty());
    }
}
