//! `ExecutionLedger`: the append-mostly per-session record of
//! structured execution steps.
//!
//! Reference: spec §4.10. Grounded in the teacher's domain-entity
//! status-machine style (`qc-15-cross-chain::domain::value_objects::HTLCState`)
//! applied to `ExecutionStepStatus` instead of HTLC state.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use swap_types::{ChainId, ExecutionStep, ExecutionStepStatus, OrchestratorError, SessionId};
use tracing::debug;

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs()
}

/// Append-mostly, per-session list of [`ExecutionStep`]s.
///
/// This is the source of truth external observability endpoints read
/// from (spec §4.10); `SessionStore::steps` is a denormalized mirror
/// kept for callers holding only a session snapshot.
#[derive(Default)]
pub struct ExecutionLedger {
    steps: RwLock<HashMap<SessionId, Vec<ExecutionStep>>>,
}

impl ExecutionLedger {
    /// Construct an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a new step in the `Pending` status, returning its index.
    pub fn begin_step(&self, session_id: SessionId, function: impl Into<String>, contract: ChainId, params: impl Into<String>) -> usize {
        let step = ExecutionStep::new(function, contract, params, now_unix());
        let mut steps = self.steps.write();
        let list = steps.entry(session_id).or_default();
        list.push(step);
        list.len() - 1
    }

    /// Transition a step to `Executing`.
    pub fn mark_executing(&self, session_id: SessionId, index: usize) -> Result<ExecutionStep, OrchestratorError> {
        self.update(session_id, index, |step| {
            step.status = ExecutionStepStatus::Executing;
        })
    }

    /// Transition a step to `Completed`, recording `tx_ref`/`escrow_ref`/`result`/`gas_used`.
    #[allow(clippy::too_many_arguments)]
    pub fn mark_completed(
        &self,
        session_id: SessionId,
        index: usize,
        tx_ref: Option<String>,
        escrow_ref: Option<String>,
        result: Option<String>,
        gas_used: Option<u64>,
    ) -> Result<ExecutionStep, OrchestratorError> {
        self.update(session_id, index, |step| {
            step.status = ExecutionStepStatus::Completed;
            step.tx_ref = tx_ref;
            step.escrow_ref = escrow_ref;
            step.result = result;
            step.gas_used = gas_used;
        })
    }

    /// Transition a step to `Failed`, recording the error string.
    pub fn mark_failed(&self, session_id: SessionId, index: usize, error: impl Into<String>) -> Result<ExecutionStep, OrchestratorError> {
        let error = error.into();
        self.update(session_id, index, move |step| {
            step.status = ExecutionStepStatus::Failed;
            step.error = Some(error.clone());
        })
    }

    fn update(&self, session_id: SessionId, index: usize, f: impl FnOnce(&mut ExecutionStep)) -> Result<ExecutionStep, OrchestratorError> {
        let mut steps = self.steps.write();
        let list = steps
            .get_mut(&session_id)
            .ok_or_else(|| OrchestratorError::NotFound(format!("no ledger for session {session_id}")))?;
        let step = list
            .get_mut(index)
            .ok_or_else(|| OrchestratorError::NotFound(format!("no step {index} for session {session_id}")))?;
        f(step);
        step.timestamp = now_unix();
        debug!(%session_id, index, status = ?step.status, "execution step updated");
        Ok(step.clone())
    }

    /// Snapshot of every step recorded for `session_id`.
    pub fn steps_for(&self, session_id: SessionId) -> Vec<ExecutionStep> {
        self.steps.read().get(&session_id).cloned().unwrap_or_default()
    }

    /// Count of non-failed steps recorded for `session_id`.
    ///
    /// Reference: spec §8 scenario 1, "`ExecutionLedger` has exactly
    /// four non-failed steps."
    pub fn non_failed_count(&self, session_id: SessionId) -> usize {
        self.steps_for(session_id).iter().filter(|s| s.status != ExecutionStepStatus::Failed).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swap_types::SessionId;

    #[test]
    fn begin_mark_executing_completed_flow() {
        let ledger = ExecutionLedger::new();
        let session_id = SessionId::new();

        let idx = ledger.begin_step(session_id, "createSrcEscrow", ChainId::ChainA, "amount=1000");
        assert_eq!(idx, 0);

        let step = ledger.mark_executing(session_id, idx).unwrap();
        assert_eq!(step.status, ExecutionStepStatus::Executing);

        let step = ledger
            .mark_completed(session_id, idx, Some("0xdead".into()), Some("0xescrow".into()), None, Some(210_000))
            .unwrap();
        assert_eq!(step.status, ExecutionStepStatus::Completed);
        assert_eq!(step.tx_ref.as_deref(), Some("0xdead"));
    }

    #[test]
    fn mark_failed_records_error() {
        let ledger = ExecutionLedger::new();
        let session_id = SessionId::new();
        let idx = ledger.begin_step(session_id, "create_htlc", ChainId::ChainB, "amount=2000");
        let step = ledger.mark_failed(session_id, idx, "rpc timeout").unwrap();
        assert_eq!(step.status, ExecutionStepStatus::Failed);
        assert_eq!(step.error.as_deref(), Some("rpc timeout"));
    }

    #[test]
    fn non_failed_count_excludes_failed_steps() {
        let ledger = ExecutionLedger::new();
        let session_id = SessionId::new();

        let a = ledger.begin_step(session_id, "createSrcEscrow", ChainId::ChainA, "");
        ledger.mark_completed(session_id, a, None, None, None, None).unwrap();

        let b = ledger.begin_step(session_id, "create_htlc", ChainId::ChainB, "");
        ledger.mark_failed(session_id, b, "boom").unwrap();

        assert_eq!(ledger.non_failed_count(session_id), 1);
    }

    #[test]
    fn update_unknown_session_not_found() {
        let ledger = ExecutionLedger::new();
        let err = ledger.mark_executing(SessionId::new(), 0).unwrap_err();
        assert!(matches!(err, OrchestratorError::NotFound(_)));
    }
}
