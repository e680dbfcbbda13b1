//! Payloads published by the Notifier component.
//!
//! Reference: spec §4.11. Delivery mechanics (the broadcast bus) live
//! in `swap-bus`; this module only defines the wire shape.

use serde::{Deserialize, Serialize};

use crate::session::{ExecutionStep, Session, SessionId, SessionStatus};

/// A message published to subscribers of a session's updates.
///
/// Reference: spec §4.11 — `session_update`, `execution_step`,
/// `execution_step_update`, and `swap_completed`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum NotificationPayload {
    /// The session's status or other top-level fields changed.
    SessionUpdate {
        /// Which session.
        session_id: SessionId,
        /// New status.
        status: SessionStatus,
    },
    /// A new execution step was appended.
    ExecutionStep {
        /// Which session.
        session_id: SessionId,
        /// The new step.
        step: ExecutionStep,
    },
    /// An existing execution step's status changed.
    ExecutionStepUpdate {
        /// Which session.
        session_id: SessionId,
        /// Index of the step within the session's ledger.
        step_index: usize,
        /// The updated step.
        step: ExecutionStep,
    },
    /// The swap reached a terminal success state.
    SwapCompleted {
        /// Which session.
        session_id: SessionId,
        /// A snapshot of the completed session.
        session: Box<Session>,
    },
}

impl NotificationPayload {
    /// The session this notification concerns.
    pub fn session_id(&self) -> SessionId {
        match self {
            NotificationPayload::SessionUpdate { session_id, .. }
            | NotificationPayload::ExecutionStep { session_id, .. }
            | NotificationPayload::ExecutionStepUpdate { session_id, .. }
            | NotificationPayload::SwapCompleted { session_id, .. } => *session_id,
        }
    }
}
