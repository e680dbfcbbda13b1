//! `Notifier`: the orchestrator-facing wrapper around `swap-bus`.
//!
//! Reference: spec §4.11. `swap-bus` provides the generic
//! publish/subscribe transport; this module adds the session-shaped
//! convenience methods the executor actually calls, the way the
//! teacher's domain crates wrap `shared-bus` rather than calling its
//! publisher trait directly from business logic.

use std::sync::Arc;

use swap_bus::{InMemoryNotificationBus, NotificationFilter, NotificationPublisher, Subscription};
use swap_types::{ExecutionStep, NotificationPayload, Session, SessionId, SessionStatus};

/// Thin façade over an [`InMemoryNotificationBus`] that knows the
/// shapes of the four events spec §4.11 names.
pub struct Notifier {
    bus: Arc<InMemoryNotificationBus>,
}

impl Notifier {
    /// Wrap a bus handle.
    pub fn new(bus: Arc<InMemoryNotificationBus>) -> Self {
        Self { bus }
    }

    /// Publish a session status change.
    pub async fn session_update(&self, session_id: SessionId, status: SessionStatus) -> usize {
        self.bus.publish(NotificationPayload::SessionUpdate { session_id, status }).await
    }

    /// Publish a newly appended execution step.
    pub async fn execution_step(&self, session_id: SessionId, step: ExecutionStep) -> usize {
        self.bus.publish(NotificationPayload::ExecutionStep { session_id, step }).await
    }

    /// Publish an in-place execution step update.
    pub async fn execution_step_update(&self, session_id: SessionId, step_index: usize, step: ExecutionStep) -> usize {
        self.bus.publish(NotificationPayload::ExecutionStepUpdate { session_id, step_index, step }).await
    }

    /// Publish the terminal swap-completed event.
    pub async fn swap_completed(&self, session: Session) -> usize {
        let session_id = session.id;
        self.bus.publish(NotificationPayload::SwapCompleted { session_id, session: Box::new(session) }).await
    }

    /// Subscribe to every event concerning a single session.
    pub fn subscribe_session(&self, session_id: SessionId) -> Subscription {
        self.bus.subscribe(NotificationFilter::for_session(session_id))
    }

    /// Subscribe to every event across every session.
    pub fn subscribe_all(&self) -> Subscription {
        self.bus.subscribe(NotificationFilter::all())
    }

    /// Total notifications published since construction.
    pub fn notifications_published(&self) -> u64 {
        self.bus.notifications_published()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn session_update_reaches_subscriber() {
        let bus = Arc::new(InMemoryNotificationBus::new());
        let notifier = Notifier::new(bus);
        let mut sub = notifier.subscribe_all();

        let session_id = SessionId::new();
        let receivers = notifier.session_update(session_id, SessionStatus::Executing).await;
        assert_eq!(receivers, 1);

        let received = sub.recv().await.unwrap();
        assert_eq!(received.session_id(), session_id);
    }

    #[tokio::test]
    async fn session_scoped_subscription_filters_other_sessions() {
        let bus = Arc::new(InMemoryNotificationBus::new());
        let notifier = Notifier::new(bus);
        let target = SessionId::new();
        let mut sub = notifier.subscribe_session(target);

        notifier.session_update(SessionId::new(), SessionStatus::Executing).await;
        notifier.session_update(target, SessionStatus::Completed).await;

        let received = sub.recv().await.unwrap();
        assert_eq!(received.session_id(), target);
    }
}
