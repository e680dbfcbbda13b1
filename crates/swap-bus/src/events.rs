//! Bus envelope and filter types.
//!
//! The payload carried on the bus is `swap_types::NotificationPayload`
//! directly; this module adds the filter and topic machinery the
//! teacher's `shared-bus::events` applies to its own `BlockchainEvent`.

use swap_types::NotificationPayload;

/// Coarse-grained topic used for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationTopic {
    /// Session status transitions.
    SessionUpdate,
    /// A new execution step was recorded.
    ExecutionStep,
    /// An existing execution step was updated in place.
    ExecutionStepUpdate,
    /// A swap reached a terminal, successful state.
    SwapCompleted,
    /// Matches every topic.
    All,
}

impl NotificationPayload {
    /// The topic this payload belongs to.
    pub fn topic(&self) -> NotificationTopic {
        match self {
            NotificationPayload::SessionUpdate { .. } => NotificationTopic::SessionUpdate,
            NotificationPayload::ExecutionStep { .. } => NotificationTopic::ExecutionStep,
            NotificationPayload::ExecutionStepUpdate { .. } => NotificationTopic::ExecutionStepUpdate,
            NotificationPayload::SwapCompleted { .. } => NotificationTopic::SwapCompleted,
        }
    }
}

/// A subscription filter.
///
/// An empty `topics` list matches every topic; an empty `session_ids`
/// list matches every session.
#[derive(Debug, Clone, Default)]
pub struct NotificationFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<NotificationTopic>,
    /// Session ids to include. Empty means all sessions.
    pub session_ids: Vec<swap_types::SessionId>,
}

impl NotificationFilter {
    /// A filter that accepts everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// A filter scoped to a single session, all topics.
    pub fn for_session(session_id: swap_types::SessionId) -> Self {
        Self {
            topics: Vec::new(),
            session_ids: vec![session_id],
        }
    }

    /// A filter scoped to specific topics, any session.
    pub fn for_topics(topics: Vec<NotificationTopic>) -> Self {
        Self {
            topics,
            session_ids: Vec::new(),
        }
    }

    /// Whether `payload` matches this filter.
    pub fn matches(&self, payload: &NotificationPayload) -> bool {
        let topic_match = self.topics.is_empty()
            || self.topics.contains(&NotificationTopic::All)
            || self.topics.contains(&payload.topic());

        let session_match = self.session_ids.is_empty() || self.session_ids.contains(&payload.session_id());

        topic_match && session_match
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swap_types::{SessionId, SessionStatus};

    #[test]
    fn empty_filter_matches_everything() {
        let filter = NotificationFilter::all();
        let payload = NotificationPayload::SessionUpdate {
            session_id: SessionId::new(),
            status: SessionStatus::Initialized,
        };
        assert!(filter.matches(&payload));
    }

    #[test]
    fn session_filter_excludes_other_sessions() {
        let target = SessionId::new();
        let other = SessionId::new();
        let filter = NotificationFilter::for_session(target);

        let matching = NotificationPayload::SessionUpdate {
            session_id: target,
            status: SessionStatus::Initialized,
        };
        let other_payload = NotificationPayload::SessionUpdate {
            session_id: other,
            status: SessionStatus::Initialized,
        };

        assert!(filter.matches(&matching));
        assert!(!filter.matches(&other_payload));
    }

    #[test]
    fn topic_filter_excludes_other_topics() {
        let filter = NotificationFilter::for_topics(vec![NotificationTopic::SwapCompleted]);
        let session_update = NotificationPayload::SessionUpdate {
            session_id: SessionId::new(),
            status: SessionStatus::Initialized,
        };
        assert!(!filter.matches(&session_update));
    }
}
