//! Publishing side of the notification bus.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use swap_types::NotificationPayload;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::events::NotificationFilter;
use crate::subscriber::Subscription;
use crate::DEFAULT_CHANNEL_CAPACITY;

/// Trait for publishing notifications to the bus.
///
/// This is the interface `CrossChainExecutor` uses to emit the session
/// update / execution step / swap completed events described in
/// spec §4.11.
#[async_trait]
pub trait NotificationPublisher: Send + Sync {
    /// Publish a notification. Returns the number of subscribers that
    /// received it.
    async fn publish(&self, payload: NotificationPayload) -> usize;

    /// Total notifications published since construction.
    fn notifications_published(&self) -> u64;
}

/// In-memory notification bus backed by `tokio::sync::broadcast`.
///
/// Suitable for single-node deployment; a distributed deployment would
/// swap this adapter for one backed by Redis, Kafka, or similar,
/// without touching the `NotificationPublisher` trait consumers.
pub struct InMemoryNotificationBus {
    sender: broadcast::Sender<NotificationPayload>,
    subscriptions: Arc<RwLock<HashMap<String, usize>>>,
    notifications_published: AtomicU64,
    capacity: usize,
}

impl InMemoryNotificationBus {
    /// Construct with the default channel capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Construct with an explicit channel capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
            notifications_published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Subscribe with a filter, returning a handle that yields matching
    /// notifications.
    pub fn subscribe(&self, filter: NotificationFilter) -> Subscription {
        let receiver = self.sender.subscribe();
        let key = format!("{:?}", filter.topics);

        if let Ok(mut subs) = self.subscriptions.write() {
            *subs.entry(key.clone()).or_insert(0) += 1;
        }

        debug!(topics = ?filter.topics, "new notification subscription");
        Subscription::new(receiver, filter, self.subscriptions.clone(), key)
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Configured channel capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InMemoryNotificationBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationPublisher for InMemoryNotificationBus {
    async fn publish(&self, payload: NotificationPayload) -> usize {
        let session_id = payload.session_id();
        self.notifications_published.fetch_add(1, Ordering::Relaxed);

        match self.sender.send(payload) {
            Ok(count) => {
                debug!(%session_id, receivers = count, "notification published");
                count
            }
            Err(_) => {
                warn!(%session_id, "notification dropped, no subscribers");
                0
            }
        }
    }

    fn notifications_published(&self) -> u64 {
        self.notifications_published.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swap_types::{SessionId, SessionStatus};

    fn sample_payload() -> NotificationPayload {
        NotificationPayload::SessionUpdate {
            session_id: SessionId::new(),
            status: SessionStatus::Initialized,
        }
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_reports_zero() {
        let bus = InMemoryNotificationBus::new();
        let receivers = bus.publish(sample_payload()).await;
        assert_eq!(receivers, 0);
        assert_eq!(bus.notifications_published(), 1);
    }

    #[tokio::test]
    async fn publish_reaches_subscriber() {
        let bus = InMemoryNotificationBus::new();
        let _sub = bus.subscribe(NotificationFilter::all());
        let receivers = bus.publish(sample_payload()).await;
        assert_eq!(receivers, 1);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn custom_capacity_is_respected() {
        let bus = InMemoryNotificationBus::with_capacity(42);
        assert_eq!(bus.capacity(), 42);
    }
}
