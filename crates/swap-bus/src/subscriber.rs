//! Subscription side of the notification bus.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use std::task::{Context, Poll};

use async_trait::async_trait;
use swap_types::NotificationPayload;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::Stream;
use tracing::debug;

use crate::events::NotificationFilter;

/// Errors surfaced while reading from a subscription.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The bus was dropped.
    #[error("notification bus closed")]
    Closed,
}

/// Trait for subscribing to notifications.
#[async_trait]
pub trait NotificationSubscriber: Send + Sync {
    /// Subscribe with a filter.
    fn subscribe(&self, filter: NotificationFilter) -> Subscription;
}

/// A live subscription handle. Cleans itself up from the bus's
/// subscriber-count tracking when dropped.
pub struct Subscription {
    receiver: broadcast::Receiver<NotificationPayload>,
    filter: NotificationFilter,
    subscriptions: Arc<RwLock<HashMap<String, usize>>>,
    topic_key: String,
}

impl Subscription {
    pub(crate) fn new(
        receiver: broadcast::Receiver<NotificationPayload>,
        filter: NotificationFilter,
        subscriptions: Arc<RwLock<HashMap<String, usize>>>,
        topic_key: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            subscriptions,
            topic_key,
        }
    }

    /// Await the next matching notification; `None` once the bus closes.
    pub async fn recv(&mut self) -> Option<NotificationPayload> {
        loop {
            let payload = match self.receiver.recv().await {
                Ok(p) => p,
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    debug!(lagged = count, "subscriber lagged, notifications dropped");
                    continue;
                }
            };

            if self.filter.matches(&payload) {
                return Some(payload);
            }
        }
    }

    /// Non-blocking receive.
    pub fn try_recv(&mut self) -> Result<Option<NotificationPayload>, SubscriptionError> {
        loop {
            let payload = match self.receiver.try_recv() {
                Ok(p) => p,
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => return Err(SubscriptionError::Closed),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            };

            if self.filter.matches(&payload) {
                return Ok(Some(payload));
            }
        }
    }

    /// The filter this subscription was created with.
    pub fn filter(&self) -> &NotificationFilter {
        &self.filter
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Ok(mut subs) = self.subscriptions.write() else {
            return;
        };
        let Some(count) = subs.get_mut(&self.topic_key) else {
            return;
        };
        *count = count.saturating_sub(1);
        if *count == 0 {
            subs.remove(&self.topic_key);
        }
    }
}

/// A `Stream` adapter over a `Subscription`, for use with stream
/// combinators (e.g. in the WebSocket/UI-facing layers this crate
/// explicitly leaves out of scope).
pub struct NotificationStream {
    subscription: Subscription,
}

impl NotificationStream {
    /// Wrap a subscription as a stream.
    pub fn new(subscription: Subscription) -> Self {
        Self { subscription }
    }
}

impl Stream for NotificationStream {
    type Item = NotificationPayload;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.subscription.try_recv() {
            Ok(Some(payload)) => Poll::Ready(Some(payload)),
            Ok(None) => {
                cx.waker().wake_by_ref();
                Poll::Pending
            }
            Err(SubscriptionError::Closed) => Poll::Ready(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::{InMemoryNotificationBus, NotificationPublisher};
    use std::time::Duration;
    use swap_types::{SessionId, SessionStatus};
    use tokio::time::timeout;

    #[tokio::test]
    async fn subscription_receives_published_event() {
        let bus = InMemoryNotificationBus::new();
        let mut sub = bus.subscribe(NotificationFilter::all());

        let payload = NotificationPayload::SessionUpdate {
            session_id: SessionId::new(),
            status: SessionStatus::Initialized,
        };
        bus.publish(payload.clone()).await;

        let received = timeout(Duration::from_millis(100), sub.recv())
            .await
            .expect("timed out")
            .expect("event");

        assert!(matches!(received, NotificationPayload::SessionUpdate { .. }));
    }

    #[tokio::test]
    async fn subscription_drop_releases_count() {
        let bus = InMemoryNotificationBus::new();
        {
            let _sub1 = bus.subscribe(NotificationFilter::all());
            let _sub2 = bus.subscribe(NotificationFilter::all());
            assert_eq!(bus.subscriber_count(), 2);
        }
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn try_recv_is_empty_with_nothing_published() {
        let bus = InMemoryNotificationBus::new();
        let mut sub = bus.subscribe(NotificationFilter::all());
        assert!(matches!(sub.try_recv(), Ok(None)));
    }
}
