//! # Swap Bus
//!
//! In-memory notification bus feeding the Notifier component (spec
//! §4.11). Grounded in the teacher's `shared-bus` crate: same
//! publisher/subscriber split and `tokio::sync::broadcast` transport,
//! narrowed to the single `NotificationPayload` union this
//! orchestrator emits instead of the teacher's many-subsystem
//! `BlockchainEvent`.
//!
//! Distributed delivery (WebSocket fan-out, webhook delivery) is an
//! explicit Non-goal; this crate only guarantees in-process delivery
//! to subscribers connected at publish time.

#![warn(missing_docs)]

pub mod events;
pub mod publisher;
pub mod subscriber;

pub use events::{NotificationFilter, NotificationTopic};
pub use publisher::{InMemoryNotificationBus, NotificationPublisher};
pub use subscriber::{NotificationStream, NotificationSubscriber, Subscription, SubscriptionError};

/// Default broadcast channel capacity, matching the teacher's bus.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_capacity_is_1000() {
        assert_eq!(DEFAULT_CHANNEL_CAPACITY, 1000);
    }
}
