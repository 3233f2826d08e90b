//! MessageBroker port - Interface to the distributed publish/subscribe system.
//!
//! Gateways never talk to each other directly. Every room has a topic on the
//! broker; a gateway publishes what its clients send and subscribes to the
//! topics of the rooms it has local listeners for.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::domain::foundation::DomainError;

/// Stream of raw payloads received on one topic.
///
/// Dropping the subscription closes it on the broker side.
pub type BrokerSubscription = BoxStream<'static, String>;

/// Port for the distributed pub/sub broker.
///
/// Implementations must:
/// - Deliver each published payload to every live subscription of the topic
/// - Never block `publish` on slow subscribers
/// - End the subscription stream when the underlying connection is lost, so
///   callers can resubscribe
///
/// # Example
///
/// ```ignore
/// broker.publish("chango:room:general", payload).await?;
///
/// let mut sub = broker.subscribe("chango:room:general").await?;
/// while let Some(payload) = sub.next().await {
///     registry.broadcast_local(&room, payload.into()).await;
/// }
/// ```
#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Publish a payload on a topic.
    async fn publish(&self, topic: &str, payload: String) -> Result<(), DomainError>;

    /// Open a subscription on a topic.
    async fn subscribe(&self, topic: &str) -> Result<BrokerSubscription, DomainError>;
}
