//! Redis pub/sub implementation of the MessageBroker port.
//!
//! Publishing goes through one shared multiplexed connection. Every
//! subscription gets its own dedicated connection, because a Redis
//! connection in subscriber mode cannot issue other commands; dropping the
//! returned stream drops that connection and with it the subscription.

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use crate::config::RedisConfig;
use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::{BrokerSubscription, MessageBroker};

/// Redis-backed broker for multi-process deployments.
#[derive(Clone)]
pub struct RedisMessageBroker {
    client: redis::Client,
    publisher: MultiplexedConnection,
    timeout: std::time::Duration,
}

impl RedisMessageBroker {
    /// Open the client and the shared publishing connection.
    ///
    /// Fails if Redis cannot be reached within the configured timeout.
    pub async fn connect(config: &RedisConfig) -> Result<Self, DomainError> {
        let client = redis::Client::open(config.url.as_str()).map_err(unavailable)?;

        let publisher = tokio::time::timeout(
            config.timeout(),
            client.get_multiplexed_tokio_connection(),
        )
        .await
        .map_err(|_| {
            DomainError::new(
                ErrorCode::BrokerUnavailable,
                format!("Timed out connecting to Redis after {:?}", config.timeout()),
            )
        })?
        .map_err(unavailable)?;

        Ok(Self {
            client,
            publisher,
            timeout: config.timeout(),
        })
    }
}

#[async_trait]
impl MessageBroker for RedisMessageBroker {
    async fn publish(&self, topic: &str, payload: String) -> Result<(), DomainError> {
        let mut conn = self.publisher.clone();

        let receivers: i64 = conn
            .publish(topic, payload)
            .await
            .map_err(|e| unavailable(e).with_detail("topic", topic))?;

        tracing::trace!(%topic, receivers, "Published to Redis");
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<BrokerSubscription, DomainError> {
        let conn = tokio::time::timeout(self.timeout, self.client.get_async_connection())
            .await
            .map_err(|_| {
                DomainError::new(ErrorCode::BrokerUnavailable, "Timed out opening subscription")
                    .with_detail("topic", topic)
            })?
            .map_err(unavailable)?;

        let mut pubsub = conn.into_pubsub();
        pubsub
            .subscribe(topic)
            .await
            .map_err(|e| unavailable(e).with_detail("topic", topic))?;

        let topic = topic.to_string();
        let stream = pubsub.into_on_message().filter_map(move |msg| {
            let payload = match msg.get_payload::<String>() {
                Ok(payload) => Some(payload),
                Err(e) => {
                    tracing::warn!(topic = %topic, "Dropping non-UTF-8 Redis payload: {}", e);
                    None
                }
            };
            futures::future::ready(payload)
        });

        Ok(stream.boxed())
    }
}

impl std::fmt::Debug for RedisMessageBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisMessageBroker")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn unavailable(e: redis::RedisError) -> DomainError {
    DomainError::new(ErrorCode::BrokerUnavailable, format!("Redis error: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_rejects_malformed_url() {
        let config = RedisConfig {
            url: "not-a-redis-url".to_string(),
            ..Default::default()
        };

        let err = RedisMessageBroker::connect(&config).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::BrokerUnavailable);
    }

    // Round-trip tests need a live Redis and are run separately:
    //
    // #[tokio::test]
    // #[ignore] // Run with: cargo test -- --ignored
    // async fn publish_reaches_subscriber() {
    //     let config = RedisConfig { url: "redis://127.0.0.1/".into(), ..Default::default() };
    //     let broker = RedisMessageBroker::connect(&config).await.unwrap();
    //     let mut sub = broker.subscribe("chango:room:test").await.unwrap();
    //     broker.publish("chango:room:test", "hi".into()).await.unwrap();
    //     assert_eq!(sub.next().await.as_deref(), Some("hi"));
    // }
}
