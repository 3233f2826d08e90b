//! In-memory broker for tests and single-node deployments.
//!
//! Each topic is a `tokio::sync::broadcast` channel. Several gateways sharing
//! one `Arc<InMemoryMessageBroker>` behave like separate processes attached
//! to the same Redis instance.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::Mutex;

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::{BrokerSubscription, MessageBroker};

const DEFAULT_TOPIC_CAPACITY: usize = 1024;

/// In-memory pub/sub broker.
///
/// Features:
/// - Fan-out per topic through broadcast channels
/// - Published payload capture for assertions
/// - Simulated outages (`set_unavailable`) and connection loss
///   (`drop_subscriptions`)
pub struct InMemoryMessageBroker {
    topics: Mutex<HashMap<String, broadcast::Sender<String>>>,
    published: Mutex<Vec<(String, String)>>,
    unavailable: AtomicBool,
    topic_capacity: usize,
}

impl InMemoryMessageBroker {
    /// Creates a broker with the default per-topic buffer.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TOPIC_CAPACITY)
    }

    /// Creates a broker whose topics buffer `topic_capacity` payloads per
    /// subscriber before lagging.
    pub fn with_capacity(topic_capacity: usize) -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
            published: Mutex::new(Vec::new()),
            unavailable: AtomicBool::new(false),
            topic_capacity,
        }
    }

    /// Makes every subsequent `publish` and `subscribe` fail until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Ends every open subscription stream, as a lost broker connection would.
    pub async fn drop_subscriptions(&self) {
        self.topics.lock().await.clear();
    }

    /// Number of live subscriptions on a topic.
    pub async fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .lock()
            .await
            .get(topic)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    /// All payloads published so far, as `(topic, payload)` pairs.
    pub async fn published(&self) -> Vec<(String, String)> {
        self.published.lock().await.clone()
    }

    fn check_available(&self) -> Result<(), DomainError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DomainError::new(
                ErrorCode::BrokerUnavailable,
                "in-memory broker is marked unavailable",
            ));
        }
        Ok(())
    }
}

impl Default for InMemoryMessageBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageBroker for InMemoryMessageBroker {
    async fn publish(&self, topic: &str, payload: String) -> Result<(), DomainError> {
        self.check_available()?;

        self.published
            .lock()
            .await
            .push((topic.to_string(), payload.clone()));

        if let Some(tx) = self.topics.lock().await.get(topic) {
            // No receivers is fine: nobody is listening on that room.
            let _ = tx.send(payload);
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<BrokerSubscription, DomainError> {
        self.check_available()?;

        let rx = {
            let mut topics = self.topics.lock().await;
            topics
                .entry(topic.to_string())
                .or_insert_with(|| broadcast::channel(self.topic_capacity).0)
                .subscribe()
        };

        let topic = topic.to_string();
        let stream = futures::stream::unfold(rx, move |mut rx| {
            let topic = topic.clone();
            async move {
                loop {
                    match rx.recv().await {
                        Ok(payload) => return Some((payload, rx)),
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(%topic, skipped, "In-memory subscription lagged");
                        }
                        Err(RecvError::Closed) => return None,
                    }
                }
            }
        });

        Ok(stream.boxed())
    }
}
