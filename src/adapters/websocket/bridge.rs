//! Bridge between the message broker and the local registry.
//!
//! Outbound, it publishes every locally originated message to the room's
//! broker topic. Inbound, it runs one relay task per room that has (or had)
//! local sessions, forwarding broker traffic from other gateways into the
//! registry.
//!
//! # Relay Flow
//!
//! ```text
//! broker topic "chango:room:lobby"
//!          │
//!          ▼
//! ┌────────────────────┐
//! │  Relay (lobby)     │──▶ own origin? skip
//! │  decode envelope   │
//! └────────────────────┘
//!          │
//!          ▼
//! ┌────────────────────┐
//! │ Registry           │
//! │  broadcast_local   │
//! └────────────────────┘
//! ```
//!
//! A relay whose subscription fails or ends waits `resubscribe_delay` and
//! subscribes again. Relays are only stopped by [`BrokerBridge::shutdown`]
//! or, when idle retirement is enabled, by [`BrokerBridge::release_if_idle`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::domain::chat::{Message, RoomName};
use crate::domain::foundation::{DomainError, ProcessId};
use crate::ports::MessageBroker;

use super::envelope::RelayEnvelope;
use super::registry::{Frame, Registry};

/// Broker topic naming and relay restart policy.
#[derive(Debug, Clone)]
pub struct BridgeSettings {
    pub topic_prefix: String,
    pub resubscribe_delay: Duration,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            topic_prefix: "chango:room:".to_string(),
            resubscribe_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Default)]
struct RelayTable {
    handles: HashMap<RoomName, JoinHandle<()>>,
    closed: bool,
}

/// Cross-process fan-out for one gateway.
pub struct BrokerBridge {
    origin: ProcessId,
    broker: Arc<dyn MessageBroker>,
    registry: Arc<Registry>,
    settings: BridgeSettings,
    relays: Mutex<RelayTable>,
}

impl BrokerBridge {
    pub fn new(
        origin: ProcessId,
        broker: Arc<dyn MessageBroker>,
        registry: Arc<Registry>,
        settings: BridgeSettings,
    ) -> Self {
        Self {
            origin,
            broker,
            registry,
            settings,
            relays: Mutex::new(RelayTable::default()),
        }
    }

    pub fn origin(&self) -> &ProcessId {
        &self.origin
    }

    /// Broker topic carrying `room`'s traffic.
    pub fn topic(&self, room: &RoomName) -> String {
        format!("{}{}", self.settings.topic_prefix, room)
    }

    /// Publishes a locally originated message to its room's topic.
    pub async fn publish(&self, message: &Message) -> Result<(), DomainError> {
        let payload = RelayEnvelope::new(self.origin.clone(), message.clone()).encode()?;
        self.broker
            .publish(&self.topic(message.room()), payload)
            .await
    }

    /// Starts the relay for `room` unless one is already running.
    ///
    /// Returns `true` if a relay was started. After [`shutdown`](Self::shutdown)
    /// this never starts one.
    pub async fn ensure_relay(&self, room: &RoomName) -> bool {
        let mut relays = self.relays.lock().await;
        if relays.closed {
            return false;
        }
        if let Some(handle) = relays.handles.get(room) {
            if !handle.is_finished() {
                return false;
            }
        }

        let relay = Relay {
            room: room.clone(),
            topic: self.topic(room),
            origin: self.origin.clone(),
            broker: self.broker.clone(),
            registry: self.registry.clone(),
            resubscribe_delay: self.settings.resubscribe_delay,
        };
        relays.handles.insert(room.clone(), tokio::spawn(relay.run()));
        tracing::debug!(room = %room, "Room relay started");
        true
    }

    /// Stops `room`'s relay if no local session remains in it.
    ///
    /// Holds the relay table lock while checking the registry, so a
    /// concurrent join's `ensure_relay` either runs first (and this sees
    /// the session) or runs after (and restarts the relay).
    pub async fn release_if_idle(&self, room: &RoomName) -> bool {
        let mut relays = self.relays.lock().await;
        if self.registry.room_len(room).await > 0 {
            return false;
        }
        match relays.handles.remove(room) {
            Some(handle) => {
                handle.abort();
                tracing::debug!(room = %room, "Idle room relay retired");
                true
            }
            None => false,
        }
    }

    /// Cancels every relay and refuses to start new ones.
    ///
    /// Returns how many relays were cancelled.
    pub async fn shutdown(&self) -> usize {
        let mut relays = self.relays.lock().await;
        relays.closed = true;
        let count = relays.handles.len();
        for (_, handle) in relays.handles.drain() {
            handle.abort();
        }
        count
    }

    /// Number of relays currently running.
    pub async fn active_relays(&self) -> usize {
        self.relays
            .lock()
            .await
            .handles
            .values()
            .filter(|h| !h.is_finished())
            .count()
    }
}

/// The long-running subscription task for one room.
struct Relay {
    room: RoomName,
    topic: String,
    origin: ProcessId,
    broker: Arc<dyn MessageBroker>,
    registry: Arc<Registry>,
    resubscribe_delay: Duration,
}

impl Relay {
    async fn run(self) {
        loop {
            match self.broker.subscribe(&self.topic).await {
                Ok(mut subscription) => {
                    tracing::debug!(room = %self.room, topic = %self.topic, "Relay subscribed");
                    while let Some(payload) = subscription.next().await {
                        self.forward(&payload).await;
                    }
                    tracing::warn!(
                        room = %self.room,
                        "Relay subscription ended, resubscribing"
                    );
                }
                Err(e) => {
                    tracing::warn!(room = %self.room, "Relay failed to subscribe: {}", e);
                }
            }
            tokio::time::sleep(self.resubscribe_delay).await;
        }
    }

    async fn forward(&self, payload: &str) {
        let envelope = match RelayEnvelope::decode(payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(room = %self.room, "Skipping undecodable broker payload: {}", e);
                return;
            }
        };

        if envelope.is_from(&self.origin) {
            return;
        }
        if envelope.message.room() != &self.room {
            tracing::warn!(
                room = %self.room,
                message_room = %envelope.message.room(),
                "Skipping broker message addressed to another room"
            );
            return;
        }

        let frame: Frame = match envelope.message.to_json() {
            Ok(json) => json.into(),
            Err(e) => {
                tracing::warn!(room = %self.room, "Failed to re-encode relayed message: {}", e);
                return;
            }
        };

        let report = self.registry.broadcast_local(&self.room, frame).await;
        tracing::trace!(
            room = %self.room,
            origin = %envelope.origin,
            delivered = report.delivered,
            "Relayed broker message"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryMessageBroker;
    use crate::adapters::websocket::registry::{outbound_queue, SessionHandle};
    use crate::domain::chat::UserName;
    use crate::domain::foundation::{ConnectionId, MessageId, Timestamp};
    use tokio::sync::mpsc;

    fn room(name: &str) -> RoomName {
        RoomName::new(name).unwrap()
    }

    fn message(room_name: &str, content: &str) -> Message {
        Message::new(
            MessageId::new(),
            room(room_name),
            UserName::new("bob").unwrap(),
            content.to_string(),
            Timestamp::now(),
        )
    }

    fn bridge(
        origin: &str,
        broker: Arc<InMemoryMessageBroker>,
        registry: Arc<Registry>,
    ) -> BrokerBridge {
        BrokerBridge::new(
            ProcessId::from(origin),
            broker,
            registry,
            BridgeSettings {
                resubscribe_delay: Duration::from_millis(10),
                ..Default::default()
            },
        )
    }

    async fn join(registry: &Registry, room_name: &str) -> (ConnectionId, mpsc::Receiver<Frame>) {
        let (tx, rx) = outbound_queue(16);
        let id = ConnectionId::new();
        registry
            .add(SessionHandle::new(id, room(room_name), UserName::new("alice").unwrap(), tx))
            .await;
        (id, rx)
    }

    async fn wait_for_subscribers(broker: &InMemoryMessageBroker, topic: &str, n: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while broker.subscriber_count(topic).await < n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("relay never subscribed");
    }

    #[test]
    fn topic_uses_prefix() {
        let bridge = bridge(
            "gw-1",
            Arc::new(InMemoryMessageBroker::new()),
            Arc::new(Registry::new()),
        );
        assert_eq!(bridge.topic(&room("lobby")), "chango:room:lobby");
    }

    #[tokio::test]
    async fn publish_wraps_message_with_origin() {
        let broker = Arc::new(InMemoryMessageBroker::new());
        let bridge = bridge("gw-1", broker.clone(), Arc::new(Registry::new()));
        let msg = message("lobby", "hi");

        bridge.publish(&msg).await.unwrap();

        let published = broker.published().await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "chango:room:lobby");
        let envelope = RelayEnvelope::decode(&published[0].1).unwrap();
        assert_eq!(envelope.origin, ProcessId::from("gw-1"));
        assert_eq!(envelope.message, msg);
    }

    #[tokio::test]
    async fn publish_surfaces_broker_failure() {
        let broker = Arc::new(InMemoryMessageBroker::new());
        broker.set_unavailable(true);
        let bridge = bridge("gw-1", broker, Arc::new(Registry::new()));

        assert!(bridge.publish(&message("lobby", "hi")).await.is_err());
    }

    #[tokio::test]
    async fn ensure_relay_starts_one_relay_per_room() {
        let broker = Arc::new(InMemoryMessageBroker::new());
        let bridge = bridge("gw-1", broker, Arc::new(Registry::new()));

        assert!(bridge.ensure_relay(&room("lobby")).await);
        assert!(!bridge.ensure_relay(&room("lobby")).await);
        assert!(bridge.ensure_relay(&room("ops")).await);
        assert_eq!(bridge.active_relays().await, 2);
    }

    #[tokio::test]
    async fn relay_delivers_foreign_messages_and_skips_own() {
        let broker = Arc::new(InMemoryMessageBroker::new());
        let registry = Arc::new(Registry::new());
        let local = bridge("gw-1", broker.clone(), registry.clone());
        let remote = bridge("gw-2", broker.clone(), Arc::new(Registry::new()));
        let (_id, mut rx) = join(&registry, "lobby").await;

        local.ensure_relay(&room("lobby")).await;
        wait_for_subscribers(&broker, "chango:room:lobby", 1).await;

        local.publish(&message("lobby", "from-self")).await.unwrap();
        let foreign = message("lobby", "from-remote");
        remote.publish(&foreign).await.unwrap();

        let frame = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(Message::from_json(&frame).unwrap(), foreign);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn relay_resubscribes_after_stream_ends() {
        let broker = Arc::new(InMemoryMessageBroker::new());
        let registry = Arc::new(Registry::new());
        let local = bridge("gw-1", broker.clone(), registry.clone());
        let remote = bridge("gw-2", broker.clone(), Arc::new(Registry::new()));
        let (_id, mut rx) = join(&registry, "lobby").await;

        local.ensure_relay(&room("lobby")).await;
        wait_for_subscribers(&broker, "chango:room:lobby", 1).await;

        broker.drop_subscriptions().await;
        wait_for_subscribers(&broker, "chango:room:lobby", 1).await;

        let foreign = message("lobby", "after-reconnect");
        remote.publish(&foreign).await.unwrap();

        let frame = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(Message::from_json(&frame).unwrap(), foreign);
    }

    #[tokio::test]
    async fn relay_survives_failed_subscribe() {
        let broker = Arc::new(InMemoryMessageBroker::new());
        broker.set_unavailable(true);
        let bridge = bridge("gw-1", broker.clone(), Arc::new(Registry::new()));

        bridge.ensure_relay(&room("lobby")).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(bridge.active_relays().await, 1);

        broker.set_unavailable(false);
        wait_for_subscribers(&broker, "chango:room:lobby", 1).await;
    }

    #[tokio::test]
    async fn release_if_idle_only_stops_empty_rooms() {
        let broker = Arc::new(InMemoryMessageBroker::new());
        let registry = Arc::new(Registry::new());
        let bridge = bridge("gw-1", broker, registry.clone());
        let (id, _rx) = join(&registry, "lobby").await;
        bridge.ensure_relay(&room("lobby")).await;

        assert!(!bridge.release_if_idle(&room("lobby")).await);
        assert_eq!(bridge.active_relays().await, 1);

        registry.remove(&id).await;
        assert!(bridge.release_if_idle(&room("lobby")).await);
        assert_eq!(bridge.active_relays().await, 0);

        // A later join brings the relay back.
        assert!(bridge.ensure_relay(&room("lobby")).await);
    }

    #[tokio::test]
    async fn shutdown_cancels_relays_and_blocks_new_ones() {
        let broker = Arc::new(InMemoryMessageBroker::new());
        let bridge = bridge("gw-1", broker, Arc::new(Registry::new()));
        bridge.ensure_relay(&room("lobby")).await;
        bridge.ensure_relay(&room("ops")).await;

        assert_eq!(bridge.shutdown().await, 2);
        assert_eq!(bridge.active_relays().await, 0);
        assert!(!bridge.ensure_relay(&room("lobby")).await);
    }
}
