//! Handling of one inbound chat message.
//!
//! Order per message: stamp, hand off to persistence, deliver to local
//! sessions, publish to the broker. Persistence runs detached and a broker
//! failure is only logged, so neither can hold back local delivery.

use std::sync::Arc;

use crate::domain::chat::{Message, RoomName, UserName};
use crate::domain::foundation::DomainError;
use crate::ports::{MessageStamper, MessageStore};

use super::bridge::BrokerBridge;
use super::registry::{BroadcastReport, Frame, Registry};

/// Turns raw content from a session into a delivered message.
pub struct Dispatcher {
    registry: Arc<Registry>,
    bridge: Arc<BrokerBridge>,
    store: Option<Arc<dyn MessageStore>>,
    stamper: Arc<dyn MessageStamper>,
}

/// What happened to one dispatched message.
#[derive(Debug)]
pub struct Dispatched {
    pub message: Message,
    pub local: BroadcastReport,
    pub published: bool,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<Registry>,
        bridge: Arc<BrokerBridge>,
        store: Option<Arc<dyn MessageStore>>,
        stamper: Arc<dyn MessageStamper>,
    ) -> Self {
        Self {
            registry,
            bridge,
            store,
            stamper,
        }
    }

    /// Stamps `content` as a message from `user` in `room` and fans it out.
    ///
    /// Only fails if the stamped message cannot be serialized, in which
    /// case nothing is delivered.
    pub async fn dispatch(
        &self,
        room: &RoomName,
        user: &UserName,
        content: String,
    ) -> Result<Dispatched, DomainError> {
        let message = self.stamper.stamp(room.clone(), user.clone(), content);
        let frame: Frame = message.to_json()?.into();

        self.persist(&message);

        let local = self.registry.broadcast_local(room, frame).await;

        let published = match self.bridge.publish(&message).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    message_id = %message.id(),
                    room = %room,
                    "Failed to publish message to broker: {}",
                    e
                );
                false
            }
        };

        tracing::debug!(
            message_id = %message.id(),
            room = %room,
            user = %user,
            delivered = local.delivered,
            published,
            "Message dispatched"
        );

        Ok(Dispatched {
            message,
            local,
            published,
        })
    }

    fn persist(&self, message: &Message) {
        let Some(store) = &self.store else {
            return;
        };
        let store = store.clone();
        let message = message.clone();
        tokio::spawn(async move {
            if let Err(e) = store.save_message(&message).await {
                tracing::warn!(
                    message_id = %message.id(),
                    room = %message.room(),
                    "Failed to persist message: {}",
                    e
                );
            }
        });
    }
}
