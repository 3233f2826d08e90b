//! MessageStamper port - Source of server-assigned message fields.
//!
//! Keeping id and clock behind a port makes stamped messages deterministic
//! under test.

use crate::domain::chat::{Message, RoomName, UserName};
use crate::domain::foundation::{MessageId, Timestamp};

/// Supplies the id and creation time of every inbound message.
pub trait MessageStamper: Send + Sync {
    /// Next message identifier.
    fn next_id(&self) -> MessageId;

    /// Current time.
    fn now(&self) -> Timestamp;

    /// Builds a fully stamped message.
    fn stamp(&self, room: RoomName, user: UserName, content: String) -> Message {
        Message::new(self.next_id(), room, user, content, self.now())
    }
}

/// Random UUIDs and the wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemStamper;

impl MessageStamper for SystemStamper {
    fn next_id(&self) -> MessageId {
        MessageId::new()
    }

    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}
