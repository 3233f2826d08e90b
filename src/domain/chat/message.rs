//! Chat message - the unit of fan-out.
//!
//! A message is stamped by the gateway that received it (id, created_at)
//! and is immutable from then on. Its JSON form is the outbound wire frame:
//!
//! ```json
//! {"id":"…","room":"general","user":"alice","content":"hi","created_at":"2026-01-01T00:00:00Z"}
//! ```

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DomainError, MessageId, Timestamp};

use super::{RoomName, UserName};

/// A chat message as delivered to every session in its room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    id: MessageId,
    room: RoomName,
    user: UserName,
    content: String,
    created_at: Timestamp,
}

impl Message {
    /// Assembles a message from already-assigned parts.
    pub fn new(
        id: MessageId,
        room: RoomName,
        user: UserName,
        content: impl Into<String>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            room,
            user,
            content: content.into(),
            created_at,
        }
    }

    pub fn id(&self) -> &MessageId {
        &self.id
    }

    pub fn room(&self) -> &RoomName {
        &self.room
    }

    pub fn user(&self) -> &UserName {
        &self.user
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn created_at(&self) -> &Timestamp {
        &self.created_at
    }

    /// Serializes to the outbound wire frame.
    pub fn to_json(&self) -> Result<String, DomainError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses an outbound wire frame back into a message.
    pub fn from_json(raw: &str) -> Result<Self, DomainError> {
        Ok(serde_json::from_str(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use uuid::Uuid;

    fn sample() -> Message {
        Message::new(
            MessageId::from_uuid(Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap()),
            RoomName::new("general").unwrap(),
            UserName::new("alice").unwrap(),
            "hi",
            Timestamp::from_unix_secs(1705314600),
        )
    }

    #[test]
    fn wire_format_has_flat_snake_case_fields() {
        let json: serde_json::Value = serde_json::from_str(&sample().to_json().unwrap()).unwrap();

        assert_eq!(json["id"], "550e8400-e29b-41d4-a716-446655440000");
        assert_eq!(json["room"], "general");
        assert_eq!(json["user"], "alice");
        assert_eq!(json["content"], "hi");
        assert_eq!(json["created_at"], "2024-01-15T10:30:00Z");
    }

    #[test]
    fn decodes_frame_produced_by_another_gateway() {
        let raw = r#"{"id":"550e8400-e29b-41d4-a716-446655440000","room":"general","user":"alice","content":"hi","created_at":"2024-01-15T10:30:00Z"}"#;
        assert_eq!(Message::from_json(raw).unwrap(), sample());
    }

    #[test]
    fn rejects_frame_with_missing_field() {
        let raw = r#"{"id":"550e8400-e29b-41d4-a716-446655440000","room":"general","content":"hi"}"#;
        assert!(Message::from_json(raw).is_err());
    }

    proptest! {
        #[test]
        fn json_preserves_every_field(
            room in "[a-z][a-z0-9_-]{0,20}",
            user in "[A-Za-z0-9_]{1,20}",
            content in "\\PC{1,200}",
            secs in 0u64..4_000_000_000,
            id in any::<u128>(),
        ) {
            let message = Message::new(
                MessageId::from_uuid(Uuid::from_u128(id)),
                RoomName::new(&room).unwrap(),
                UserName::new(&user).unwrap(),
                content.clone(),
                Timestamp::from_unix_secs(secs),
            );
            let decoded = Message::from_json(&message.to_json().unwrap()).unwrap();
            prop_assert_eq!(decoded.room().as_str(), room.as_str());
            prop_assert_eq!(decoded.user().as_str(), user.as_str());
            prop_assert_eq!(decoded.content(), content.as_str());
            prop_assert_eq!(decoded, message);
        }
    }
}
