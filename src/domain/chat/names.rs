//! Room and user name value objects.
//!
//! Both arrive as query parameters on the upgrade request and are validated
//! once, before any connection state exists.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::ValidationError;

/// Maximum length of a room name, in characters.
pub const MAX_ROOM_LEN: usize = 64;

/// Maximum length of a user name, in characters.
pub const MAX_USER_LEN: usize = 32;

/// Logical fan-out group. Not persisted; used for grouping and topic routing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomName(String);

impl RoomName {
    /// Creates a RoomName from raw input, trimming surrounding whitespace.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, ValidationError> {
        let name = raw.as_ref().trim();
        if name.is_empty() {
            return Err(ValidationError::empty_field("room"));
        }
        let len = name.chars().count();
        if len > MAX_ROOM_LEN {
            return Err(ValidationError::too_long("room", MAX_ROOM_LEN, len));
        }
        if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(ValidationError::invalid_format(
                "room",
                "must not contain whitespace or control characters",
            ));
        }
        Ok(Self(name.to_string()))
    }

    /// Returns the inner string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Display name of the sender, as supplied on the upgrade request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserName(String);

impl UserName {
    /// Creates a UserName; only ASCII letters, digits and `_` are accepted.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, ValidationError> {
        let name = raw.as_ref().trim();
        if name.is_empty() {
            return Err(ValidationError::empty_field("user"));
        }
        let len = name.chars().count();
        if len > MAX_USER_LEN {
            return Err(ValidationError::too_long("user", MAX_USER_LEN, len));
        }
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ValidationError::invalid_format(
                "user",
                "only letters, digits and underscores are allowed",
            ));
        }
        Ok(Self(name.to_string()))
    }

    /// Returns the inner string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_name_trims_input() {
        let room = RoomName::new("  general ").unwrap();
        assert_eq!(room.as_str(), "general");
    }

    #[test]
    fn room_name_rejects_blank() {
        assert_eq!(
            RoomName::new("   "),
            Err(ValidationError::empty_field("room"))
        );
    }

    #[test]
    fn room_name_rejects_inner_whitespace() {
        assert!(matches!(
            RoomName::new("two words"),
            Err(ValidationError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn room_name_rejects_overlong_input() {
        let raw = "r".repeat(MAX_ROOM_LEN + 1);
        assert!(matches!(
            RoomName::new(raw),
            Err(ValidationError::TooLong { max: MAX_ROOM_LEN, .. })
        ));
    }

    #[test]
    fn room_name_allows_punctuation() {
        assert!(RoomName::new("team-rust.general#1").is_ok());
    }

    #[test]
    fn user_name_accepts_word_characters() {
        assert_eq!(UserName::new("alice_01").unwrap().as_str(), "alice_01");
    }

    #[test]
    fn user_name_rejects_symbols() {
        assert!(UserName::new("alice!").is_err());
        assert!(UserName::new("al ice").is_err());
    }

    #[test]
    fn user_name_rejects_empty() {
        assert_eq!(UserName::new(""), Err(ValidationError::empty_field("user")));
    }
}
