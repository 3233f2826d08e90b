//! MessageStore port - Best-effort persistence of chat messages.
//!
//! The gateway never waits on the store before delivering; a failed save is
//! logged and the message is delivered anyway.

use async_trait::async_trait;

use crate::domain::chat::Message;
use crate::domain::foundation::DomainError;

/// Port for persisting chat messages.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist one message.
    async fn save_message(&self, message: &Message) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn MessageStore) {}
}
