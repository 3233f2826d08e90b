//! In-memory message store for tests.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::chat::Message;
use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::MessageStore;

/// Captures saved messages; can be switched into a failing mode.
#[derive(Default)]
pub struct InMemoryMessageStore {
    saved: Mutex<Vec<Message>>,
    failing: AtomicBool,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent save fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Messages saved so far, in save order.
    pub async fn saved(&self) -> Vec<Message> {
        self.saved.lock().await.clone()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn save_message(&self, message: &Message) -> Result<(), DomainError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DomainError::new(
                ErrorCode::DatabaseError,
                "in-memory store is marked failing",
            ));
        }
        self.saved.lock().await.push(message.clone());
        Ok(())
    }
}
