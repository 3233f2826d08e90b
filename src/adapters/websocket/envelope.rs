//! Broker wire format.
//!
//! Every message a gateway publishes is wrapped with the publishing
//! process's id, so that relays can skip traffic their own process already
//! delivered locally:
//!
//! ```json
//! {"origin": "6f1c...", "message": {"id": "...", "room": "lobby", ...}}
//! ```
//!
//! Clients never see the envelope; they receive the bare message JSON.

use serde::{Deserialize, Serialize};

use crate::domain::chat::Message;
use crate::domain::foundation::{DomainError, ProcessId};

/// A chat message as it travels over the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayEnvelope {
    pub origin: ProcessId,
    pub message: Message,
}

impl RelayEnvelope {
    pub fn new(origin: ProcessId, message: Message) -> Self {
        Self { origin, message }
    }

    pub fn encode(&self) -> Result<String, DomainError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(raw: &str) -> Result<Self, DomainError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// True when this envelope was published by `process`.
    pub fn is_from(&self, process: &ProcessId) -> bool {
        &self.origin == process
    }
}
