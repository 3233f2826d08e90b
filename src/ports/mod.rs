//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the gateway core and the outside world. Adapters implement these ports.
//!
//! - `MessageBroker` - Distributed pub/sub used to relay room traffic between processes
//! - `MessageStore` - Best-effort message persistence
//! - `MessageStamper` - Server-assigned id and timestamp source

mod message_broker;
mod message_stamper;
mod message_store;

pub use message_broker::{BrokerSubscription, MessageBroker};
pub use message_stamper::{MessageStamper, SystemStamper};
pub use message_store::MessageStore;
