//! PostgreSQL adapters - Database implementations for persistence ports.
//!
//! - `PostgresMessageStore` - Appends chat messages to the `messages` table

mod message_store;

pub use message_store::PostgresMessageStore;
