//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `memory` - In-process broker and store (tests, single node)
//! - `redis` - Redis pub/sub broker
//! - `postgres` - PostgreSQL message store
//! - `websocket` - The chat gateway itself

pub mod memory;
pub mod postgres;
pub mod redis;
pub mod websocket;

pub use memory::{InMemoryMessageBroker, InMemoryMessageStore};
pub use postgres::PostgresMessageStore;
pub use redis::RedisMessageBroker;
pub use websocket::{Gateway, GatewayDeps, GatewaySettings};
