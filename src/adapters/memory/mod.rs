//! In-memory adapters for tests and single-node runs.

mod broker;
mod store;

pub use broker::InMemoryMessageBroker;
pub use store::InMemoryMessageStore;
