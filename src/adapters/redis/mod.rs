//! Redis adapters - pub/sub relay of room traffic between gateway processes.

mod broker;

pub use broker::RedisMessageBroker;
