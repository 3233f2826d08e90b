//! Domain layer - chat messages, room identifiers and connection lifecycle.

pub mod chat;
pub mod foundation;
