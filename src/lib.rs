//! Chango Gateway - Horizontally scaled real-time chat gateway
//!
//! Clients join a named room over WebSocket and every message sent to the
//! room reaches every member, whichever gateway process they are connected
//! to. Processes relay room traffic to each other through a pub/sub broker.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod telemetry;
