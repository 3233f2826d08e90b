//! WebSocket chat gateway.
//!
//! Accepts client connections, fans messages out to every session in the
//! same room on this process, and relays them through the message broker to
//! sessions on other processes.
//!
//! # Architecture
//!
//! ```text
//!  client ──ws──▶ reader pump ──▶ Dispatcher ──┬──▶ MessageStore (detached)
//!                                              ├──▶ Registry.broadcast_local
//!                                              └──▶ BrokerBridge.publish
//!                                                          │
//! ┌────────────────────────────────────────────────────────┼──────────────┐
//! │                     Message Broker                     ▼              │
//! │   InMemoryMessageBroker (test) │ RedisMessageBroker (production)     │
//! └────────────────────────────────────────────────────────┬──────────────┘
//!                                                          │ one relay per room
//!                                                          ▼
//!  client ◀──ws── writer pump ◀── outbound queue ◀── Registry.broadcast_local
//! ```
//!
//! # Components
//!
//! - [`registry`] - Live sessions by connection and room, local fan-out
//! - [`session`] - Reader and writer pumps
//! - [`dispatch`] - Stamp, persist, deliver, publish
//! - [`bridge`] - Broker publishing and per-room relays
//! - [`envelope`] - Broker wire format
//! - [`handler`] - Axum upgrade handler and [`Gateway`] lifecycle
//! - [`shutdown`] - Shutdown phases

pub mod bridge;
pub mod dispatch;
pub mod envelope;
pub mod handler;
pub mod registry;
pub mod session;
pub mod shutdown;

pub use bridge::{BridgeSettings, BrokerBridge};
pub use dispatch::{Dispatched, Dispatcher};
pub use envelope::RelayEnvelope;
pub use handler::{
    ws_handler, Gateway, GatewayDeps, GatewaySettings, JoinParams, JoinRequest, ShutdownReport,
};
pub use registry::{outbound_queue, BroadcastReport, Frame, Registry, SessionHandle};
pub use session::{decode_frame, CloseReason, DecodeError, Inbound, SessionSettings};
pub use shutdown::ShutdownPhase;
