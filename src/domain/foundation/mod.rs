//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers, lifecycle enums, and error types
//! that form the vocabulary of the gateway domain.

mod errors;
mod ids;
mod session_state;
mod state_machine;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{ConnectionId, MessageId, ProcessId};
pub use session_state::SessionState;
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
