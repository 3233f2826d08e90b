//! Chat module - messages and the identifiers that route them.

mod message;
mod names;

pub use message::Message;
pub use names::{RoomName, UserName, MAX_ROOM_LEN, MAX_USER_LEN};
