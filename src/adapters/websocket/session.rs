//! Reader and writer pumps for one WebSocket session.
//!
//! The socket is split in two. The reader pump decodes inbound frames and
//! hands chat content to the [`Dispatcher`]; the writer pump drains the
//! session's outbound queue onto the socket. Both are generic over the
//! stream/sink halves so they can be driven without a real socket.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{close_code, CloseFrame, Message as WsMessage};
use futures::{Sink, SinkExt, Stream, StreamExt};
use thiserror::Error;
use tokio::sync::{mpsc, watch};

use crate::config::GatewayConfig;
use crate::domain::chat::{RoomName, UserName};
use crate::domain::foundation::ConnectionId;

use super::dispatch::Dispatcher;
use super::registry::Frame;
use super::shutdown::{reached, ShutdownPhase};

/// Per-session limits.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub queue_capacity: usize,
    pub write_timeout: Duration,
    pub max_message_bytes: usize,
}

impl From<&GatewayConfig> for SessionSettings {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            queue_capacity: config.outbound_queue_capacity,
            write_timeout: config.write_timeout(),
            max_message_bytes: config.max_message_bytes,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&GatewayConfig::default())
    }
}

/// Why a pump stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Client sent a Close frame or the stream ended.
    ClientClosed,
    /// Reading from the socket failed.
    ReadError,
    /// Outbound queue closed: the session left the registry.
    QueueClosed,
    /// Writing to the socket failed.
    WriteError,
    /// A single write exceeded the write timeout.
    WriteTimeout,
    /// Outbound queue overflowed and the registry shed the session.
    SlowConsumer,
    /// Gateway began draining.
    Shutdown,
    /// Task was cancelled or panicked.
    Aborted,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CloseReason::ClientClosed => "client_closed",
            CloseReason::ReadError => "read_error",
            CloseReason::QueueClosed => "queue_closed",
            CloseReason::WriteError => "write_error",
            CloseReason::WriteTimeout => "write_timeout",
            CloseReason::SlowConsumer => "slow_consumer",
            CloseReason::Shutdown => "shutdown",
            CloseReason::Aborted => "aborted",
        };
        write!(f, "{}", s)
    }
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Chat(String),
    Control,
    Close,
}

/// Inbound frame that carries no usable chat content.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("binary frame is not valid UTF-8")]
    InvalidUtf8,

    #[error("message is empty")]
    Empty,

    #[error("message is {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: usize },
}

/// Interprets one inbound WebSocket frame.
///
/// Text and UTF-8 binary frames carry chat content. Blank content and
/// content over `max_bytes` are rejected.
pub fn decode_frame(frame: WsMessage, max_bytes: usize) -> Result<Inbound, DecodeError> {
    let text = match frame {
        WsMessage::Text(text) => text,
        WsMessage::Binary(bytes) => String::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)?,
        WsMessage::Ping(_) | WsMessage::Pong(_) => return Ok(Inbound::Control),
        WsMessage::Close(_) => return Ok(Inbound::Close),
    };

    if text.len() > max_bytes {
        return Err(DecodeError::TooLarge {
            size: text.len(),
            limit: max_bytes,
        });
    }
    if text.trim().is_empty() {
        return Err(DecodeError::Empty);
    }
    Ok(Inbound::Chat(text))
}

/// Everything the reader pump needs besides the socket.
pub struct ReaderContext {
    pub connection_id: ConnectionId,
    pub room: RoomName,
    pub user: UserName,
    pub max_message_bytes: usize,
    pub dispatcher: Arc<Dispatcher>,
}

/// Reads frames until the client goes away or the gateway starts draining.
///
/// Malformed frames are skipped; the session stays open.
pub async fn run_reader<S, E>(
    mut stream: S,
    ctx: ReaderContext,
    mut phase: watch::Receiver<ShutdownPhase>,
) -> CloseReason
where
    S: Stream<Item = Result<WsMessage, E>> + Unpin,
    E: Display,
{
    loop {
        let next = tokio::select! {
            next = stream.next() => next,
            _ = reached(&mut phase, ShutdownPhase::Draining) => return CloseReason::Shutdown,
        };

        let frame = match next {
            None => return CloseReason::ClientClosed,
            Some(Err(e)) => {
                tracing::debug!(connection_id = %ctx.connection_id, "Receive error: {}", e);
                return CloseReason::ReadError;
            }
            Some(Ok(frame)) => frame,
        };

        match decode_frame(frame, ctx.max_message_bytes) {
            Ok(Inbound::Chat(content)) => {
                if let Err(e) = ctx.dispatcher.dispatch(&ctx.room, &ctx.user, content).await {
                    tracing::warn!(
                        connection_id = %ctx.connection_id,
                        "Dropping message that could not be dispatched: {}",
                        e
                    );
                }
            }
            Ok(Inbound::Control) => {}
            Ok(Inbound::Close) => {
                tracing::debug!(connection_id = %ctx.connection_id, "Client sent close frame");
                return CloseReason::ClientClosed;
            }
            Err(e) => {
                tracing::debug!(
                    connection_id = %ctx.connection_id,
                    "Skipping inbound frame: {}",
                    e
                );
            }
        }
    }
}

/// Writes queued frames to the socket in order.
///
/// When the queue closes (the session was removed from the registry) a
/// Close frame is sent. A failed or timed-out write ends the pump.
pub async fn run_writer<S>(
    mut sink: S,
    mut queue: mpsc::Receiver<Frame>,
    write_timeout: Duration,
) -> CloseReason
where
    S: Sink<WsMessage> + Unpin,
    S::Error: Display,
{
    while let Some(frame) = queue.recv().await {
        match tokio::time::timeout(write_timeout, sink.send(WsMessage::Text(frame.to_string())))
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::debug!("Send error, closing connection: {}", e);
                return CloseReason::WriteError;
            }
            Err(_) => {
                tracing::debug!(?write_timeout, "Write timed out, closing connection");
                return CloseReason::WriteTimeout;
            }
        }
    }

    let close = WsMessage::Close(Some(CloseFrame {
        code: close_code::NORMAL,
        reason: "".into(),
    }));
    match tokio::time::timeout(write_timeout, sink.send(close)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!("Failed to send close frame: {}", e),
        Err(_) => tracing::debug!("Close frame timed out"),
    }
    CloseReason::QueueClosed
}
