//! Process-local session registry.
//!
//! Tracks every live session on this gateway, indexed by connection and by
//! room, and performs the local half of fan-out.
//!
//! # Architecture
//!
//! ```text
//! Room: lobby              Room: ops
//! ├── conn-a ─▶ [queue]    ├── conn-d ─▶ [queue]
//! ├── conn-b ─▶ [queue]    └── conn-e ─▶ [queue]
//! └── conn-c ─▶ [queue]
//! ```
//!
//! Each session owns a bounded outbound queue whose sending half lives here.
//! Broadcasting never waits on a socket: a full queue marks its session as a
//! slow consumer, which is removed from the registry and told to close through
//! its eviction signal. Removing a session drops its sender, which closes the
//! queue and lets the writer pump finish.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{Notify, RwLock};

use crate::domain::chat::{RoomName, UserName};
use crate::domain::foundation::ConnectionId;

/// One serialized message, shared by every queue it is pushed onto.
pub type Frame = Arc<str>;

/// Creates the bounded outbound queue for one session.
///
/// `capacity` must be non-zero.
pub fn outbound_queue(capacity: usize) -> (mpsc::Sender<Frame>, mpsc::Receiver<Frame>) {
    mpsc::channel(capacity)
}

/// Registry entry for one live session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: ConnectionId,
    room: RoomName,
    user: UserName,
    outbound: mpsc::Sender<Frame>,
    evicted: Arc<Notify>,
}

impl SessionHandle {
    pub fn new(
        id: ConnectionId,
        room: RoomName,
        user: UserName,
        outbound: mpsc::Sender<Frame>,
    ) -> Self {
        Self {
            id,
            room,
            user,
            outbound,
            evicted: Arc::new(Notify::new()),
        }
    }

    /// Signalled once if the registry sheds this session as a slow consumer.
    pub fn eviction(&self) -> Arc<Notify> {
        self.evicted.clone()
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    pub fn room(&self) -> &RoomName {
        &self.room
    }

    pub fn user(&self) -> &UserName {
        &self.user
    }
}

/// Outcome of one local broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Sessions whose queue accepted the frame.
    pub delivered: usize,

    /// Sessions removed because their queue was full.
    pub shed: Vec<ConnectionId>,

    /// Sessions removed because their writer had already gone away.
    pub stale: Vec<ConnectionId>,
}

#[derive(Default)]
struct Index {
    sessions: HashMap<ConnectionId, SessionHandle>,
    rooms: HashMap<RoomName, HashSet<ConnectionId>>,
}

impl Index {
    fn insert(&mut self, session: SessionHandle) {
        let id = *session.id();
        self.rooms
            .entry(session.room().clone())
            .or_default()
            .insert(id);

        if let Some(previous) = self.sessions.insert(id, session) {
            if self.sessions.get(&id).map(|s| s.room()) != Some(previous.room()) {
                self.unlink(&id, previous.room());
            }
        }
    }

    fn remove(&mut self, id: &ConnectionId) -> Option<SessionHandle> {
        let session = self.sessions.remove(id)?;
        self.unlink(id, session.room());
        Some(session)
    }

    fn unlink(&mut self, id: &ConnectionId, room: &RoomName) {
        if let Some(members) = self.rooms.get_mut(room) {
            members.remove(id);
            if members.is_empty() {
                self.rooms.remove(room);
            }
        }
    }
}

/// Concurrent map of live sessions.
///
/// # Thread Safety
///
/// Broadcasts only take the read lock, so rooms fan out concurrently.
/// Registration, removal and shedding take the write lock.
#[derive(Default)]
pub struct Registry {
    index: RwLock<Index>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session. An entry with the same id is replaced.
    pub async fn add(&self, session: SessionHandle) {
        tracing::debug!(
            connection_id = %session.id(),
            room = %session.room(),
            user = %session.user(),
            "Session registered"
        );
        self.index.write().await.insert(session);
    }

    /// Removes a session, closing its outbound queue.
    ///
    /// Returns `false` when the id was not registered, so repeated removal is
    /// harmless.
    pub async fn remove(&self, id: &ConnectionId) -> bool {
        let removed = self.index.write().await.remove(id);
        if let Some(session) = &removed {
            tracing::debug!(
                connection_id = %id,
                room = %session.room(),
                "Session unregistered"
            );
        }
        removed.is_some()
    }

    /// Enqueues `frame` for every session in `room` without waiting.
    ///
    /// Sessions whose queue is full are shed; sessions whose writer already
    /// exited are dropped. Both are removed before this returns, so no later
    /// broadcast reaches them.
    pub async fn broadcast_local(&self, room: &RoomName, frame: Frame) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        {
            let index = self.index.read().await;
            let Some(members) = index.rooms.get(room) else {
                return report;
            };

            for id in members {
                let Some(session) = index.sessions.get(id) else {
                    continue;
                };
                match session.outbound.try_send(frame.clone()) {
                    Ok(()) => report.delivered += 1,
                    Err(TrySendError::Full(_)) => report.shed.push(*id),
                    Err(TrySendError::Closed(_)) => report.stale.push(*id),
                }
            }
        }

        if !report.shed.is_empty() || !report.stale.is_empty() {
            let mut index = self.index.write().await;
            for id in &report.shed {
                tracing::warn!(
                    connection_id = %id,
                    room = %room,
                    "Outbound queue full, shedding slow consumer"
                );
                if let Some(session) = index.remove(id) {
                    session.evicted.notify_one();
                }
            }
            for id in &report.stale {
                index.remove(id);
            }
        }

        report
    }

    pub async fn contains(&self, id: &ConnectionId) -> bool {
        self.index.read().await.sessions.contains_key(id)
    }

    /// Number of live sessions in `room` (0 if unknown).
    pub async fn room_len(&self, room: &RoomName) -> usize {
        self.index
            .read()
            .await
            .rooms
            .get(room)
            .map(HashSet::len)
            .unwrap_or(0)
    }

    /// Total number of live sessions.
    pub async fn len(&self) -> usize {
        self.index.read().await.sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Rooms with at least one live session.
    pub async fn rooms(&self) -> Vec<RoomName> {
        self.index.read().await.rooms.keys().cloned().collect()
    }

    /// Removes every session, closing all outbound queues.
    ///
    /// Writers flush what is already queued and then close their sockets.
    /// Returns how many sessions were removed.
    pub async fn close_all(&self) -> usize {
        let mut index = self.index.write().await;
        let count = index.sessions.len();
        index.sessions.clear();
        index.rooms.clear();
        count
    }
}
