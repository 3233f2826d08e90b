//! WebSocket upgrade handler and gateway lifecycle.
//!
//! Handles the HTTP → WebSocket upgrade and manages the connection lifecycle:
//! 1. Validate the `room` and `user` query parameters
//! 2. Upgrade to WebSocket
//! 3. Register the session and make sure its room has a relay
//! 4. Run reader and writer pumps until either side ends
//! 5. Unregister, and retire the room relay if it went idle
//!
//! [`Gateway::shutdown`] drains every session within a grace period and
//! then force-closes whatever is left.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures::StreamExt;
use http::StatusCode;
use serde::Deserialize;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::domain::chat::{RoomName, UserName};
use crate::domain::foundation::{
    ConnectionId, ProcessId, SessionState, StateMachine, ValidationError,
};
use crate::ports::{MessageBroker, MessageStamper, MessageStore};

use super::bridge::{BridgeSettings, BrokerBridge};
use super::dispatch::Dispatcher;
use super::registry::{outbound_queue, Registry, SessionHandle};
use super::session::{run_reader, run_writer, CloseReason, ReaderContext, SessionSettings};
use super::shutdown::{reached, ShutdownPhase};

/// External collaborators of a gateway.
#[derive(Clone)]
pub struct GatewayDeps {
    pub broker: Arc<dyn MessageBroker>,
    /// Messages are not persisted when `None`.
    pub store: Option<Arc<dyn MessageStore>>,
    pub stamper: Arc<dyn MessageStamper>,
}

/// Tunables of a gateway.
#[derive(Debug, Clone, Default)]
pub struct GatewaySettings {
    pub session: SessionSettings,
    pub bridge: BridgeSettings,
    pub retire_idle_relays: bool,
}

impl GatewaySettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            session: SessionSettings::from(&config.gateway),
            bridge: BridgeSettings {
                topic_prefix: config.redis.topic_prefix.clone(),
                resubscribe_delay: config.redis.resubscribe_delay(),
            },
            retire_idle_relays: config.gateway.retire_idle_relays,
        }
    }
}

/// Query parameters of the upgrade request.
#[derive(Debug, Default, Deserialize)]
pub struct JoinParams {
    pub room: Option<String>,
    pub user: Option<String>,
}

/// Validated identity of a joining session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    pub room: RoomName,
    pub user: UserName,
}

impl JoinRequest {
    pub fn from_params(params: &JoinParams) -> Result<Self, ValidationError> {
        let room = params
            .room
            .as_deref()
            .ok_or_else(|| ValidationError::empty_field("room"))
            .and_then(|room| RoomName::new(room))?;
        let user = params
            .user
            .as_deref()
            .ok_or_else(|| ValidationError::empty_field("user"))
            .and_then(|user| UserName::new(user))?;
        Ok(Self { room, user })
    }
}

/// Result of [`Gateway::shutdown`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub relays_cancelled: usize,
    pub sessions_closed: usize,
    pub force_closed: usize,
}

/// One chat gateway process: registry, broker bridge and live sessions.
pub struct Gateway {
    process_id: ProcessId,
    registry: Arc<Registry>,
    bridge: Arc<BrokerBridge>,
    dispatcher: Arc<Dispatcher>,
    settings: GatewaySettings,
    phase: watch::Sender<ShutdownPhase>,
    live_sessions: watch::Sender<usize>,
}

impl Gateway {
    pub fn new(deps: GatewayDeps, settings: GatewaySettings) -> Arc<Self> {
        let process_id = ProcessId::new();
        let registry = Arc::new(Registry::new());
        let bridge = Arc::new(BrokerBridge::new(
            process_id.clone(),
            deps.broker,
            registry.clone(),
            settings.bridge.clone(),
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            registry.clone(),
            bridge.clone(),
            deps.store,
            deps.stamper,
        ));
        let (phase, _) = watch::channel(ShutdownPhase::Running);
        let (live_sessions, _) = watch::channel(0);

        tracing::info!(process_id = %process_id, "Gateway created");

        Arc::new(Self {
            process_id,
            registry,
            bridge,
            dispatcher,
            settings,
            phase,
            live_sessions,
        })
    }

    /// Router serving `GET /ws?room=<room>&user=<user>`.
    pub fn router(self: &Arc<Self>) -> Router {
        Router::new()
            .route("/ws", get(ws_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(self.clone())
    }

    pub fn process_id(&self) -> &ProcessId {
        &self.process_id
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn bridge(&self) -> &Arc<BrokerBridge> {
        &self.bridge
    }

    pub fn phase(&self) -> ShutdownPhase {
        *self.phase.borrow()
    }

    /// Session tasks still running, including ones already unregistered.
    pub fn live_sessions(&self) -> usize {
        *self.live_sessions.borrow()
    }

    /// Runs one upgraded connection to completion.
    pub async fn accept(self: Arc<Self>, socket: WebSocket, join: JoinRequest) {
        let _live = LiveSession::enter(&self.live_sessions);
        let id = ConnectionId::new();
        let JoinRequest { room, user } = join;
        let mut state = SessionState::default();
        let mut phase = self.phase.subscribe();

        if *phase.borrow() != ShutdownPhase::Running {
            tracing::debug!(connection_id = %id, "Gateway draining, dropping new session");
            refuse_while_draining(state, &id);
            return;
        }

        let (outbound, queue) = outbound_queue(self.settings.session.queue_capacity);
        let handle = SessionHandle::new(id, room.clone(), user.clone(), outbound);
        let evicted = handle.eviction();
        self.registry.add(handle).await;
        self.bridge.ensure_relay(&room).await;
        state = advance(state, SessionState::Active, &id);
        tracing::info!(connection_id = %id, room = %room, user = %user, "Session active");

        let (sink, stream) = socket.split();
        let mut writer = tokio::spawn(run_writer(
            sink,
            queue,
            self.settings.session.write_timeout,
        ));
        let mut reader = tokio::spawn(run_reader(
            stream,
            ReaderContext {
                connection_id: id,
                room: room.clone(),
                user: user.clone(),
                max_message_bytes: self.settings.session.max_message_bytes,
                dispatcher: self.dispatcher.clone(),
            },
            self.phase.subscribe(),
        ));

        let first = tokio::select! {
            res = &mut reader => PumpExit::Reader(res.unwrap_or(CloseReason::Aborted)),
            res = &mut writer => PumpExit::Writer(res.unwrap_or(CloseReason::Aborted)),
            _ = evicted.notified() => PumpExit::Evicted,
            _ = reached(&mut phase, ShutdownPhase::ForceClose) => PumpExit::Forced,
        };
        state = advance(state, SessionState::Closing, &id);

        let reason = match first {
            PumpExit::Reader(reason) => {
                // Closing the queue lets the writer flush and say goodbye.
                self.registry.remove(&id).await;
                let forced = tokio::select! {
                    _ = &mut writer => false,
                    _ = reached(&mut phase, ShutdownPhase::ForceClose) => true,
                };
                if forced {
                    writer.abort();
                }
                reason
            }
            PumpExit::Writer(reason) => {
                reader.abort();
                reason
            }
            PumpExit::Evicted => {
                // Nothing more from this client may reach the room.
                reader.abort();
                let _ = (&mut reader).await;
                writer.abort();
                CloseReason::SlowConsumer
            }
            PumpExit::Forced => {
                reader.abort();
                writer.abort();
                CloseReason::Aborted
            }
        };

        self.registry.remove(&id).await;
        if self.settings.retire_idle_relays {
            self.bridge.release_if_idle(&room).await;
        }
        state = advance(state, SessionState::Closed, &id);
        tracing::info!(
            connection_id = %id,
            room = %room,
            %reason,
            %state,
            "Session closed"
        );
    }

    /// Stops the gateway.
    ///
    /// Relays are cancelled and readers stop at once; writers get `grace` to
    /// flush their queues and close. Sessions still running after that are
    /// aborted. New upgrades are refused from the first step on.
    pub async fn shutdown(&self, grace: Duration) -> ShutdownReport {
        self.phase.send_replace(ShutdownPhase::Draining);
        let relays_cancelled = self.bridge.shutdown().await;
        let sessions_closed = self.registry.close_all().await;
        tracing::info!(
            relays_cancelled,
            sessions_closed,
            ?grace,
            "Gateway draining"
        );

        let mut live = self.live_sessions.subscribe();
        let drained = tokio::time::timeout(grace, live.wait_for(|n| *n == 0))
            .await
            .map(|r| r.is_ok())
            .unwrap_or(false);

        let force_closed = if drained { 0 } else { self.live_sessions() };
        self.phase.send_replace(ShutdownPhase::ForceClose);
        if force_closed > 0 {
            tracing::warn!(force_closed, "Grace period elapsed, force-closing sessions");
        }

        ShutdownReport {
            relays_cancelled,
            sessions_closed,
            force_closed,
        }
    }
}

enum PumpExit {
    Reader(CloseReason),
    Writer(CloseReason),
    Evicted,
    Forced,
}

fn advance(state: SessionState, next: SessionState, id: &ConnectionId) -> SessionState {
    match state.transition_to(next) {
        Ok(next) => next,
        Err(e) => {
            tracing::warn!(connection_id = %id, "Session state not advanced: {}", e);
            state
        }
    }
}

/// Ends a session that was upgraded after draining began.
fn refuse_while_draining(state: SessionState, id: &ConnectionId) -> SessionState {
    let state = advance(state, SessionState::Closing, id);
    let state = advance(state, SessionState::Closed, id);
    tracing::info!(
        connection_id = %id,
        reason = %CloseReason::Shutdown,
        %state,
        "Session closed"
    );
    state
}

/// Counts a session task for as long as it is alive.
struct LiveSession<'a> {
    counter: &'a watch::Sender<usize>,
}

impl<'a> LiveSession<'a> {
    fn enter(counter: &'a watch::Sender<usize>) -> Self {
        counter.send_modify(|n| *n += 1);
        Self { counter }
    }
}

impl Drop for LiveSession<'_> {
    fn drop(&mut self) {
        self.counter.send_modify(|n| *n = n.saturating_sub(1));
    }
}

/// Handle WebSocket upgrade requests.
///
/// Route: `GET /ws?room=<room>&user=<user>`
///
/// Invalid or missing parameters are answered with `400 Bad Request` and no
/// upgrade. A draining gateway answers `503 Service Unavailable`.
pub async fn ws_handler(
    State(gateway): State<Arc<Gateway>>,
    Query(params): Query<JoinParams>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let join = match JoinRequest::from_params(&params) {
        Ok(join) => join,
        Err(e) => {
            tracing::debug!("Rejecting upgrade: {}", e);
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    if gateway.phase() != ShutdownPhase::Running {
        return (StatusCode::SERVICE_UNAVAILABLE, "gateway is shutting down").into_response();
    }

    match upgrade {
        Ok(upgrade) => upgrade.on_upgrade(move |socket| gateway.accept(socket, join)),
        Err(rejection) => rejection.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryMessageBroker;
    use crate::ports::SystemStamper;
    use axum::body::Body;
    use http::Request;
    use tower::ServiceExt;

    fn gateway() -> Arc<Gateway> {
        Gateway::new(
            GatewayDeps {
                broker: Arc::new(InMemoryMessageBroker::new()),
                store: None,
                stamper: Arc::new(SystemStamper),
            },
            GatewaySettings::default(),
        )
    }

    fn params(room: Option<&str>, user: Option<&str>) -> JoinParams {
        JoinParams {
            room: room.map(str::to_string),
            user: user.map(str::to_string),
        }
    }

    #[test]
    fn join_request_requires_both_parameters() {
        assert!(JoinRequest::from_params(&params(Some("lobby"), Some("alice"))).is_ok());
        assert_eq!(
            JoinRequest::from_params(&params(None, Some("alice"))),
            Err(ValidationError::empty_field("room"))
        );
        assert_eq!(
            JoinRequest::from_params(&params(Some("lobby"), None)),
            Err(ValidationError::empty_field("user"))
        );
    }

    #[test]
    fn join_request_validates_names() {
        assert!(JoinRequest::from_params(&params(Some(""), Some("alice"))).is_err());
        assert!(JoinRequest::from_params(&params(Some("lobby"), Some("bad name"))).is_err());
    }

    #[tokio::test]
    async fn missing_user_is_bad_request() {
        let response = gateway()
            .router()
            .oneshot(Request::builder().uri("/ws?room=lobby").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn valid_params_without_upgrade_headers_are_rejected_by_upgrade() {
        let gw = gateway();
        let response = gw
            .router()
            .oneshot(
                Request::builder()
                    .uri("/ws?room=lobby&user=alice")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response.status().is_client_error());
        assert!(gw.registry().is_empty().await);
    }

    #[tokio::test]
    async fn shutdown_with_no_sessions_finishes_immediately() {
        let gw = gateway();
        gw.bridge().ensure_relay(&RoomName::new("lobby").unwrap()).await;

        let report = tokio::time::timeout(Duration::from_secs(1), gw.shutdown(Duration::from_secs(5)))
            .await
            .unwrap();

        assert_eq!(
            report,
            ShutdownReport {
                relays_cancelled: 1,
                sessions_closed: 0,
                force_closed: 0
            }
        );
        assert_eq!(gw.phase(), ShutdownPhase::ForceClose);
    }

    #[tokio::test]
    async fn draining_gateway_refuses_upgrades() {
        let gw = gateway();
        gw.shutdown(Duration::from_millis(10)).await;

        let response = gw
            .router()
            .oneshot(
                Request::builder()
                    .uri("/ws?room=lobby&user=alice")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn session_refused_while_draining_ends_closed() {
        let state = refuse_while_draining(SessionState::Connecting, &ConnectionId::new());
        assert_eq!(state, SessionState::Closed);
    }

    #[test]
    fn settings_follow_config() {
        let mut config = AppConfig::default();
        config.gateway.outbound_queue_capacity = 100;
        config.gateway.retire_idle_relays = true;
        config.redis.topic_prefix = "test:".to_string();

        let settings = GatewaySettings::from_config(&config);
        assert_eq!(settings.session.queue_capacity, 100);
        assert!(settings.retire_idle_relays);
        assert_eq!(settings.bridge.topic_prefix, "test:");
    }
}
