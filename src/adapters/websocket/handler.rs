//! WebSocket upgrade handler for the chat relay.
//!
//! Handles the HTTP → WebSocket upgrade and manages the connection lifecycle:
//! 1. Check the handshake `Origin` against the configured policy
//! 2. Upgrade to WebSocket and register with the hub
//! 3. Send the `connected` notice
//! 4. Relay inbound `chat-message` frames and drain the outbound queue
//! 5. Deregister from the hub exactly once
//!
//! Every socket write is bounded by `SocketConfig::send_timeout`. A peer that
//! stops reading long enough for one write to exceed it is closed with 1013
//! (try again later) and deregistered.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Request, State,
    },
    http::{header::ORIGIN, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use thiserror::Error;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::SocketConfig;
use crate::domain::chat::ConnectionState;
use crate::domain::foundation::{ConnectionId, StateMachine};

use super::{
    hub::BroadcastHub,
    messages::{ClientEvent, ServerEvent},
};

/// State required for WebSocket handling.
#[derive(Clone)]
pub struct WebSocketState {
    /// The hub every connection registers with.
    pub hub: Arc<BroadcastHub>,
    /// Handshake policy and write timeout.
    pub socket: Arc<SocketConfig>,
}

impl WebSocketState {
    pub fn new(hub: Arc<BroadcastHub>, socket: Arc<SocketConfig>) -> Self {
        Self { hub, socket }
    }
}

/// Why a frame could not be written to the socket.
#[derive(Debug, Error)]
enum SendError {
    #[error("socket write timed out")]
    Stalled,

    #[error(transparent)]
    Transport(#[from] axum::Error),
}

/// Reject handshakes whose `Origin` is not in the configured list.
///
/// Requests without an `Origin` header (non-browser clients) pass through.
pub async fn origin_guard(
    State(state): State<WebSocketState>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(origin) = request.headers().get(ORIGIN) {
        let allowed = origin
            .to_str()
            .map(|o| state.socket.is_origin_allowed(o))
            .unwrap_or(false);
        if !allowed {
            tracing::warn!(origin = ?origin, "Rejected socket handshake from disallowed origin");
            return origin_rejected();
        }
    }

    next.run(request).await
}

fn origin_rejected() -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(serde_json::json!({
            "error": "Origin not allowed",
            "code": "ORIGIN_NOT_ALLOWED"
        })),
    )
        .into_response()
}

/// Handle WebSocket upgrade requests for the chat relay.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<WebSocketState>) -> Response {
    let send_timeout = state.socket.send_timeout();
    ws.on_upgrade(move |socket| handle_socket(socket, state.hub, send_timeout))
}

/// Handle an established WebSocket connection.
///
/// Runs for the lifetime of the connection. Whichever side ends first
/// tears down the other, then the connection is removed from the hub. The
/// writer ends on a transport error, when a write stalls past
/// `send_timeout`, or when the hub closes the outbound queue.
async fn handle_socket(socket: WebSocket, hub: Arc<BroadcastHub>, send_timeout: Duration) {
    let (mut sender, mut receiver) = socket.split();

    let connection_id = ConnectionId::new();
    let mut state = ConnectionState::Connecting;

    let mut outbound = match hub.on_connect(connection_id).await {
        Ok(outbound) => outbound,
        Err(e) => {
            tracing::debug!(connection_id = %connection_id, "Connection refused: {}", e);
            advance(connection_id, &mut state, ConnectionState::Closed);
            let going_away = close_frame(close_code::AWAY, "server shutting down");
            let _ = tokio::time::timeout(send_timeout, sender.send(going_away)).await;
            return;
        }
    };

    if let Err(e) = send_event(
        &mut sender,
        &ServerEvent::connected(connection_id),
        send_timeout,
    )
    .await
    {
        tracing::debug!(connection_id = %connection_id, "Failed to send connected notice: {}", e);
        advance(connection_id, &mut state, ConnectionState::Closed);
        hub.on_disconnect(&connection_id).await;
        return;
    }
    advance(connection_id, &mut state, ConnectionState::Open);

    // Forward broadcasts from the hub to the client
    let mut send_task = tokio::spawn(async move {
        while let Some(payload) = outbound.recv().await {
            let event = ServerEvent::ChatMessage(payload);
            match send_event(&mut sender, &event, send_timeout).await {
                Ok(()) => {}
                Err(SendError::Stalled) => {
                    tracing::warn!(
                        connection_id = %connection_id,
                        timeout_secs = send_timeout.as_secs(),
                        "Socket write stalled, closing connection"
                    );
                    let again = close_frame(close_code::AGAIN, "write timed out");
                    let _ = tokio::time::timeout(send_timeout, sender.send(again)).await;
                    return;
                }
                Err(SendError::Transport(e)) => {
                    tracing::debug!(
                        connection_id = %connection_id,
                        "Send error, closing connection: {}",
                        e
                    );
                    return;
                }
            }
        }

        // Queue closed by the hub (shutdown or replaced handle)
        let _ = tokio::time::timeout(send_timeout, sender.send(Message::Close(None))).await;
    });

    // Relay chat messages from the client to the hub
    let recv_hub = hub.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Text(text)) => match ClientEvent::parse(&text) {
                    Ok(ClientEvent::ChatMessage(payload)) => {
                        recv_hub.on_message(&connection_id, payload).await;
                    }
                    Ok(ClientEvent::Unrecognized(kind)) => {
                        tracing::trace!(connection_id = %connection_id, event = %kind, "Ignoring event");
                    }
                    Err(e) => {
                        tracing::debug!(connection_id = %connection_id, "Malformed frame: {}", e);
                    }
                },
                Ok(Message::Binary(_)) => {
                    tracing::debug!(
                        connection_id = %connection_id,
                        "Received unsupported binary message"
                    );
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                    // Protocol keepalive, answered by axum
                }
                Ok(Message::Close(_)) => {
                    tracing::debug!(connection_id = %connection_id, "Client sent close frame");
                    break;
                }
                Err(e) => {
                    tracing::debug!(connection_id = %connection_id, "Receive error: {}", e);
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    hub.on_disconnect(&connection_id).await;
    advance(connection_id, &mut state, ConnectionState::Closed);
}

/// Move a connection's lifecycle state, logging the transition.
fn advance(connection_id: ConnectionId, state: &mut ConnectionState, next: ConnectionState) {
    match state.transition_to(next) {
        Ok(advanced) => {
            tracing::trace!(
                connection_id = %connection_id,
                from = ?state,
                to = ?advanced,
                "Connection state changed"
            );
            *state = advanced;
        }
        Err(e) => {
            tracing::warn!(connection_id = %connection_id, "{}", e);
        }
    }
}

fn close_frame(code: u16, reason: &'static str) -> Message {
    Message::Close(Some(CloseFrame {
        code,
        reason: reason.into(),
    }))
}

/// Send a JSON event over the WebSocket, giving up after `send_timeout`.
async fn send_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &ServerEvent,
    send_timeout: Duration,
) -> Result<(), SendError> {
    let json = event.to_json().map_err(axum::Error::new)?;
    tokio::time::timeout(send_timeout, sender.send(Message::Text(json)))
        .await
        .map_err(|_| SendError::Stalled)??;
    Ok(())
}

/// CORS policy for the socket handshake.
pub fn socket_cors(config: &SocketConfig) -> CorsLayer {
    let origin = if config.allowed_origins_list().iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(config.allowed_origin_headers())
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(config.allowed_methods_list())
}

/// Create axum router for the chat socket endpoint.
///
/// The route is mounted at `SocketConfig::path` and carries the origin guard
/// and handshake CORS policy.
///
/// # Example
///
/// ```ignore
/// let app = Router::new()
///     .merge(websocket_router(state.clone()).with_state(state));
/// ```
pub fn websocket_router(state: WebSocketState) -> Router<WebSocketState> {
    let cors = socket_cors(&state.socket);
    let path = state.socket.path.clone();

    Router::new()
        .route(&path, get(ws_handler))
        .layer(middleware::from_fn_with_state(state, origin_guard))
        .layer(cors)
}
