//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::registry::default_name;
use crate::game::{ArenaHandle, ArenaRequest, JoinError};
use crate::http::middleware::{verify_jwt, AuthError};
use crate::util::rate_limit::PeerRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, Outbound, ServerMsg};

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// JWT token; required only when a secret is configured
    #[serde(default)]
    pub token: Option<String>,
}

/// Identity of a connected peer
#[derive(Debug, Clone)]
struct Peer {
    session_id: Uuid,
    display_name: String,
    privileged: bool,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    // Verify token before upgrading
    match authenticate(&state, query.token.as_deref()) {
        Ok(peer) => {
            info!(session_id = %peer.session_id, privileged = peer.privileged, "WebSocket upgrade");
            ws.on_upgrade(move |socket| handle_socket(socket, peer, state.arena.clone()))
        }
        Err(e) => {
            error!(error = %e, "WebSocket auth failed");
            (StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
        }
    }
}

fn authenticate(state: &AppState, token: Option<&str>) -> Result<Peer, AuthError> {
    let Some(secret) = state.config.jwt_secret.as_deref() else {
        // Anonymous sessions
        let session_id = Uuid::new_v4();
        return Ok(Peer {
            session_id,
            display_name: default_name(session_id),
            privileged: false,
        });
    };

    let token = token.ok_or(AuthError::MissingHeader)?;
    let claims = verify_jwt(token, secret)?;

    Ok(Peer {
        session_id: claims.sub,
        display_name: claims
            .name
            .clone()
            .unwrap_or_else(|| default_name(claims.sub)),
        privileged: claims.is_admin(),
    })
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, peer: Peer, arena: ArenaHandle) {
    let session_id = peer.session_id;
    info!(session_id = %session_id, "New WebSocket connection");

    let (mut ws_sink, ws_stream) = socket.split();

    let welcome = ServerMsg::Welcome {
        session_id,
        server_time: unix_millis(),
    };

    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(session_id = %session_id, error = %e, "Failed to send welcome");
        return;
    }

    // Subscribe before registering so the join broadcast is not missed
    let events_rx = arena.subscribe();

    if let Err(e) = admit(&arena, &peer).await {
        warn!(session_id = %session_id, error = %e, "Connection refused");
        if let Some(msg) = rejection(&e) {
            let _ = send_msg(&mut ws_sink, &msg).await;
        }
        let _ = ws_sink.send(Message::Close(None)).await;
        return;
    }

    run_session(peer, ws_sink, ws_stream, &arena, events_rx).await;

    info!(session_id = %session_id, "WebSocket connection closed");
}

/// Register the peer; refused peers never reach the session loop
async fn admit(arena: &ArenaHandle, peer: &Peer) -> Result<(), JoinError> {
    arena
        .join(peer.session_id, peer.display_name.clone(), peer.privileged)
        .await
}

/// Message telling a refused peer why
fn rejection(e: &JoinError) -> Option<ServerMsg> {
    match e {
        JoinError::Rejected(reason) => Some(ServerMsg::error(reason.code(), reason.to_string())),
        JoinError::Closed(_) => None,
    }
}

/// Run the WebSocket session with read/write split
async fn run_session(
    peer: Peer,
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    arena: &ArenaHandle,
    mut events_rx: broadcast::Receiver<Outbound>,
) {
    let session_id = peer.session_id;
    let rate_limiter = PeerRateLimiter::new();

    // Spawn writer task: arena events -> WebSocket
    let writer_handle = tokio::spawn(async move {
        loop {
            match events_rx.recv().await {
                Ok(outbound) => {
                    if !outbound.is_for(session_id) {
                        continue;
                    }
                    if let Err(e) = send_msg(&mut ws_sink, &outbound.msg).await {
                        debug!(session_id = %session_id, error = %e, "WebSocket send failed");
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    // Periodic team resync repairs what was skipped
                    warn!(session_id = %session_id, lagged_count = n, "Client lagged, skipping {} events", n);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(session_id = %session_id, "Event channel closed");
                    break;
                }
            }
        }
    });

    // Reader loop: WebSocket -> arena loop
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_request() {
                    warn!(session_id = %session_id, "Rate limited request");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => {
                        let leaving = matches!(msg, ClientMsg::Leave);
                        let request = ArenaRequest {
                            session_id,
                            privileged: peer.privileged,
                            msg,
                            received_at: unix_millis(),
                            reply: None,
                        };

                        if arena.submit(request).await.is_err() {
                            debug!(session_id = %session_id, "Arena request channel closed");
                            break;
                        }
                        if leaving {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(session_id = %session_id, error = %e, "Failed to parse client message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(session_id = %session_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(session_id = %session_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(session_id = %session_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Only an admitted connection gets here, so this cannot evict another socket's session
    let _ = arena
        .submit(ArenaRequest {
            session_id,
            privileged: false,
            msg: ClientMsg::Leave,
            received_at: unix_millis(),
            reply: None,
        })
        .await;

    writer_handle.abort();
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
