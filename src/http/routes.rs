//! HTTP route definitions

use axum::{
    extract::{Extension, State},
    http::{header, Method, StatusCode},
    middleware,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::app::AppState;
use crate::game::scoreboard::Scoreboard;
use crate::game::ArenaRequest;
use crate::http::middleware::{require_admin, AuthenticatedUser};
use crate::util::time::{unix_millis, uptime_secs};
use crate::ws::handler::ws_handler;
use crate::ws::protocol::ClientMsg;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // CORS configuration - support multiple origins (comma-separated in CLIENT_ORIGIN)
    let allowed_origins: Vec<header::HeaderValue> = state
        .config
        .client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true);

    let public_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/scoreboard", get(scoreboard_handler))
        .route("/ws", get(ws_handler));

    let admin_routes = Router::new()
        .route("/admin/reset", post(reset_handler))
        .layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    participants: usize,
    game_over: bool,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let game_over = state.arena.scoreboard_rx.borrow().game_over;

    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        participants: state.arena.participant_count(),
        game_over,
    })
}

// ============================================================================
// Scoreboard endpoint
// ============================================================================

async fn scoreboard_handler(State(state): State<AppState>) -> Json<Scoreboard> {
    Json(state.arena.scoreboard())
}

// ============================================================================
// Admin endpoints
// ============================================================================

#[derive(Serialize)]
struct ResetResponse {
    status: &'static str,
}

async fn reset_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, AppError> {
    info!(operator = %auth.user_id, "Match reset requested");

    state
        .arena
        .submit(ArenaRequest {
            session_id: auth.user_id,
            privileged: true,
            msg: ClientMsg::RequestReset,
            received_at: unix_millis(),
            reply: None,
        })
        .await
        .map_err(|e| AppError::Unavailable(e.to_string()))?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ResetResponse { status: "reset_requested" }),
    ))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
