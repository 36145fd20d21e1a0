//! Shared application state and router assembly.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;

use vibecall_store::ProfileStore;

use crate::auth::SessionValidator;
use crate::hub::SignalingHub;
use crate::rate_limit::RateLimiter;
use crate::routes;
use crate::turn::TurnIssuer;
use crate::ws;

/// State shared by every route and WebSocket connection.
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<SignalingHub>,
    pub profiles: Arc<dyn ProfileStore>,
    pub turn: Arc<TurnIssuer>,
    pub limiter: Arc<RateLimiter>,
    /// Present only when a session secret is configured.
    pub sessions: Option<Arc<SessionValidator>>,
    pub stun_url: String,
    /// When set, the plain credential route also requires a session.
    pub require_auth: bool,
}

/// Assemble the relay's HTTP surface.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/api/webrtc/config", get(routes::webrtc_config))
        .route("/api/webrtc/turn-credentials", get(routes::turn_credentials))
        .route(
            "/api/webrtc/turn-credentials-auth",
            get(routes::turn_credentials_auth),
        )
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
}
