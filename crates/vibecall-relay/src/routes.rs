//! REST routes: health, WebRTC configuration, and TURN credentials.

use std::net::SocketAddr;

use axum::Json;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use vibecall_core::time::unix_timestamp;

use crate::auth::SessionClaims;
use crate::server::AppState;
use crate::turn::{IceServer, TurnError};

#[derive(Debug, Deserialize)]
pub struct TurnQuery {
    #[serde(rename = "userId")]
    user_id: Option<String>,
}

/// `GET /health`
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "timestamp": unix_timestamp() }))
}

/// `GET /api/webrtc/config` — ICE server list for call setup.
///
/// Carries the STUN entry and, when the relay is statically configured, a
/// TURN entry with those fixed credentials. Ephemeral credentials never
/// appear here; clients fetch them from the credential routes.
pub async fn webrtc_config(State(state): State<AppState>) -> Json<serde_json::Value> {
    let mut ice_servers = vec![IceServer {
        urls: state.stun_url.clone(),
        username: None,
        credential: None,
    }];
    if let Some(entry) = state.turn.static_ice_server() {
        ice_servers.push(entry);
    }
    Json(json!({ "iceServers": ice_servers }))
}

/// `GET /api/webrtc/turn-credentials[?userId=]`
pub async fn turn_credentials(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(query): Query<TurnQuery>,
) -> Response {
    if state.require_auth {
        if let Err(response) = require_session(&state, &headers) {
            return response;
        }
    }
    issue(&state, addr, query.user_id.as_deref()).await
}

/// `GET /api/webrtc/turn-credentials-auth[?userId=]` — same contract, but
/// always requires a validated session token.
pub async fn turn_credentials_auth(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(query): Query<TurnQuery>,
) -> Response {
    let claims = match require_session(&state, &headers) {
        Ok(claims) => claims,
        Err(response) => return response,
    };
    // Prefer the explicit hint, else the authenticated identity.
    let hint = query.user_id.clone().or(Some(claims.sub));
    issue(&state, addr, hint.as_deref()).await
}

fn require_session(state: &AppState, headers: &HeaderMap) -> Result<SessionClaims, Response> {
    let Some(validator) = &state.sessions else {
        return Err(error_response(
            StatusCode::FORBIDDEN,
            "Session validation not configured",
        ));
    };
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    let Some(token) = token else {
        return Err(error_response(
            StatusCode::UNAUTHORIZED,
            "Missing session token",
        ));
    };
    validator
        .validate(token)
        .map_err(|_| error_response(StatusCode::UNAUTHORIZED, "Invalid session token"))
}

async fn issue(state: &AppState, addr: SocketAddr, user_id: Option<&str>) -> Response {
    if let Err(retry_after) = state.limiter.check(addr.ip()) {
        let retry_secs = retry_after.as_secs().max(1);
        return (
            StatusCode::TOO_MANY_REQUESTS,
            [("retry-after", retry_secs.to_string())],
            Json(json!({ "error": "Too many requests", "retryAfter": retry_secs })),
        )
            .into_response();
    }

    // Ban pre-check fails open: an unreachable profile store must not
    // block legitimate issuance.
    if let Some(user_id) = user_id {
        match state.profiles.is_banned(user_id).await {
            Ok(Some(true)) => {
                return error_response(StatusCode::FORBIDDEN, "User is banned");
            }
            Ok(_) => {}
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Ban check failed; proceeding");
            }
        }
    }

    match state.turn.issue(user_id) {
        Ok(credentials) => Json(credentials).into_response(),
        Err(e @ TurnError::ServerUrlMissing) => {
            error_response(StatusCode::BAD_REQUEST, &e.to_string())
        }
        Err(e @ TurnError::NotConfigured) => {
            error_response(StatusCode::FORBIDDEN, &e.to_string())
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
