use super::{session_error_response, ApiResponse, AppState, CommandOutputBody};
use crate::session::ConnectRequest;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound for a caller-supplied command timeout.
const MAX_COMMAND_TIMEOUT_SECS: u64 = 300;

pub async fn connect(State(state): State<AppState>, Json(req): Json<ConnectRequest>) -> Response {
    if req.host.trim().is_empty() || req.user.trim().is_empty() {
        return ApiResponse::err(StatusCode::BAD_REQUEST, "host and user are required")
            .into_response();
    }
    let outcome = state.sessions.connect(req).await;
    ApiResponse::ok(outcome).into_response()
}

pub async fn disconnect(State(state): State<AppState>) -> impl IntoResponse {
    ApiResponse::ok(state.sessions.disconnect().await)
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub connected: bool,
    pub host: String,
    pub user: String,
    pub current_dir: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_since: Option<DateTime<Utc>>,
}

pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.sessions.status();
    let connected_since = if status.connected {
        state.sessions.connected_at()
    } else {
        None
    };
    ApiResponse::ok(StatusResponse {
        connected: status.connected,
        host: status.host,
        user: status.user,
        current_dir: status.working_dir,
        connected_since,
    })
}

#[derive(Deserialize)]
pub struct ExecuteRequest {
    pub command: String,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

pub async fn execute(State(state): State<AppState>, Json(req): Json<ExecuteRequest>) -> Response {
    if req.command.trim().is_empty() {
        return ApiResponse::err(StatusCode::BAD_REQUEST, "command is required").into_response();
    }
    let timeout = match req.timeout_secs {
        Some(secs) if secs > 0 => Duration::from_secs(secs.min(MAX_COMMAND_TIMEOUT_SECS)),
        _ => state.sessions.settings().command_timeout,
    };
    match state.sessions.execute(&req.command, timeout).await {
        Ok(output) => ApiResponse::ok(CommandOutputBody { output }).into_response(),
        Err(e) => session_error_response(e),
    }
}
