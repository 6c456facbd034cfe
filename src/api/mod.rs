pub mod data;
pub mod ssh;

use crate::metrics::MetricsRegistry;
use crate::session::{SessionError, SessionManager};
use axum::{
    extract::{DefaultBodyLimit, MatchedPath, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Unified API response envelope for consistent JSON output.
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> (StatusCode, axum::Json<Self>) {
        (
            StatusCode::OK,
            axum::Json(Self {
                success: true,
                data: Some(data),
                error: None,
            }),
        )
    }

    /// Error envelope that still carries a payload, e.g. the output of a
    /// command that exited non-zero.
    pub fn err_with_data(
        status: StatusCode,
        data: T,
        msg: impl Into<String>,
    ) -> (StatusCode, axum::Json<Self>) {
        (
            status,
            axum::Json(Self {
                success: false,
                data: Some(data),
                error: Some(msg.into()),
            }),
        )
    }
}

impl ApiResponse<()> {
    pub fn err(status: StatusCode, msg: impl Into<String>) -> (StatusCode, axum::Json<Self>) {
        (
            status,
            axum::Json(Self {
                success: false,
                data: None,
                error: Some(msg.into()),
            }),
        )
    }
}

/// Body of a successful or failed command execution.
#[derive(Debug, Serialize)]
pub struct CommandOutputBody {
    pub output: String,
}

/// HTTP status for a session-level failure.
pub fn session_error_status(error: &SessionError) -> StatusCode {
    match error {
        SessionError::NotConnected => StatusCode::CONFLICT,
        SessionError::AuthenticationFailed(_) => StatusCode::UNAUTHORIZED,
        SessionError::CommandTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        SessionError::RemoteExit { .. } => StatusCode::BAD_GATEWAY,
        SessionError::DirectoryNotFound(_) => StatusCode::NOT_FOUND,
        SessionError::Transport(_) => StatusCode::BAD_GATEWAY,
    }
}

/// Map a session error onto the JSON envelope. A non-zero remote exit keeps
/// whatever output the command produced.
pub fn session_error_response(error: SessionError) -> Response {
    let status = session_error_status(&error);
    let message = error.to_string();
    match error {
        SessionError::RemoteExit { output, .. } => {
            ApiResponse::err_with_data(status, CommandOutputBody { output }, message)
                .into_response()
        }
        _ => ApiResponse::err(status, message).into_response(),
    }
}

#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionManager,
    pub metrics: Option<Arc<MetricsRegistry>>,
    pub api_token: Arc<str>,
    pub cors: bool,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(
        sessions: SessionManager,
        metrics: Option<Arc<MetricsRegistry>>,
        api_token: &str,
        cors: bool,
    ) -> Self {
        Self {
            sessions,
            metrics,
            api_token: Arc::from(api_token),
            cors,
            start_time: std::time::Instant::now(),
        }
    }
}

#[derive(Serialize)]
struct HealthInfo {
    status: &'static str,
    uptime_secs: u64,
    ssh_connected: bool,
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    ApiResponse::ok(HealthInfo {
        status: "ok",
        uptime_secs: state.start_time.elapsed().as_secs(),
        ssh_connected: state.sessions.status().connected,
    })
}

async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let Some(ref metrics) = state.metrics else {
        return (StatusCode::NOT_FOUND, "metrics disabled").into_response();
    };
    match metrics.render() {
        Ok(buffer) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            buffer,
        )
            .into_response(),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "encoding error").into_response(),
    }
}

/// API metrics middleware: records request count and duration per route pattern.
async fn api_metrics_middleware(
    State(state): State<AppState>,
    matched_path: Option<MatchedPath>,
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> impl IntoResponse {
    let Some(metrics) = state.metrics.clone() else {
        return next.run(req).await;
    };
    let method = req.method().to_string();
    let path = matched_path
        .map(|mp| mp.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let start = std::time::Instant::now();

    let response = next.run(req).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16();

    metrics.record_http_request(&method, &path, status);
    metrics.record_http_request_duration(&method, &path, duration);

    response
}

/// Bearer token auth middleware. A no-op while no token is configured.
async fn auth_middleware(
    State(state): State<AppState>,
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> impl IntoResponse {
    if state.api_token.is_empty() {
        return next.run(req).await;
    }

    use subtle::ConstantTimeEq;
    let expected = state.api_token.as_bytes();

    let provided = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    if let Some(provided) = provided {
        let provided = provided.as_bytes();
        if provided.len() == expected.len() && bool::from(provided.ct_eq(expected)) {
            return next.run(req).await;
        }
    }

    ApiResponse::err(StatusCode::UNAUTHORIZED, "unauthorized").into_response()
}

/// Permissive CORS: answers preflight requests directly and stamps the
/// allow headers on every response.
async fn cors_middleware(
    State(state): State<AppState>,
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    if !state.cors {
        return next.run(req).await;
    }

    let mut response = if req.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(req).await
    };

    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization"),
    );
    response
}

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    let authed = Router::new()
        .route("/api/ssh/connect", post(ssh::connect))
        .route("/api/ssh/disconnect", post(ssh::disconnect))
        .route("/api/ssh/status", get(ssh::status))
        .route("/api/ssh/execute", post(ssh::execute))
        .route("/api/data/processes", get(data::processes))
        .route("/api/data/ports", get(data::ports))
        .route("/api/data/connections", get(data::connections))
        .route("/api/data/resources", get(data::resources))
        .route("/api/data/network", get(data::network))
        .route("/api/data/disk-usage", get(data::disk_usage))
        .route("/api/data/logs", get(data::logs))
        .route("/api/data/users", get(data::users))
        .route("/api/data/client-ips", get(data::client_ips))
        .route("/api/data/services", get(data::services))
        .route("/api/data/system-info", get(data::system_info))
        .route("/api/process/action", post(data::process_action))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let mut app = Router::new().route("/health", get(health_handler));
    if state.metrics.is_some() {
        app = app.route("/metrics", get(metrics_handler));
    }

    app.merge(authed)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api_metrics_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            cors_middleware,
        ))
        .layer(DefaultBodyLimit::max(64 * 1024))
        .with_state(state)
}

/// Bind `listen_addr` and serve until `shutdown` fires.
pub async fn start_api_server(
    listen_addr: &str,
    state: AppState,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    info!(addr = %listen_addr, "API server listening");
    start_api_server_on_listener(listener, state, shutdown).await
}

/// Start the API server on a pre-bound listener (avoids port races in tests).
pub async fn start_api_server_on_listener(
    listener: tokio::net::TcpListener,
    state: AppState,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let app = router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    Ok(())
}
