use super::{session_error_response, ApiResponse, AppState};
use crate::collectors::processes::{self, ProcessAction, ProcessActionError};
use crate::collectors::{disk, network, resources, sockets, system, users};
use crate::session::SessionError;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

fn respond<T: Serialize>(result: Result<T, SessionError>) -> Response {
    match result {
        Ok(data) => ApiResponse::ok(data).into_response(),
        Err(e) => session_error_response(e),
    }
}

pub async fn processes(State(state): State<AppState>) -> Response {
    respond(processes::collect_processes(&state.sessions).await)
}

pub async fn ports(State(state): State<AppState>) -> Response {
    respond(sockets::collect_listen_ports(&state.sessions).await)
}

pub async fn connections(State(state): State<AppState>) -> Response {
    respond(sockets::collect_connections(&state.sessions).await)
}

pub async fn client_ips(State(state): State<AppState>) -> Response {
    respond(sockets::collect_client_ips(&state.sessions).await)
}

pub async fn resources(State(state): State<AppState>) -> Response {
    respond(resources::collect_resources(&state.sessions).await)
}

pub async fn network(State(state): State<AppState>) -> Response {
    respond(network::collect_network(&state.sessions).await)
}

pub async fn disk_usage(State(state): State<AppState>) -> Response {
    respond(disk::collect_disk_usage(&state.sessions).await)
}

pub async fn logs(State(state): State<AppState>) -> Response {
    respond(system::collect_logs(&state.sessions).await)
}

pub async fn users(State(state): State<AppState>) -> Response {
    respond(users::collect_users(&state.sessions).await)
}

pub async fn services(State(state): State<AppState>) -> Response {
    respond(system::collect_services(&state.sessions).await)
}

pub async fn system_info(State(state): State<AppState>) -> Response {
    respond(system::collect_system_info(&state.sessions).await)
}

#[derive(Deserialize)]
pub struct ProcessActionRequest {
    pub pid: String,
    pub action: String,
}

#[derive(Serialize)]
pub struct ProcessActionResponse {
    pub pid: String,
    pub action: ProcessAction,
    pub output: String,
}

pub async fn process_action(
    State(state): State<AppState>,
    Json(req): Json<ProcessActionRequest>,
) -> Response {
    let result = match req.action.parse::<ProcessAction>() {
        Ok(action) => processes::perform_action(&state.sessions, &req.pid, action)
            .await
            .map(|output| (action, output)),
        Err(e) => Err(e),
    };

    match result {
        Ok((action, output)) => ApiResponse::ok(ProcessActionResponse {
            pid: req.pid.trim().to_string(),
            action,
            output,
        })
        .into_response(),
        Err(ProcessActionError::Session(e)) => session_error_response(e),
        Err(e @ ProcessActionError::NotFound(_)) => {
            ApiResponse::err(StatusCode::NOT_FOUND, e.to_string()).into_response()
        }
        Err(e) => ApiResponse::err(StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    }
}
