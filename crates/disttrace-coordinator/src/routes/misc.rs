//! `/api/auth`, `/api/status`, `/api/traces`, `/api/graph` — the handlers
//! that don't belong to a single CRUD resource.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use disttrace_auth::check_operator_login;
use disttrace_proto::StatusResponse;

use crate::error::ApiError;
use crate::state::CoordinatorState;

#[derive(Debug, Deserialize)]
pub struct AuthQuery {
    user: String,
    password: String,
}

/// `GET /api/auth?user&password` — no auth required, issues a bearer token
/// as an opaque text body on success.
pub async fn auth(
    State(state): State<CoordinatorState>,
    Query(params): Query<AuthQuery>,
) -> Response {
    match check_operator_login(&state.store, &params.user, &params.password).await {
        Ok(user) => {
            let token = state.tokens.issue(&user.name, Utc::now());
            (StatusCode::OK, token).into_response()
        }
        Err(_) => (StatusCode::UNAUTHORIZED, "User/PW do not match").into_response(),
    }
}

pub async fn status(State(state): State<CoordinatorState>) -> Json<StatusResponse> {
    let uptime_secs = (Utc::now() - state.started_at).num_seconds().max(0);
    let guard = state.last_agent_config.lock().expect("state mutex poisoned");
    let (last_agent_config_time, last_agent_config) = match &*guard {
        Some(cfg) => (Some(cfg.transmitted_at), Some(cfg.response.clone())),
        None => (None, None),
    };
    Json(StatusResponse {
        uptime_secs,
        last_agent_config_time,
        last_agent_config,
    })
}

#[derive(Debug, Deserialize)]
pub struct TracesQuery {
    limit: Option<i64>,
}

pub async fn list_traces(
    State(state): State<CoordinatorState>,
    Query(q): Query<TracesQuery>,
) -> Result<Response, ApiError> {
    let limit = q.limit.filter(|&n| n > 0);
    let history = disttrace_aggregate::trace_history(&state.store, limit)?;
    Ok(Json(history).into_response())
}

#[derive(Debug, Deserialize)]
pub struct GraphQuery {
    #[serde(rename = "destID")]
    dest_id: Uuid,
    #[serde(rename = "slaveID")]
    slave_id: Uuid,
    #[serde(default)]
    skip: i64,
}

pub async fn graph(
    State(state): State<CoordinatorState>,
    Query(q): Query<GraphQuery>,
) -> Result<Json<Value>, ApiError> {
    let result = disttrace_aggregate::graph(&state.store, q.dest_id, q.slave_id, q.skip)?;
    Ok(Json(result.to_json()))
}
