//! `POST /slave/config` — authenticates an agent and hands back its
//! effective target list, remembering the transmission for `/api/status`.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use disttrace_auth::check_agent_credentials;
use disttrace_proto::{AgentCredentials, ConfigRequest, ConfigResponse};
use disttrace_registry::TargetRegistry;

use crate::state::CoordinatorState;

pub async fn fetch_config(
    State(state): State<CoordinatorState>,
    Json(req): Json<ConfigRequest>,
) -> Response {
    let agent_name = req.name.clone();
    let creds: AgentCredentials = req.into();

    let agent_id = match check_agent_credentials(&state.store, &creds).await {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!(agent = %agent_name, error = %e, "config fetch rejected");
            return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
        }
    };

    let targets = match TargetRegistry::new(&state.store).list() {
        Ok(targets) => targets,
        Err(e) => {
            tracing::warn!(error = %e, "can't read targets from db");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Can't read targets from db").into_response();
        }
    };

    for target in &targets {
        if let Err(e) = target.validate() {
            tracing::warn!(target = %target.name, error = %e, "loaded config is invalid");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Loaded config is invalid").into_response();
        }
    }

    let response = ConfigResponse {
        id: agent_id,
        targets,
    };
    state.record_agent_config(response.clone());

    tracing::info!(
        agent = %agent_name,
        targets = response.targets.len(),
        "transmitting config to agent"
    );
    Json(response).into_response()
}
