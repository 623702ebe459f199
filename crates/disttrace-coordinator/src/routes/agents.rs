//! `/api/slaves` — agent CRUD. Create and update take their fields as query
//! parameters rather than a JSON body, matching the rest of this API's
//! operator-form style.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use disttrace_proto::Agent;
use disttrace_registry::AgentRegistry;

use crate::error::ApiError;
use crate::state::CoordinatorState;

#[derive(Debug, Deserialize)]
pub struct CreateAgentQuery {
    name: String,
    secret: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAgentQuery {
    id: Uuid,
    name: String,
    secret: String,
}

pub async fn list(State(state): State<CoordinatorState>) -> Result<Json<Vec<Agent>>, ApiError> {
    Ok(Json(AgentRegistry::new(&state.store).list()?))
}

pub async fn create(
    State(state): State<CoordinatorState>,
    Query(q): Query<CreateAgentQuery>,
) -> Result<Response, ApiError> {
    let created = AgentRegistry::new(&state.store).create(Agent {
        id: Uuid::nil(),
        name: q.name,
        secret: q.secret,
    })?;
    Ok((StatusCode::CREATED, Json(created)).into_response())
}

pub async fn update(
    State(state): State<CoordinatorState>,
    Query(q): Query<UpdateAgentQuery>,
) -> Result<Json<Agent>, ApiError> {
    let updated = AgentRegistry::new(&state.store).update(Agent {
        id: q.id,
        name: q.name,
        secret: q.secret,
    })?;
    Ok(Json(updated))
}

pub async fn delete(
    State(state): State<CoordinatorState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    AgentRegistry::new(&state.store).delete(id)?;
    Ok(StatusCode::OK)
}
