//! `/api/targets` — probing-target CRUD via query-parameter forms (spec's
//! S5 scenario: `POST /api/targets?name=...&address=...&retries=...&maxHops=...&timeout=...`).

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use disttrace_proto::Target;
use disttrace_registry::TargetRegistry;

use crate::error::ApiError;
use crate::state::CoordinatorState;

#[derive(Debug, Deserialize)]
pub struct CreateTargetQuery {
    name: String,
    address: String,
    retries: i32,
    #[serde(rename = "maxHops")]
    max_hops: i32,
    timeout: i32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTargetQuery {
    id: Uuid,
    name: String,
    address: String,
    retries: i32,
    #[serde(rename = "maxHops")]
    max_hops: i32,
    timeout: i32,
}

pub async fn list(State(state): State<CoordinatorState>) -> Result<Json<Vec<Target>>, ApiError> {
    Ok(Json(TargetRegistry::new(&state.store).list()?))
}

pub async fn create(
    State(state): State<CoordinatorState>,
    Query(q): Query<CreateTargetQuery>,
) -> Result<Response, ApiError> {
    let created = TargetRegistry::new(&state.store).create(Target {
        id: Uuid::nil(),
        name: q.name,
        address: q.address,
        retries: q.retries,
        max_hops: q.max_hops,
        timeout_ms: q.timeout,
    })?;
    Ok((StatusCode::CREATED, Json(created)).into_response())
}

pub async fn update(
    State(state): State<CoordinatorState>,
    Query(q): Query<UpdateTargetQuery>,
) -> Result<Json<Target>, ApiError> {
    let updated = TargetRegistry::new(&state.store).update(Target {
        id: q.id,
        name: q.name,
        address: q.address,
        retries: q.retries,
        max_hops: q.max_hops,
        timeout_ms: q.timeout,
    })?;
    Ok(Json(updated))
}

pub async fn delete(
    State(state): State<CoordinatorState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    TargetRegistry::new(&state.store).delete(id)?;
    Ok(StatusCode::OK)
}
