//! `/api/users` — operator user CRUD. Responses never carry `PasswordHash`
//! or `Salt`; [`UserSummary`] is the wire-facing projection of
//! [`disttrace_proto::User`].

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use disttrace_registry::{users::NewUser, UserRegistry};

use crate::error::ApiError;
use crate::state::CoordinatorState;

#[derive(Debug, Serialize)]
pub struct UserSummary {
    #[serde(rename = "ID")]
    id: Uuid,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "PasswordNeedsChange")]
    password_needs_change: bool,
}

impl From<disttrace_proto::User> for UserSummary {
    fn from(user: disttrace_proto::User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            password_needs_change: user.password_needs_change,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateUserQuery {
    name: String,
    password: String,
    #[serde(default, rename = "passwordNeedsChange")]
    password_needs_change: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserQuery {
    id: Uuid,
    name: String,
    #[serde(default)]
    password: Option<String>,
    #[serde(default, rename = "passwordNeedsChange")]
    password_needs_change: bool,
}

pub async fn list(State(state): State<CoordinatorState>) -> Result<Json<Vec<UserSummary>>, ApiError> {
    let users = UserRegistry::new(&state.store).list()?;
    Ok(Json(users.into_iter().map(UserSummary::from).collect()))
}

pub async fn create(
    State(state): State<CoordinatorState>,
    Query(q): Query<CreateUserQuery>,
) -> Result<Response, ApiError> {
    let created = UserRegistry::new(&state.store).create(NewUser {
        name: q.name,
        password: q.password,
        password_needs_change: q.password_needs_change,
    })?;
    Ok((StatusCode::CREATED, Json(UserSummary::from(created))).into_response())
}

pub async fn update(
    State(state): State<CoordinatorState>,
    Query(q): Query<UpdateUserQuery>,
) -> Result<Json<UserSummary>, ApiError> {
    let updated = UserRegistry::new(&state.store).update(q.id, q.name, q.password, q.password_needs_change)?;
    Ok(Json(UserSummary::from(updated)))
}

pub async fn delete(
    State(state): State<CoordinatorState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    UserRegistry::new(&state.store).delete(id)?;
    Ok(StatusCode::OK)
}
