//! Shared error → HTTP response mapping for the operator API. The
//! `/slave/*` ingestion handlers build their own `SubmitResultResponse`
//! envelopes directly (spec §4.E/§7) rather than going through this type,
//! since their error shape is wire-contractual, not incidental.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use disttrace_auth::AuthError;
use disttrace_registry::RegistryError;
use disttrace_store::StoreError;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized,
    NotFound,
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, message).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        tracing::warn!(error = %err, "store error surfaced to operator API");
        ApiError::Internal("Database error".to_string())
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Validation(msg) => ApiError::BadRequest(msg),
            RegistryError::NameTaken => ApiError::BadRequest("name already in use".to_string()),
            RegistryError::NotFound(_) => ApiError::NotFound,
            RegistryError::Store(e) => ApiError::from(e),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials
            | AuthError::TokenMalformed
            | AuthError::TokenInvalid
            | AuthError::TokenExpired => ApiError::Unauthorized,
            AuthError::Store(e) => ApiError::from(e),
        }
    }
}
