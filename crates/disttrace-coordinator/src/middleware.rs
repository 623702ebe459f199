//! Bearer-auth middleware for the `/api/*` operator subtree (everything
//! except `/api/auth`, which issues the token this middleware checks).

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::Utc;

use crate::state::CoordinatorState;

pub async fn require_operator_token(
    State(state): State<CoordinatorState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let header = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let token = header.and_then(disttrace_auth::TokenAuthority::token_from_header);

    let Some(token) = token else {
        return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    };

    if let Err(e) = state.tokens.verify(token, Utc::now()) {
        tracing::warn!(error = %e, "operator token rejected");
        return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    }

    next.run(request).await
}
