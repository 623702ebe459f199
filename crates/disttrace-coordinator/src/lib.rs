//! Coordinator HTTP API: router assembly for the agent-facing `/slave/*`
//! endpoints and the operator-facing `/api/*` endpoints.

#![forbid(unsafe_code)]

pub mod access_log;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

use std::time::Duration;

use axum::error_handling::HandleErrorLayer;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{BoxError, Router};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::state::CoordinatorState;

/// Per-request budget standing in for the original's separate read/write
/// timeouts (spec §5: 15s read, 15s write) — axum's `serve` doesn't expose
/// those independently, so one deadline covers the whole request/response
/// cycle instead.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

async fn on_timeout(_err: BoxError) -> StatusCode {
    StatusCode::REQUEST_TIMEOUT
}

/// Builds the full coordinator router: agent endpoints are open, everything
/// under `/api` except `/api/auth` requires a bearer token issued by
/// `/api/auth` (spec §4.E).
pub fn router(state: CoordinatorState) -> Router {
    let agent_routes = Router::new()
        .route("/slave/config", post(routes::config::fetch_config))
        .route("/slave/results", post(routes::ingest::submit_results));

    let protected_api = Router::new()
        .route(
            "/api/slaves",
            get(routes::agents::list).post(routes::agents::create).put(routes::agents::update),
        )
        .route("/api/slaves/{id}", axum::routing::delete(routes::agents::delete))
        .route(
            "/api/targets",
            get(routes::targets::list).post(routes::targets::create).put(routes::targets::update),
        )
        .route("/api/targets/{id}", axum::routing::delete(routes::targets::delete))
        .route(
            "/api/users",
            get(routes::users::list).post(routes::users::create).put(routes::users::update),
        )
        .route("/api/users/{id}", axum::routing::delete(routes::users::delete))
        .route("/api/status", get(routes::misc::status))
        .route("/api/traces", get(routes::misc::list_traces))
        .route("/api/graph", get(routes::misc::graph))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_operator_token,
        ));

    let open_api = Router::new().route("/api/auth", get(routes::misc::auth));

    // Layers wrap outside-in as they're added, so the last `.layer()` call
    // is outermost. Spec order (outer → inner) is CORS, then the combined
    // access-log writer, then router dispatch.
    agent_routes
        .merge(protected_api)
        .merge(open_api)
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(on_timeout))
                .layer(TimeoutLayer::new(REQUEST_TIMEOUT)),
        )
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(access_log::access_log))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use disttrace_store::Store;
    use tower::ServiceExt;

    fn test_state() -> CoordinatorState {
        CoordinatorState::new(std::sync::Arc::new(Store::open_in_memory().expect("in-memory store opens")))
    }

    #[tokio::test]
    async fn protected_route_without_token_is_unauthorized() {
        let app = router(test_state());
        let response = app
            .oneshot(Request::builder().uri("/api/slaves").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn auth_route_is_open() {
        let app = router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/auth?user=admin&password=123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let app = router(test_state());
        let response = app
            .oneshot(Request::builder().uri("/nonexistent").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cors_preflight_is_answered_without_reaching_the_router() {
        let app = router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/api/slaves")
                    .header(axum::http::header::ORIGIN, "http://example.com")
                    .header(axum::http::header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(axum::http::header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );
    }
}
