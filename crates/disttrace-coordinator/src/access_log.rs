//! Apache combined-log-format access logging (spec §6: "Access log appended
//! to a separate file... combined-log format"). Emitted as a `tracing` event
//! on the `access_log` target so `main.rs` can route it to its own file
//! writer without touching the application log stream.

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;

/// Wraps the whole router: records method, path, status, and response size
/// in combined-log format after the inner handler runs. Placed outermost so
/// it sees every request, including ones the CORS/auth layers short-circuit.
///
/// `ConnectInfo` is only populated when served via
/// `into_make_service_with_connect_info`; it's absent in unit tests that
/// drive the router with `tower::ServiceExt::oneshot`, so the remote
/// address falls back to `-` rather than failing the request.
pub async fn access_log(
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let remote = connect_info
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "-".to_string());
    let method = request.method().clone();
    let uri = request.uri().clone();
    let version = format!("{:?}", request.version());
    let referer = header_or_dash(&request, axum::http::header::REFERER);
    let user_agent = header_or_dash(&request, axum::http::header::USER_AGENT);

    let response = next.run(request).await;

    let status = response.status().as_u16();
    let size = response
        .headers()
        .get(axum::http::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");
    let timestamp = Utc::now().format("%d/%b/%Y:%H:%M:%S %z");

    tracing::info!(
        target: "access_log",
        "{} - - [{}] \"{} {} {}\" {} {} \"{}\" \"{}\"",
        remote,
        timestamp,
        method,
        uri,
        version,
        status,
        size,
        referer,
        user_agent,
    );

    response
}

fn header_or_dash(request: &Request<Body>, name: axum::http::HeaderName) -> String {
    request
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string()
}
