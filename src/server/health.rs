//! Liveness endpoint.

use axum::http::StatusCode;

/// Returns 200 with the body `OK` while the server accepts connections.
///
/// Does not touch the queue or the upstream API, so a slow or failing
/// accounting platform never makes the service look dead.
pub async fn health_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}
