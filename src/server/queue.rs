//! Pending-queue inspection endpoint.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

use super::AppState;
use crate::types::WebhookEvent;

/// Returns the events still waiting to be processed, oldest first.
///
/// - 200 OK with a JSON array of events
/// - 500 Internal Server Error if the queue file cannot be read
pub async fn queue_handler(State(app_state): State<AppState>) -> Response {
    match app_state.queue().get_all().await {
        Ok(events) => Json::<Vec<WebhookEvent>>(events).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to read queue");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
