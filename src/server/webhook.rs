//! Webhook endpoint handler.
//!
//! Verifies the delivery signature, parses the body and enqueues every event
//! before answering. Processing happens later in the worker, so the response
//! says nothing about whether an invoice was handled.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::AppState;
use crate::queue::EnqueueOutcome;
use crate::webhooks::{SIGNATURE_HEADER, WebhookError, parse_payload, verify_signature};

/// Reasons a delivery is rejected at the boundary.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("missing required header: {0}")]
    MissingSignature(&'static str),

    #[error("invalid signature")]
    InvalidSignature,

    #[error(transparent)]
    Payload(#[from] WebhookError),
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let status = match &self {
            IngestError::MissingSignature(_) | IngestError::InvalidSignature => {
                StatusCode::UNAUTHORIZED
            }
            IngestError::Payload(_) => StatusCode::BAD_REQUEST,
        };

        (status, self.to_string()).into_response()
    }
}

/// Webhook handler.
///
/// # Response
///
/// - 200 OK: signature valid and body parsed (including the empty
///   "intent to receive" delivery); enqueue failures are logged, not reported
/// - 400 Bad Request: signature valid but body malformed
/// - 401 Unauthorized: signature missing or invalid
pub async fn webhook_handler(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, IngestError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(IngestError::MissingSignature(SIGNATURE_HEADER))?;

    // Verify before parsing.
    if !verify_signature(&body, signature, app_state.webhook_key()) {
        warn!("Invalid webhook signature");
        return Err(IngestError::InvalidSignature);
    }

    let payload = parse_payload(&body)?;
    if payload.is_probe() {
        debug!("Intent-to-receive delivery acknowledged");
        return Ok(StatusCode::OK);
    }

    info!(
        count = payload.events.len(),
        first_sequence = ?payload.first_event_sequence,
        last_sequence = ?payload.last_event_sequence,
        "Received webhook events"
    );

    for event in payload.events {
        let resource_id = event.resource_id.clone();
        match app_state.queue().enqueue(event).await {
            Ok(EnqueueOutcome::Queued) => debug!(resource_id = %resource_id, "Event queued"),
            Ok(EnqueueOutcome::Duplicate) => {
                debug!(resource_id = %resource_id, "Duplicate event ignored")
            }
            Err(e) => error!(resource_id = %resource_id, error = %e, "Failed to enqueue event"),
        }
    }

    Ok(StatusCode::OK)
}
