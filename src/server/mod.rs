//! HTTP server for the invoice notifier.
//!
//! This module implements the HTTP server that:
//! - Accepts webhooks from the accounting platform, validates signatures, and
//!   enqueues each event durably
//! - Exposes the pending queue for observability
//! - Provides health checks for liveness probes
//!
//! # Endpoints
//!
//! - `POST /webhook` - Accepts webhook deliveries (returns 200 OK)
//! - `GET /queue` - Returns the pending events as JSON
//! - `GET /health` - Returns 200 if server is running

use std::sync::Arc;

pub mod health;
pub mod queue;
pub mod webhook;

pub use health::health_handler;
pub use queue::queue_handler;
pub use webhook::webhook_handler;

use crate::queue::DurableQueue;

/// Shared application state.
///
/// This is passed to all handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Queue that accepted events are appended to.
    queue: Arc<DurableQueue>,

    /// Key for HMAC-SHA256 signature verification.
    webhook_key: Vec<u8>,
}

impl AppState {
    pub fn new(queue: Arc<DurableQueue>, webhook_key: impl Into<Vec<u8>>) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                queue,
                webhook_key: webhook_key.into(),
            }),
        }
    }

    pub fn queue(&self) -> &DurableQueue {
        &self.inner.queue
    }

    pub fn webhook_key(&self) -> &[u8] {
        &self.inner.webhook_key
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("queue", &self.inner.queue.path())
            .finish_non_exhaustive()
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router(app_state: AppState) -> axum::Router {
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/webhook", post(webhook_handler))
        .route("/queue", get(queue_handler))
        .route("/health", get(health_handler))
        .with_state(app_state)
}
