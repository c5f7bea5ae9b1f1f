//! Webhook ingestion helpers.
//!
//! This module provides:
//! - Signature verification for webhook deliveries (base64 HMAC-SHA256)
//! - Parsing of the delivery body into [`WebhookEvent`](crate::types::WebhookEvent)s

pub mod payload;
pub mod signature;

pub use payload::{WebhookError, WebhookPayload, parse_payload};
pub use signature::{
    SIGNATURE_HEADER, compute_signature, format_signature_header, parse_signature_header,
    verify_signature,
};
