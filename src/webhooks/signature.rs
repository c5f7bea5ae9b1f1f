//! Webhook signature verification using HMAC-SHA256.
//!
//! The accounting platform signs each delivery with HMAC-SHA256 over the raw
//! request body, keyed by the webhook key, and sends the digest base64-encoded
//! in the `x-xero-signature` header.
//!
//! Verification is the first step in webhook processing; invalid signatures
//! are rejected before the body is parsed.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the base64 signature.
pub const SIGNATURE_HEADER: &str = "x-xero-signature";

/// Decodes a signature header value into raw bytes.
///
/// Returns `None` for values that are not valid base64. Never panics.
///
/// # Examples
///
/// ```
/// use invoice_notifier::webhooks::parse_signature_header;
///
/// assert_eq!(parse_signature_header("EjSrzQ=="), Some(vec![0x12, 0x34, 0xab, 0xcd]));
/// assert!(parse_signature_header("not base64!").is_none());
/// ```
pub fn parse_signature_header(header: &str) -> Option<Vec<u8>> {
    STANDARD.decode(header.trim()).ok()
}

/// Computes the HMAC-SHA256 signature of a payload.
///
/// Returns `None` only if the key is rejected by the MAC, which HMAC never does.
pub fn compute_signature(payload: &[u8], key: &[u8]) -> Option<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key).ok()?;
    mac.update(payload);
    Some(mac.finalize().into_bytes().to_vec())
}

/// Formats a signature as a header value.
pub fn format_signature_header(signature: &[u8]) -> String {
    STANDARD.encode(signature)
}

/// Verifies a webhook signature against the payload and key.
///
/// Uses constant-time comparison.
///
/// # Examples
///
/// ```
/// use invoice_notifier::webhooks::{compute_signature, format_signature_header, verify_signature};
///
/// let payload = br#"{"events":[]}"#;
/// let key = b"webhook-key";
///
/// let header = format_signature_header(&compute_signature(payload, key).unwrap());
///
/// assert!(verify_signature(payload, &header, key));
/// assert!(!verify_signature(payload, &header, b"other-key"));
/// ```
pub fn verify_signature(payload: &[u8], signature_header: &str, key: &[u8]) -> bool {
    let Some(expected_signature) = parse_signature_header(signature_header) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
        return false;
    };
    mac.update(payload);

    mac.verify_slice(&expected_signature).is_ok()
}
