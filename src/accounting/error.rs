//! Accounting API error types.
//!
//! Errors are categorized so the worker can decide what to do with the event
//! that triggered the call:
//!
//! - **Transient** and **RateLimited** errors leave the event queued; rate
//!   limiting additionally stretches the pause before the next cycle
//! - **Unauthorized** triggers a forced credential refresh inside the attempt
//!   loop, and is otherwise treated as transient
//! - **Credentials** means no usable credential could be obtained at all
//!
//! The error is `Clone` so that one failed in-flight fetch can be handed to
//! every caller that joined it.

use std::fmt;

use thiserror::Error;

use crate::auth::AuthError;

/// Result type for accounting API operations.
pub type Result<T> = std::result::Result<T, AccountingError>;

/// The kind of accounting API error, categorized for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountingErrorKind {
    /// HTTP 5xx, network failures, timeouts.
    Transient,

    /// HTTP 429, or any failure whose message says "too many requests".
    RateLimited,

    /// HTTP 401/403: the access token was not accepted.
    Unauthorized,

    /// HTTP 404: the entity does not exist (or is not visible to this tenant).
    NotFound,

    /// Any other 4xx, or a response body that could not be decoded.
    Permanent,

    /// No credential could be obtained (missing lease, refresh rejected).
    Credentials,
}

/// An accounting API error with categorization for retry decisions.
#[derive(Debug, Clone, Error)]
pub struct AccountingError {
    pub kind: AccountingErrorKind,

    /// The HTTP status code, if a response was received.
    pub status_code: Option<u16>,

    /// A human-readable description, including the response body when present.
    pub message: String,
}

impl fmt::Display for AccountingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "accounting API error (HTTP {}): {}", code, self.message),
            None => write!(f, "accounting API error: {}", self.message),
        }
    }
}

impl AccountingError {
    pub fn new(
        kind: AccountingErrorKind,
        status_code: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        AccountingError {
            kind,
            status_code,
            message: message.into(),
        }
    }

    /// Categorizes a non-success HTTP response.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        let kind = match status {
            429 => AccountingErrorKind::RateLimited,
            401 | 403 => AccountingErrorKind::Unauthorized,
            404 => AccountingErrorKind::NotFound,
            _ if is_rate_limit_message(&body) => AccountingErrorKind::RateLimited,
            500..=599 => AccountingErrorKind::Transient,
            _ => AccountingErrorKind::Permanent,
        };
        AccountingError::new(kind, Some(status), body)
    }

    /// Categorizes a transport-level failure.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return AccountingError::from_status(status.as_u16(), err.to_string());
        }
        let kind = if err.is_decode() {
            AccountingErrorKind::Permanent
        } else {
            AccountingErrorKind::Transient
        };
        AccountingError::new(kind, None, err.to_string())
    }

    /// An expected entity was missing from an otherwise successful response.
    pub fn missing(what: impl fmt::Display) -> Self {
        AccountingError::new(
            AccountingErrorKind::NotFound,
            None,
            format!("response contained no {what}"),
        )
    }

    /// Returns true if the upstream asked us to slow down.
    pub fn is_rate_limited(&self) -> bool {
        self.kind == AccountingErrorKind::RateLimited || is_rate_limit_message(&self.message)
    }

    /// Returns true if the token was rejected and a forced refresh may help.
    pub fn is_unauthorized(&self) -> bool {
        self.kind == AccountingErrorKind::Unauthorized
    }
}

impl From<AuthError> for AccountingError {
    fn from(err: AuthError) -> Self {
        let status_code = match &err {
            AuthError::RefreshRejected { status, .. } => Some(*status),
            _ => None,
        };
        let kind = match &err {
            AuthError::Http(e) if !e.is_decode() => AccountingErrorKind::Transient,
            AuthError::RefreshRejected { status: 429, .. } => AccountingErrorKind::RateLimited,
            _ => AccountingErrorKind::Credentials,
        };
        AccountingError::new(kind, status_code, err.to_string())
    }
}

/// Checks if an error message indicates a rate limit.
fn is_rate_limit_message(message: &str) -> bool {
    let message_lower = message.to_lowercase();
    message_lower.contains("too many requests") || message_lower.contains("rate limit")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn status_classification() {
        assert_eq!(AccountingError::from_status(429, "").kind, AccountingErrorKind::RateLimited);
        assert_eq!(AccountingError::from_status(401, "").kind, AccountingErrorKind::Unauthorized);
        assert_eq!(AccountingError::from_status(403, "").kind, AccountingErrorKind::Unauthorized);
        assert_eq!(AccountingError::from_status(404, "").kind, AccountingErrorKind::NotFound);
        assert_eq!(AccountingError::from_status(503, "").kind, AccountingErrorKind::Transient);
        assert_eq!(AccountingError::from_status(400, "bad").kind, AccountingErrorKind::Permanent);
    }

    #[test]
    fn rate_limit_detected_from_message() {
        let err = AccountingError::from_status(503, "Too Many Requests, slow down");
        assert!(err.is_rate_limited());

        let err = AccountingError::new(AccountingErrorKind::Transient, None, "TooManyRequests?");
        assert!(!err.is_rate_limited());

        let err = AccountingError::new(
            AccountingErrorKind::Transient,
            None,
            "HTTP 429 Too Many Requests",
        );
        assert!(err.is_rate_limited());
    }

    #[test]
    fn display_includes_status() {
        let err = AccountingError::from_status(500, "boom");
        assert_eq!(err.to_string(), "accounting API error (HTTP 500): boom");
    }

    #[test]
    fn missing_lease_maps_to_credentials() {
        let err: AccountingError = AuthError::MissingLease(PathBuf::from("token.json")).into();
        assert_eq!(err.kind, AccountingErrorKind::Credentials);
        assert!(!err.is_unauthorized());
    }

    #[test]
    fn rejected_refresh_keeps_status() {
        let err: AccountingError = AuthError::RefreshRejected {
            status: 400,
            body: "invalid_grant".to_string(),
        }
        .into();
        assert_eq!(err.kind, AccountingErrorKind::Credentials);
        assert_eq!(err.status_code, Some(400));
    }
}
