//! Upstream credential management.
//!
//! The accounting API is called with a short-lived OAuth access token. This
//! module keeps that token valid across long-running retries:
//!
//! - [`CredentialLease`] is the persisted token record and knows when it expires
//! - [`TokenExchange`] trades a refresh token for a new lease
//! - [`CredentialLeaseManager`] caches the lease, refreshes it ahead of expiry,
//!   collapses concurrent refreshes into one, and rewrites the lease file after
//!   every refresh so a restart resumes with the newest refresh token

mod exchange;
mod lease;
mod manager;

use std::path::PathBuf;

use thiserror::Error;

use crate::persistence::SnapshotError;

pub use exchange::{HttpTokenExchange, TokenExchange, TokenResponse};
pub use lease::{CredentialLease, DEFAULT_SAFETY_MARGIN_SECS};
pub use manager::{CredentialLeaseManager, LEASE_FILE_NAME};

/// Errors from obtaining or refreshing a credential.
///
/// All of these are fatal for the operation that needed the credential; the
/// manager never retries internally.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No lease file has been provisioned.
    #[error("no credential lease at {0}; provision token.json before starting")]
    MissingLease(PathBuf),

    /// The lease file exists but is unreadable or malformed.
    #[error("cannot load credential lease: {0}")]
    LeaseFile(#[from] SnapshotError),

    /// The token endpoint answered with a non-success status.
    #[error("token refresh rejected (HTTP {status}): {body}")]
    RefreshRejected { status: u16, body: String },

    /// The token endpoint issued a token that expires within the safety margin.
    #[error("refreshed token lives {expires_in}s, inside the {margin_secs}s safety margin")]
    LeaseTooShort { expires_in: i64, margin_secs: i64 },

    /// The token endpoint could not be reached or returned an undecodable body.
    #[error("token refresh failed: {0}")]
    Http(#[from] reqwest::Error),
}
