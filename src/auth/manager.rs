//! Cached, self-refreshing access credential.

use std::path::{Path, PathBuf};

use chrono::{Duration, Utc};
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

use super::AuthError;
use super::exchange::{HttpTokenExchange, TokenExchange};
use super::lease::{CredentialLease, DEFAULT_SAFETY_MARGIN_SECS};
use crate::persistence::{save_json_atomic, try_load_json};

/// File name of the lease inside the state directory.
pub const LEASE_FILE_NAME: &str = "token.json";

/// Holds the current [`CredentialLease`] and refreshes it when needed.
///
/// The lease is loaded from disk on first use. The cache lock is held for the
/// whole refresh exchange, so concurrent callers that find the lease expired
/// wait for the one refresh in progress and then reuse its result; nobody
/// ever observes a half-replaced lease.
#[derive(Debug)]
pub struct CredentialLeaseManager<E = HttpTokenExchange> {
    path: PathBuf,
    exchange: E,
    safety_margin: Duration,
    lease: Mutex<Option<CredentialLease>>,
}

impl<E: TokenExchange> CredentialLeaseManager<E> {
    /// Creates a manager for the lease stored at `path`.
    pub fn new(path: impl Into<PathBuf>, exchange: E) -> Self {
        CredentialLeaseManager {
            path: path.into(),
            exchange,
            safety_margin: Duration::seconds(DEFAULT_SAFETY_MARGIN_SECS),
            lease: Mutex::new(None),
        }
    }

    /// Creates a manager for `<state_dir>/token.json`.
    pub fn in_dir(state_dir: &Path, exchange: E) -> Self {
        Self::new(state_dir.join(LEASE_FILE_NAME), exchange)
    }

    /// Overrides the safety margin subtracted from the lease lifetime.
    pub fn with_safety_margin(mut self, safety_margin: Duration) -> Self {
        self.safety_margin = safety_margin;
        self
    }

    /// Returns the lease file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns an access token that is valid right now.
    ///
    /// Uses the cached lease when it has not reached its expiry; otherwise
    /// refreshes, persists the new lease, and returns the new token.
    ///
    /// # Errors
    ///
    /// Fails if no lease file exists, the file is malformed, the refresh
    /// exchange does not succeed, or the refreshed token would already be
    /// inside the safety margin.
    pub async fn get_valid_access(&self) -> Result<String, AuthError> {
        let mut slot = self.lease.lock().await;
        let current = self.loaded(&mut slot)?;

        if current.is_usable_at(Utc::now(), self.safety_margin) {
            return Ok(current.access_token.clone());
        }

        info!("Access token expired, refreshing");
        self.refresh_locked(&mut slot).await
    }

    /// Refreshes unconditionally, ignoring the local expiry.
    ///
    /// Used when the upstream rejects a token that still looked valid here
    /// (clock skew, revocation).
    pub async fn force_refresh(&self) -> Result<String, AuthError> {
        let mut slot = self.lease.lock().await;
        info!("Forcing access token refresh");
        self.refresh_locked(&mut slot).await
    }

    /// Returns a copy of the cached lease, loading it if necessary.
    pub async fn current_lease(&self) -> Result<CredentialLease, AuthError> {
        let mut slot = self.lease.lock().await;
        Ok(self.loaded(&mut slot)?.clone())
    }

    fn loaded<'a>(
        &self,
        slot: &'a mut Option<CredentialLease>,
    ) -> Result<&'a CredentialLease, AuthError> {
        if slot.is_none() {
            let lease: CredentialLease = try_load_json(&self.path)?
                .ok_or_else(|| AuthError::MissingLease(self.path.clone()))?;
            *slot = Some(lease);
        }
        slot.as_ref()
            .ok_or_else(|| AuthError::MissingLease(self.path.clone()))
    }

    #[instrument(skip(self, slot), fields(path = %self.path.display()))]
    async fn refresh_locked(
        &self,
        slot: &mut Option<CredentialLease>,
    ) -> Result<String, AuthError> {
        let refresh_token = self.loaded(slot)?.refresh_token.clone();

        let response = self.exchange.refresh(&refresh_token).await?;
        let lease = CredentialLease::from_response(response, Utc::now());

        if let Err(e) = save_json_atomic(&self.path, &lease) {
            error!(error = %e, "Failed to persist refreshed credential lease");
        }

        // The refresh token has rotated, so the lease is kept even when unusable.
        let usable = lease.is_usable_at(Utc::now(), self.safety_margin);
        let expires_in = lease.expires_in;
        let access_token = lease.access_token.clone();
        info!(expires_at = %lease.expires_at(self.safety_margin), "Access token refreshed");
        *slot = Some(lease);

        if !usable {
            warn!(expires_in, "Refreshed access token expires inside the safety margin");
            return Err(AuthError::LeaseTooShort {
                expires_in,
                margin_secs: self.safety_margin.num_seconds(),
            });
        }
        Ok(access_token)
    }
}
