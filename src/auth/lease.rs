//! The persisted credential record.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::exchange::TokenResponse;

/// Seconds shaved off the advertised lifetime so a token is never used in
/// its final minute.
pub const DEFAULT_SAFETY_MARGIN_SECS: i64 = 60;

/// An access credential with a bounded validity window.
///
/// This is exactly the structure stored in `token.json`:
/// `{access_token, refresh_token, expires_in, token_type, obtained_at}`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialLease {
    pub access_token: String,
    pub refresh_token: String,
    /// Lifetime in seconds as reported by the token endpoint.
    pub expires_in: i64,
    pub token_type: String,
    pub obtained_at: DateTime<Utc>,
}

impl CredentialLease {
    /// Builds a lease from a token endpoint response received at `obtained_at`.
    pub fn from_response(response: TokenResponse, obtained_at: DateTime<Utc>) -> Self {
        CredentialLease {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_in: response.expires_in,
            token_type: response.token_type,
            obtained_at,
        }
    }

    /// `obtained_at + expires_in - safety_margin`.
    pub fn expires_at(&self, safety_margin: Duration) -> DateTime<Utc> {
        self.obtained_at + Duration::seconds(self.expires_in) - safety_margin
    }

    /// Returns true if the lease may still be used at `now`.
    pub fn is_usable_at(&self, now: DateTime<Utc>, safety_margin: Duration) -> bool {
        now < self.expires_at(safety_margin)
    }
}

// Tokens stay out of logs.
impl fmt::Debug for CredentialLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialLease")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("obtained_at", &self.obtained_at)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lease(obtained_at: DateTime<Utc>, expires_in: i64) -> CredentialLease {
        CredentialLease {
            access_token: "secret-access".to_string(),
            refresh_token: "secret-refresh".to_string(),
            expires_in,
            token_type: "Bearer".to_string(),
            obtained_at,
        }
    }

    #[test]
    fn expiry_subtracts_safety_margin() {
        let t0 = Utc::now();
        let l = lease(t0, 1800);
        let margin = Duration::seconds(DEFAULT_SAFETY_MARGIN_SECS);

        assert_eq!(l.expires_at(margin), t0 + Duration::seconds(1740));
        assert!(l.is_usable_at(t0 + Duration::seconds(1739), margin));
        assert!(!l.is_usable_at(t0 + Duration::seconds(1740), margin));
    }

    #[test]
    fn lifetime_shorter_than_margin_is_never_usable() {
        let t0 = Utc::now();
        let l = lease(t0, 30);
        assert!(!l.is_usable_at(t0, Duration::seconds(60)));
    }

    #[test]
    fn debug_output_redacts_tokens() {
        let rendered = format!("{:?}", lease(Utc::now(), 1800));
        assert!(!rendered.contains("secret-access"));
        assert!(!rendered.contains("secret-refresh"));
        assert!(rendered.contains("Bearer"));
    }
}
