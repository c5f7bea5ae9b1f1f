//! Environment-driven configuration.
//!
//! Required secrets missing from the environment are a startup error.
//! Everything else has a default; numeric tuning values that fail to parse
//! fall back to their defaults rather than aborting.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use crate::worker::PacingConfig;

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_STATE_DIR: &str = "state";
pub const DEFAULT_API_BASE: &str = "https://api.xero.com/api.xro/2.0";
pub const DEFAULT_TOKEN_URL: &str = "https://identity.xero.com/connect/token";

/// Errors from reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),

    #[error("invalid listen address {value:?}: {source}")]
    InvalidListenAddr {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },
}

/// HTTP mail relay settings.
#[derive(Clone)]
pub struct MailConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub from: String,
}

impl fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailConfig")
            .field("url", &self.url)
            .field("from", &self.from)
            .finish_non_exhaustive()
    }
}

/// Service configuration.
#[derive(Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    /// Holds `queue.json`, `sent_invoices.json` and `token.json`.
    pub state_dir: PathBuf,
    pub webhook_key: String,
    pub client_id: String,
    pub client_secret: String,
    pub api_base: String,
    pub token_url: String,
    /// `None` selects the dry-run notifier.
    pub mail: Option<MailConfig>,
    pub pacing: PacingConfig,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("listen_addr", &self.listen_addr)
            .field("state_dir", &self.state_dir)
            .field("client_id", &self.client_id)
            .field("api_base", &self.api_base)
            .field("token_url", &self.token_url)
            .field("mail", &self.mail)
            .field("pacing", &self.pacing)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let require = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let listen_value =
            get("INVOICE_NOTIFIER_LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
        let listen_addr = listen_value
            .parse()
            .map_err(|source| ConfigError::InvalidListenAddr {
                value: listen_value.clone(),
                source,
            })?;

        let mail = match get("MAIL_API_URL") {
            Some(url) => Some(MailConfig {
                url,
                api_key: get("MAIL_API_KEY"),
                from: require("MAIL_FROM")?,
            }),
            None => None,
        };

        Ok(Config {
            listen_addr,
            state_dir: get("INVOICE_NOTIFIER_STATE_DIR")
                .unwrap_or_else(|| DEFAULT_STATE_DIR.to_string())
                .into(),
            webhook_key: require("XERO_WEBHOOK_KEY")?,
            client_id: require("XERO_CLIENT_ID")?,
            client_secret: require("XERO_CLIENT_SECRET")?,
            api_base: get("XERO_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            token_url: get("XERO_TOKEN_URL").unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string()),
            mail,
            pacing: PacingConfig::from_lookup(&lookup),
        })
    }
}
