//! Delays between processing cycles.
//!
//! The worker calls the accounting API at most once per cycle, so pacing the
//! cycles is what keeps the service under the platform's rate ceiling:
//!
//! - **Minimum interval**: 1.1 seconds after every processed event (about 54
//!   calls a minute), configurable via `INVOICE_NOTIFIER_MIN_INTERVAL_MS`
//! - **Idle interval**: 1 second when the queue is empty, configurable via
//!   `INVOICE_NOTIFIER_IDLE_INTERVAL_MS`
//! - **Rate-limit cooldown**: an extra 10 seconds after the platform says
//!   "too many requests", configurable via
//!   `INVOICE_NOTIFIER_RATE_LIMIT_COOLDOWN_SECS`

use std::time::Duration;

/// Default pause after a processed event (1.1 seconds).
const DEFAULT_MIN_INTERVAL_MS: u64 = 1100;

/// Default pause when there is nothing to do (1 second).
const DEFAULT_IDLE_INTERVAL_MS: u64 = 1000;

/// Default extra pause after a rate-limit response (10 seconds).
const DEFAULT_RATE_LIMIT_COOLDOWN_SECS: u64 = 10;

/// What happened in one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The queue was empty.
    Idle,

    /// The head event was handled (or skipped) and removed.
    Success,

    /// The head event stays queued and will be retried.
    RetriableFailure,

    /// The head event stays queued and the upstream asked us to slow down.
    RateLimited,
}

/// Pacing configuration for the worker loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingConfig {
    /// Pause after every cycle that processed an event.
    pub min_interval: Duration,

    /// Pause after a cycle that found the queue empty.
    pub idle_interval: Duration,

    /// Extra pause, on top of `min_interval`, after a rate-limited cycle.
    pub rate_limit_cooldown: Duration,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl PacingConfig {
    pub fn new() -> Self {
        PacingConfig {
            min_interval: Duration::from_millis(DEFAULT_MIN_INTERVAL_MS),
            idle_interval: Duration::from_millis(DEFAULT_IDLE_INTERVAL_MS),
            rate_limit_cooldown: Duration::from_secs(DEFAULT_RATE_LIMIT_COOLDOWN_SECS),
        }
    }

    /// Creates a `PacingConfig` from environment variables.
    ///
    /// Unset or unparsable values fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |name: &str| lookup(name).and_then(|s| s.trim().parse::<u64>().ok());

        PacingConfig {
            min_interval: Duration::from_millis(
                read("INVOICE_NOTIFIER_MIN_INTERVAL_MS").unwrap_or(DEFAULT_MIN_INTERVAL_MS),
            ),
            idle_interval: Duration::from_millis(
                read("INVOICE_NOTIFIER_IDLE_INTERVAL_MS").unwrap_or(DEFAULT_IDLE_INTERVAL_MS),
            ),
            rate_limit_cooldown: Duration::from_secs(
                read("INVOICE_NOTIFIER_RATE_LIMIT_COOLDOWN_SECS")
                    .unwrap_or(DEFAULT_RATE_LIMIT_COOLDOWN_SECS),
            ),
        }
    }

    /// Returns how long to sleep after a cycle with the given outcome.
    pub fn delay_after(&self, outcome: CycleOutcome) -> Duration {
        match outcome {
            CycleOutcome::Idle => self.idle_interval,
            CycleOutcome::Success | CycleOutcome::RetriableFailure => self.min_interval,
            CycleOutcome::RateLimited => self.rate_limit_cooldown + self.min_interval,
        }
    }
}
