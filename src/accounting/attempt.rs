//! Fixed-delay attempt loop for document fetches.
//!
//! Unlike a general backoff policy, the loop here is deliberately small: a
//! couple of attempts with a constant pause. An authorization failure between
//! attempts triggers a forced credential refresh so the next attempt runs with
//! a new token. Everything else is retried as-is.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use super::error::AccountingError;

/// Configuration for the attempt loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptConfig {
    /// Total attempts, including the first.
    pub max_attempts: u32,

    /// Pause between attempts.
    pub delay: Duration,
}

impl AttemptConfig {
    /// Two attempts, one second apart.
    pub const DEFAULT: Self = Self {
        max_attempts: 2,
        delay: Duration::from_secs(1),
    };

    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

impl Default for AttemptConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Runs `operation` up to `config.max_attempts` times.
///
/// Returns the first success, or the last error once attempts are exhausted.
/// When an attempt fails as unauthorized and another attempt remains,
/// `on_unauthorized` runs before the pause; its own failure is logged and does
/// not stop the loop (the next attempt will surface it).
pub async fn with_attempts<T, F, Fut, R, RFut>(
    config: AttemptConfig,
    mut operation: F,
    mut on_unauthorized: R,
) -> Result<T, AccountingError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AccountingError>>,
    R: FnMut() -> RFut,
    RFut: Future<Output = Result<(), AccountingError>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if attempt >= max_attempts {
            return Err(err);
        }

        debug!(attempt, error = %err, "Attempt failed, retrying");
        if err.is_unauthorized()
            && let Err(refresh_err) = on_unauthorized().await
        {
            warn!(error = %refresh_err, "Forced credential refresh failed");
        }

        tokio::time::sleep(config.delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounting::error::AccountingErrorKind;
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_attempts: u32) -> AttemptConfig {
        AttemptConfig::new(max_attempts, Duration::from_millis(1))
    }

    async fn no_refresh() -> Result<(), AccountingError> {
        Ok(())
    }

    #[test]
    fn default_is_two_attempts_one_second_apart() {
        let config = AttemptConfig::default();
        assert_eq!(config.max_attempts, 2);
        assert_eq!(config.delay, Duration::from_secs(1));
    }

    #[test]
    fn zero_attempts_is_clamped_to_one() {
        assert_eq!(AttemptConfig::new(0, Duration::ZERO).max_attempts, 1);
    }

    #[tokio::test]
    async fn success_on_first_attempt() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_attempts(
            fast(2),
            move || {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, AccountingError>(42) }
            },
            no_refresh,
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_attempts_return_last_error() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result: Result<(), _> = with_attempts(
            fast(2),
            move || {
                let n = counter_clone.fetch_add(1, Ordering::SeqCst);
                async move { Err(AccountingError::from_status(500, format!("failure {n}"))) }
            },
            no_refresh,
        )
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.status_code, Some(500));
        assert_eq!(err.message, "failure 1");
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unauthorized_forces_refresh_before_next_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let refreshes = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        let refreshes_clone = refreshes.clone();
        let refreshes_seen = refreshes.clone();

        let result = with_attempts(
            fast(2),
            move || {
                let n = calls_clone.fetch_add(1, Ordering::SeqCst);
                let refreshed = refreshes_seen.load(Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(AccountingError::from_status(401, "token expired"))
                    } else {
                        Ok(refreshed)
                    }
                }
            },
            move || {
                refreshes_clone.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            },
        )
        .await;

        assert_eq!(result.unwrap(), 1, "second attempt should see the refresh");
        assert_eq!(refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn no_refresh_after_final_attempt() {
        let refreshes = Arc::new(AtomicU32::new(0));
        let refreshes_clone = refreshes.clone();

        let result: Result<(), _> = with_attempts(
            fast(1),
            || async { Err(AccountingError::from_status(401, "nope")) },
            move || {
                refreshes_clone.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            },
        )
        .await;

        assert_eq!(result.unwrap_err().kind, AccountingErrorKind::Unauthorized);
        assert_eq!(refreshes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_refresh_does_not_stop_the_loop() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result: Result<(), _> = with_attempts(
            fast(3),
            move || {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                async { Err(AccountingError::from_status(401, "nope")) }
            },
            || async {
                Err(AccountingError::new(
                    AccountingErrorKind::Credentials,
                    Some(400),
                    "invalid_grant",
                ))
            },
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    proptest! {
        #[test]
        fn attempts_never_exceed_configured_max(max in 1u32..6, succeed_at in 0u32..8) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .unwrap();
            let calls = Arc::new(AtomicU32::new(0));
            let calls_clone = calls.clone();

            let result = runtime.block_on(with_attempts(
                AttemptConfig::new(max, Duration::ZERO),
                move || {
                    let n = calls_clone.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n >= succeed_at {
                            Ok(n)
                        } else {
                            Err(AccountingError::from_status(503, "busy"))
                        }
                    }
                },
                no_refresh,
            ));

            let made = calls.load(Ordering::SeqCst);
            prop_assert!(made <= max);
            prop_assert_eq!(result.is_ok(), succeed_at < max);
            if succeed_at < max {
                prop_assert_eq!(made, succeed_at + 1);
            } else {
                prop_assert_eq!(made, max);
            }
        }
    }
}
