//! Bounded retry for X API calls.
//!
//! Rate limits (HTTP 429) wait until the reset time the API reports, capped
//! at a fixed cooldown; the X API windows are 15 minutes, so the default
//! cooldown is 900 s and is also the wait when no reset time is known. Transient network failures and
//! 5xx responses back off exponentially with jitter. Everything else is
//! returned immediately. After `max_retries` retries the last error is
//! returned to the caller.

use std::future::Future;
use std::time::Duration;

use crate::error::XApiError;

const MAX_BACKOFF_MS: u64 = 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub rate_limit_cooldown_secs: u64,
    pub backoff_base_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            rate_limit_cooldown_secs: 900,
            backoff_base_ms: 1_000,
        }
    }
}

impl RetryPolicy {
    /// No retries at all; used by tests that assert on the first failure.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            rate_limit_cooldown_secs: 0,
            backoff_base_ms: 0,
        }
    }

    /// Delay before retry number `attempt` (1-based), or `None` when `err`
    /// should not be retried.
    fn delay_for(&self, err: &XApiError, attempt: u32) -> Option<Duration> {
        match err {
            XApiError::RateLimited {
                retry_after_secs, ..
            } => Some(Duration::from_secs(self.rate_limit_wait_secs(*retry_after_secs))),
            XApiError::Http(e)
                if e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|s| s.is_server_error()) =>
            {
                Some(self.backoff(attempt))
            }
            XApiError::UnexpectedStatus { status, .. } if *status >= 500 => {
                Some(self.backoff(attempt))
            }
            _ => None,
        }
    }

    /// The reset time reported by the API when it sent one, never longer than
    /// the configured cooldown. Falls back to the cooldown.
    fn rate_limit_wait_secs(&self, retry_after_secs: u64) -> u64 {
        if retry_after_secs == 0 {
            self.rate_limit_cooldown_secs
        } else {
            retry_after_secs.min(self.rate_limit_cooldown_secs)
        }
    }

    /// Upper bound on the wall-clock time of one call made under this policy,
    /// when every attempt runs for `request_timeout` and every retry waits
    /// the longest possible delay.
    #[must_use]
    pub fn worst_case(&self, request_timeout: Duration) -> Duration {
        let longest_wait = Duration::from_secs(self.rate_limit_cooldown_secs)
            .max(Duration::from_millis(MAX_BACKOFF_MS * 5 / 4));
        request_timeout
            .saturating_mul(self.max_retries.saturating_add(1))
            .saturating_add(longest_wait.saturating_mul(self.max_retries))
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let computed = self
            .backoff_base_ms
            .saturating_mul(1u64 << attempt.saturating_sub(1).min(10));
        let capped = computed.min(MAX_BACKOFF_MS);
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let jittered = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
        Duration::from_millis(jittered)
    }
}

/// Runs `operation`, retrying according to `policy`.
pub(crate) async fn retry_with_policy<T, F, Fut>(
    policy: RetryPolicy,
    endpoint: &str,
    mut operation: F,
) -> Result<T, XApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, XApiError>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= policy.max_retries {
                    return Err(err);
                }
                let Some(delay) = policy.delay_for(&err, attempt + 1) else {
                    return Err(err);
                };
                attempt += 1;
                #[allow(clippy::cast_possible_truncation)]
                let delay_ms = delay.as_millis() as u64;
                tracing::warn!(
                    endpoint,
                    attempt,
                    max_retries = policy.max_retries,
                    delay_ms,
                    error = %err,
                    "X API call failed, retrying after delay"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    fn is_retriable(err: &XApiError) -> bool {
        RetryPolicy::default().delay_for(err, 1).is_some()
    }

    fn rate_limited() -> XApiError {
        XApiError::RateLimited {
            endpoint: "/2/tweets/search/recent".to_owned(),
            retry_after_secs: 900,
        }
    }

    fn instant_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            rate_limit_cooldown_secs: 0,
            backoff_base_ms: 0,
        }
    }

    #[test]
    fn rate_limited_is_retriable() {
        assert!(is_retriable(&rate_limited()));
    }

    #[test]
    fn server_error_status_is_retriable() {
        assert!(is_retriable(&XApiError::UnexpectedStatus {
            status: 503,
            endpoint: "x".to_owned(),
            body: String::new(),
        }));
    }

    #[test]
    fn client_error_status_is_not_retriable() {
        assert!(!is_retriable(&XApiError::UnexpectedStatus {
            status: 403,
            endpoint: "x".to_owned(),
            body: String::new(),
        }));
    }

    #[test]
    fn submission_failure_is_not_retriable() {
        assert!(!is_retriable(&XApiError::Submission("exit 1".to_owned())));
    }

    #[test]
    fn rate_limit_waits_the_fixed_cooldown() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.delay_for(&rate_limited(), 3),
            Some(Duration::from_secs(900))
        );
    }

    #[test]
    fn rate_limit_waits_for_reported_reset() {
        let policy = RetryPolicy::default();
        let err = XApiError::RateLimited {
            endpoint: "x".to_owned(),
            retry_after_secs: 42,
        };
        assert_eq!(policy.delay_for(&err, 1), Some(Duration::from_secs(42)));
    }

    #[test]
    fn reported_reset_is_capped_at_cooldown() {
        let policy = RetryPolicy {
            rate_limit_cooldown_secs: 60,
            ..RetryPolicy::default()
        };
        let err = XApiError::RateLimited {
            endpoint: "x".to_owned(),
            retry_after_secs: 3_600,
        };
        assert_eq!(policy.delay_for(&err, 1), Some(Duration::from_secs(60)));
    }

    #[test]
    fn rate_limit_without_reset_waits_cooldown() {
        let policy = RetryPolicy::default();
        let err = XApiError::RateLimited {
            endpoint: "x".to_owned(),
            retry_after_secs: 0,
        };
        assert_eq!(policy.delay_for(&err, 1), Some(Duration::from_secs(900)));
    }

    #[test]
    fn worst_case_covers_every_retry_waiting_the_cooldown() {
        let policy = RetryPolicy::default();
        let budget = policy.worst_case(Duration::from_secs(60));
        assert_eq!(budget, Duration::from_secs(4 * 60 + 3 * 900));
    }

    #[test]
    fn worst_case_without_retries_is_one_request() {
        assert_eq!(
            RetryPolicy::none().worst_case(Duration::from_secs(5)),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn backoff_is_capped() {
        let policy = RetryPolicy {
            max_retries: 20,
            rate_limit_cooldown_secs: 0,
            backoff_base_ms: 10_000,
        };
        let delay = policy.backoff(15);
        assert!(delay <= Duration::from_millis(MAX_BACKOFF_MS * 5 / 4));
    }

    #[tokio::test]
    async fn succeeds_immediately_on_first_try() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_policy(instant_policy(3), "test", || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<u32, XApiError>(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_rate_limit_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_policy(instant_policy(3), "test", || {
            let c = Arc::clone(&c);
            async move {
                let attempt = c.fetch_add(1, Ordering::SeqCst) + 1;
                if attempt < 3 {
                    Err(rate_limited())
                } else {
                    Ok(7)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_policy(instant_policy(2), "test", || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(rate_limited())
            }
        })
        .await;
        assert!(matches!(result, Err(XApiError::RateLimited { .. })));
        assert_eq!(
            calls.load(Ordering::SeqCst),
            3,
            "one initial attempt plus two retries"
        );
    }

    #[tokio::test]
    async fn does_not_retry_malformed_post() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_policy(instant_policy(3), "test", || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(XApiError::MalformedPost {
                    post_id: "1".to_owned(),
                    reason: "missing author_id".to_owned(),
                })
            }
        })
        .await;
        assert!(matches!(result, Err(XApiError::MalformedPost { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
