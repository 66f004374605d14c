//! Bounded retry for eventually-consistent remote state

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::error::{HarnessError, RemoteError, RemoteResult, Result};

/// Attempt budget and spacing for a readiness wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(10, Duration::from_secs(5))
    }
}

/// Polls `check` until it succeeds, fails hard, or the budget runs out.
///
/// Only [`RemoteError::Transient`] triggers another attempt; not-found and
/// fatal errors abort the wait immediately. A budget of N makes at most N
/// attempts with N-1 sleeps between them, so a budget of 1 means a single
/// attempt and no sleep. Exhaustion surfaces the last observed error inside
/// [`HarnessError::Exhausted`].
pub async fn wait_until<T, F, Fut>(policy: RetryPolicy, what: &str, mut check: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = RemoteResult<T>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut last = RemoteError::Transient(format!("{what} was never checked"));
    for attempt in 1..=attempts {
        match check().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() => {
                debug!(what, attempt, max = attempts, "not ready yet: {}", err);
                last = err;
                if attempt < attempts {
                    tokio::time::sleep(policy.interval).await;
                }
            }
            Err(err) => return Err(err.into()),
        }
    }
    Err(HarnessError::Exhausted {
        what: what.to_string(),
        attempts,
        last,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    #[tokio::test]
    async fn test_returns_first_success_without_further_attempts() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let policy = RetryPolicy::new(5, Duration::from_millis(10));
        let value = wait_until(policy, "instant readiness", move || {
            let seen = seen.clone();
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok::<_, RemoteError>(7)
            }
        })
        .await
        .unwrap();
        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_transient_failures_until_ready() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let policy = RetryPolicy::new(5, Duration::from_millis(5));
        let value = wait_until(policy, "role propagation", move || {
            let seen = seen.clone();
            async move {
                if seen.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(RemoteError::Transient("AccessDenied".into()))
                } else {
                    Ok("ready")
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(value, "ready");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_reports_budget_and_last_error() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let err = wait_until(policy, "stack readiness", || async {
            Err::<(), _>(RemoteError::Transient("still CREATE_IN_PROGRESS".into()))
        })
        .await
        .unwrap_err();
        match err {
            HarnessError::Exhausted {
                what,
                attempts,
                last,
            } => {
                assert_eq!(what, "stack readiness");
                assert_eq!(attempts, 3);
                assert_eq!(
                    last,
                    RemoteError::Transient("still CREATE_IN_PROGRESS".into())
                );
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fatal_errors_abort_without_retrying() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let policy = RetryPolicy::new(10, Duration::from_millis(1));
        let err = wait_until(policy, "doomed check", move || {
            let seen = seen.clone();
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(RemoteError::Fatal("template is malformed".into()))
            }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, HarnessError::Remote(RemoteError::Fatal(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_not_found_aborts_without_retrying() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let policy = RetryPolicy::new(10, Duration::from_millis(1));
        let err = wait_until(policy, "missing document", move || {
            let seen = seen.clone();
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(RemoteError::NotFound("no such document".into()))
            }
        })
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            HarnessError::Remote(RemoteError::NotFound(_))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_single_attempt_budget_never_sleeps() {
        let policy = RetryPolicy::new(1, Duration::from_secs(5));
        let started = Instant::now();
        let err = wait_until(policy, "one shot", || async {
            Err::<(), _>(RemoteError::Transient("not yet".into()))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, HarnessError::Exhausted { attempts: 1, .. }));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_attempts_are_spaced_by_the_interval() {
        let interval = Duration::from_millis(20);
        let policy = RetryPolicy::new(3, interval);
        let started = Instant::now();
        let _ = wait_until(policy, "spaced", || async {
            Err::<(), _>(RemoteError::Transient("not yet".into()))
        })
        .await;
        // 3 attempts bracket 2 sleeps.
        assert!(started.elapsed() >= interval * 2);
    }

    #[tokio::test]
    async fn test_zero_budget_is_clamped_to_one_attempt() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let policy = RetryPolicy::new(0, Duration::from_millis(1));
        let err = wait_until(policy, "clamped", move || {
            let seen = seen.clone();
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(RemoteError::Transient("not yet".into()))
            }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, HarnessError::Exhausted { attempts: 1, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
