//! Bounded retry for vendor calls
//!
//! Transport failures are already retried by [`crate::http_client`]. This
//! layer retries *vendor* conditions: throttling reported in the body, busy
//! backends, and the per-call-site codes a handler knows are transient
//! (`TaskConflict`, `IncorrectInstanceStatus`, ...). Retries stop at the
//! operation deadline and the last error is returned.

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep};

use crate::error::{ProviderError, Result};

/// Vendor codes that are always worth retrying.
const TRANSIENT_CODES: &[&str] = &[
    "ServiceUnavailable",
    "InternalError",
    "SystemBusy",
    "UnknownError",
    "OperationConflict",
];

/// Outcome of one attempt inside [`retry`].
#[derive(Debug)]
pub enum RetryError {
    /// Sleep and try again (until the deadline).
    Retryable(ProviderError),
    /// Give up immediately.
    NonRetryable(ProviderError),
}

impl RetryError {
    pub fn into_inner(self) -> ProviderError {
        match self {
            Self::Retryable(e) | Self::NonRetryable(e) => e,
        }
    }
}

/// Sleep schedule between attempts: `first`, `first + step`, ... capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncrementalWait {
    pub first: Duration,
    pub step: Duration,
    pub max: Duration,
}

impl Default for IncrementalWait {
    fn default() -> Self {
        Self::new(Duration::from_secs(3), Duration::from_secs(3))
    }
}

impl IncrementalWait {
    pub fn new(first: Duration, step: Duration) -> Self {
        Self {
            first,
            step,
            max: Duration::from_secs(30),
        }
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        self.first
            .saturating_add(self.step.saturating_mul(attempt))
            .min(self.max)
    }
}

/// Whether the error's vendor code is exactly one of `codes`.
pub fn is_expected_errors(err: &ProviderError, codes: &[&str]) -> bool {
    err.code().is_some_and(|code| codes.contains(&code))
}

/// Throttling, busy backends and transport hiccups.
pub fn need_retry(err: &ProviderError) -> bool {
    if err.is_retryable() {
        return true;
    }
    err.code().is_some_and(|code| {
        code.starts_with("Throttling")
            || code.starts_with("Unknown")
            || TRANSIENT_CODES.contains(&code)
    })
}

/// Classifies `err` for [`retry`]: retryable when [`need_retry`] says so or the
/// code is in the call site's `codes`.
pub fn retry_on(err: ProviderError, codes: &[&str]) -> RetryError {
    if need_retry(&err) || is_expected_errors(&err, codes) {
        RetryError::Retryable(err)
    } else {
        RetryError::NonRetryable(err)
    }
}

/// Runs `op` until it succeeds, fails non-retryably, or `timeout` elapses,
/// sleeping according to the default [`IncrementalWait`].
pub async fn retry<T, F, Fut>(timeout: Duration, op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, RetryError>>,
{
    retry_with(timeout, IncrementalWait::default(), op).await
}

/// [`retry`] with an explicit sleep schedule.
pub async fn retry_with<T, F, Fut>(timeout: Duration, wait: IncrementalWait, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, RetryError>>,
{
    let deadline = Instant::now() + timeout;
    let mut attempt = 0_u32;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(RetryError::NonRetryable(e)) => return Err(e),
            Err(RetryError::Retryable(e)) => {
                let delay = wait.delay(attempt);
                if Instant::now() + delay > deadline {
                    log::warn!(
                        "Giving up after {} attempt(s), deadline of {}s reached: {e}",
                        attempt + 1,
                        timeout.as_secs()
                    );
                    return Err(e);
                }
                log::warn!(
                    "Attempt {} failed, retrying in {:.1}s: {e}",
                    attempt + 1,
                    delay.as_secs_f32()
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn api(code: &str) -> ProviderError {
        ProviderError::Api {
            product: "vpc".into(),
            action: "CreateVpc".into(),
            raw_code: Some(code.into()),
            raw_message: "x".into(),
            request_id: None,
        }
    }

    #[test]
    fn incremental_wait_grows_and_caps() {
        let wait = IncrementalWait::new(Duration::from_secs(3), Duration::from_secs(5));
        assert_eq!(wait.delay(0), Duration::from_secs(3));
        assert_eq!(wait.delay(1), Duration::from_secs(8));
        assert_eq!(wait.delay(10), Duration::from_secs(30));
    }

    #[test]
    fn expected_errors_exact_match() {
        assert!(is_expected_errors(&api("TaskConflict"), &["TaskConflict"]));
        assert!(!is_expected_errors(&api("TaskConflict.Foo"), &["TaskConflict"]));
        assert!(is_expected_errors(
            &api("TaskConflict").context("CreateVpc", ""),
            &["TaskConflict"]
        ));
    }

    #[test]
    fn need_retry_classification() {
        assert!(need_retry(&api("Throttling.User")));
        assert!(need_retry(&api("ServiceUnavailable")));
        assert!(need_retry(&api("UnknownError")));
        assert!(!need_retry(&api("InvalidParameter")));
        assert!(need_retry(&ProviderError::NetworkError {
            product: "vpc".into(),
            detail: "reset".into(),
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = retry(Duration::from_secs(60), || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(retry_on(api("TaskConflict"), &["TaskConflict"]))
            } else {
                Ok("vpc-1")
            }
        })
        .await;
        assert_eq!(result.ok(), Some("vpc-1"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_returns_immediately() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = retry(Duration::from_secs(60), || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(retry_on(api("InvalidCidrBlock.Malformed"), &["TaskConflict"]))
        })
        .await;
        assert_eq!(
            result.err().and_then(|e| e.code().map(str::to_string)),
            Some("InvalidCidrBlock.Malformed".to_string())
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_surfaces_last_error() {
        let start = Instant::now();
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = retry(Duration::from_secs(10), || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(RetryError::Retryable(api("Throttling")))
        })
        .await;
        assert_eq!(
            result.err().and_then(|e| e.code().map(str::to_string)).as_deref(),
            Some("Throttling")
        );
        // sleeps of 3s then 6s fit in 10s; the third would not
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(start.elapsed() <= Duration::from_secs(10));
    }
}
