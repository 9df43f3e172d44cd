//! State-refresh loop
//!
//! Polls a describe call until the vendor object reaches a target status.
//! A refresh step returns:
//!
//! - `Ok(Some(Refreshed))` when the object was found, with its status;
//! - `Ok(None)` when it does not exist;
//! - `Err(_)` when it reported a failure status or the describe call failed.
//!
//! An `Err` ends the wait at once; the loop never polls past a known failure.

use std::future::Future;
use std::time::Duration;

use serde_json::Value;
use tokio::time::{Instant, sleep};

use crate::error::{ProviderError, Result};
use crate::utils::json_path;

/// A found object and its current status.
#[derive(Debug, Clone, PartialEq)]
pub struct Refreshed {
    pub object: Value,
    pub status: String,
}

/// Wait parameters.
#[derive(Debug, Clone)]
pub struct StateRefreshConf {
    pub pending: Vec<String>,
    /// Empty target means "wait until the object is gone".
    pub target: Vec<String>,
    pub timeout: Duration,
    /// Sleep before the first poll.
    pub delay: Duration,
    pub poll_interval: Duration,
    /// Consecutive not-found polls tolerated while waiting for a target.
    pub not_found_checks: u32,
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

impl StateRefreshConf {
    pub fn new(pending: &[&str], target: &[&str], timeout: Duration) -> Self {
        Self {
            pending: to_strings(pending),
            target: to_strings(target),
            timeout,
            delay: Duration::from_secs(5),
            poll_interval: Duration::from_secs(3),
            not_found_checks: 20,
        }
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn with_not_found_checks(mut self, checks: u32) -> Self {
        self.not_found_checks = checks;
        self
    }

    /// Polls `refresh` until a target status is reached.
    ///
    /// Returns the final object, or `None` when waiting for deletion and the
    /// object is gone.
    pub async fn wait_for_state<F, Fut>(&self, id: &str, mut refresh: F) -> Result<Option<Refreshed>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<Refreshed>>>,
    {
        let deadline = Instant::now() + self.timeout;
        let mut last_status: Option<String> = None;
        let mut not_found = 0_u32;

        log::debug!(
            "Waiting for '{id}' to become [{}] (timeout {}s)",
            self.target.join(", "),
            self.timeout.as_secs()
        );
        sleep(self.delay.min(self.timeout)).await;

        loop {
            match refresh().await? {
                None if self.target.is_empty() => return Ok(None),
                None => {
                    not_found += 1;
                    if not_found > self.not_found_checks {
                        return Err(ProviderError::NotFound {
                            resource: "object".to_string(),
                            id: id.to_string(),
                            raw_code: None,
                            raw_message: Some(format!(
                                "still missing after {not_found} checks while waiting for [{}]",
                                self.target.join(", ")
                            )),
                        });
                    }
                }
                Some(found) => {
                    not_found = 0;
                    if self.target.contains(&found.status) {
                        return Ok(Some(found));
                    }
                    // An empty pending list accepts any interim status
                    if !self.pending.is_empty() && !self.pending.contains(&found.status) {
                        return Err(ProviderError::UnexpectedState {
                            id: id.to_string(),
                            status: found.status,
                            expected: self.target.clone(),
                        });
                    }
                    log::debug!("'{id}' is {}, waiting", found.status);
                    last_status = Some(found.status);
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(ProviderError::WaitTimeout {
                    id: id.to_string(),
                    target: self.target.clone(),
                    last_status,
                    timeout_secs: self.timeout.as_secs(),
                });
            }
            sleep(self.poll_interval.min(deadline - now)).await;
        }
    }
}

/// Converts a describe result into a refresh outcome.
///
/// Not found becomes `None`; a status listed in `fail_states` becomes
/// [`ProviderError::FailedToReachTarget`].
pub fn status_refresh(
    id: &str,
    described: Result<Value>,
    status_path: &str,
    fail_states: &[&str],
) -> Result<Option<Refreshed>> {
    let object = match described {
        Ok(object) => object,
        Err(e) if e.is_not_found() => return Ok(None),
        Err(e) => return Err(e),
    };
    let status = json_path::get_string(&object, status_path).unwrap_or_default();
    if fail_states.contains(&status.as_str()) {
        return Err(ProviderError::FailedToReachTarget {
            id: id.to_string(),
            status,
            reason: None,
        });
    }
    Ok(Some(Refreshed { object, status }))
}
