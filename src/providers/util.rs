use anyhow::Error;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// How often and how patiently a provider retries a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub retries: usize,
    /// Delay before the first retry; doubles on every further retry.
    pub initial_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            retries: 2,
            initial_delay_ms: 250,
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        RetryPolicy {
            retries: 0,
            initial_delay_ms: 0,
        }
    }
}

/// Retries a transport-level failure of an async request.
///
/// Only errors returned by `operation` are retried; a response with an
/// error status is passed through to the caller unchanged.
pub async fn with_retry<F, Fut, T>(mut operation: F, policy: RetryPolicy) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, reqwest::Error>>,
{
    let mut attempt = 0;
    let mut delay = policy.initial_delay_ms;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(err) if attempt >= policy.retries => return Err(err.into()),
            Err(err) => {
                attempt += 1;
                debug!(
                    "Attempt {}/{} failed: {}. Retrying in {}ms...",
                    attempt,
                    policy.retries + 1,
                    err,
                    delay
                );
                tokio::time::sleep(Duration::from_millis(delay)).await;
                delay = delay.saturating_mul(2);
            }
        }
    }
}
