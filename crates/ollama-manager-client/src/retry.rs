//! Retry with exponential backoff for daemon requests

use std::{future::Future, time::Duration};

use tokio::time::sleep;
use tracing::{debug, warn};

const INITIAL_BACKOFF_MS: u64 = 100;
const MAX_BACKOFF_MS: u64 = 400;

/// When a failed request may be sent again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Idempotent requests are also retried after timeouts and 5xx answers;
    /// others only when the connection could not be established.
    pub idempotent: bool,
}

impl RetryPolicy {
    pub fn idempotent(max_retries: u32) -> Self {
        Self {
            max_retries,
            idempotent: true,
        }
    }

    pub fn connect_only(max_retries: u32) -> Self {
        Self {
            max_retries,
            idempotent: false,
        }
    }

    /// Backoff before retry number `attempt` (0-based): 100ms, 200ms, 400ms, 400ms...
    pub fn backoff(attempt: u32) -> Duration {
        let ms = INITIAL_BACKOFF_MS.saturating_mul(2_u64.saturating_pow(attempt));
        Duration::from_millis(ms.min(MAX_BACKOFF_MS))
    }

    fn should_retry(&self, result: &Result<reqwest::Response, reqwest::Error>) -> bool {
        match result {
            Ok(response) => self.idempotent && response.status().is_server_error(),
            Err(err) if err.is_connect() => true,
            Err(err) => self.idempotent && err.is_timeout(),
        }
    }
}

/// Execute `request_fn` until it succeeds, fails permanently, or the policy
/// runs out of retries. The last response or error is returned.
pub async fn execute_with_retry<F, Fut>(
    policy: RetryPolicy,
    mut request_fn: F,
) -> Result<reqwest::Response, reqwest::Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    let mut attempt = 0;

    loop {
        let result = request_fn().await;

        if attempt >= policy.max_retries || !policy.should_retry(&result) {
            if attempt > 0 && attempt >= policy.max_retries {
                debug!("Max retries ({}) reached", policy.max_retries);
            }
            return result;
        }

        let backoff = RetryPolicy::backoff(attempt);
        match &result {
            Ok(response) => warn!(
                "Daemon answered {} on attempt {}/{}, retrying after {:?}",
                response.status(),
                attempt + 1,
                policy.max_retries + 1,
                backoff
            ),
            Err(err) => warn!(
                "Transient error on attempt {}/{}, retrying after {:?}: {}",
                attempt + 1,
                policy.max_retries + 1,
                backoff,
                err
            ),
        }

        sleep(backoff).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_schedule() {
        assert_eq!(RetryPolicy::backoff(0), Duration::from_millis(100));
        assert_eq!(RetryPolicy::backoff(1), Duration::from_millis(200));
        assert_eq!(RetryPolicy::backoff(2), Duration::from_millis(400));
        assert_eq!(RetryPolicy::backoff(7), Duration::from_millis(400));
    }
}
