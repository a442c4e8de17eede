//! Bounded exponential-backoff retry over async provider calls

use std::future::Future;
use std::time::Duration;

use crate::error::{ProviderError, RawFailure, classify};

/// Retries after the first attempt
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Delay before the first retry; doubled for each subsequent one
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(1500);

/// How often and how patiently a provider call is retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: DEFAULT_INITIAL_DELAY,
        }
    }
}

impl RetryPolicy {
    pub const fn new(max_retries: u32, initial_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
        }
    }

    /// Total number of calls the policy allows
    pub const fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Backoff before retry number `attempt` (zero-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.initial_delay.saturating_mul(2_u32.saturating_pow(attempt))
    }
}

/// A retry about to happen
#[derive(Debug, Clone)]
pub struct RetryAttempt {
    /// 1-based number of the attempt that failed
    pub attempt: u32,
    /// Sleep before the next attempt
    pub delay: Duration,
    /// Classified failure that triggered the retry
    pub error: ProviderError,
}

/// Run a provider call under `policy`, classifying raw failures
pub async fn with_retries<T, F, Fut>(policy: &RetryPolicy, call: F) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RawFailure>>,
{
    retry_with(policy, call, classify, |_| {}).await
}

/// Run `call` until it succeeds, fails with a non-retryable error, or the
/// attempt budget runs out
///
/// Every failure goes through `classify`. Only rate limits and network
/// failures are retried; anything else is returned at once. When the budget
/// is exhausted the last classified error is returned unchanged.
/// `on_retry` sees each retry before its backoff sleep.
pub async fn retry_with<T, E, F, Fut, C, O>(
    policy: &RetryPolicy,
    mut call: F,
    classify: C,
    mut on_retry: O,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(E) -> ProviderError,
    O: FnMut(&RetryAttempt),
{
    let mut attempt = 0;

    loop {
        let error = match call().await {
            Ok(value) => return Ok(value),
            Err(raw) => classify(raw),
        };

        attempt += 1;

        if !error.is_retryable() || attempt >= policy.max_attempts() {
            return Err(error);
        }

        let delay = policy.delay_for(attempt - 1);

        let retry = RetryAttempt { attempt, delay, error };

        tracing::warn!(
            attempt = retry.attempt,
            max_attempts = policy.max_attempts(),
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            kind = %retry.error.kind(),
            detail = retry.error.detail(),
            "provider call failed, retrying"
        );

        on_retry(&retry);
        tokio::time::sleep(delay).await;
    }
}
