//! Retry policy shared by every network-calling component
//!
//! A policy is a fixed attempt count plus a fixed delay between attempts.
//! Callers decide which errors are retryable; everything else is returned
//! immediately.

use crate::config::HttpConfig;
use crate::FetchError;
use std::future::Future;
use std::time::Duration;

/// Error returned once a retried operation gives up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryFailure<E> {
    /// The last error observed
    pub error: E,

    /// How many attempts were made, including the first
    pub attempts: u32,
}

impl RetryFailure<FetchError> {
    /// Folds the attempt count into a transport error
    pub fn into_fetch_error(self) -> FetchError {
        match self.error {
            FetchError::Transport { message, .. } => FetchError::Transport {
                attempts: self.attempts,
                message,
            },
            other => other,
        }
    }
}

/// Fixed-count, fixed-delay retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy; `max_attempts` is clamped to at least one
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Builds the policy described by the `[http]` configuration
    pub fn from_config(config: &HttpConfig) -> Self {
        Self::new(config.retry_attempts, config.retry_delay())
    }

    /// A policy that never retries
    pub fn single_attempt() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable error,
    /// or the attempt budget is spent
    ///
    /// `operation` receives the 1-based attempt number.
    pub async fn run<T, E, F, Fut, P>(
        &self,
        label: &str,
        mut operation: F,
        is_retryable: P,
    ) -> Result<T, RetryFailure<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) if is_retryable(&error) && attempt < self.max_attempts => {
                    tracing::warn!(
                        "{} failed, retry {}/{}: {}",
                        label,
                        attempt,
                        self.max_attempts,
                        error
                    );
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                Err(error) => {
                    return Err(RetryFailure {
                        error,
                        attempts: attempt,
                    })
                }
            }
        }
    }
}
