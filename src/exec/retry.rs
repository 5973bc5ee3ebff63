// src/exec/retry.rs

//! Exponential backoff for retryable task errors.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::exec::error::TaskError;

/// Delay schedule between attempts.
///
/// The attempt budget itself comes from the workflow (`max_retries`), the
/// delays from here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub backoff_multiplier: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    GiveUp,
}

/// Final result of a retried operation.
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub result: Result<T, TaskError>,
    pub attempts: u32,
}

impl RetryPolicy {
    /// Delay that follows `current`, capped at `max_delay`.
    pub fn next_delay(&self, current: Duration) -> Duration {
        Duration::try_from_secs_f64(current.as_secs_f64() * self.backoff_multiplier)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Decide whether attempt number `attempt` (1-based) should be followed
    /// by another one.
    pub fn decide(
        &self,
        error: &TaskError,
        attempt: u32,
        max_attempts: u32,
        delay: Duration,
    ) -> RetryDecision {
        if !error.is_retryable() || attempt >= max_attempts {
            RetryDecision::GiveUp
        } else {
            RetryDecision::RetryAfter(delay)
        }
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or
    /// `max_attempts` attempts have been made. At least one attempt is
    /// always made.
    pub async fn run<T, F, Fut>(&self, max_attempts: u32, mut op: F) -> RetryOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, TaskError>>,
    {
        let max_attempts = max_attempts.max(1);
        let mut delay = self.initial_delay.min(self.max_delay);
        let mut attempt = 1;

        loop {
            match op(attempt).await {
                Ok(value) => {
                    return RetryOutcome {
                        result: Ok(value),
                        attempts: attempt,
                    };
                }
                Err(err) => match self.decide(&err, attempt, max_attempts, delay) {
                    RetryDecision::RetryAfter(wait) => {
                        warn!(
                            attempt,
                            max_attempts,
                            delay_ms = wait.as_millis() as u64,
                            error = %err,
                            "attempt failed; retrying"
                        );
                        tokio::time::sleep(wait).await;
                        delay = self.next_delay(delay);
                        attempt += 1;
                    }
                    RetryDecision::GiveUp => {
                        debug!(attempt, retryable = err.is_retryable(), "giving up");
                        return RetryOutcome {
                            result: Err(err),
                            attempts: attempt,
                        };
                    }
                },
            }
        }
    }
}
