//! Fixed-delay bounded retry
//!
//! The delay is applied before every attempt, including the first: the
//! dependency being retried (a freshly restarted service) needs time to come up.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::observability::{log_event_with_fields, Event};

/// Retry bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, at least 1
    pub max_attempts: u32,
    /// Sleep before each attempt
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

/// What a retried call ended with
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    /// Attempts actually made
    pub attempts: u32,
    pub result: Result<T, E>,
}

/// Call `op` until it succeeds or `policy.max_attempts` attempts have been made.
///
/// `op` receives the 1-based attempt number. The last error is returned on
/// exhaustion.
pub async fn retry_fixed<T, E, F, Fut>(policy: RetryPolicy, mut op: F) -> RetryOutcome<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        if !policy.delay.is_zero() {
            tokio::time::sleep(policy.delay).await;
        }

        match op(attempt).await {
            Ok(value) => {
                return RetryOutcome {
                    attempts: attempt,
                    result: Ok(value),
                }
            }
            Err(err) if attempt >= max_attempts => {
                return RetryOutcome {
                    attempts: attempt,
                    result: Err(err),
                }
            }
            Err(err) => {
                let attempt_str = attempt.to_string();
                let max_str = max_attempts.to_string();
                let reason = err.to_string();
                log_event_with_fields(
                    Event::BootstrapRetry,
                    &[
                        ("attempt", attempt_str.as_str()),
                        ("max_attempts", max_str.as_str()),
                        ("reason", reason.as_str()),
                    ],
                );
            }
        }
    }
}
