//! Retry policy for task dispatch.
//!
//! A failed attempt is retried while `failures <= max_retries`, sleeping
//! `backoff(failures)` in between. Fatal errors short-circuit the loop.

use std::{future::Future, time::Duration};

/// Delay function keyed by the number of failures so far (starting at 1).
#[derive(Clone, Debug, PartialEq)]
pub enum Backoff {
    /// `base * failures`
    Linear { base: Duration },
    /// `initial * multiplier^(failures - 1)`, capped at `max`
    Exponential {
        initial: Duration,
        multiplier: f64,
        max: Duration,
    },
}

impl Backoff {
    pub fn delay(&self, failures: u32) -> Duration {
        let failures = failures.max(1);
        match self {
            Backoff::Linear { base } => base.saturating_mul(failures),
            Backoff::Exponential {
                initial,
                multiplier,
                max,
            } => {
                let factor = multiplier.max(1.0).powi(failures.saturating_sub(1) as i32);
                let scaled = initial.as_secs_f64() * factor;
                if !scaled.is_finite() || scaled >= max.as_secs_f64() {
                    *max
                } else {
                    Duration::from_secs_f64(scaled)
                }
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::linear(3, Duration::from_millis(1000))
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: Backoff) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    /// Linear backoff: the n-th retry waits `base * n`.
    pub fn linear(max_retries: u32, base: Duration) -> Self {
        Self::new(max_retries, Backoff::Linear { base })
    }

    /// A single attempt and no waiting.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::linear(0, Duration::ZERO)
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Total attempts allowed, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Whether another attempt is allowed after `failures` failed ones.
    pub fn should_retry(&self, failures: u32) -> bool {
        failures <= self.max_retries
    }

    pub fn delay_for(&self, failures: u32) -> Duration {
        self.backoff.delay(failures)
    }
}

/// Failure of a single attempt.
#[derive(Debug)]
pub enum AttemptError<E> {
    /// Counts against the retry budget
    Retryable(String),
    /// Stops the loop immediately
    Fatal(E),
}

/// Successful result and the failures that preceded it.
#[derive(Debug)]
pub struct Retried<T> {
    pub value: T,
    pub failures: Vec<String>,
}

/// Why the retry loop gave up.
#[derive(Debug)]
pub enum RetryError<E> {
    /// Every allowed attempt failed; holds one message per failure
    Exhausted { failures: Vec<String> },
    /// A fatal error stopped the loop after `failures`
    Fatal { error: E, failures: Vec<String> },
}

impl<E> RetryError<E> {
    pub fn failures(&self) -> &[String] {
        match self {
            RetryError::Exhausted { failures } | RetryError::Fatal { failures, .. } => failures,
        }
    }
}

/// Run `operation` until it succeeds, fails fatally or the policy gives up.
///
/// `operation` receives the 1-based attempt number.
pub async fn execute_with_retry<T, E, Op, Fut>(
    policy: &RetryPolicy,
    mut operation: Op,
) -> Result<Retried<T>, RetryError<E>>
where
    Op: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, AttemptError<E>>>,
{
    let mut failures: Vec<String> = Vec::new();

    loop {
        let attempt = failures.len() as u32 + 1;
        match operation(attempt).await {
            Ok(value) => return Ok(Retried { value, failures }),
            Err(AttemptError::Fatal(error)) => return Err(RetryError::Fatal { error, failures }),
            Err(AttemptError::Retryable(message)) => {
                if !policy.should_retry(attempt) {
                    failures.push(message);
                    return Err(RetryError::Exhausted { failures });
                }
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    attempt = attempt,
                    max_retries = policy.max_retries(),
                    delay_ms = delay.as_millis() as u64,
                    error = %message,
                    "Attempt failed; retrying"
                );
                failures.push(message);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
