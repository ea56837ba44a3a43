//! Retry policy with exponential backoff.
//!
//! A [`RetryPolicy`] is a plain value: how many attempts, how long to wait
//! between them, and which errors are worth another try. The generic
//! [`attempt_with_policy`] helper runs an operation under a policy and
//! returns either the result or the terminal failure.
//!
//! # Example
//!
//! ```no_run
//! use sfexport_core::{RetryPolicy, attempt_with_policy};
//!
//! # async fn example() {
//! let policy = RetryPolicy::default();
//! let outcome = attempt_with_policy(&policy, |attempt| async move {
//!     // Your operation here
//!     Ok::<_, sfexport_core::Error>(attempt)
//! })
//! .await;
//! assert!(outcome.is_ok());
//! # }
//! ```

use std::fmt;
use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::error::Error;

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait exactly this long (server-specified rate limit).
    RetryAfter(Duration),
    /// Retry with no wait; the credential has already been replaced.
    Immediately,
    /// Wait the exponential backoff delay for this attempt.
    Backoff,
    /// Stop; the failure will not go away by retrying.
    GiveUp,
}

/// Retry configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt (total attempts = retries + 1).
    pub max_retries: u32,
    /// Delay before the first retry; doubles per attempt.
    pub base_delay: Duration,
    /// Upper bound for the exponential part of the delay.
    pub max_delay: Duration,
    /// Random jitter in `[0, jitter)` added to every backoff delay.
    pub jitter: Duration,
    /// Wait used for a rate limit response without `Retry-After`.
    pub rate_limit_fallback: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            jitter: Duration::from_secs(1),
            rate_limit_fallback: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Total attempts allowed by this policy.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Classify a failure.
    pub fn classify(&self, err: &Error) -> RetryDecision {
        if err.is_session_expired() {
            return RetryDecision::Immediately;
        }
        match err {
            Error::RateLimited { retry_after } => {
                RetryDecision::RetryAfter(retry_after.unwrap_or(self.rate_limit_fallback))
            }
            Error::Transport(_) | Error::Integrity(_) => RetryDecision::Backoff,
            Error::Protocol(p) if p.is_transient() => RetryDecision::Backoff,
            Error::Protocol(_)
            | Error::Auth(_)
            | Error::Storage(_)
            | Error::InvalidInput(_) => RetryDecision::GiveUp,
        }
    }

    /// Backoff delay after the failed attempt number `attempt` (0-based):
    /// `base * 2^attempt`, capped, plus jitter.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        let exponential = self.base_delay.saturating_mul(factor).min(self.max_delay);
        exponential + self.sample_jitter()
    }

    fn sample_jitter(&self) -> Duration {
        if self.jitter.is_zero() {
            return Duration::ZERO;
        }
        let mut rng = rand::thread_rng();
        Duration::from_secs_f64(rng.gen_range(0.0..self.jitter.as_secs_f64()))
    }
}

/// The terminal failure of [`attempt_with_policy`].
#[derive(Debug)]
pub struct RetryFailure {
    /// Attempts made before giving up.
    pub attempts: u32,
    /// The error of the last attempt.
    pub error: Error,
}

impl fmt::Display for RetryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (after {} attempt(s))", self.error, self.attempts)
    }
}

impl std::error::Error for RetryFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Run `operation` until it succeeds, the policy gives up, or the attempts
/// run out.
///
/// The operation receives the 0-based attempt number. Credential refresh on
/// expiry is the operation's job; the helper only decides whether to wait.
pub async fn attempt_with_policy<T, F, Fut>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, RetryFailure>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let max_attempts = policy.max_attempts();
    let mut attempt = 0;

    loop {
        let error = match operation(attempt).await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) => error,
        };

        let attempts = attempt + 1;
        let delay = match policy.classify(&error) {
            RetryDecision::RetryAfter(delay) => Some(delay),
            RetryDecision::Immediately => Some(Duration::ZERO),
            RetryDecision::Backoff => Some(policy.backoff_delay(attempt)),
            RetryDecision::GiveUp => None,
        };

        let Some(delay) = delay.filter(|_| attempts < max_attempts) else {
            tracing::debug!(
                error = %error,
                attempts,
                retryable = delay.is_some(),
                "Giving up"
            );
            return Err(RetryFailure { attempts, error });
        };

        tracing::warn!(
            error = %error,
            attempt = attempts,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            "Attempt failed, retrying"
        );

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        attempt += 1;
    }
}
