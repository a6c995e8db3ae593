//! Fixed-interval retry policy
//!
//! The data request is retried a bounded number of times with a constant pause
//! between attempts. The pause is produced by a pluggable delay function so
//! tests can run without sleeping.
//!
//! # Example
//!
//! ```no_run
//! use siaet_dl::retry::{Attempt, RetryPolicy, retry_attempts};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let policy = RetryPolicy::fixed(3, Duration::from_secs(5));
//! let value = retry_attempts(&policy, |attempt| async move {
//!     if attempt < 2 { Attempt::Retry("busy") } else { Attempt::Done("ok") }
//! })
//! .await;
//! assert_eq!(value.value, "ok");
//! # }
//! ```

use crate::config::RetryConfig;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

type DelayFn = Arc<dyn Fn(u32) -> Duration + Send + Sync>;

/// How many attempts to make and how long to wait between them
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: DelayFn,
}

impl RetryPolicy {
    /// Constant `delay` between at most `max_attempts` attempts
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self::with_delay_fn(max_attempts, move |_| delay)
    }

    /// No waiting between attempts
    pub fn no_delay(max_attempts: u32) -> Self {
        Self::fixed(max_attempts, Duration::ZERO)
    }

    /// Custom delay; `f` receives the number of the attempt that just failed
    pub fn with_delay_fn<F>(max_attempts: u32, f: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        Self {
            max_attempts: max_attempts.max(1),
            delay: Arc::new(f),
        }
    }

    /// Attempt cap (at least 1)
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Pause after failed attempt number `attempt`
    pub fn delay_after(&self, attempt: u32) -> Duration {
        (self.delay)(attempt)
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        RetryPolicy::fixed(config.max_attempts, config.delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::from(&RetryConfig::default())
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("first_delay", &self.delay_after(1))
            .finish()
    }
}

/// Verdict of one attempt
#[derive(Clone, Debug, PartialEq)]
pub enum Attempt<T> {
    /// Stop here and return the value
    Done(T),
    /// Try again if attempts remain; otherwise return the value
    Retry(T),
}

/// Final value with the number of attempts it took
#[derive(Clone, Debug, PartialEq)]
pub struct Attempted<T> {
    /// Value of the last attempt
    pub value: T,
    /// Attempts made, between 1 and the policy cap
    pub attempts: u32,
}

/// Run `operation` until it returns [`Attempt::Done`] or the cap is reached
///
/// `operation` receives the 1-based attempt number. Between two attempts the
/// policy delay is awaited, so `n` attempts observe exactly `n - 1` delays.
pub async fn retry_attempts<F, Fut, T>(policy: &RetryPolicy, mut operation: F) -> Attempted<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Attempt<T>>,
{
    let mut attempt = 1;
    loop {
        match operation(attempt).await {
            Attempt::Done(value) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "Operation finished after retry");
                }
                return Attempted {
                    value,
                    attempts: attempt,
                };
            }
            Attempt::Retry(value) if attempt >= policy.max_attempts() => {
                tracing::error!(
                    attempts = attempt,
                    "Operation failed after all retry attempts exhausted"
                );
                return Attempted {
                    value,
                    attempts: attempt,
                };
            }
            Attempt::Retry(_) => {
                let delay = policy.delay_after(attempt);
                tracing::warn!(
                    attempt,
                    max_attempts = policy.max_attempts(),
                    delay_ms = delay.as_millis() as u64,
                    "Attempt failed, retrying"
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                attempt += 1;
            }
        }
    }
}
