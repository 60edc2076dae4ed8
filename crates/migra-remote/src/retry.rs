//! Retrying remote calls
//!
//! [`with_retry`] runs an operation up to `max_retries + 1` times with
//! exponential, jittered backoff between attempts. Only
//! [`RemoteError::is_retryable`] failures are retried; cancellation is checked
//! before every attempt and every sleep, and races both.

use crate::abort::AbortSignal;
use crate::error::RemoteError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Backoff policy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds
    pub base_delay_ms: u64,
    /// Delay ceiling, in milliseconds
    pub max_delay_ms: u64,
    /// Random jitter as a fraction of the delay (0.25 = +/-25%)
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 16_000,
            jitter: 0.25,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Set the retry count
    #[inline]
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set base and maximum delay
    #[inline]
    #[must_use]
    pub fn with_delays(mut self, base: Duration, max: Duration) -> Self {
        self.base_delay_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
        self.max_delay_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the jitter fraction (clamped to [0, 1])
    #[inline]
    #[must_use]
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = if jitter.is_finite() { jitter.clamp(0.0, 1.0) } else { 0.0 };
        self
    }

    /// Un-jittered delay before retry number `retry` (1-based)
    ///
    /// `base * 2^(retry-1)`, capped at `max_delay_ms`.
    #[must_use]
    pub fn base_delay(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let multiplier = 2u64.saturating_pow(retry - 1);
        Duration::from_millis(self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms))
    }

    /// Jittered delay before retry number `retry` (1-based)
    #[must_use]
    pub fn delay(&self, retry: u32) -> Duration {
        let base = self.base_delay(retry);
        // non-finite jitter means none
        let jitter = if self.jitter.is_finite() { self.jitter.clamp(0.0, 1.0) } else { 0.0 };
        if jitter == 0.0 || base.is_zero() {
            return base;
        }
        let factor = rand::rng().random_range(1.0 - jitter..=1.0 + jitter);
        base.mul_f64(factor)
    }
}

/// Run `op` with retries
///
/// `label` names the call in logs. The last error is returned unchanged once
/// retries are exhausted or a non-retryable error occurs.
///
/// # Errors
///
/// - [`RemoteError::Aborted`] as soon as `signal` fires
/// - The operation's own error when it is not retryable
/// - The last retryable error after `max_retries` retries
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    signal: &AbortSignal,
    label: &str,
    mut op: F,
) -> Result<T, RemoteError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RemoteError>>,
{
    let mut attempt: u32 = 0;
    loop {
        signal.check()?;
        let result = signal.run(op()).await?;

        let err = match result {
            Ok(value) => {
                if attempt > 0 {
                    tracing::info!("{} succeeded after {} retries", label, attempt);
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if err.is_abort() {
            return Err(err);
        }
        if !err.is_retryable() || attempt >= policy.max_retries {
            if attempt > 0 {
                tracing::warn!("{} failed after {} retries: {}", label, attempt, err);
            }
            return Err(err);
        }

        attempt += 1;
        let delay = policy.delay(attempt);
        tracing::warn!(
            "{} failed ({}), retry {}/{} in {}ms",
            label,
            err,
            attempt,
            policy.max_retries,
            delay.as_millis()
        );

        signal.check()?;
        signal.run(tokio::time::sleep(delay)).await?;
    }
}
