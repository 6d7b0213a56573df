use std::{fmt::Display, future::Future, time::Duration};

use crate::error::{RetryClass, Retryable};

/// Backoff multiplier applied when the upstream reports rate limiting.
pub const RATE_LIMIT_MULTIPLIER: f64 = 2.0;

/// Upper bound for any single wait, computed or requested by the upstream.
pub const MAX_DELAY: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub rate_limit_multiplier: f64,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            rate_limit_multiplier: RATE_LIMIT_MULTIPLIER,
        }
    }

    /// Delay before the attempt following failed attempt number `attempt`
    /// (attempts count from 0): `base * 2^(attempt+1) * multiplier`,
    /// capped at [`MAX_DELAY`].
    pub fn delay_for(&self, attempt: u32, multiplier: f64) -> Duration {
        let factor = 2f64.powi(attempt.saturating_add(1).min(30) as i32) * multiplier;
        Duration::try_from_secs_f64(self.base_delay.as_secs_f64() * factor)
            .map_or(MAX_DELAY, |d| d.min(MAX_DELAY))
    }

    /// Backoff for the failed attempt, stretched to the upstream's
    /// requested wait when that is longer.
    pub fn wait_after<E: Retryable>(&self, attempt: u32, multiplier: f64, err: &E) -> Duration {
        let backoff = self.delay_for(attempt, multiplier);
        match err.retry_after() {
            Some(hint) => backoff.max(hint.min(MAX_DELAY)),
            None => backoff,
        }
    }
}

/// Runs `op` until it succeeds, fails permanently, or `max_retries + 1`
/// attempts have been made. The last error is returned on exhaustion.
pub async fn run<T, E, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    let mut attempt: u32 = 0;

    loop {
        let err = match op().await {
            Ok(v) => {
                if attempt > 0 {
                    tracing::info!("{} succeeded after {} retries", label, attempt);
                }
                return Ok(v);
            }
            Err(e) => e,
        };

        let multiplier = match err.retry_class() {
            RetryClass::Permanent => {
                tracing::warn!("{} failed permanently: {}", label, err);
                return Err(err);
            }
            RetryClass::RateLimited => policy.rate_limit_multiplier,
            RetryClass::Transient => 1.0,
        };

        if attempt >= policy.max_retries {
            tracing::error!("{} failed after {} attempts: {}", label, attempt + 1, err);
            return Err(err);
        }

        let delay = policy.wait_after(attempt, multiplier, &err);
        tracing::warn!(
            "{} attempt {} failed: {}; retrying in {:?}",
            label,
            attempt + 1,
            err,
            delay
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
