//! Retry and timeout decoration for providers.
//!
//! Wraps any [`MetadataProvider`] and enforces the full resilience policy
//! for one logical search: a per-attempt timeout, a shared overall deadline,
//! exponential backoff with jitter for retryable errors, and a single
//! hint-respecting backoff for rate limits.

use super::{MetadataProvider, ProviderCandidate, ProviderError, SearchQuery};
use crate::config::RetryConfig;
use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;
use tokio::time::Instant;

pub struct RetryingProvider<P> {
    inner: P,
    config: RetryConfig,
}

impl<P> RetryingProvider<P> {
    pub fn new(inner: P, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

/// Exponential backoff for retry `attempt` (1-based), with up to 50% jitter
/// added so concurrent workers don't thunder in lockstep.
fn backoff_for_attempt(base: Duration, attempt: u32) -> Duration {
    let exp = base.saturating_mul(1u32 << (attempt - 1).min(16));
    let jitter_ms = exp.as_millis() as u64 / 2;
    if jitter_ms == 0 {
        return exp;
    }
    exp + Duration::from_millis(rand::rng().random_range(0..jitter_ms))
}

#[async_trait]
impl<P: MetadataProvider> MetadataProvider for RetryingProvider<P> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<ProviderCandidate>, ProviderError> {
        let deadline = Instant::now() + self.config.overall_deadline();
        let mut attempt: u32 = 0;
        let mut rate_limit_spent = false;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(ProviderError::Timeout);
            }
            attempt += 1;

            let budget = self.config.attempt_timeout().min(remaining);
            let outcome = tokio::time::timeout(budget, self.inner.search(query)).await;
            let err = match outcome {
                Ok(Ok(candidates)) => return Ok(candidates),
                Ok(Err(e)) => e,
                Err(_) => ProviderError::Timeout,
            };

            match err {
                ProviderError::RateLimited { retry_after } => {
                    if rate_limit_spent {
                        return Err(ProviderError::RateLimited { retry_after });
                    }
                    rate_limit_spent = true;
                    // A rate-limit pause does not consume a retry attempt.
                    attempt -= 1;
                    let wait = retry_after
                        .unwrap_or_else(|| self.config.rate_limit_backoff())
                        .min(remaining);
                    log::debug!(
                        "{}: rate limited, backing off {:?} before retrying '{}'",
                        self.inner.name(),
                        wait,
                        query.title
                    );
                    tokio::time::sleep(wait).await;
                }
                e if e.is_retryable() => {
                    if attempt >= self.config.max_attempts {
                        log::warn!(
                            "{}: giving up on '{}' after {} attempts: {}",
                            self.inner.name(),
                            query.title,
                            attempt,
                            e
                        );
                        return Err(e);
                    }
                    let wait = backoff_for_attempt(self.config.base_backoff(), attempt)
                        .min(deadline.saturating_duration_since(Instant::now()));
                    log::debug!(
                        "{}: attempt {} failed for '{}' ({}), retrying in {:?}",
                        self.inner.name(),
                        attempt,
                        query.title,
                        e,
                        wait
                    );
                    tokio::time::sleep(wait).await;
                }
                e => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially() {
        let base = Duration::from_millis(100);
        for attempt in 1..=4u32 {
            let floor = base * (1 << (attempt - 1));
            let wait = backoff_for_attempt(base, attempt);
            assert!(wait >= floor, "attempt {}: {:?} < {:?}", attempt, wait, floor);
            assert!(wait < floor + floor / 2 + Duration::from_millis(1));
        }
    }

    #[test]
    fn backoff_shift_is_clamped() {
        // Large attempt numbers must not overflow the shift.
        let wait = backoff_for_attempt(Duration::from_millis(1), 40);
        assert!(wait >= Duration::from_millis(1));
    }
}
