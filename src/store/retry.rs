//! Retry wrapper for profile stores.
//!
//! Transient failures (transport, pool, 408/429/5xx) are retried with
//! exponential backoff plus jitter; everything else fails immediately.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::warn;

use crate::error::StoreError;
use crate::onboarding::model::TraderProfile;
use crate::session::IdentityId;

use super::traits::{LoadOutcome, ProfileStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. Always at least 1.
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based), without jitter.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_backoff.saturating_mul(factor).min(self.max_backoff)
    }

    /// Delay with up to +50% random jitter, still capped.
    fn jittered_delay(&self, attempt: u32) -> Duration {
        let delay = self.delay_for_attempt(attempt);
        let jitter_ms = rand::thread_rng().gen_range(0..=delay.as_millis() as u64 / 2);
        (delay + Duration::from_millis(jitter_ms)).min(self.max_backoff)
    }
}

/// Run `op` until it succeeds, fails permanently, or attempts run out.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    op_name: &str,
    mut op: F,
) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < max_attempts => {
                let delay = policy.jittered_delay(attempt);
                warn!(
                    op = op_name,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transient store failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// `ProfileStore` decorator adding retries to both operations.
pub struct RetryingStore<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: ProfileStore> RetryingStore<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: ProfileStore> ProfileStore for RetryingStore<S> {
    async fn load_profile(&self, identity: &IdentityId) -> Result<LoadOutcome, StoreError> {
        with_retry(&self.policy, "load_profile", || self.inner.load_profile(identity)).await
    }

    async fn save_profile(
        &self,
        identity: &IdentityId,
        profile: &TraderProfile,
    ) -> Result<(), StoreError> {
        with_retry(&self.policy, "save_profile", || {
            self.inner.save_profile(identity, profile)
        })
        .await
    }
}
