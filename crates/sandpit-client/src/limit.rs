//! Token-bucket rate limiting, shared across calls by bucket key.
//!
//! Every operation class ("analyze", "list", "status", ...) maps to one
//! bucket in a [`RateLimiterRegistry`]. Buckets refill lazily: each
//! check/acquire computes `min(burst, tokens + elapsed * rate)` under the
//! bucket's own mutex, so two callers racing on the last token cannot both
//! win. Unrelated keys never contend on a shared lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sandpit_core::{Result, SandpitError};
use tokio::time::Instant;
use tracing::debug;

/// Mutable ledger of one bucket. Only touched while holding its mutex.
#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

type SharedBucket = Arc<tokio::sync::Mutex<BucketState>>;

/// Process-wide map of bucket key to token ledger.
///
/// Clients sharing a registry coordinate on the same buckets even across
/// client instances. The registry is explicitly injectable so tests get an
/// isolated one instead of fighting over hidden global state.
#[derive(Debug, Clone, Default)]
pub struct RateLimiterRegistry {
    buckets: Arc<Mutex<HashMap<String, SharedBucket>>>,
}

impl RateLimiterRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a limiter handle for `key`, creating the bucket on first use
    /// with `burst` initial tokens
    #[must_use]
    pub fn limiter(&self, key: &str, rate: f64, burst: f64) -> RateLimiter {
        let bucket = {
            let mut buckets = self.buckets.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            Arc::clone(buckets.entry(key.to_string()).or_insert_with(|| {
                Arc::new(tokio::sync::Mutex::new(BucketState {
                    tokens: burst,
                    last_refill: Instant::now(),
                }))
            }))
        };
        RateLimiter {
            key: key.to_string(),
            rate,
            burst,
            bucket,
        }
    }

    /// Drop every bucket; the next use of any key starts a fresh ledger
    pub fn clear(&self) {
        self.buckets
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
    }
}

/// Handle to one shared token bucket.
///
/// `rate` and `burst` live on the handle, not the ledger, so reconfiguring
/// a key takes effect on the next refill computation without resetting the
/// tokens already accumulated.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    key: String,
    rate: f64,
    burst: f64,
    bucket: SharedBucket,
}

impl RateLimiter {
    /// Bucket key this handle gates
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// A non-positive rate or burst disables limiting: every check succeeds
    /// and no tokens are consumed
    #[must_use]
    pub fn is_unlimited(&self) -> bool {
        self.rate <= 0.0 || self.burst <= 0.0
    }

    /// Refresh the ledger and consume one token if available.
    ///
    /// Non-blocking: returns false when the bucket is empty.
    pub async fn check(&self) -> bool {
        if self.is_unlimited() {
            return true;
        }
        let mut state = self.bucket.lock().await;
        self.refill(&mut state);
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Consume one token, suspending until the bucket refills far enough.
    ///
    /// Cancellation-safe: a caller cancelled while waiting has consumed
    /// nothing. The token is only taken inside the critical section, at the
    /// moment the call is allowed through.
    pub async fn acquire(&self) {
        if self.is_unlimited() {
            return;
        }
        loop {
            let wait = {
                let mut state = self.bucket.lock().await;
                self.refill(&mut state);
                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return;
                }
                // Time until one whole token is available
                Duration::from_secs_f64((1.0 - state.tokens) / self.rate)
            };
            debug!(key = %self.key, wait_ms = wait.as_millis() as u64, "rate limit wait");
            tokio::time::sleep(wait).await;
        }
    }

    /// Consume one token or fail immediately with a local rate-limit error
    /// carrying the time until the next token
    pub async fn try_acquire(&self) -> Result<()> {
        if self.is_unlimited() {
            return Ok(());
        }
        let mut state = self.bucket.lock().await;
        self.refill(&mut state);
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            Ok(())
        } else {
            Err(SandpitError::RateLimited {
                retry_after: Some((1.0 - state.tokens) / self.rate),
            })
        }
    }

    /// Restore the bucket to full capacity
    pub async fn reset(&self) {
        let mut state = self.bucket.lock().await;
        state.tokens = self.burst;
        state.last_refill = Instant::now();
    }

    /// Current availability estimate, without consuming anything
    pub async fn available(&self) -> f64 {
        if self.is_unlimited() {
            return f64::INFINITY;
        }
        let state = self.bucket.lock().await;
        let elapsed = state.last_refill.elapsed().as_secs_f64();
        (state.tokens + elapsed * self.rate).min(self.burst)
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.rate).min(self.burst);
        state.last_refill = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_burst_exhaustion() {
        let registry = RateLimiterRegistry::new();
        let limiter = registry.limiter("analyze", 1.0, 3.0);

        assert!(limiter.check().await);
        assert!(limiter.check().await);
        assert!(limiter.check().await);
        // floor(burst) consumed; the next check must fail
        assert!(!limiter.check().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_linear_refill() {
        let registry = RateLimiterRegistry::new();
        let limiter = registry.limiter("analyze", 2.0, 2.0);

        assert!(limiter.check().await);
        assert!(limiter.check().await);
        assert!(!limiter.check().await);

        // rate=2 means one token every 500ms
        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(limiter.check().await);
        assert!(!limiter.check().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_clamped_at_burst() {
        let registry = RateLimiterRegistry::new();
        let limiter = registry.limiter("list", 10.0, 2.0);

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(limiter.check().await);
        assert!(limiter.check().await);
        assert!(!limiter.check().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_waits_for_token() {
        let registry = RateLimiterRegistry::new();
        let limiter = registry.limiter("status", 4.0, 1.0);

        assert!(limiter.check().await);
        let before = Instant::now();
        limiter.acquire().await;
        // one token at rate=4 takes 250ms
        assert!(before.elapsed() >= Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_reset_restores_burst() {
        let registry = RateLimiterRegistry::new();
        let limiter = registry.limiter("analyze", 1.0, 2.0);

        assert!(limiter.check().await);
        assert!(limiter.check().await);
        assert!(!limiter.check().await);

        limiter.reset().await;
        assert!(limiter.check().await);
        assert!(limiter.check().await);
    }

    #[tokio::test]
    async fn test_unlimited_escape_hatch() {
        let registry = RateLimiterRegistry::new();
        let limiter = registry.limiter("analyze", 0.0, 0.0);

        for _ in 0..100 {
            assert!(limiter.check().await);
        }
        limiter.acquire().await;
        assert!(limiter.try_acquire().await.is_ok());
    }

    #[tokio::test]
    async fn test_try_acquire_reports_wait() {
        let registry = RateLimiterRegistry::new();
        let limiter = registry.limiter("analyze", 2.0, 1.0);

        assert!(limiter.check().await);
        let err = limiter.try_acquire().await.unwrap_err();
        let retry_after = err.retry_after().unwrap();
        assert!(retry_after > 0.0 && retry_after <= 0.5);
    }

    #[tokio::test]
    async fn test_shared_bucket_across_handles() {
        let registry = RateLimiterRegistry::new();
        let a = registry.limiter("analyze", 1.0, 2.0);
        let b = registry.limiter("analyze", 1.0, 2.0);

        assert!(a.check().await);
        assert!(b.check().await);
        // both handles drained the same ledger
        assert!(!a.check().await);
        assert!(!b.check().await);
    }

    #[tokio::test]
    async fn test_independent_keys() {
        let registry = RateLimiterRegistry::new();
        let a = registry.limiter("analyze", 1.0, 1.0);
        let b = registry.limiter("list", 1.0, 1.0);

        assert!(a.check().await);
        assert!(!a.check().await);
        // a different key is unaffected
        assert!(b.check().await);
    }

    #[tokio::test]
    async fn test_concurrent_acquirers_never_oversubscribe() {
        let registry = RateLimiterRegistry::new();
        let limiter = registry.limiter("analyze", 0.001, 5.0);

        let mut handles = Vec::new();
        for _ in 0..20 {
            let l = limiter.clone();
            handles.push(tokio::spawn(async move { l.check().await }));
        }
        let mut granted = 0;
        for h in handles {
            if h.await.unwrap() {
                granted += 1;
            }
        }
        assert_eq!(granted, 5);
    }
}
