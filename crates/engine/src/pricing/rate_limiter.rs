//! Per-provider request admission.
//!
//! Each provider gets a token bucket for its request rate and a semaphore for
//! its concurrency ceiling, both sized from the adapter's [`RequestLimits`]
//! the first time the provider is seen. Every refresh cycle of a provider
//! shares them, so the ceiling holds across regions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, warn};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

use crate::errors::{CloudInfoError, Result};
use crate::infoer::RequestLimits;

/// Default bucket capacity (allows bursting).
const DEFAULT_BUCKET_CAPACITY: f64 = 10.0;

/// Token bucket for a single provider.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
    /// Token refill rate (tokens per second).
    rate: f64,
    capacity: f64,
}

impl TokenBucket {
    fn new(requests_per_minute: u32, capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_update: Instant::now(),
            rate: requests_per_minute.max(1) as f64 / 60.0,
            capacity,
        }
    }

    fn for_limits(limits: &RequestLimits) -> Self {
        Self::new(
            limits.requests_per_minute,
            DEFAULT_BUCKET_CAPACITY.max(limits.max_concurrency as f64),
        )
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);
        self.last_update = now;
    }

    fn try_acquire(&mut self) -> bool {
        self.refill();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn time_until_available(&mut self) -> Duration {
        self.refill();

        if self.tokens >= 1.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64((1.0 - self.tokens) / self.rate)
        }
    }
}

/// Admission to send one request to a provider. The concurrency slot is
/// released on drop.
#[derive(Debug)]
pub struct RequestPermit {
    _slot: OwnedSemaphorePermit,
}

/// Thread-safe limiter keeping one token bucket and one concurrency
/// semaphore per provider.
#[derive(Default)]
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, TokenBucket>>,
    slots: Mutex<HashMap<String, Arc<Semaphore>>>,
}

/// Lock a limiter map, recovering from poison: a slightly off bucket is
/// better than a panicking refresh cycle.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        warn!("Rate limiter mutex was poisoned, recovering");
        poisoned.into_inner()
    })
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots_for(&self, provider: &str, limits: &RequestLimits) -> Arc<Semaphore> {
        let mut slots = lock(&self.slots);
        let semaphore = slots
            .entry(provider.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(limits.max_concurrency.max(1))));
        Arc::clone(semaphore)
    }

    /// Wait for a free concurrency slot, then for a rate token.
    ///
    /// Hold the permit until the request completes. Fails with `Cancelled`
    /// when the provider is reset while waiting.
    pub async fn acquire(&self, provider: &str, limits: &RequestLimits) -> Result<RequestPermit> {
        let slot = self
            .slots_for(provider, limits)
            .acquire_owned()
            .await
            .map_err(|_| CloudInfoError::Cancelled)?;

        loop {
            let wait_time = {
                let mut buckets = lock(&self.buckets);
                let bucket = buckets
                    .entry(provider.to_string())
                    .or_insert_with(|| TokenBucket::for_limits(limits));

                if bucket.try_acquire() {
                    return Ok(RequestPermit { _slot: slot });
                }

                bucket.time_until_available()
            };

            if wait_time > Duration::ZERO {
                debug!("Rate limiter: waiting {:?} for provider '{}'", wait_time, provider);
                tokio::time::sleep(wait_time).await;
            }
        }
    }

    /// Forget a provider's limits. Requests still waiting for a slot fail.
    pub fn reset(&self, provider: &str) {
        lock(&self.buckets).remove(provider);
        if let Some(slots) = lock(&self.slots).remove(provider) {
            slots.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(requests_per_minute: u32, max_concurrency: usize) -> RequestLimits {
        RequestLimits {
            requests_per_minute,
            max_concurrency,
        }
    }

    #[test]
    fn test_bucket_drains_to_capacity() {
        let mut bucket = TokenBucket::new(60, 3.0);

        for _ in 0..3 {
            assert!(bucket.try_acquire());
        }
        assert!(!bucket.try_acquire());
    }

    #[test]
    fn test_bucket_refills() {
        let mut bucket = TokenBucket::new(60, 1.0); // 1 token/second

        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());

        bucket.last_update = Instant::now() - Duration::from_secs(2);

        assert!(bucket.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_async_acquire_waits_for_refill() {
        let limiter = RateLimiter::new();
        let limits = limits(6000, 1); // 100/second, bursts of 10

        for _ in 0..10 {
            limiter.acquire("azure", &limits).await.unwrap();
        }

        let start = Instant::now();
        limiter.acquire("azure", &limits).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_slots_are_per_provider() {
        let limiter = RateLimiter::new();
        let limits = limits(6000, 1);

        let held = limiter.acquire("alibaba", &limits).await.unwrap();
        let blocked = tokio::time::timeout(
            Duration::from_secs(1),
            limiter.acquire("alibaba", &limits),
        )
        .await;
        assert!(blocked.is_err());

        // Other providers are independent
        assert!(limiter.acquire("amazon", &limits).await.is_ok());

        drop(held);
        assert!(limiter.acquire("alibaba", &limits).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_fails_waiting_requests() {
        let limiter = Arc::new(RateLimiter::new());
        let limits = limits(6000, 1);
        let _held = limiter.acquire("google", &limits).await.unwrap();

        let waiter = {
            let limiter = Arc::clone(&limiter);
            let limits = limits.clone();
            tokio::spawn(async move { limiter.acquire("google", &limits).await.map(|_| ()) })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        limiter.reset("google");

        assert!(matches!(waiter.await.unwrap(), Err(CloudInfoError::Cancelled)));
        // A fresh semaphore serves the provider from now on
        assert!(limiter.acquire("google", &limits).await.is_ok());
    }
}
