//! Batched on-demand price retrieval with per-item fallback.
//!
//! Some providers refuse a whole multi-item price request when a single
//! member is invalid, and there is no way to know up front which one. The
//! fetcher therefore prices instance types in fixed-size batches and, when a
//! batch is rejected with a parameter error, re-issues it one instance type
//! at a time, skipping the ones that still fail.

use std::collections::HashMap;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use log::{debug, warn};

use super::rate_limiter::{RateLimiter, RequestPermit};
use crate::errors::{CloudInfoError, Result, RetryClass};
use crate::infoer::{Infoer, RequestLimits};
use crate::models::InstanceType;
use crate::shutdown::CancellationSignal;

/// Instance types per price request.
pub const DEFAULT_BATCH_SIZE: usize = 25;

/// Batches in flight per provider, before the adapter's own ceiling.
pub const DEFAULT_BATCH_CONCURRENCY: usize = 4;

#[derive(Clone, Debug)]
pub struct BatchPriceConfig {
    pub batch_size: usize,
    pub max_concurrency: usize,
}

impl Default for BatchPriceConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_concurrency: DEFAULT_BATCH_CONCURRENCY,
        }
    }
}

/// Result of a batched price fetch.
#[derive(Clone, Debug, Default)]
pub struct BatchPriceOutcome {
    /// Priced instance types. Types that could not be priced are absent.
    pub prices: HashMap<InstanceType, f64>,
    /// Instance types whose single-item retry also failed, sorted.
    pub skipped: Vec<InstanceType>,
    /// Number of batches the input was split into.
    pub batches: usize,
    /// Batches that were re-issued item by item.
    pub split_batches: usize,
    /// Total price requests sent to the adapter.
    pub requests: usize,
}

impl BatchPriceOutcome {
    fn merge(&mut self, other: BatchPriceOutcome) {
        self.prices.extend(other.prices);
        self.skipped.extend(other.skipped);
        self.batches += other.batches;
        self.split_batches += other.split_batches;
        self.requests += other.requests;
    }

    /// Non-fatal warning describing the skipped instance types, if any.
    pub fn partial_data(&self, provider: &str, region: &str) -> Option<CloudInfoError> {
        if self.skipped.is_empty() {
            None
        } else {
            Some(CloudInfoError::PartialData {
                provider: provider.to_string(),
                region: region.to_string(),
                failed: self.skipped.clone(),
            })
        }
    }
}

/// Fetches on-demand prices in bounded, rate-limited batches.
pub struct BatchPriceFetcher {
    config: BatchPriceConfig,
    rate_limiter: Arc<RateLimiter>,
}

impl BatchPriceFetcher {
    pub fn new(config: BatchPriceConfig, rate_limiter: Arc<RateLimiter>) -> Self {
        Self {
            config,
            rate_limiter,
        }
    }

    /// Split instance types into batches of at most `batch_size`, keeping order.
    pub fn partition<'a>(&self, instance_types: &'a [InstanceType]) -> Vec<&'a [InstanceType]> {
        instance_types.chunks(self.config.batch_size.max(1)).collect()
    }

    /// Fetch on-demand prices for `instance_types` in `region`.
    ///
    /// Batches are issued concurrently, bounded by the configured concurrency
    /// and the adapter's own `max_concurrency`. The latter is enforced by the
    /// rate limiter across every fetch of the provider. A parameter rejection
    /// splits the batch; any other error aborts the whole fetch. Cancellation
    /// is observed before every request.
    pub async fn fetch(
        &self,
        infoer: &dyn Infoer,
        region: &str,
        instance_types: &[InstanceType],
        cancel: &CancellationSignal,
    ) -> Result<BatchPriceOutcome> {
        let mut outcome = BatchPriceOutcome::default();
        if instance_types.is_empty() {
            return Ok(outcome);
        }

        let limits = infoer.request_limits();
        let concurrency = self
            .config
            .max_concurrency
            .min(limits.max_concurrency)
            .max(1);
        let batches = self.partition(instance_types);

        debug!(
            "Fetching on-demand prices for {} instance type(s) of '{}' in {} ({} batch(es), concurrency {})",
            instance_types.len(),
            infoer.id(),
            region,
            batches.len(),
            concurrency
        );

        let requests: Vec<_> = batches
            .into_iter()
            .map(|batch| self.fetch_batch(infoer, region, batch, &limits, cancel))
            .collect();
        let mut results = stream::iter(requests).buffer_unordered(concurrency);

        while let Some(result) = results.next().await {
            // Dropping the stream on error abandons the batches still in flight
            outcome.merge(result?);
        }

        outcome.skipped.sort();
        Ok(outcome)
    }

    async fn fetch_batch(
        &self,
        infoer: &dyn Infoer,
        region: &str,
        batch: &[InstanceType],
        limits: &RequestLimits,
        cancel: &CancellationSignal,
    ) -> Result<BatchPriceOutcome> {
        let mut outcome = BatchPriceOutcome {
            batches: 1,
            requests: 1,
            ..Default::default()
        };

        let response = {
            let _permit = self.admit(infoer, limits, cancel).await?;
            infoer.get_on_demand_prices(region, batch).await
        };

        match response {
            Ok(prices) if prices.len() == batch.len() => {
                outcome
                    .prices
                    .extend(batch.iter().cloned().zip(prices));
                return Ok(outcome);
            }
            Ok(prices) => {
                warn!(
                    "'{}' returned {} price(s) for a batch of {} in {}, retrying per instance type",
                    infoer.id(),
                    prices.len(),
                    batch.len(),
                    region
                );
            }
            Err(e) if e.retry_class() == RetryClass::PerItem => {
                debug!(
                    "Batch of {} rejected by '{}' in {} ({}), retrying per instance type",
                    batch.len(),
                    infoer.id(),
                    region,
                    e
                );
            }
            Err(e) => return Err(e),
        }

        outcome.split_batches = 1;
        for instance_type in batch {
            let response = {
                let _permit = self.admit(infoer, limits, cancel).await?;
                infoer
                    .get_on_demand_prices(region, std::slice::from_ref(instance_type))
                    .await
            };
            outcome.requests += 1;

            match response {
                Ok(prices) if prices.len() == 1 => {
                    outcome.prices.insert(instance_type.clone(), prices[0]);
                }
                Ok(_) => {
                    debug!("No price for instance type '{}' in {}", instance_type, region);
                    outcome.skipped.push(instance_type.clone());
                }
                Err(e) => {
                    debug!(
                        "No price for instance type '{}' in {}: {}",
                        instance_type, region, e
                    );
                    outcome.skipped.push(instance_type.clone());
                }
            }
        }

        Ok(outcome)
    }

    /// Wait for the provider's rate limiter, checking cancellation on both
    /// sides of the wait.
    async fn admit(
        &self,
        infoer: &dyn Infoer,
        limits: &RequestLimits,
        cancel: &CancellationSignal,
    ) -> Result<RequestPermit> {
        cancel.check()?;
        let permit = self.rate_limiter.acquire(infoer.id(), limits).await?;
        cancel.check()?;
        Ok(permit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;
    use crate::infoer::InfoerCapabilities;
    use crate::models::{Price, VmInfo, ZoneId};
    use crate::shutdown;
    use async_trait::async_trait;
    use std::collections::{BTreeMap, HashSet};
    use std::sync::Mutex;

    /// Prices every type except the `invalid` ones; rejects any batch containing one.
    struct PricingInfoer {
        invalid: HashSet<String>,
        fatal: bool,
        requests: Mutex<Vec<Vec<String>>>,
        /// Cancels the trigger once this many requests were received.
        cancel_after: Option<(usize, shutdown::ShutdownTrigger)>,
    }

    impl PricingInfoer {
        fn new(invalid: &[&str]) -> Self {
            Self {
                invalid: invalid.iter().map(|s| s.to_string()).collect(),
                fatal: false,
                requests: Mutex::new(Vec::new()),
                cancel_after: None,
            }
        }

        fn request_sizes(&self) -> Vec<usize> {
            self.requests.lock().unwrap().iter().map(Vec::len).collect()
        }
    }

    #[async_trait]
    impl Infoer for PricingInfoer {
        fn id(&self) -> &str {
            "mock"
        }

        fn has_short_lived_price_info(&self) -> bool {
            false
        }

        fn capabilities(&self) -> InfoerCapabilities {
            InfoerCapabilities {
                batch_pricing: true,
                images: false,
            }
        }

        fn request_limits(&self) -> RequestLimits {
            RequestLimits {
                requests_per_minute: 60_000,
                max_concurrency: 2,
            }
        }

        async fn get_virtual_machines(&self, _region: &str) -> Result<Vec<VmInfo>> {
            Ok(Vec::new())
        }

        async fn get_current_prices(&self, _region: &str) -> Result<HashMap<String, Price>> {
            Ok(HashMap::new())
        }

        async fn get_zones(&self, _region: &str) -> Result<Vec<ZoneId>> {
            Ok(Vec::new())
        }

        async fn get_regions(&self, _service: &str) -> Result<BTreeMap<String, String>> {
            Ok(BTreeMap::new())
        }

        async fn get_on_demand_prices(
            &self,
            _region: &str,
            instance_types: &[String],
        ) -> Result<Vec<f64>> {
            let received = {
                let mut requests = self.requests.lock().unwrap();
                requests.push(instance_types.to_vec());
                requests.len()
            };
            if let Some((after, trigger)) = &self.cancel_after {
                if received == *after {
                    trigger.cancel();
                }
            }
            if self.fatal {
                return Err(CloudInfoError::rejected("mock", ErrorCode::Throttled, "slow down"));
            }
            if instance_types.iter().any(|t| self.invalid.contains(t)) {
                return Err(CloudInfoError::rejected(
                    "mock",
                    ErrorCode::InvalidParameter,
                    "InstanceType",
                ));
            }
            Ok(instance_types.iter().map(|t| t.len() as f64).collect())
        }
    }

    fn fetcher() -> BatchPriceFetcher {
        BatchPriceFetcher::new(BatchPriceConfig::default(), Arc::new(RateLimiter::new()))
    }

    fn types(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("type-{:03}", i)).collect()
    }

    #[test]
    fn test_partition_sizes() {
        let fetcher = fetcher();
        let input = types(60);
        let sizes: Vec<usize> = fetcher.partition(&input).iter().map(|b| b.len()).collect();
        assert_eq!(sizes, vec![25, 25, 10]);
    }

    #[tokio::test]
    async fn test_all_batches_priced() {
        let infoer = PricingInfoer::new(&[]);
        let input = types(51);

        let outcome = fetcher()
            .fetch(&infoer, "eu-1", &input, &CancellationSignal::never())
            .await
            .unwrap();

        assert_eq!(outcome.prices.len(), 51);
        assert_eq!(outcome.batches, 3);
        assert_eq!(outcome.requests, 3);
        assert_eq!(outcome.split_batches, 0);
        assert!(outcome.partial_data("mock", "eu-1").is_none());
    }

    #[tokio::test]
    async fn test_rejected_batch_is_split() {
        let infoer = PricingInfoer::new(&["type-030"]);
        let input = types(40);

        let outcome = fetcher()
            .fetch(&infoer, "eu-1", &input, &CancellationSignal::never())
            .await
            .unwrap();

        assert_eq!(outcome.prices.len(), 39);
        assert!(!outcome.prices.contains_key("type-030"));
        assert_eq!(outcome.skipped, vec!["type-030".to_string()]);
        assert_eq!(outcome.split_batches, 1);
        // 2 batch requests + 15 single-item retries for the second batch
        assert_eq!(outcome.requests, 17);
        assert_eq!(
            infoer.request_sizes().iter().filter(|size| **size == 1).count(),
            15
        );
        assert!(matches!(
            outcome.partial_data("mock", "eu-1"),
            Some(CloudInfoError::PartialData { failed, .. }) if failed == vec!["type-030".to_string()]
        ));
    }

    #[tokio::test]
    async fn test_other_errors_abort() {
        let mut infoer = PricingInfoer::new(&[]);
        infoer.fatal = true;

        let err = fetcher()
            .fetch(&infoer, "eu-1", &types(30), &CancellationSignal::never())
            .await
            .unwrap_err();

        assert_eq!(err.code(), Some(&ErrorCode::Throttled));
        assert!(infoer.request_sizes().iter().all(|size| *size > 1));
    }

    #[tokio::test]
    async fn test_cancelled_before_first_batch() {
        let infoer = PricingInfoer::new(&[]);
        let (trigger, signal) = shutdown::channel();
        trigger.cancel();

        let err = fetcher()
            .fetch(&infoer, "eu-1", &types(10), &signal)
            .await
            .unwrap_err();

        assert!(matches!(err, CloudInfoError::Cancelled));
        assert!(infoer.request_sizes().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_between_batches() {
        let (trigger, signal) = shutdown::channel();
        let mut infoer = PricingInfoer::new(&[]);
        infoer.cancel_after = Some((2, trigger));

        let err = fetcher()
            .fetch(&infoer, "eu-1", &types(200), &signal)
            .await
            .unwrap_err();

        // Requests already sent complete; at most the batches in flight follow
        assert!(matches!(err, CloudInfoError::Cancelled));
        let sent = infoer.request_sizes();
        assert!(sent.len() < 8, "sent {} of 8 batches", sent.len());
        assert!(sent.iter().all(|size| *size == 25));
    }

    #[tokio::test]
    async fn test_cancelled_during_split() {
        let (trigger, signal) = shutdown::channel();
        let mut infoer = PricingInfoer::new(&["type-003"]);
        // The batch request and two single-item retries
        infoer.cancel_after = Some((3, trigger));
        let fetcher = BatchPriceFetcher::new(
            BatchPriceConfig {
                batch_size: 10,
                max_concurrency: 1,
            },
            Arc::new(RateLimiter::new()),
        );

        let err = fetcher
            .fetch(&infoer, "eu-1", &types(10), &signal)
            .await
            .unwrap_err();

        assert!(matches!(err, CloudInfoError::Cancelled));
        assert_eq!(infoer.request_sizes(), vec![10, 1, 1]);
    }

    #[tokio::test]
    async fn test_empty_input_sends_nothing() {
        let infoer = PricingInfoer::new(&[]);
        let outcome = fetcher()
            .fetch(&infoer, "eu-1", &[], &CancellationSignal::never())
            .await
            .unwrap();
        assert_eq!(outcome.requests, 0);
        assert!(infoer.request_sizes().is_empty());
    }
}
