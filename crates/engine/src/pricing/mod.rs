//! On-demand price retrieval.
//!
//! - [`BatchPriceFetcher`] splits instance types into bounded batches and
//!   falls back to per-item requests when a batch is rejected.
//! - [`RateLimiter`] admits requests per provider: a token bucket for the
//!   rate and a semaphore for the adapter's concurrency ceiling.

mod batch;
mod rate_limiter;

pub use batch::{
    BatchPriceConfig, BatchPriceFetcher, BatchPriceOutcome, DEFAULT_BATCH_CONCURRENCY,
    DEFAULT_BATCH_SIZE,
};
pub use rate_limiter::{RateLimiter, RequestPermit};
