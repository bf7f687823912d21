//! Per-key in-flight tracking.
//!
//! Full and spot refreshes of the same (provider, region) key share one
//! guard, so they never overlap. A cycle that finds the key busy is
//! suppressed, not queued.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::cache::RegionKey;

#[derive(Default)]
pub struct InFlight {
    keys: Mutex<HashSet<RegionKey>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<RegionKey>> {
        self.keys.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark a key as running. `None` if it already is.
    pub fn try_acquire(&self, provider: &str, region: &str) -> Option<InFlightGuard<'_>> {
        let key = (provider.to_string(), region.to_string());
        if self.lock().insert(key.clone()) {
            Some(InFlightGuard { owner: self, key })
        } else {
            None
        }
    }
}

/// Releases its key on drop, including when the cycle panics or is dropped
/// mid-await.
pub struct InFlightGuard<'a> {
    owner: &'a InFlight,
    key: RegionKey,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.owner.lock().remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_is_refused_until_drop() {
        let in_flight = InFlight::new();

        let guard = in_flight.try_acquire("amazon", "eu-west-1");
        assert!(guard.is_some());
        assert!(in_flight.try_acquire("amazon", "eu-west-1").is_none());

        // Other keys are independent
        assert!(in_flight.try_acquire("amazon", "us-east-1").is_some());

        drop(guard);
        assert!(in_flight.try_acquire("amazon", "eu-west-1").is_some());
    }
}
