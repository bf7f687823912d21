//! In-memory product cache.
//!
//! Writers build a complete [`RegionSnapshot`] and swap the `Arc` under a
//! short write lock; readers clone the `Arc` under a short read lock. A
//! reader therefore always sees one cycle's catalog and prices, never a mix.
//!
//! Every write carries the provider [`epoch`](ProductCache::epoch) observed
//! when its cycle started. [`reset_provider`](ProductCache::reset_provider)
//! bumps the epoch before dropping the entries, so a cycle that outlives a
//! reset cannot write its provider back.

mod snapshot;
mod status;

pub use snapshot::{ProviderSnapshot, RegionSnapshot};
pub use status::{KeyStatus, RefreshState};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use log::debug;

use crate::models::{InstanceType, Price, ProviderName, RegionId, VmInfo, ZoneId};

/// (provider, region) cache key.
pub type RegionKey = (ProviderName, RegionId);

/// Region placeholder for provider-level status entries.
pub const PROVIDER_SCOPE: &str = "*";

fn key(provider: &str, region: &str) -> RegionKey {
    (provider.to_string(), region.to_string())
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
pub struct ProductCache {
    regions: RwLock<HashMap<RegionKey, Arc<RegionSnapshot>>>,
    providers: RwLock<HashMap<ProviderName, Arc<ProviderSnapshot>>>,
    status: RwLock<HashMap<RegionKey, KeyStatus>>,
    epochs: RwLock<HashMap<ProviderName, u64>>,
    generation: AtomicU64,
}

impl ProductCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Current epoch of a provider; changes on every reset.
    pub fn epoch(&self, provider: &str) -> u64 {
        read(&self.epochs).get(provider).copied().unwrap_or_default()
    }

    /// Callers hold the write lock of the map they are about to change.
    fn is_current(&self, provider: &str, epoch: u64) -> bool {
        let current = self.epoch(provider);
        if current != epoch {
            debug!(
                "Dropping write for '{}' from epoch {} (now {})",
                provider, epoch, current
            );
        }
        current == epoch
    }

    pub fn region(&self, provider: &str, region: &str) -> Option<Arc<RegionSnapshot>> {
        read(&self.regions).get(&key(provider, region)).cloned()
    }

    /// Every cached region snapshot of a provider, sorted by region id.
    pub fn regions_of(&self, provider: &str) -> Vec<(RegionId, Arc<RegionSnapshot>)> {
        let mut snapshots: Vec<_> = read(&self.regions)
            .iter()
            .filter(|((p, _), _)| p == provider)
            .map(|((_, region), snapshot)| (region.clone(), Arc::clone(snapshot)))
            .collect();
        snapshots.sort_by(|a, b| a.0.cmp(&b.0));
        snapshots
    }

    /// Replace the whole snapshot of a key with a new catalog and prices.
    ///
    /// `None` when the provider was reset since `epoch`.
    pub fn commit_region(
        &self,
        provider: &str,
        region: &str,
        epoch: u64,
        vms: Vec<VmInfo>,
        zones: Vec<ZoneId>,
        prices: HashMap<InstanceType, Price>,
    ) -> Option<Arc<RegionSnapshot>> {
        let mut regions = write(&self.regions);
        if !self.is_current(provider, epoch) {
            return None;
        }

        let generation = self.next_generation();
        let now = Utc::now();
        let snapshot = Arc::new(RegionSnapshot {
            vms: Arc::new(vms),
            zones: Arc::new(zones),
            prices: Arc::new(prices),
            catalog_updated_at: now,
            prices_updated_at: now,
            catalog_generation: generation,
            price_generation: generation,
        });

        regions.insert(key(provider, region), Arc::clone(&snapshot));
        debug!(
            "Committed {} VM(s) for {}/{} (generation {})",
            snapshot.vms.len(),
            provider,
            region,
            generation
        );
        Some(snapshot)
    }

    /// Replace only the price part of a key, reusing its catalog.
    ///
    /// `None` when the key has no snapshot yet or the provider was reset
    /// since `epoch`.
    pub fn commit_prices(
        &self,
        provider: &str,
        region: &str,
        epoch: u64,
        prices: HashMap<InstanceType, Price>,
    ) -> Option<Arc<RegionSnapshot>> {
        let mut regions = write(&self.regions);
        if !self.is_current(provider, epoch) {
            return None;
        }
        let current = regions.get(&key(provider, region))?;
        let generation = self.next_generation();
        let snapshot = Arc::new(current.with_prices(prices, generation, Utc::now()));
        regions.insert(key(provider, region), Arc::clone(&snapshot));
        Some(snapshot)
    }

    pub fn provider(&self, provider: &str) -> Option<Arc<ProviderSnapshot>> {
        read(&self.providers).get(provider).cloned()
    }

    /// `false` when the provider was reset since `epoch`.
    pub fn commit_provider(&self, provider: &str, epoch: u64, mut snapshot: ProviderSnapshot) -> bool {
        let mut providers = write(&self.providers);
        if !self.is_current(provider, epoch) {
            return false;
        }
        snapshot.updated_at = Some(Utc::now());
        providers.insert(provider.to_string(), Arc::new(snapshot));
        true
    }

    /// Providers with provider-level data, sorted.
    pub fn providers(&self) -> Vec<ProviderName> {
        let mut names: Vec<_> = read(&self.providers).keys().cloned().collect();
        names.sort();
        names
    }

    pub fn status(&self, provider: &str, region: &str) -> KeyStatus {
        read(&self.status)
            .get(&key(provider, region))
            .cloned()
            .unwrap_or_default()
    }

    fn update_status(
        &self,
        provider: &str,
        region: &str,
        epoch: u64,
        update: impl FnOnce(&mut KeyStatus),
    ) {
        let mut status = write(&self.status);
        if self.is_current(provider, epoch) {
            update(status.entry(key(provider, region)).or_default());
        }
    }

    pub(crate) fn mark_refreshing(&self, provider: &str, region: &str, epoch: u64) {
        self.update_status(provider, region, epoch, KeyStatus::begin);
    }

    pub(crate) fn mark_ready(&self, provider: &str, region: &str, epoch: u64) {
        self.update_status(provider, region, epoch, |status| status.succeed(Utc::now()));
    }

    pub(crate) fn mark_failed(&self, provider: &str, region: &str, epoch: u64, error: &str) {
        self.update_status(provider, region, epoch, |status| status.fail(error.to_string()));
    }

    pub(crate) fn mark_cancelled(&self, provider: &str, region: &str, epoch: u64) {
        self.update_status(provider, region, epoch, KeyStatus::abandon);
    }

    pub(crate) fn mark_suppressed(&self, provider: &str, region: &str, epoch: u64) {
        self.update_status(provider, region, epoch, |status| status.suppressed += 1);
    }

    /// Drop every entry of a provider and start a new epoch for it.
    pub fn reset_provider(&self, provider: &str) {
        *write(&self.epochs).entry(provider.to_string()).or_default() += 1;
        write(&self.regions).retain(|(p, _), _| p != provider);
        write(&self.status).retain(|(p, _), _| p != provider);
        write(&self.providers).remove(provider);
        debug!("Reset cache entries of '{}'", provider);
    }
}
