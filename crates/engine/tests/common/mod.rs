//! Scriptable provider adapter shared by the integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cloudinfo_engine::errors::{CloudInfoError, ErrorCode, Result};
use cloudinfo_engine::infoer::{Infoer, InfoerCapabilities, PriceDescriptor, RequestLimits};
use cloudinfo_engine::models::{Price, RegionId, SpotPriceInfo, VmInfo, ZoneId};

/// Mutable provider state; tests change it between cycles.
#[derive(Clone, Default)]
pub struct MockState {
    pub regions: BTreeMap<RegionId, String>,
    pub zones: Vec<ZoneId>,
    pub vms: Vec<VmInfo>,
    pub on_demand: HashMap<String, f64>,
    /// Types whose presence makes a batch request fail with `InvalidParameter`.
    pub invalid: HashSet<String>,
    pub spot: HashMap<String, SpotPriceInfo>,
    pub descriptor: Option<PriceDescriptor>,
    pub fail_vms: bool,
    pub fail_regions: bool,
    /// Error code returned by every on-demand price request.
    pub price_error: Option<ErrorCode>,
    /// Delay of `get_virtual_machines`.
    pub vm_delay: Duration,
    /// Delay of every on-demand price request.
    pub price_delay: Duration,
}

pub struct MockInfoer {
    id: String,
    short_lived: bool,
    batch_pricing: bool,
    max_concurrency: usize,
    pub state: Mutex<MockState>,
    pub vm_calls: AtomicUsize,
    pub current_price_calls: AtomicUsize,
    pub on_demand_requests: Mutex<Vec<Vec<String>>>,
    running: AtomicUsize,
    pub max_running: AtomicUsize,
    price_running: AtomicUsize,
    max_price_running: AtomicUsize,
}

impl MockInfoer {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            short_lived: false,
            batch_pricing: true,
            max_concurrency: 4,
            state: Mutex::new(MockState::default()),
            vm_calls: AtomicUsize::new(0),
            current_price_calls: AtomicUsize::new(0),
            on_demand_requests: Mutex::new(Vec::new()),
            running: AtomicUsize::new(0),
            max_running: AtomicUsize::new(0),
            price_running: AtomicUsize::new(0),
            max_price_running: AtomicUsize::new(0),
        }
    }

    pub fn short_lived(mut self) -> Self {
        self.short_lived = true;
        self
    }

    pub fn without_batch_pricing(mut self) -> Self {
        self.batch_pricing = false;
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn with_state(self, state: MockState) -> Self {
        *self.state.lock().unwrap() = state;
        self
    }

    pub fn update(&self, f: impl FnOnce(&mut MockState)) {
        f(&mut self.state.lock().unwrap());
    }

    pub fn vm_calls(&self) -> usize {
        self.vm_calls.load(Ordering::SeqCst)
    }

    pub fn current_price_calls(&self) -> usize {
        self.current_price_calls.load(Ordering::SeqCst)
    }

    pub fn request_sizes(&self) -> Vec<usize> {
        self.on_demand_requests
            .lock()
            .unwrap()
            .iter()
            .map(Vec::len)
            .collect()
    }

    /// Highest number of on-demand price requests seen in flight at once.
    pub fn max_price_requests_in_flight(&self) -> usize {
        self.max_price_running.load(Ordering::SeqCst)
    }

    fn snapshot(&self) -> MockState {
        self.state.lock().unwrap().clone()
    }
}

/// One region "r1" with zones z1..z3, and the given instance types priced at
/// 1.0 on demand.
pub fn single_region(types: &[&str]) -> MockState {
    let mut regions = BTreeMap::new();
    regions.insert("r1".to_string(), "Region 1".to_string());
    MockState {
        regions,
        zones: vec!["z1".to_string(), "z2".to_string(), "z3".to_string()],
        vms: types
            .iter()
            .map(|t| VmInfo::new(*t, 2.0, 8.0).with_network_perf("1 Gbit/s"))
            .collect(),
        on_demand: types.iter().map(|t| (t.to_string(), 1.0)).collect(),
        ..Default::default()
    }
}

/// Regions "r1".."rN" sharing one catalog of the given instance types.
pub fn many_regions(count: usize, types: &[String]) -> MockState {
    let names: Vec<&str> = types.iter().map(String::as_str).collect();
    let mut state = single_region(&names);
    state.regions = (1..=count)
        .map(|i| (format!("r{}", i), format!("Region {}", i)))
        .collect();
    state
}

/// Instance type names `t000`, `t001`, ...
pub fn type_names(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("t{:03}", i)).collect()
}

#[async_trait]
impl Infoer for MockInfoer {
    fn id(&self) -> &str {
        &self.id
    }

    fn has_short_lived_price_info(&self) -> bool {
        self.short_lived
    }

    fn capabilities(&self) -> InfoerCapabilities {
        InfoerCapabilities {
            batch_pricing: self.batch_pricing,
            images: false,
        }
    }

    fn request_limits(&self) -> RequestLimits {
        RequestLimits {
            requests_per_minute: 6_000_000,
            max_concurrency: self.max_concurrency,
        }
    }

    async fn initialize(&self) -> Result<Option<PriceDescriptor>> {
        Ok(self.snapshot().descriptor)
    }

    async fn get_virtual_machines(&self, _region: &str) -> Result<Vec<VmInfo>> {
        self.vm_calls.fetch_add(1, Ordering::SeqCst);
        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(running, Ordering::SeqCst);

        let state = self.snapshot();
        if !state.vm_delay.is_zero() {
            tokio::time::sleep(state.vm_delay).await;
        }
        self.running.fetch_sub(1, Ordering::SeqCst);

        if state.fail_vms {
            return Err(CloudInfoError::unavailable(&self.id, "connection reset"));
        }
        Ok(state.vms)
    }

    async fn get_current_prices(&self, _region: &str) -> Result<HashMap<String, Price>> {
        self.current_price_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .snapshot()
            .spot
            .into_iter()
            .map(|(instance_type, spot)| (instance_type, Price::spot(spot)))
            .collect())
    }

    async fn get_zones(&self, _region: &str) -> Result<Vec<ZoneId>> {
        Ok(self.snapshot().zones)
    }

    async fn get_regions(&self, _service: &str) -> Result<BTreeMap<RegionId, String>> {
        let state = self.snapshot();
        if state.fail_regions {
            return Err(CloudInfoError::unavailable(&self.id, "regions unavailable"));
        }
        Ok(state.regions)
    }

    async fn get_on_demand_prices(&self, _region: &str, instance_types: &[String]) -> Result<Vec<f64>> {
        self.on_demand_requests
            .lock()
            .unwrap()
            .push(instance_types.to_vec());

        let state = self.snapshot();
        if !state.price_delay.is_zero() {
            let running = self.price_running.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_price_running.fetch_max(running, Ordering::SeqCst);
            tokio::time::sleep(state.price_delay).await;
            self.price_running.fetch_sub(1, Ordering::SeqCst);
        }
        if let Some(code) = state.price_error {
            return Err(CloudInfoError::rejected(&self.id, code, "price request refused"));
        }
        if instance_types.iter().any(|t| state.invalid.contains(t)) {
            return Err(CloudInfoError::rejected(
                &self.id,
                ErrorCode::InvalidParameter,
                "InstanceType is invalid",
            ));
        }
        instance_types
            .iter()
            .map(|t| {
                state.on_demand.get(t).copied().ok_or_else(|| {
                    CloudInfoError::rejected(&self.id, ErrorCode::InvalidParameter, t.clone())
                })
            })
            .collect()
    }
}

pub fn shared(infoer: MockInfoer) -> Arc<MockInfoer> {
    Arc::new(infoer)
}
