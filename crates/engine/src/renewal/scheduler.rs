//! Periodic renewal of the product cache.
//!
//! Every provider gets a loop on the long renewal interval. Providers with
//! short-lived price info get a second loop on the spot interval that only
//! replaces prices. Region refreshes run as independent tasks.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use log::{debug, info, warn};
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};

use super::refresher::Refresher;
use crate::config::EngineConfig;
use crate::events::RefreshOutcome;
use crate::infoer::Infoer;
use crate::shutdown::{self, CancellationSignal, ShutdownTrigger};

pub struct RenewalScheduler {
    refresher: Arc<Refresher>,
    renewal_interval: Duration,
    spot_renewal_interval: Duration,
}

impl RenewalScheduler {
    pub fn new(refresher: Arc<Refresher>, config: &EngineConfig) -> Self {
        Self {
            refresher,
            renewal_interval: config.renewal_interval,
            spot_renewal_interval: config.spot_renewal_interval,
        }
    }

    /// Spawn the renewal loops of every registered provider.
    ///
    /// The first full renewal starts immediately. Providers registered later
    /// are not picked up by this handle.
    pub fn start(&self) -> SchedulerHandle {
        let (trigger, signal) = shutdown::channel();
        let mut tasks = Vec::new();

        for infoer in self.refresher.registry().all() {
            tasks.push(tokio::spawn(provider_loop(
                Arc::clone(&self.refresher),
                Arc::clone(&infoer),
                self.renewal_interval,
                signal.clone(),
            )));

            if infoer.has_short_lived_price_info() {
                tasks.push(tokio::spawn(spot_loop(
                    Arc::clone(&self.refresher),
                    infoer,
                    self.spot_renewal_interval,
                    signal.clone(),
                )));
            }
        }

        info!(
            "Renewal scheduler started: {} task(s), renewal every {:?}, spot prices every {:?}",
            tasks.len(),
            self.renewal_interval,
            self.spot_renewal_interval
        );

        SchedulerHandle { trigger, tasks }
    }

    /// Run one full renewal of every registered provider and wait for it.
    pub async fn run_once(&self, cancel: &CancellationSignal) {
        let renewals = self
            .refresher
            .registry()
            .all()
            .into_iter()
            .map(|infoer| async move { renew_provider(&self.refresher, &infoer, cancel).await });
        join_all(renewals).await;
    }
}

/// Handle over running renewal loops.
pub struct SchedulerHandle {
    trigger: ShutdownTrigger,
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Signal observed by every task of this handle.
    pub fn signal(&self) -> CancellationSignal {
        self.trigger.signal()
    }

    pub fn is_finished(&self) -> bool {
        self.tasks.iter().all(JoinHandle::is_finished)
    }

    /// Cancel every loop and wait for in-flight cycles to wind down.
    ///
    /// Cycles observe cancellation at their next checkpoint and discard
    /// their partial results.
    pub async fn shutdown(self) {
        info!("Stopping renewal scheduler...");
        self.trigger.cancel();

        for task in self.tasks {
            if let Err(e) = task.await {
                warn!("Renewal task ended abnormally: {}", e);
            }
        }

        info!("Renewal scheduler stopped");
    }
}

/// Full renewal of one provider: preload, provider-level data, then every
/// region in parallel.
///
/// Returns the provider-level outcome; region outcomes go to the event sink.
pub async fn renew_provider(
    refresher: &Arc<Refresher>,
    infoer: &Arc<dyn Infoer>,
    cancel: &CancellationSignal,
) -> RefreshOutcome {
    let provider = infoer.id().to_string();

    let descriptor = match infoer.initialize().await {
        Ok(descriptor) => descriptor,
        Err(e) => {
            warn!("Failed to initialize '{}', renewing without preloaded prices: {}", provider, e);
            None
        }
    };

    let (outcome, regions) = refresher.refresh_provider(infoer.as_ref(), cancel).await;
    let Some(regions) = regions else {
        return outcome;
    };

    let mut descriptor = descriptor.unwrap_or_default();
    let tasks: Vec<_> = regions
        .into_iter()
        .map(|region| {
            let refresher = Arc::clone(refresher);
            let infoer = Arc::clone(infoer);
            let cancel = cancel.clone();
            let seed = descriptor.remove(&region);
            tokio::spawn(async move {
                refresher
                    .refresh_region(infoer.as_ref(), &region, seed.as_ref(), &cancel)
                    .await
            })
        })
        .collect();

    for result in join_all(tasks).await {
        if let Err(e) = result {
            warn!("Region refresh task of '{}' ended abnormally: {}", provider, e);
        }
    }

    outcome
}

/// Spot-only renewal of every cached region of a provider.
pub async fn renew_spot_prices(
    refresher: &Arc<Refresher>,
    infoer: &Arc<dyn Infoer>,
    cancel: &CancellationSignal,
) {
    let provider = infoer.id().to_string();
    let tasks: Vec<_> = refresher
        .cache()
        .regions_of(&provider)
        .into_iter()
        .map(|(region, _)| {
            let refresher = Arc::clone(refresher);
            let infoer = Arc::clone(infoer);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                refresher
                    .refresh_spot_prices(infoer.as_ref(), &region, &cancel)
                    .await
            })
        })
        .collect();

    for result in join_all(tasks).await {
        if let Err(e) = result {
            warn!("Spot price task of '{}' ended abnormally: {}", provider, e);
        }
    }
}

async fn provider_loop(
    refresher: Arc<Refresher>,
    infoer: Arc<dyn Infoer>,
    period: Duration,
    cancel: CancellationSignal,
) {
    let provider = infoer.id().to_string();
    // First tick is immediate
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if !refresher.registry().contains(&provider) {
            info!("Provider '{}' was removed, stopping its renewal", provider);
            break;
        }

        debug!("Renewing provider '{}'", provider);
        renew_provider(&refresher, &infoer, &cancel).await;
    }

    debug!("Renewal loop of '{}' stopped", provider);
}

async fn spot_loop(
    refresher: Arc<Refresher>,
    infoer: Arc<dyn Infoer>,
    period: Duration,
    cancel: CancellationSignal,
) {
    let provider = infoer.id().to_string();
    // The full renewal already fetches spot prices
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if !refresher.registry().contains(&provider) {
            break;
        }

        debug!("Renewing spot prices of '{}'", provider);
        renew_spot_prices(&refresher, &infoer, &cancel).await;
    }

    debug!("Spot price loop of '{}' stopped", provider);
}
