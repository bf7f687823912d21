//! Refresh event sink trait and implementations.

use std::sync::{Arc, Mutex};

use log::{info, trace, warn};

use super::{RefreshEvent, RefreshOutcome};

/// Trait for receiving refresh events.
///
/// `emit()` is called from refresh tasks and must not block. Failure to
/// handle an event never affects the cycle that produced it.
pub trait RefreshEventSink: Send + Sync {
    /// Emit a single refresh event.
    fn emit(&self, event: RefreshEvent);

    /// Emit multiple refresh events.
    ///
    /// Default implementation calls `emit()` for each event.
    fn emit_batch(&self, events: Vec<RefreshEvent>) {
        for event in events {
            self.emit(event);
        }
    }
}

/// Writes events through the `log` facade. Spot prices go to `trace`.
#[derive(Clone, Default)]
pub struct LoggingEventSink;

impl RefreshEventSink for LoggingEventSink {
    fn emit(&self, event: RefreshEvent) {
        match event {
            RefreshEvent::CycleCompleted {
                provider,
                region,
                kind,
                duration,
                outcome,
            } => {
                let key = match region {
                    Some(region) => format!("{}/{}", provider, region),
                    None => provider,
                };
                match outcome {
                    RefreshOutcome::Failed { error } => {
                        warn!("{:?} refresh of {} failed after {:?}: {}", kind, key, duration, error)
                    }
                    RefreshOutcome::Partial { skipped } => info!(
                        "{:?} refresh of {} completed in {:?}, {} instance type(s) unpriced",
                        kind, key, duration, skipped
                    ),
                    outcome => info!("{:?} refresh of {} {:?} in {:?}", kind, key, outcome, duration),
                }
            }
            RefreshEvent::SpotPrice {
                provider,
                region,
                zone,
                instance_type,
                price,
            } => trace!(
                "spot price {}/{}/{} {} = {}",
                provider,
                region,
                zone,
                instance_type,
                price
            ),
        }
    }
}

/// No-op implementation for contexts that don't need events.
#[derive(Clone, Default)]
pub struct NoOpEventSink;

impl RefreshEventSink for NoOpEventSink {
    fn emit(&self, _event: RefreshEvent) {}
}

/// Mock sink for testing - collects emitted events.
#[derive(Clone, Default)]
pub struct MockEventSink {
    events: Arc<Mutex<Vec<RefreshEvent>>>,
}

impl MockEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    pub fn events(&self) -> Vec<RefreshEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Outcomes of the completed cycles, in emission order.
    pub fn outcomes(&self) -> Vec<RefreshOutcome> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                RefreshEvent::CycleCompleted { outcome, .. } => Some(outcome),
                RefreshEvent::SpotPrice { .. } => None,
            })
            .collect()
    }

    /// Clears collected events.
    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().unwrap().is_empty()
    }
}

impl RefreshEventSink for MockEventSink {
    fn emit(&self, event: RefreshEvent) {
        self.events.lock().unwrap().push(event);
    }
}
