//! Registered provider adapters.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use log::info;

use super::traits::Infoer;
use crate::models::ProviderName;

/// Adapters by provider name, shared between the read façade and the
/// renewal machinery. Removing a provider stops its renewal loops at their
/// next checkpoint.
#[derive(Default)]
pub struct InfoerRegistry {
    infoers: RwLock<BTreeMap<ProviderName, Arc<dyn Infoer>>>,
}

impl InfoerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter, replacing any previous one with the same id.
    pub fn register(&self, infoer: Arc<dyn Infoer>) {
        let id = infoer.id().to_string();
        info!("Registered provider '{}'", id);
        self.infoers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, infoer);
    }

    pub fn remove(&self, provider: &str) -> Option<Arc<dyn Infoer>> {
        self.infoers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(provider)
    }

    pub fn get(&self, provider: &str) -> Option<Arc<dyn Infoer>> {
        self.infoers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(provider)
            .cloned()
    }

    pub fn contains(&self, provider: &str) -> bool {
        self.infoers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(provider)
    }

    /// Registered provider names, sorted.
    pub fn names(&self) -> Vec<ProviderName> {
        self.infoers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Snapshot of every registered adapter, sorted by name.
    pub fn all(&self) -> Vec<Arc<dyn Infoer>> {
        self.infoers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}
