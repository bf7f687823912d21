use serde::{Deserialize, Serialize};

use super::types::RegionId;

/// A service supported by a provider (e.g., "compute", "eks", "ack").
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Service {
    pub service: String,
}

impl Service {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            service: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.service
    }
}

/// A cloud provider and the services it exposes.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    pub provider: String,
    #[serde(default)]
    pub services: Vec<Service>,
}

impl Provider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            provider: name.into(),
            services: Vec::new(),
        }
    }

    pub fn with_services(mut self, services: Vec<Service>) -> Self {
        self.services = services;
        self
    }

    pub fn name(&self) -> &str {
        &self.provider
    }
}

/// A machine image usable by a service.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Image {
    #[serde(rename = "image")]
    pub name: String,
}

impl Image {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A service version (e.g., a Kubernetes release).
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Version {
    #[serde(rename = "versions")]
    pub version: String,
}

impl Version {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.version
    }
}

/// Versions available in one location, with the location's default.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct LocationVersion {
    pub location: RegionId,
    pub versions: Vec<String>,
    #[serde(rename = "default")]
    pub default_version: String,
}

impl LocationVersion {
    pub fn new(location: impl Into<RegionId>, versions: Vec<String>, default_version: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            versions,
            default_version: default_version.into(),
        }
    }
}

/// A distinct attribute value observed across cached products.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttrValue {
    pub str_value: String,
    pub value: f64,
}
