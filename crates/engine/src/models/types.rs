/// Provider name (e.g., "amazon", "alibaba")
pub type ProviderName = String;

/// Region identifier as reported by the provider
pub type RegionId = String;

/// Availability zone identifier
pub type ZoneId = String;

/// Instance type identifier (e.g., "ecs.g6.large")
pub type InstanceType = String;

/// Attribute key for the CPU count of an instance type
pub const CPU: &str = "cpu";

/// Attribute key for the memory size of an instance type
pub const MEMORY: &str = "memory";

/// Attribute key for the network performance tier
pub const NETWORK_PERF_CATEGORY: &str = "networkPerfCategory";

/// Attribute key for the instance type category
pub const INSTANCE_TYPE_CATEGORY: &str = "instanceTypeCategory";
