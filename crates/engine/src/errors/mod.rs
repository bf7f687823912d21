//! Error types and retry classification for the cloudinfo engine.
//!
//! This module provides:
//! - [`CloudInfoError`]: The main error enum for adapter calls, refresh cycles and reads
//! - [`ErrorCode`]: Structured provider error code set by adapters
//! - [`MappingError`]: Classification failure (network tier, category)
//! - [`RetryClass`]: Classification for determining retry behavior

mod retry;

pub use retry::RetryClass;

use std::fmt;

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, CloudInfoError>;

/// Structured error code reported by a provider adapter.
///
/// Adapters translate their vendor error payloads into one of these codes so
/// the engine can decide on retries by identity, not by message text.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum ErrorCode {
    /// The provider refused one or more request parameters.
    InvalidParameter,
    /// The provider throttled the request.
    Throttled,
    /// Credentials were rejected.
    Unauthorized,
    /// The requested resource does not exist at the provider.
    NotFound,
    /// Any other vendor code, kept verbatim for diagnostics.
    Other(String),
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidParameter => write!(f, "InvalidParameter"),
            Self::Throttled => write!(f, "Throttled"),
            Self::Unauthorized => write!(f, "Unauthorized"),
            Self::NotFound => write!(f, "NotFound"),
            Self::Other(code) => write!(f, "{}", code),
        }
    }
}

/// A network tier or VM category could not be derived.
///
/// Never fatal: callers log it and fall back to a default value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MappingError {
    /// The throughput string could not be parsed.
    #[error("Unrecognized network performance: '{0}'")]
    UnparseableNetworkPerf(String),

    /// The parsed value is outside every configured range.
    #[error("No network tier covers {0} Gbit/s")]
    NetworkPerfOutOfRange(f64),

    /// No category rule matched the instance type.
    #[error("No category for instance type: {0}")]
    UnknownCategory(String),

    /// The tier thresholds are not contiguous or overlap.
    #[error("Invalid tier thresholds: {0}")]
    InvalidThresholds(String),
}

/// Errors that can occur in the cloudinfo engine.
///
/// Each variant is classified into a [`RetryClass`] via the
/// [`retry_class`](Self::retry_class) method.
#[derive(Error, Debug)]
pub enum CloudInfoError {
    /// An adapter call failed. Transient unless the code says otherwise.
    #[error("Provider unavailable: {provider} - {message}")]
    ProviderUnavailable {
        /// The provider that failed
        provider: String,
        /// The error message from the provider
        message: String,
        /// Structured vendor code, when the adapter could determine one
        code: Option<ErrorCode>,
    },

    /// The provider does not support the requested service or operation.
    #[error("Unsupported service: {provider} does not support '{service}'")]
    UnsupportedService {
        /// The provider that was asked
        provider: String,
        /// The service or operation name
        service: String,
    },

    /// The attribute has no numeric value set on cached products.
    #[error("Unsupported attribute: {0}")]
    UnsupportedAttribute(String),

    /// Some elements of a bulk request failed; the rest were recovered.
    #[error("Partial data from {provider} in {region}: {} item(s) failed", failed.len())]
    PartialData {
        /// The provider that was queried
        provider: String,
        /// The region that was queried
        region: String,
        /// Identifiers of the items that could not be retrieved
        failed: Vec<String>,
    },

    /// Classification failed.
    #[error(transparent)]
    Mapping(#[from] MappingError),

    /// No adapter is registered under this name.
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// The cache has not been populated for this key yet.
    #[error("No data yet for {provider} in {region}")]
    NoDataYet {
        /// Provider name
        provider: String,
        /// Region id, or `*` for provider-level data
        region: String,
    },

    /// The cache is populated but holds no price for the query.
    #[error("No price data for {instance_type} in {provider}/{region}")]
    NoPriceData {
        /// Provider name
        provider: String,
        /// Region id
        region: String,
        /// Instance type
        instance_type: String,
    },

    /// The cache is populated but the query matched nothing.
    #[error("No matching data: {0}")]
    NoMatchingData(String),

    /// The operation observed a cancellation request.
    #[error("Cancelled")]
    Cancelled,

    /// Invalid engine configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl CloudInfoError {
    /// Shorthand for an adapter failure without a vendor code.
    pub fn unavailable(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderUnavailable {
            provider: provider.into(),
            message: message.into(),
            code: None,
        }
    }

    /// Shorthand for an adapter failure carrying a vendor code.
    pub fn rejected(
        provider: impl Into<String>,
        code: ErrorCode,
        message: impl Into<String>,
    ) -> Self {
        Self::ProviderUnavailable {
            provider: provider.into(),
            message: message.into(),
            code: Some(code),
        }
    }

    /// The structured vendor code, if any.
    pub fn code(&self) -> Option<&ErrorCode> {
        match self {
            Self::ProviderUnavailable { code, .. } => code.as_ref(),
            _ => None,
        }
    }

    /// Returns the retry classification for this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use cloudinfo_engine::errors::{CloudInfoError, ErrorCode, RetryClass};
    ///
    /// let error = CloudInfoError::rejected("alibaba", ErrorCode::InvalidParameter, "bad type");
    /// assert_eq!(error.retry_class(), RetryClass::PerItem);
    ///
    /// let error = CloudInfoError::unavailable("alibaba", "connection reset");
    /// assert_eq!(error.retry_class(), RetryClass::NextCycle);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::ProviderUnavailable {
                code: Some(ErrorCode::InvalidParameter),
                ..
            } => RetryClass::PerItem,

            Self::ProviderUnavailable { .. } | Self::PartialData { .. } | Self::Cancelled => {
                RetryClass::NextCycle
            }

            // Read-path errors resolve themselves once a cycle completes
            Self::NoDataYet { .. } | Self::NoPriceData { .. } | Self::NoMatchingData(_) => {
                RetryClass::NextCycle
            }

            Self::UnsupportedService { .. }
            | Self::UnsupportedAttribute(_)
            | Self::Mapping(_)
            | Self::UnknownProvider(_)
            | Self::Config(_) => RetryClass::Never,
        }
    }
}
