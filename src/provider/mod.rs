//! Payment rail providers.
//!
//! # Responsibilities
//! - Name each external rail (mobile-money operator, card processor, bank aggregator)
//! - Define the liveness capability the health prober depends on
//!
//! # Design Decisions
//! - Clients are injected into the engine; the core never builds them itself
//! - Payment calls stay with the caller, only the liveness call is part of the trait

pub mod http;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use http::HttpProviderClient;

/// Identifier of a payment rail, e.g. `mpesa_ke` or `telebirr_et`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(Arc<str>);

impl ProviderId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ProviderId {
    fn from(id: String) -> Self {
        Self(Arc::from(id))
    }
}

/// Errors a liveness probe can end with.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProbeError {
    /// No answer within the provider's probe timeout.
    #[error("probe timed out after {0} ms")]
    Timeout(u64),

    /// Connection refused, DNS failure, TLS failure and friends.
    #[error("transport error: {0}")]
    Transport(String),

    /// Endpoint answered with a 5xx status.
    #[error("provider returned server error status {0}")]
    ServerError(u16),

    /// Probe URL could not be built from configuration.
    #[error("invalid provider endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Result of one liveness probe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthSample {
    pub ok: bool,
    pub latency_ms: f64,
    pub error_message: Option<String>,
}

/// Liveness capability of a provider.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// The provider this client talks to.
    fn id(&self) -> &ProviderId;

    /// Upper bound on a single probe, enforced by the prober.
    fn probe_timeout(&self) -> Duration;

    /// Perform a lightweight reachability call.
    ///
    /// `Ok` means the endpoint is up, even if it refused our credentials.
    async fn liveness(&self) -> Result<(), ProbeError>;
}
