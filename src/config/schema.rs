//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the engine.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the routing engine.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    /// Circuit breaker thresholds shared by every provider.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Background probe settings.
    pub health_check: HealthCheckConfig,

    /// Payment rails known at startup.
    pub providers: Vec<ProviderConfig>,

    /// Per-currency routing strategies.
    pub routing: Vec<RoutingStrategyConfig>,

    /// Fallback providers for currencies without a strategy.
    pub defaults: DefaultsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub admin: AdminConfig,
}

/// How a half-open circuit decides to close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HalfOpenPolicy {
    /// Any success closes, any failure reopens.
    #[default]
    FirstSuccess,
    /// `success_threshold` successes in a row close, any failure reopens.
    ConsecutiveSuccesses,
}

/// Circuit breaker and statistics window configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open a closed circuit.
    pub failure_threshold: u32,

    /// Consecutive half-open successes needed under `consecutive_successes`.
    pub success_threshold: u32,

    /// Quiet time after the last failure before an open circuit half-opens.
    pub reset_timeout_ms: u64,

    /// Trailing window used for success rates.
    pub window_size_ms: u64,

    pub half_open_policy: HalfOpenPolicy,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 3,
            reset_timeout_ms: 30_000,
            window_size_ms: 60_000,
            half_open_policy: HalfOpenPolicy::FirstSuccess,
        }
    }
}

/// Health probe configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Run the probe loop at startup.
    pub enabled: bool,

    /// Time between probe rounds in milliseconds.
    pub interval_ms: u64,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 30_000,
        }
    }
}

/// A single payment rail.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    /// Unique provider identifier (e.g. "mpesa_ke").
    pub id: String,

    /// Provider API base URL.
    pub base_url: String,

    /// Path probed for liveness, relative to `base_url`.
    #[serde(default = "default_health_path")]
    pub health_path: String,

    /// Probe timeout in milliseconds.
    #[serde(default = "default_probe_timeout_ms")]
    pub timeout_ms: u64,

    /// Environment variable holding the provider's bearer token.
    #[serde(default)]
    pub api_key_env: Option<String>,
}

fn default_health_path() -> String {
    "/".to_string()
}

fn default_probe_timeout_ms() -> u64 {
    10_000
}

/// Health criteria a provider must meet to be routed to.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SelectionCriteria {
    pub min_success_rate: f64,
    pub max_latency_ms: f64,
    pub max_consecutive_failures: u32,
}

impl Default for SelectionCriteria {
    fn default() -> Self {
        Self {
            min_success_rate: 0.9,
            max_latency_ms: 5_000.0,
            max_consecutive_failures: 3,
        }
    }
}

/// Routing strategy for one currency.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoutingStrategyConfig {
    /// ISO currency code (e.g. "KES").
    pub currency: String,

    pub primary: String,

    pub backup: String,

    /// Probability mass favouring the primary when the backup performs better.
    #[serde(default = "default_preference_score")]
    pub preference_score: f64,

    #[serde(default)]
    pub criteria: SelectionCriteria,
}

fn default_preference_score() -> f64 {
    0.8
}

/// Fallback provider selection.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Provider used when nothing more specific is configured.
    pub provider: String,

    /// Currency code -> provider, consulted before `provider`.
    pub currencies: BTreeMap<String, String>,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            provider: "default".to_string(),
            currencies: BTreeMap::new(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
            request_timeout_secs: 30,
        }
    }
}
