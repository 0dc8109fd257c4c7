//! Provider health records.
//!
//! # Contents
//! - `HealthRecord`: live snapshot per provider, mutated only by the store
//! - `Attempt`: immutable log entry for one probe or live call
//! - `HealthSummary`: healthy / degraded / unhealthy classification
//!
//! # Design Decisions
//! - Records start optimistic (healthy, 100% success, circuit closed)
//! - Latency is an exponential moving average, 0.3 weight on the new sample
//! - Timestamps are epoch milliseconds

use serde::{Deserialize, Serialize};

use crate::provider::ProviderId;
use crate::resilience::circuit_breaker::CircuitState;

/// Weight of the newest latency sample in the moving average.
pub const LATENCY_EMA_ALPHA: f64 = 0.3;

/// Success rate below which a closed provider counts as degraded.
pub const DEGRADED_SUCCESS_RATE: f64 = 0.95;

/// Fold a latency sample into the running average.
pub fn ema_latency(average_ms: f64, sample_ms: f64) -> f64 {
    average_ms * (1.0 - LATENCY_EMA_ALPHA) + sample_ms * LATENCY_EMA_ALPHA
}

/// Where an attempt came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptSource {
    /// Synthetic liveness check.
    Probe,
    /// Real payment traffic.
    Live,
}

impl AttemptSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptSource::Probe => "probe",
            AttemptSource::Live => "live",
        }
    }
}

/// One recorded provider invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attempt {
    pub provider: ProviderId,
    pub success: bool,
    pub latency_ms: f64,
    pub error: Option<String>,
    pub timestamp: u64,
    pub source: AttemptSource,
}

/// Live health snapshot of one provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthRecord {
    pub provider: ProviderId,
    pub is_healthy: bool,
    /// Fraction of successful attempts inside the trailing window.
    pub success_rate: f64,
    pub average_latency_ms: f64,
    pub consecutive_failures: u32,
    /// Lifetime failures.
    pub failure_count: u64,
    /// Lifetime attempts, probes included.
    pub total_attempts: u64,
    pub last_check: Option<u64>,
    pub last_success: Option<u64>,
    pub last_failure: Option<u64>,
    pub last_error: Option<String>,
    pub circuit_state: CircuitState,
    /// When the circuit last opened, cleared on close.
    pub opened_at: Option<u64>,
    /// Successes seen since entering half-open.
    pub half_open_successes: u32,
}

impl HealthRecord {
    /// Optimistic record for a provider that has not been observed yet.
    pub fn new(provider: ProviderId) -> Self {
        Self {
            provider,
            is_healthy: true,
            success_rate: 1.0,
            average_latency_ms: 0.0,
            consecutive_failures: 0,
            failure_count: 0,
            total_attempts: 0,
            last_check: None,
            last_success: None,
            last_failure: None,
            last_error: None,
            circuit_state: CircuitState::Closed,
            opened_at: None,
            half_open_successes: 0,
        }
    }

    pub fn classify(&self) -> HealthClass {
        match self.circuit_state {
            CircuitState::Open => HealthClass::Unhealthy,
            CircuitState::HalfOpen => HealthClass::Degraded,
            CircuitState::Closed if self.success_rate < DEGRADED_SUCCESS_RATE => HealthClass::Degraded,
            CircuitState::Closed => HealthClass::Healthy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthClass {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Providers grouped by health class, each list sorted by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HealthSummary {
    pub healthy: Vec<ProviderId>,
    pub degraded: Vec<ProviderId>,
    pub unhealthy: Vec<ProviderId>,
}

impl HealthSummary {
    /// Build a summary from records.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a HealthRecord>) -> Self {
        let mut summary = Self::default();
        for record in records {
            let bucket = match record.classify() {
                HealthClass::Healthy => &mut summary.healthy,
                HealthClass::Degraded => &mut summary.degraded,
                HealthClass::Unhealthy => &mut summary.unhealthy,
            };
            bucket.push(record.provider.clone());
        }
        summary.healthy.sort();
        summary.degraded.sort();
        summary.unhealthy.sort();
        summary
    }

    pub fn total(&self) -> usize {
        self.healthy.len() + self.degraded.len() + self.unhealthy.len()
    }
}
