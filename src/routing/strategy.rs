//! Per-currency routing strategies and availability criteria.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::RoutingStrategyConfig;
pub use crate::config::SelectionCriteria;
use crate::health::HealthRecord;
use crate::provider::ProviderId;
use crate::resilience::circuit_breaker::CircuitState;

/// Kind of money movement being routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    #[default]
    Payment,
    Payout,
    Refund,
    BalanceInquiry,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Payment => "payment",
            OperationType::Payout => "payout",
            OperationType::Refund => "refund",
            OperationType::BalanceInquiry => "balance_inquiry",
        }
    }
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected strategy values.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StrategyError {
    #[error("primary and backup are both '{0}'")]
    SameProvider(String),

    #[error("preference_score {0} is outside [0, 1]")]
    PreferenceOutOfRange(f64),

    #[error("min_success_rate {0} is outside [0, 1]")]
    MinSuccessRateOutOfRange(f64),

    #[error("max_latency_ms {0} must be positive")]
    InvalidMaxLatency(f64),

    #[error("max_consecutive_failures must be greater than zero")]
    ZeroMaxConsecutiveFailures,
}

/// Primary/backup pair for one currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingStrategy {
    pub primary: ProviderId,
    pub backup: ProviderId,
    /// Probability mass favouring the primary when the backup performs better.
    pub preference_score: f64,
    #[serde(default)]
    pub criteria: SelectionCriteria,
}

impl RoutingStrategy {
    pub fn new(primary: impl Into<ProviderId>, backup: impl Into<ProviderId>, preference_score: f64) -> Self {
        Self {
            primary: primary.into(),
            backup: backup.into(),
            preference_score,
            criteria: SelectionCriteria::default(),
        }
    }

    pub fn with_criteria(mut self, criteria: SelectionCriteria) -> Self {
        self.criteria = criteria;
        self
    }

    pub fn from_config(config: &RoutingStrategyConfig) -> Self {
        Self {
            primary: ProviderId::new(&config.primary),
            backup: ProviderId::new(&config.backup),
            preference_score: config.preference_score,
            criteria: config.criteria,
        }
    }

    pub fn validate(&self) -> Result<(), StrategyError> {
        if self.primary == self.backup {
            return Err(StrategyError::SameProvider(self.primary.to_string()));
        }
        if !(0.0..=1.0).contains(&self.preference_score) {
            return Err(StrategyError::PreferenceOutOfRange(self.preference_score));
        }
        if !(0.0..=1.0).contains(&self.criteria.min_success_rate) {
            return Err(StrategyError::MinSuccessRateOutOfRange(self.criteria.min_success_rate));
        }
        if !(self.criteria.max_latency_ms > 0.0) {
            return Err(StrategyError::InvalidMaxLatency(self.criteria.max_latency_ms));
        }
        if self.criteria.max_consecutive_failures == 0 {
            return Err(StrategyError::ZeroMaxConsecutiveFailures);
        }
        Ok(())
    }
}

/// Whether a provider meets the criteria to receive traffic.
pub fn is_available(record: &HealthRecord, criteria: &SelectionCriteria) -> bool {
    record.circuit_state != CircuitState::Open
        && record.success_rate >= criteria.min_success_rate
        && record.consecutive_failures < criteria.max_consecutive_failures
        && record.average_latency_ms <= criteria.max_latency_ms
}

/// Currency codes are matched case-insensitively.
pub fn normalize_currency(currency: &str) -> String {
    currency.trim().to_ascii_uppercase()
}
