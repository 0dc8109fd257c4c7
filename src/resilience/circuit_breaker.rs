//! Circuit breaker for provider protection.
//!
//! # States
//! - Closed: normal operation, traffic flows
//! - Open: provider presumed down, never routed to
//! - Half-Open: testing if the provider recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive_failures >= failure_threshold
//! Open → Half-Open: now - last_failure > reset_timeout
//! Half-Open → Closed: latest outcome healthy (or success_threshold in a row)
//! Half-Open → Open: latest outcome unhealthy
//! ```
//!
//! # Design Decisions
//! - Per-provider circuit breaker (not global)
//! - Evaluation is a pure function of the just-updated record; the store
//!   applies it inside the same critical section as the update
//! - At most one transition per evaluation, so Open never jumps to Closed
//! - Half-Open admits all traffic and reopens on the first failure
//! - A success that moves Open to Half-Open counts toward `success_threshold`,
//!   so traffic-driven and read-driven recovery need the same number of
//!   successes (except at a threshold of 1, where Open still cannot close
//!   on the success that half-opens it)

use serde::{Deserialize, Serialize};

use crate::config::{CircuitBreakerConfig, HalfOpenPolicy};
use crate::health::state::HealthRecord;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        }
    }

    /// Gauge encoding: 0 closed, 1 half-open, 2 open.
    pub fn gauge_value(&self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::HalfOpen => 1.0,
            CircuitState::Open => 2.0,
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A state change applied to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: CircuitState,
    pub to: CircuitState,
}

/// Compute the next state.
///
/// `latest` is the outcome that triggered the evaluation, `None` when the
/// record is only being refreshed against the clock.
pub fn evaluate(
    record: &HealthRecord,
    latest: Option<bool>,
    config: &CircuitBreakerConfig,
    now: u64,
) -> CircuitState {
    match record.circuit_state {
        CircuitState::Closed => {
            if record.consecutive_failures >= config.failure_threshold {
                CircuitState::Open
            } else {
                CircuitState::Closed
            }
        }
        CircuitState::Open => {
            let quiet_for = record
                .last_failure
                .map(|t| now.saturating_sub(t))
                .unwrap_or(u64::MAX);
            if quiet_for > config.reset_timeout_ms {
                CircuitState::HalfOpen
            } else {
                CircuitState::Open
            }
        }
        CircuitState::HalfOpen => match latest {
            Some(false) => CircuitState::Open,
            Some(true) => match config.half_open_policy {
                HalfOpenPolicy::FirstSuccess => CircuitState::Closed,
                HalfOpenPolicy::ConsecutiveSuccesses => {
                    if record.half_open_successes >= config.success_threshold {
                        CircuitState::Closed
                    } else {
                        CircuitState::HalfOpen
                    }
                }
            },
            None => CircuitState::HalfOpen,
        },
    }
}

/// Move `record` to `to`, resetting the counters tied to the new state.
pub fn apply(record: &mut HealthRecord, to: CircuitState, now: u64) {
    match to {
        CircuitState::Open => {
            record.opened_at = Some(now);
        }
        CircuitState::HalfOpen => {}
        CircuitState::Closed => {
            record.consecutive_failures = 0;
            record.opened_at = None;
        }
    }
    record.half_open_successes = 0;
    record.circuit_state = to;
}

/// Evaluate and apply in one step.
pub fn advance(
    record: &mut HealthRecord,
    latest: Option<bool>,
    config: &CircuitBreakerConfig,
    now: u64,
) -> Option<Transition> {
    let from = record.circuit_state;
    let to = evaluate(record, latest, config, now);
    if from == to {
        return None;
    }
    apply(record, to, now);
    if to == CircuitState::HalfOpen && latest == Some(true) {
        record.half_open_successes = 1;
    }
    Some(Transition { from, to })
}

/// Operator override: force the circuit closed.
pub fn force_close(record: &mut HealthRecord, now: u64) -> Option<Transition> {
    let from = record.circuit_state;
    apply(record, CircuitState::Closed, now);
    (from != CircuitState::Closed).then_some(Transition {
        from,
        to: CircuitState::Closed,
    })
}
