//! Passive health checking: outcomes of real payment attempts.
//!
//! # Responsibilities
//! - Accept the outcome of every live provider invocation
//! - Feed it into the same store path the prober uses
//!
//! # Design Decisions
//! - Live attempts and probes share one record per provider
//! - Callers that invoke providers themselves only need this for bookkeeping

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use crate::health::state::{AttemptSource, HealthRecord};
use crate::health::store::HealthStore;
use crate::provider::ProviderId;

/// Records live attempt outcomes.
#[derive(Debug, Clone)]
pub struct AttemptRecorder {
    store: Arc<HealthStore>,
}

impl AttemptRecorder {
    pub fn new(store: Arc<HealthStore>) -> Self {
        Self { store }
    }

    /// Record one live attempt.
    pub fn record(
        &self,
        provider: &ProviderId,
        success: bool,
        latency_ms: f64,
        error: Option<String>,
    ) -> HealthRecord {
        if let Some(err) = &error {
            tracing::debug!(provider = %provider, latency_ms, error = %err, "Live attempt failed");
        }
        self.store
            .record_result(provider, success, latency_ms, error, AttemptSource::Live)
    }

    pub fn record_success(&self, provider: &ProviderId, elapsed: Duration) -> HealthRecord {
        self.record(provider, true, duration_ms(elapsed), None)
    }

    pub fn record_failure(
        &self,
        provider: &ProviderId,
        elapsed: Duration,
        error: impl Display,
    ) -> HealthRecord {
        self.record(provider, false, duration_ms(elapsed), Some(error.to_string()))
    }
}

pub(crate) fn duration_ms(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::CircuitBreakerConfig;

    #[test]
    fn test_records_live_attempts() {
        let p = ProviderId::new("paystack_ng");
        let store = Arc::new(HealthStore::new(
            [p.clone()],
            CircuitBreakerConfig::default(),
            Arc::new(ManualClock::new(0)),
        ));
        let recorder = AttemptRecorder::new(store.clone());

        recorder.record_success(&p, Duration::from_millis(1000));
        let r = recorder.record_failure(&p, Duration::from_millis(0), "card declined by issuer");

        assert_eq!(r.failure_count, 1);
        assert!((r.average_latency_ms - 210.0).abs() < 1e-6);
        assert_eq!(r.last_error.as_deref(), Some("card declined by issuer"));

        let attempts = store.attempts(&p);
        assert_eq!(attempts.len(), 2);
        assert!(attempts.iter().all(|a| a.source == AttemptSource::Live));
    }

    #[test]
    fn test_duration_ms() {
        assert_eq!(duration_ms(Duration::from_micros(1500)), 1.5);
    }
}
