//! HealthRecord store: the single source of truth for provider health.
//!
//! # Responsibilities
//! - Append attempts and fold them into each provider's record
//! - Keep success rates confined to the trailing window
//! - Re-evaluate the circuit breaker in the same critical section as the update
//!
//! # Design Decisions
//! - One mutex per provider; the dashmap shard lock is only held to fetch the slot
//! - Reads refresh clock-derived fields (window, Open → Half-Open) under the same lock
//! - Unknown providers read as optimistic defaults and register on first write

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arc_swap::ArcSwap;
use dashmap::DashMap;

use crate::clock::Clock;
use crate::config::CircuitBreakerConfig;
use crate::health::state::{ema_latency, Attempt, AttemptSource, HealthRecord, HealthSummary};
use crate::observability::metrics;
use crate::provider::ProviderId;
use crate::resilience::circuit_breaker::{self, Transition};

/// Attempts are kept for this many windows before pruning.
pub const RETENTION_WINDOWS: u64 = 10;

#[derive(Debug)]
struct ProviderSlot {
    record: HealthRecord,
    attempts: VecDeque<Attempt>,
    /// Index of the oldest attempt still inside the success-rate window.
    window_start: usize,
    window_total: u64,
    window_ok: u64,
    /// Window width the cursor was last computed for.
    window_ms: u64,
}

impl ProviderSlot {
    fn new(provider: ProviderId) -> Self {
        Self {
            record: HealthRecord::new(provider),
            attempts: VecDeque::new(),
            window_start: 0,
            window_total: 0,
            window_ok: 0,
            window_ms: 0,
        }
    }

    fn push(&mut self, attempt: Attempt) {
        self.window_total += 1;
        self.window_ok += attempt.success as u64;
        self.attempts.push_back(attempt);
    }

    /// Slide the window cursor, drop attempts past retention and update the success rate.
    ///
    /// Only attempts leaving the window or retention are visited, so the cost
    /// does not grow with the number of retained attempts.
    fn refresh_window(&mut self, now: u64, window_ms: u64) {
        if window_ms != self.window_ms {
            self.rescan(now, window_ms);
        } else {
            while let Some(attempt) = self.attempts.get(self.window_start) {
                if now.saturating_sub(attempt.timestamp) < window_ms {
                    break;
                }
                self.window_total -= 1;
                self.window_ok -= attempt.success as u64;
                self.window_start += 1;
            }
        }

        let retention = window_ms.saturating_mul(RETENTION_WINDOWS);
        while let Some(front) = self.attempts.front() {
            if now.saturating_sub(front.timestamp) <= retention {
                break;
            }
            let success = front.success;
            self.attempts.pop_front();
            if self.window_start > 0 {
                self.window_start -= 1;
            } else {
                self.window_total -= 1;
                self.window_ok -= success as u64;
            }
        }

        self.record.success_rate = if self.window_total == 0 {
            1.0
        } else {
            self.window_ok as f64 / self.window_total as f64
        };
    }

    /// Recompute the cursor from scratch after the window width changed.
    fn rescan(&mut self, now: u64, window_ms: u64) {
        self.window_start = self
            .attempts
            .iter()
            .position(|a| now.saturating_sub(a.timestamp) < window_ms)
            .unwrap_or(self.attempts.len());
        let (total, ok) = self
            .attempts
            .range(self.window_start..)
            .fold((0u64, 0u64), |(total, ok), a| (total + 1, ok + a.success as u64));
        self.window_total = total;
        self.window_ok = ok;
        self.window_ms = window_ms;
    }
}

fn lock(slot: &Mutex<ProviderSlot>) -> MutexGuard<'_, ProviderSlot> {
    // Poisoned slots stay readable.
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Concurrent store of per-provider health.
#[derive(Debug)]
pub struct HealthStore {
    slots: DashMap<ProviderId, Arc<Mutex<ProviderSlot>>>,
    config: ArcSwap<CircuitBreakerConfig>,
    clock: Arc<dyn Clock>,
}

impl HealthStore {
    /// Create a store with an optimistic record for every known provider.
    pub fn new(
        providers: impl IntoIterator<Item = ProviderId>,
        config: CircuitBreakerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let slots = DashMap::new();
        for provider in providers {
            metrics::record_circuit_state(provider.as_str(), circuit_breaker::CircuitState::Closed);
            slots.insert(provider.clone(), Arc::new(Mutex::new(ProviderSlot::new(provider))));
        }
        Self {
            slots,
            config: ArcSwap::from_pointee(config),
            clock,
        }
    }

    /// Current circuit thresholds.
    pub fn config(&self) -> Arc<CircuitBreakerConfig> {
        self.config.load_full()
    }

    /// Swap circuit thresholds; takes effect on the next update or read.
    pub fn update_config(&self, config: CircuitBreakerConfig) {
        tracing::info!(
            failure_threshold = config.failure_threshold,
            reset_timeout_ms = config.reset_timeout_ms,
            window_size_ms = config.window_size_ms,
            "Circuit breaker thresholds updated"
        );
        self.config.store(Arc::new(config));
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Register a provider; returns false if it was already known.
    pub fn register(&self, provider: ProviderId) -> bool {
        let mut inserted = false;
        self.slots.entry(provider.clone()).or_insert_with(|| {
            inserted = true;
            Arc::new(Mutex::new(ProviderSlot::new(provider.clone())))
        });
        if inserted {
            metrics::record_circuit_state(provider.as_str(), circuit_breaker::CircuitState::Closed);
        }
        inserted
    }

    pub fn contains(&self, provider: &ProviderId) -> bool {
        self.slots.contains_key(provider)
    }

    /// Known providers, sorted.
    pub fn providers(&self) -> Vec<ProviderId> {
        let mut ids: Vec<_> = self.slots.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    fn slot(&self, provider: &ProviderId) -> Option<Arc<Mutex<ProviderSlot>>> {
        self.slots.get(provider).map(|e| e.value().clone())
    }

    fn slot_or_register(&self, provider: &ProviderId) -> Arc<Mutex<ProviderSlot>> {
        if let Some(slot) = self.slot(provider) {
            return slot;
        }
        tracing::warn!(provider = %provider, "Recording result for unknown provider, registering it");
        self.register(provider.clone());
        self.slots
            .entry(provider.clone())
            .or_insert_with(|| Arc::new(Mutex::new(ProviderSlot::new(provider.clone()))))
            .value()
            .clone()
    }

    /// Record the outcome of a probe or live attempt and return the updated record.
    pub fn record_result(
        &self,
        provider: &ProviderId,
        success: bool,
        latency_ms: f64,
        error: Option<String>,
        source: AttemptSource,
    ) -> HealthRecord {
        let config = self.config.load();
        let slot = self.slot_or_register(provider);

        let (snapshot, transition) = {
            let mut guard = lock(&slot);
            let now = self.clock.now_millis();
            let latency_ms = latency_ms.max(0.0);

            guard.push(Attempt {
                provider: provider.clone(),
                success,
                latency_ms,
                error: error.clone(),
                timestamp: now,
                source,
            });
            guard.refresh_window(now, config.window_size_ms);

            let record = &mut guard.record;
            record.total_attempts += 1;
            record.last_check = Some(now);
            record.is_healthy = success;
            record.average_latency_ms = ema_latency(record.average_latency_ms, latency_ms);
            if success {
                record.consecutive_failures = 0;
                record.last_success = Some(now);
                if record.circuit_state == circuit_breaker::CircuitState::HalfOpen {
                    record.half_open_successes += 1;
                }
            } else {
                record.consecutive_failures += 1;
                record.failure_count += 1;
                record.last_failure = Some(now);
                record.last_error = error;
            }

            let transition = circuit_breaker::advance(record, Some(success), &config, now);
            (record.clone(), transition)
        };

        metrics::record_attempt(provider.as_str(), source.as_str(), success, latency_ms);
        if let Some(transition) = transition {
            log_transition(&snapshot, transition);
        }
        snapshot
    }

    /// Point read. Unknown providers read as optimistic defaults.
    pub fn get(&self, provider: &ProviderId) -> HealthRecord {
        match self.slot(provider) {
            Some(slot) => self.refresh(&slot),
            None => HealthRecord::new(provider.clone()),
        }
    }

    /// Snapshot of every known provider.
    pub fn get_all(&self) -> BTreeMap<ProviderId, HealthRecord> {
        let slots: Vec<_> = self
            .slots
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        slots
            .into_iter()
            .map(|(id, slot)| (id, self.refresh(&slot)))
            .collect()
    }

    /// Classify every provider as healthy, degraded or unhealthy.
    pub fn summary(&self) -> HealthSummary {
        let all = self.get_all();
        HealthSummary::from_records(all.values())
    }

    /// Re-evaluate clock-driven state for every provider.
    pub fn refresh_all(&self) {
        let _ = self.get_all();
    }

    /// Operator override: force CLOSED and clear the failure streak.
    ///
    /// Returns `None` for unknown providers.
    pub fn reset(&self, provider: &ProviderId) -> Option<HealthRecord> {
        let slot = self.slot(provider)?;
        let (snapshot, transition) = {
            let mut guard = lock(&slot);
            let now = self.clock.now_millis();
            let transition = circuit_breaker::force_close(&mut guard.record, now);
            (guard.record.clone(), transition)
        };
        tracing::info!(provider = %provider, "Circuit breaker manually reset");
        if let Some(transition) = transition {
            log_transition(&snapshot, transition);
        }
        Some(snapshot)
    }

    /// Attempts currently retained for a provider, oldest first.
    pub(crate) fn attempts(&self, provider: &ProviderId) -> Vec<Attempt> {
        self.slot(provider)
            .map(|slot| lock(&slot).attempts.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn refresh(&self, slot: &Mutex<ProviderSlot>) -> HealthRecord {
        let config = self.config.load();
        let (snapshot, transition) = {
            let mut guard = lock(slot);
            let now = self.clock.now_millis();
            guard.refresh_window(now, config.window_size_ms);
            let transition = circuit_breaker::advance(&mut guard.record, None, &config, now);
            (guard.record.clone(), transition)
        };
        if let Some(transition) = transition {
            log_transition(&snapshot, transition);
        }
        snapshot
    }
}

fn log_transition(record: &HealthRecord, transition: Transition) {
    metrics::record_circuit_state(record.provider.as_str(), transition.to);
    match transition.to {
        circuit_breaker::CircuitState::Open => tracing::warn!(
            provider = %record.provider,
            from = %transition.from,
            consecutive_failures = record.consecutive_failures,
            last_error = ?record.last_error,
            "Circuit opened"
        ),
        _ => tracing::info!(
            provider = %record.provider,
            from = %transition.from,
            to = %transition.to,
            "Circuit state changed"
        ),
    }
}
