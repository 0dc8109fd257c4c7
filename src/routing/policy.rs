//! Provider selection.
//!
//! # Responsibilities
//! - Hold per-currency strategies and the default provider table
//! - Pick primary or backup from current health records
//! - Explain every decision with a reason string
//!
//! # Design Decisions
//! - Strategies live in a concurrent map, updatable at runtime
//! - Defaults are swapped wholesale on config reload
//! - Randomness is injected so the preference draw can be pinned in tests

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use serde::Serialize;
use uuid::Uuid;

use crate::config::DefaultsConfig;
use crate::health::{HealthRecord, HealthStore};
use crate::observability::metrics;
use crate::provider::ProviderId;
use crate::resilience::circuit_breaker::CircuitState;
use crate::routing::strategy::{
    is_available, normalize_currency, OperationType, RoutingStrategy, StrategyError,
};

/// Success-rate lead the backup needs before it may steal primary traffic.
pub const BACKUP_ADVANTAGE: f64 = 0.1;

/// Source of uniform draws in `[0, 1)`.
pub trait RandomSource: Send + Sync {
    fn next_f64(&self) -> f64;
}

/// Thread-local fast RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct FastRandom;

impl RandomSource for FastRandom {
    fn next_f64(&self) -> f64 {
        fastrand::f64()
    }
}

/// Always returns the same draw.
#[derive(Debug, Clone, Copy)]
pub struct FixedRandom(pub f64);

impl RandomSource for FixedRandom {
    fn next_f64(&self) -> f64 {
        self.0
    }
}

/// Outcome of a routing call.
#[derive(Debug, Clone, Serialize)]
pub struct RoutingDecision {
    pub decision_id: Uuid,
    pub currency: String,
    pub amount: u64,
    pub operation: OperationType,
    pub provider: ProviderId,
    pub is_backup: bool,
    pub reason: String,
    /// Strategy primary, or the default provider when no strategy applies.
    pub primary: ProviderId,
    /// Strategy backup, `None` when routed through defaults.
    pub backup: Option<ProviderId>,
}

/// Default provider table.
#[derive(Debug, Clone)]
pub struct DefaultProviders {
    pub provider: ProviderId,
    pub currencies: HashMap<String, ProviderId>,
}

impl DefaultProviders {
    pub fn from_config(config: &DefaultsConfig) -> Self {
        Self {
            provider: ProviderId::new(&config.provider),
            currencies: config
                .currencies
                .iter()
                .map(|(currency, provider)| (normalize_currency(currency), ProviderId::new(provider)))
                .collect(),
        }
    }

    pub fn for_currency(&self, currency: &str) -> &ProviderId {
        self.currencies.get(currency).unwrap_or(&self.provider)
    }
}

impl Default for DefaultProviders {
    fn default() -> Self {
        Self::from_config(&DefaultsConfig::default())
    }
}

/// Chooses a provider per request.
pub struct RoutingPolicy {
    store: Arc<HealthStore>,
    strategies: DashMap<String, RoutingStrategy>,
    defaults: ArcSwap<DefaultProviders>,
    random: Arc<dyn RandomSource>,
}

impl RoutingPolicy {
    pub fn new(store: Arc<HealthStore>, defaults: DefaultProviders, random: Arc<dyn RandomSource>) -> Self {
        Self {
            store,
            strategies: DashMap::new(),
            defaults: ArcSwap::from_pointee(defaults),
            random,
        }
    }

    /// Pick a provider for one request.
    pub fn select(&self, currency: &str, amount: u64, operation: OperationType) -> RoutingDecision {
        let currency = normalize_currency(currency);
        let strategy = self.strategies.get(&currency).map(|s| s.value().clone());

        let (provider, is_backup, reason, primary, backup) = match strategy {
            None => {
                let defaults = self.defaults.load();
                let provider = defaults.for_currency(&currency).clone();
                let reason = "default provider for currency".to_string();
                (provider.clone(), false, reason, provider, None)
            }
            Some(strategy) => {
                let primary = self.store.get(&strategy.primary);
                let backup = self.store.get(&strategy.backup);
                let (use_backup, reason) = self.choose(&strategy, &primary, &backup);
                let provider = if use_backup {
                    strategy.backup.clone()
                } else {
                    strategy.primary.clone()
                };
                (provider, use_backup, reason, strategy.primary, Some(strategy.backup))
            }
        };

        tracing::debug!(
            currency = %currency,
            amount,
            operation = %operation,
            provider = %provider,
            is_backup,
            reason = %reason,
            "Routing decision"
        );
        metrics::record_routing_decision(&currency, provider.as_str(), is_backup);

        RoutingDecision {
            decision_id: Uuid::new_v4(),
            currency,
            amount,
            operation,
            provider,
            is_backup,
            reason,
            primary,
            backup,
        }
    }

    /// `true` means route to the backup.
    fn choose(&self, strategy: &RoutingStrategy, primary: &HealthRecord, backup: &HealthRecord) -> (bool, String) {
        let primary_ok = is_available(primary, &strategy.criteria);
        let backup_ok = is_available(backup, &strategy.criteria);

        if primary_ok {
            if backup_ok
                && backup.success_rate - primary.success_rate > BACKUP_ADVANTAGE
                && self.random.next_f64() > strategy.preference_score
            {
                let reason = format!(
                    "backup has higher success rate {:.1}% vs {:.1}%",
                    backup.success_rate * 100.0,
                    primary.success_rate * 100.0
                );
                return (true, reason);
            }
            return (false, "primary provider healthy".to_string());
        }

        if backup_ok {
            return (true, format!("primary unavailable: {}", primary.circuit_state));
        }

        // Never hand out an open primary while the backup's circuit still admits traffic.
        if primary.circuit_state == CircuitState::Open && backup.circuit_state != CircuitState::Open {
            return (true, "all providers degraded, primary circuit open, attempting backup".to_string());
        }
        (false, "all providers degraded, attempting primary".to_string())
    }

    /// Install or replace the strategy for a currency. Returns the previous one.
    pub fn update_strategy(
        &self,
        currency: &str,
        strategy: RoutingStrategy,
    ) -> Result<Option<RoutingStrategy>, StrategyError> {
        strategy.validate()?;
        let currency = normalize_currency(currency);
        tracing::info!(
            currency = %currency,
            primary = %strategy.primary,
            backup = %strategy.backup,
            preference_score = strategy.preference_score,
            "Routing strategy updated"
        );
        Ok(self.strategies.insert(currency, strategy))
    }

    pub fn remove_strategy(&self, currency: &str) -> Option<RoutingStrategy> {
        let currency = normalize_currency(currency);
        let removed = self.strategies.remove(&currency).map(|(_, s)| s);
        if removed.is_some() {
            tracing::info!(currency = %currency, "Routing strategy removed");
        }
        removed
    }

    pub fn strategy(&self, currency: &str) -> Option<RoutingStrategy> {
        self.strategies
            .get(&normalize_currency(currency))
            .map(|s| s.value().clone())
    }

    pub fn strategies(&self) -> BTreeMap<String, RoutingStrategy> {
        self.strategies
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Swap in a complete strategy set, as on config reload.
    pub fn replace_strategies(
        &self,
        strategies: impl IntoIterator<Item = (String, RoutingStrategy)>,
    ) -> Result<(), StrategyError> {
        let mut next = HashMap::new();
        for (currency, strategy) in strategies {
            strategy.validate()?;
            next.insert(normalize_currency(&currency), strategy);
        }
        self.strategies.retain(|currency, _| next.contains_key(currency));
        for (currency, strategy) in next {
            self.strategies.insert(currency, strategy);
        }
        Ok(())
    }

    pub fn defaults(&self) -> Arc<DefaultProviders> {
        self.defaults.load_full()
    }

    pub fn set_defaults(&self, defaults: DefaultProviders) {
        self.defaults.store(Arc::new(defaults));
    }
}
