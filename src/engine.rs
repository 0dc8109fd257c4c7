//! The routing engine: one explicitly constructed owner of all provider state.
//!
//! # Responsibilities
//! - Own the health store, routing policy, failover executor and prober
//! - Expose the inbound operations payment services and operators call
//! - Start and stop the background probe loop
//! - Apply reloaded configuration
//!
//! # Design Decisions
//! - No global state; callers share the engine through `Arc`
//! - Provider clients are injected, the engine never dials providers itself
//! - At most one probe loop runs at a time

use std::collections::BTreeMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::health::{AttemptRecorder, HealthMonitor, HealthRecord, HealthStore, HealthSummary};
use crate::lifecycle::Shutdown;
use crate::provider::{HttpProviderClient, ProbeError, ProviderClient, ProviderId};
use crate::resilience::{FailoverError, FailoverExecutor, FailoverOutcome};
use crate::routing::{
    DefaultProviders, FastRandom, OperationType, RandomSource, RoutingDecision, RoutingPolicy,
    RoutingStrategy, StrategyError,
};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown provider '{0}'")]
    UnknownProvider(ProviderId),

    #[error("invalid routing strategy: {0}")]
    Strategy(#[from] StrategyError),

    #[error("provider client: {0}")]
    Client(#[from] ProbeError),

    #[error("monitoring interval must be greater than zero")]
    ZeroInterval,
}

struct MonitorTask {
    shutdown: Shutdown,
    handle: JoinHandle<()>,
    interval: Duration,
}

pub struct RoutingEngine {
    store: Arc<HealthStore>,
    recorder: AttemptRecorder,
    policy: Arc<RoutingPolicy>,
    executor: FailoverExecutor,
    monitor: HealthMonitor,
    monitoring: Mutex<Option<MonitorTask>>,
}

impl RoutingEngine {
    /// Build an engine with HTTP clients for every configured provider.
    pub fn from_config(config: &EngineConfig) -> Result<Self, EngineError> {
        let mut clients: Vec<Arc<dyn ProviderClient>> = Vec::with_capacity(config.providers.len());
        for provider in &config.providers {
            clients.push(Arc::new(HttpProviderClient::from_config(provider)?));
        }
        Self::new(config, clients, Arc::new(SystemClock), Arc::new(FastRandom))
    }

    /// Build an engine around injected clients, clock and random source.
    pub fn new(
        config: &EngineConfig,
        clients: Vec<Arc<dyn ProviderClient>>,
        clock: Arc<dyn Clock>,
        random: Arc<dyn RandomSource>,
    ) -> Result<Self, EngineError> {
        let known = clients
            .iter()
            .map(|c| c.id().clone())
            .chain(config.providers.iter().map(|p| ProviderId::new(&p.id)));
        let store = Arc::new(HealthStore::new(known, config.circuit_breaker.clone(), clock));

        let policy = Arc::new(RoutingPolicy::new(
            store.clone(),
            DefaultProviders::from_config(&config.defaults),
            random,
        ));
        policy.replace_strategies(
            config
                .routing
                .iter()
                .map(|r| (r.currency.clone(), RoutingStrategy::from_config(r))),
        )?;

        let recorder = AttemptRecorder::new(store.clone());
        let executor = FailoverExecutor::new(policy.clone(), recorder.clone());
        let monitor = HealthMonitor::new(store.clone(), clients);

        tracing::info!(
            providers = store.providers().len(),
            strategies = config.routing.len(),
            default_provider = %config.defaults.provider,
            "Routing engine initialised"
        );

        Ok(Self {
            store,
            recorder,
            policy,
            executor,
            monitor,
            monitoring: Mutex::new(None),
        })
    }

    pub fn store(&self) -> &Arc<HealthStore> {
        &self.store
    }

    pub fn recorder(&self) -> &AttemptRecorder {
        &self.recorder
    }

    pub fn select_provider(&self, currency: &str, amount: u64, operation: OperationType) -> RoutingDecision {
        self.policy.select(currency, amount, operation)
    }

    pub async fn execute_with_failover<T, E, P, PF, B, BF>(
        &self,
        currency: &str,
        amount: u64,
        operation: OperationType,
        primary_op: P,
        backup_op: B,
    ) -> Result<FailoverOutcome<T>, FailoverError>
    where
        P: FnOnce(ProviderId) -> PF,
        PF: Future<Output = Result<T, E>>,
        B: FnOnce(ProviderId) -> BF,
        BF: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.executor
            .execute(currency, amount, operation, primary_op, backup_op)
            .await
    }

    /// Bookkeeping for callers that invoke providers themselves.
    pub fn record_attempt(
        &self,
        provider: &ProviderId,
        success: bool,
        latency_ms: f64,
        error: Option<String>,
    ) -> HealthRecord {
        self.recorder.record(provider, success, latency_ms, error)
    }

    pub fn get_health_status(&self) -> BTreeMap<ProviderId, HealthRecord> {
        self.store.get_all()
    }

    pub fn get_provider_health(&self, provider: &ProviderId) -> HealthRecord {
        self.store.get(provider)
    }

    pub fn get_health_summary(&self) -> HealthSummary {
        self.store.summary()
    }

    /// Probe one provider now and return its updated record.
    pub async fn force_health_check(&self, provider: &ProviderId) -> Result<HealthRecord, EngineError> {
        tracing::info!(provider = %provider, "Forced health check");
        self.monitor
            .check_one(provider)
            .await
            .ok_or_else(|| EngineError::UnknownProvider(provider.clone()))
    }

    /// Operator override: force the circuit closed.
    pub fn reset_circuit_breaker(&self, provider: &ProviderId) -> Result<HealthRecord, EngineError> {
        self.store
            .reset(provider)
            .ok_or_else(|| EngineError::UnknownProvider(provider.clone()))
    }

    pub fn update_routing_strategy(
        &self,
        currency: &str,
        strategy: RoutingStrategy,
    ) -> Result<Option<RoutingStrategy>, EngineError> {
        Ok(self.policy.update_strategy(currency, strategy)?)
    }

    pub fn remove_routing_strategy(&self, currency: &str) -> Option<RoutingStrategy> {
        self.policy.remove_strategy(currency)
    }

    pub fn get_routing_strategy(&self, currency: &str) -> Option<RoutingStrategy> {
        self.policy.strategy(currency)
    }

    pub fn list_strategies(&self) -> BTreeMap<String, RoutingStrategy> {
        self.policy.strategies()
    }

    /// Spawn the probe loop, replacing any loop already running.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn start_health_monitoring(&self, interval: Duration) -> Result<(), EngineError> {
        if interval.is_zero() {
            return Err(EngineError::ZeroInterval);
        }
        let mut slot = self.monitoring.lock().await;
        if let Some(previous) = slot.take() {
            tracing::info!("Replacing running health monitor");
            stop_task(previous).await;
        }

        let shutdown = Shutdown::new();
        let handle = tokio::spawn(self.monitor.clone().run(interval, shutdown.subscribe()));
        *slot = Some(MonitorTask {
            shutdown,
            handle,
            interval,
        });
        Ok(())
    }

    /// Signal the probe loop and wait for it. `false` if none was running.
    pub async fn stop_health_monitoring(&self) -> bool {
        match self.monitoring.lock().await.take() {
            Some(task) => {
                stop_task(task).await;
                true
            }
            None => false,
        }
    }

    /// Probe interval of the running loop, if any.
    pub async fn monitoring_interval(&self) -> Option<Duration> {
        self.monitoring.lock().await.as_ref().map(|t| t.interval)
    }

    /// Apply a reloaded configuration.
    ///
    /// Strategies, defaults and circuit thresholds change in place. Provider
    /// clients are fixed at construction.
    pub fn apply_config(&self, config: &EngineConfig) -> Result<(), EngineError> {
        self.policy.replace_strategies(
            config
                .routing
                .iter()
                .map(|r| (r.currency.clone(), RoutingStrategy::from_config(r))),
        )?;
        self.policy.set_defaults(DefaultProviders::from_config(&config.defaults));
        self.store.update_config(config.circuit_breaker.clone());

        let configured: Vec<ProviderId> = config.providers.iter().map(|p| ProviderId::new(&p.id)).collect();
        let probed = self.monitor.providers();
        if configured.iter().any(|p| !probed.contains(p)) || probed.iter().any(|p| !configured.contains(p)) {
            tracing::warn!("Provider list changed; restart to probe the new set");
        }

        tracing::info!(strategies = config.routing.len(), "Configuration applied");
        Ok(())
    }
}

async fn stop_task(task: MonitorTask) {
    task.shutdown.trigger();
    if let Err(e) = task.handle.await {
        tracing::error!(error = %e, "Health monitor task failed");
    }
    tracing::info!("Health monitor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::{parse_config, CircuitBreakerConfig};
    use crate::resilience::CircuitState;
    use crate::routing::FixedRandom;
    use async_trait::async_trait;

    struct StaticClient {
        id: ProviderId,
        up: bool,
    }

    #[async_trait]
    impl ProviderClient for StaticClient {
        fn id(&self) -> &ProviderId {
            &self.id
        }

        fn probe_timeout(&self) -> Duration {
            Duration::from_millis(100)
        }

        async fn liveness(&self) -> Result<(), ProbeError> {
            if self.up {
                Ok(())
            } else {
                Err(ProbeError::ServerError(502))
            }
        }
    }

    const CONFIG: &str = r#"
        [[providers]]
        id = "mpesa_ke"
        base_url = "http://127.0.0.1:1"

        [[providers]]
        id = "airtel_ke"
        base_url = "http://127.0.0.1:1"

        [[providers]]
        id = "flutterwave"
        base_url = "http://127.0.0.1:1"

        [[routing]]
        currency = "KES"
        primary = "mpesa_ke"
        backup = "airtel_ke"
        preference_score = 0.8

        [defaults]
        provider = "flutterwave"
    "#;

    fn engine(mpesa_up: bool) -> (RoutingEngine, Arc<ManualClock>) {
        let config = parse_config(CONFIG).unwrap();
        let clock = Arc::new(ManualClock::new(1_000_000));
        let clients: Vec<Arc<dyn ProviderClient>> = vec![
            Arc::new(StaticClient {
                id: ProviderId::new("mpesa_ke"),
                up: mpesa_up,
            }),
            Arc::new(StaticClient {
                id: ProviderId::new("airtel_ke"),
                up: true,
            }),
        ];
        let engine = RoutingEngine::new(&config, clients, clock.clone(), Arc::new(FixedRandom(0.0))).unwrap();
        (engine, clock)
    }

    #[test]
    fn test_initial_records_are_optimistic() {
        let (engine, _) = engine(true);
        let status = engine.get_health_status();
        assert_eq!(status.len(), 3);
        assert!(status.values().all(|r| r.is_healthy && r.circuit_state == CircuitState::Closed));
        assert_eq!(engine.get_health_summary().healthy.len(), 3);
    }

    #[test]
    fn test_configured_strategy_and_default() {
        let (engine, _) = engine(true);
        assert_eq!(engine.list_strategies().len(), 1);
        assert_eq!(
            engine.select_provider("KES", 100, OperationType::Payment).provider.as_str(),
            "mpesa_ke"
        );
        let d = engine.select_provider("USD", 100, OperationType::Payment);
        assert_eq!(d.provider.as_str(), "flutterwave");
        assert!(!d.is_backup);
    }

    #[tokio::test]
    async fn test_force_health_check() {
        let (engine, _) = engine(false);
        let record = engine.force_health_check(&ProviderId::new("mpesa_ke")).await.unwrap();
        assert_eq!(record.consecutive_failures, 1);
        assert!(record.last_error.unwrap().contains("502"));

        let err = engine.force_health_check(&ProviderId::new("ghost")).await.unwrap_err();
        assert!(matches!(err, EngineError::UnknownProvider(_)));
    }

    #[test]
    fn test_reset_circuit_breaker() {
        let (engine, _) = engine(true);
        let mpesa = ProviderId::new("mpesa_ke");
        for _ in 0..5 {
            engine.record_attempt(&mpesa, false, 20.0, Some("timeout".into()));
        }
        assert_eq!(engine.get_provider_health(&mpesa).circuit_state, CircuitState::Open);
        assert!(engine.select_provider("KES", 1, OperationType::Payment).is_backup);

        let record = engine.reset_circuit_breaker(&mpesa).unwrap();
        assert_eq!(record.circuit_state, CircuitState::Closed);
        assert_eq!(record.consecutive_failures, 0);
        assert!(engine.reset_circuit_breaker(&ProviderId::new("ghost")).is_err());
    }

    #[test]
    fn test_strategy_updates() {
        let (engine, _) = engine(true);
        let err = engine
            .update_routing_strategy("UGX", RoutingStrategy::new("mtn_ug", "mtn_ug", 0.5))
            .unwrap_err();
        assert!(matches!(err, EngineError::Strategy(StrategyError::SameProvider(_))));

        engine
            .update_routing_strategy("UGX", RoutingStrategy::new("mtn_ug", "airtel_ug", 0.5))
            .unwrap();
        assert_eq!(engine.list_strategies().len(), 2);
        assert!(engine.remove_routing_strategy("ugx").is_some());
        assert_eq!(engine.list_strategies().len(), 1);
    }

    #[tokio::test]
    async fn test_monitoring_lifecycle() {
        let (engine, _) = engine(false);
        assert!(matches!(
            engine.start_health_monitoring(Duration::ZERO).await,
            Err(EngineError::ZeroInterval)
        ));
        assert!(!engine.stop_health_monitoring().await);

        engine.start_health_monitoring(Duration::from_secs(3600)).await.unwrap();
        engine.start_health_monitoring(Duration::from_secs(1800)).await.unwrap();
        assert_eq!(engine.monitoring_interval().await, Some(Duration::from_secs(1800)));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(engine.stop_health_monitoring().await);
        assert_eq!(engine.monitoring_interval().await, None);

        let mpesa = engine.get_provider_health(&ProviderId::new("mpesa_ke"));
        assert_eq!(mpesa.consecutive_failures, 2, "one immediate round per started loop");
    }

    #[test]
    fn test_apply_config() {
        let (engine, _) = engine(true);
        let mut config = parse_config(CONFIG).unwrap();
        config.routing.clear();
        config.defaults.provider = "paystack".to_string();
        config.circuit_breaker = CircuitBreakerConfig {
            failure_threshold: 2,
            ..Default::default()
        };
        engine.apply_config(&config).unwrap();

        assert!(engine.list_strategies().is_empty());
        assert_eq!(
            engine.select_provider("KES", 1, OperationType::Payment).provider.as_str(),
            "paystack"
        );
        let mpesa = ProviderId::new("mpesa_ke");
        engine.record_attempt(&mpesa, false, 1.0, None);
        engine.record_attempt(&mpesa, false, 1.0, None);
        assert_eq!(engine.get_provider_health(&mpesa).circuit_state, CircuitState::Open);
    }

    #[test]
    fn test_open_circuit_recovers_after_reset_timeout() {
        let (engine, clock) = engine(true);
        let mpesa = ProviderId::new("mpesa_ke");
        for _ in 0..5 {
            engine.record_attempt(&mpesa, false, 1.0, None);
        }
        clock.advance(30_001);
        assert_eq!(engine.get_provider_health(&mpesa).circuit_state, CircuitState::HalfOpen);
        engine.record_attempt(&mpesa, true, 1.0, None);
        assert_eq!(engine.get_provider_health(&mpesa).circuit_state, CircuitState::Closed);
    }
}
