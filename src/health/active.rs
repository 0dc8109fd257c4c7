//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every provider, all at once
//! - Bound each probe by the provider's own timeout
//! - Feed each sample into the store as a probe attempt

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::health::passive::duration_ms;
use crate::health::state::{AttemptSource, HealthRecord};
use crate::health::store::HealthStore;
use crate::observability::metrics;
use crate::provider::{HealthSample, ProbeError, ProviderClient, ProviderId};

/// Probes providers and records the results.
#[derive(Clone)]
pub struct HealthMonitor {
    store: Arc<HealthStore>,
    clients: Vec<Arc<dyn ProviderClient>>,
}

impl HealthMonitor {
    pub fn new(store: Arc<HealthStore>, clients: Vec<Arc<dyn ProviderClient>>) -> Self {
        Self { store, clients }
    }

    pub fn providers(&self) -> Vec<ProviderId> {
        self.clients.iter().map(|c| c.id().clone()).collect()
    }

    /// Run one liveness probe, bounded by the client's timeout.
    pub async fn probe(client: &dyn ProviderClient) -> HealthSample {
        let timeout = client.probe_timeout();
        let start = Instant::now();
        let result = match time::timeout(timeout, client.liveness()).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout(timeout.as_millis() as u64)),
        };
        let latency_ms = duration_ms(start.elapsed());

        match result {
            Ok(()) => HealthSample {
                ok: true,
                latency_ms,
                error_message: None,
            },
            Err(e) => HealthSample {
                ok: false,
                latency_ms,
                error_message: Some(e.to_string()),
            },
        }
    }

    /// Probe a single provider now. `None` if no client is registered for it.
    pub async fn check_one(&self, provider: &ProviderId) -> Option<HealthRecord> {
        let client = self.clients.iter().find(|c| c.id() == provider)?;
        let sample = Self::probe(client.as_ref()).await;
        Some(record_sample(&self.store, provider, sample))
    }

    /// Probe every provider concurrently and wait for all of them.
    ///
    /// Each probe runs in its own task, so a hang or panic in one client
    /// cannot hold up or poison the others.
    pub async fn check_all(&self) -> Vec<(ProviderId, HealthSample)> {
        let started = Instant::now();
        let tasks: Vec<_> = self
            .clients
            .iter()
            .map(|client| {
                let client = client.clone();
                let store = self.store.clone();
                let id = client.id().clone();
                let handle = tokio::spawn(async move {
                    let sample = Self::probe(client.as_ref()).await;
                    record_sample(&store, client.id(), sample.clone());
                    sample
                });
                (id, handle)
            })
            .collect();

        let (ids, handles): (Vec<_>, Vec<_>) = tasks.into_iter().unzip();
        let results = join_all(handles).await;

        let mut samples = Vec::with_capacity(ids.len());
        for (id, result) in ids.into_iter().zip(results) {
            match result {
                Ok(sample) => samples.push((id, sample)),
                Err(e) => {
                    let message = format!("probe task failed: {}", e);
                    tracing::error!(provider = %id, error = %message, "Health probe aborted");
                    let sample = HealthSample {
                        ok: false,
                        latency_ms: 0.0,
                        error_message: Some(message),
                    };
                    record_sample(&self.store, &id, sample.clone());
                    samples.push((id, sample));
                }
            }
        }

        self.store.refresh_all();
        metrics::record_probe_round(started.elapsed());
        let healthy = samples.iter().filter(|(_, s)| s.ok).count();
        tracing::debug!(
            providers = samples.len(),
            healthy,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Probe round complete"
        );
        samples
    }

    /// Probe immediately, then every `interval` until shutdown.
    ///
    /// A round already in flight when shutdown arrives is allowed to finish.
    pub async fn run(self, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_ms = interval.as_millis() as u64,
            providers = self.clients.len(),
            "Health monitor starting"
        );

        self.check_all().await;

        let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // Shutdown wins over a tick that came due during the last round.
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
                _ = ticker.tick() => {
                    self.check_all().await;
                }
            }
        }
    }
}

fn record_sample(store: &HealthStore, provider: &ProviderId, sample: HealthSample) -> HealthRecord {
    if let Some(err) = &sample.error_message {
        tracing::warn!(provider = %provider, latency_ms = sample.latency_ms, error = %err, "Health probe failed");
    }
    store.record_result(
        provider,
        sample.ok,
        sample.latency_ms,
        sample.error_message,
        AttemptSource::Probe,
    )
}
