//! railswitch: provider health, circuit breaking and primary/backup routing.
//!
//! # Architecture Overview
//!
//! ```text
//!   payment services                               operators
//!         │                                            │
//!         ▼                                            ▼
//!   ┌─────────────────────────── RoutingEngine ──────────────────────────┐
//!   │                                                       admin API    │
//!   │  routing policy ──▶ failover executor ──▶ attempt recorder ──┐     │
//!   │        ▲                                                     ▼     │
//!   │        └──────────── health store + circuit breaker ◀── prober     │
//!   └────────────────────────────────────────────────────────────────────┘
//!                                                     │
//!                                                     ▼
//!                                           provider liveness endpoints
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use railswitch::admin::setup_admin_router;
use railswitch::config::{load_config, watcher::ConfigWatcher, EngineConfig};
use railswitch::lifecycle::shutdown_signal;
use railswitch::observability::{logging, metrics};
use railswitch::RoutingEngine;

const CONFIG_ENV: &str = "RAILSWITCH_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "railswitch.toml";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_ENV).ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let config = if path.exists() {
        load_config(&path)?
    } else {
        eprintln!("config file {} not found, using defaults", path.display());
        EngineConfig::default()
    };

    logging::init_logging(&config.observability);
    tracing::info!(config = %path.display(), "railswitch v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let engine = Arc::new(RoutingEngine::from_config(&config)?);

    if config.health_check.enabled {
        engine
            .start_health_monitoring(Duration::from_millis(config.health_check.interval_ms))
            .await?;
    }

    // Hot reload; the watcher must outlive the loop below.
    let _watcher = if path.exists() {
        let (watcher, mut updates) = ConfigWatcher::new(&path);
        let watcher = watcher.run()?;
        let engine = engine.clone();
        tokio::spawn(async move {
            while let Some(new_config) = updates.recv().await {
                if let Err(e) = engine.apply_config(&new_config) {
                    tracing::error!(error = %e, "Rejected reloaded configuration");
                }
            }
        });
        Some(watcher)
    } else {
        None
    };

    if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        tracing::info!(address = %listener.local_addr()?, "Admin API listening");
        let app = setup_admin_router(engine.clone(), &config.admin);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
    } else {
        shutdown_signal().await;
    }

    engine.stop_health_monitoring().await;
    tracing::info!("Shutdown complete");
    Ok(())
}
