//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields (provider, currency, circuit state) on every event
//! - Metrics are cheap; recording without an installed exporter is a no-op
//! - Provider ids are the only high-cardinality label

pub mod logging;
pub mod metrics;
