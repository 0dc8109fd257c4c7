//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → Probe every provider concurrently
//!     → store.rs
//!
//! Passive health checks (passive.rs):
//!     Live payment attempt finished
//!     → store.rs
//!
//! Store (store.rs):
//!     Append attempt → update record (state.rs) → re-evaluate circuit breaker
//! ```
//!
//! # Design Decisions
//! - Active and passive checks feed one record per provider
//! - Circuit state is derived from the record, never set directly
//! - Health state is per-provider, locked per-provider

pub mod active;
pub mod passive;
pub mod state;
pub mod store;

pub use active::HealthMonitor;
pub use passive::AttemptRecorder;
pub use state::{Attempt, AttemptSource, HealthClass, HealthRecord, HealthSummary};
pub use store::HealthStore;
