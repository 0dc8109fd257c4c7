//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Health record updated (health/store.rs):
//!     → circuit_breaker.rs (pure transition evaluation, same critical section)
//!
//! Payment request:
//!     → routing policy picks a provider
//!     → failover.rs (run selected op, on failure run backup op once)
//!     → every invocation recorded as a live attempt
//! ```
//!
//! # Design Decisions
//! - Circuit state changes only through evaluated transitions or an explicit reset
//! - Failover never retries the same provider twice

pub mod circuit_breaker;
pub mod failover;

pub use circuit_breaker::{CircuitState, Transition};
pub use failover::{FailoverError, FailoverExecutor, FailoverOutcome};
