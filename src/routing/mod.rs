//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! select(currency, amount, operation)
//!     → strategy.rs (per-currency primary/backup, availability criteria)
//!     → policy.rs (read both health records, pick one, explain why)
//!     → RoutingDecision
//!
//! No strategy for the currency:
//!     → per-currency default, else the global default provider
//! ```
//!
//! # Design Decisions
//! - Routing never fails; the worst case is a degraded primary
//! - Strategies are validated before they become visible

pub mod policy;
pub mod strategy;

pub use policy::{DefaultProviders, FastRandom, FixedRandom, RandomSource, RoutingDecision, RoutingPolicy};
pub use strategy::{OperationType, RoutingStrategy, SelectionCriteria, StrategyError};
