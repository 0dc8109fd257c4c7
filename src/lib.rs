//! Provider resilience and routing engine for payment rails.

pub mod admin;
pub mod clock;
pub mod config;
pub mod engine;
pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod provider;
pub mod resilience;
pub mod routing;

pub use config::EngineConfig;
pub use engine::{EngineError, RoutingEngine};
pub use lifecycle::Shutdown;
