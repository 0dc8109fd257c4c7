//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → EngineConfig (validated, immutable)
//!     → used to build the RoutingEngine and its provider clients
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → engine applies new routing strategies and circuit thresholds
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Provider credentials are referenced by env var name, never stored inline

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, CircuitBreakerConfig, DefaultsConfig, EngineConfig, HalfOpenPolicy,
    HealthCheckConfig, ObservabilityConfig, ProviderConfig, RoutingStrategyConfig,
    SelectionCriteria,
};
