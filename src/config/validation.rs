//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (strategies and defaults reference known providers)
//! - Validate value ranges (thresholds > 0, scores within [0, 1], URLs parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: EngineConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system, including on hot reload

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::EngineConfig;
use crate::routing::strategy::{normalize_currency, RoutingStrategy, StrategyError};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },

    #[error("duplicate provider id '{0}'")]
    DuplicateProvider(String),

    #[error("provider '{id}' has invalid base_url: {reason}")]
    InvalidProviderUrl { id: String, reason: String },

    #[error("provider '{0}' has an empty id or zero timeout")]
    InvalidProvider(String),

    #[error("duplicate routing strategy for currency '{0}'")]
    DuplicateStrategy(String),

    #[error("routing strategy for '{currency}': {source}")]
    Strategy {
        currency: String,
        source: StrategyError,
    },

    #[error("{context} references unknown provider '{provider}'")]
    UnknownProvider { context: String, provider: String },

    #[error("{field} is not a valid socket address: '{value}'")]
    InvalidAddress { field: &'static str, value: String },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &EngineConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let cb = &config.circuit_breaker;
    if cb.failure_threshold == 0 {
        errors.push(ValidationError::NotPositive { field: "circuit_breaker.failure_threshold" });
    }
    if cb.success_threshold == 0 {
        errors.push(ValidationError::NotPositive { field: "circuit_breaker.success_threshold" });
    }
    if cb.window_size_ms == 0 {
        errors.push(ValidationError::NotPositive { field: "circuit_breaker.window_size_ms" });
    }
    if config.health_check.interval_ms == 0 {
        errors.push(ValidationError::NotPositive { field: "health_check.interval_ms" });
    }

    let mut known = HashSet::new();
    for provider in &config.providers {
        if provider.id.trim().is_empty() || provider.timeout_ms == 0 {
            errors.push(ValidationError::InvalidProvider(provider.id.clone()));
        }
        if !known.insert(provider.id.as_str()) {
            errors.push(ValidationError::DuplicateProvider(provider.id.clone()));
        }
        if let Err(e) = url::Url::parse(&provider.base_url) {
            errors.push(ValidationError::InvalidProviderUrl {
                id: provider.id.clone(),
                reason: e.to_string(),
            });
        }
    }

    // An empty provider list means clients are injected programmatically,
    // so references cannot be checked.
    let check_refs = !config.providers.is_empty();
    let unknown = |context: String, provider: &str| {
        if check_refs && !known.contains(provider) {
            Some(ValidationError::UnknownProvider {
                context,
                provider: provider.to_string(),
            })
        } else {
            None
        }
    };

    let mut currencies = HashSet::new();
    for strategy in &config.routing {
        let currency = normalize_currency(&strategy.currency);
        if !currencies.insert(currency.clone()) {
            errors.push(ValidationError::DuplicateStrategy(currency.clone()));
        }
        if let Err(source) = RoutingStrategy::from_config(strategy).validate() {
            errors.push(ValidationError::Strategy {
                currency: currency.clone(),
                source,
            });
        }
        let context = format!("routing strategy for '{}'", currency);
        errors.extend(unknown(context.clone(), &strategy.primary));
        errors.extend(unknown(context, &strategy.backup));
    }

    errors.extend(unknown("defaults.provider".to_string(), &config.defaults.provider));
    for (currency, provider) in &config.defaults.currencies {
        errors.extend(unknown(format!("defaults.currencies.{}", currency), provider));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }
    if config.admin.enabled && config.admin.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "admin.bind_address",
            value: config.admin.bind_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
