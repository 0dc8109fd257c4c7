//! Primary/backup execution of caller-supplied provider operations.
//!
//! # Responsibilities
//! - Route the request, run the selected provider's operation
//! - On failure, run the backup operation once
//! - Record every invocation as a live attempt
//!
//! # Design Decisions
//! - One pass through {primary, backup} is the whole retry budget
//! - No lock is held while an operation runs
//! - No deadline is imposed beyond what the operations carry themselves

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;

use crate::health::AttemptRecorder;
use crate::observability::metrics;
use crate::provider::ProviderId;
use crate::routing::{OperationType, RoutingDecision, RoutingPolicy};

/// Placeholder error for a primary that was never invoked.
pub const SKIPPED: &str = "skipped";

/// Terminal failover failures.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FailoverError {
    #[error(
        "all providers failed for {currency}: primary {primary}: {primary_error}; backup {backup}: {backup_error}"
    )]
    AllProvidersFailed {
        currency: String,
        primary: ProviderId,
        backup: ProviderId,
        primary_error: String,
        backup_error: String,
    },

    #[error("provider {provider} failed for {currency} and no backup is configured: {error}")]
    NoBackupConfigured {
        currency: String,
        provider: ProviderId,
        error: String,
    },
}

/// Successful execution.
#[derive(Debug)]
pub struct FailoverOutcome<T> {
    pub result: T,
    pub provider: ProviderId,
    pub is_backup: bool,
    /// Provider invocations that actually happened (1 or 2).
    pub attempts: u32,
    pub decision: RoutingDecision,
}

#[derive(Clone)]
pub struct FailoverExecutor {
    policy: Arc<RoutingPolicy>,
    recorder: AttemptRecorder,
}

impl FailoverExecutor {
    pub fn new(policy: Arc<RoutingPolicy>, recorder: AttemptRecorder) -> Self {
        Self { policy, recorder }
    }

    /// Run `primary_op` against the routed provider, falling back to `backup_op`.
    ///
    /// When routing already picked the backup, `primary_op` is never called
    /// and reported as skipped if the backup fails too.
    pub async fn execute<T, E, P, PF, B, BF>(
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
        let decision = self.policy.select(currency, amount, operation);
        let mut attempts = 0;

        let (backup, primary_error) = if decision.is_backup {
            (decision.provider.clone(), SKIPPED.to_string())
        } else {
            attempts += 1;
            let error = match self.invoke(&decision.provider, primary_op).await {
                Ok(result) => {
                    metrics::record_failover(&decision.currency, "primary");
                    return Ok(FailoverOutcome {
                        result,
                        provider: decision.provider.clone(),
                        is_backup: false,
                        attempts,
                        decision,
                    });
                }
                Err(error) => error,
            };
            tracing::warn!(
                decision_id = %decision.decision_id,
                currency = %decision.currency,
                provider = %decision.provider,
                error = %error,
                "Primary provider failed, failing over"
            );
            match decision.backup.clone() {
                Some(backup) => (backup, error),
                None => {
                    metrics::record_failover(&decision.currency, "failed");
                    return Err(FailoverError::NoBackupConfigured {
                        currency: decision.currency,
                        provider: decision.provider,
                        error,
                    });
                }
            }
        };

        attempts += 1;
        match self.invoke(&backup, backup_op).await {
            Ok(result) => {
                metrics::record_failover(&decision.currency, "backup");
                tracing::info!(
                    decision_id = %decision.decision_id,
                    currency = %decision.currency,
                    provider = %backup,
                    attempts,
                    "Backup provider succeeded"
                );
                Ok(FailoverOutcome {
                    result,
                    provider: backup,
                    is_backup: true,
                    attempts,
                    decision,
                })
            }
            Err(backup_error) => {
                metrics::record_failover(&decision.currency, "failed");
                tracing::error!(
                    decision_id = %decision.decision_id,
                    currency = %decision.currency,
                    primary = %decision.primary,
                    backup = %backup,
                    primary_error = %primary_error,
                    backup_error = %backup_error,
                    "All providers failed"
                );
                Err(FailoverError::AllProvidersFailed {
                    currency: decision.currency,
                    primary: decision.primary,
                    backup,
                    primary_error,
                    backup_error,
                })
            }
        }
    }

    async fn invoke<T, E, F, Fut>(&self, provider: &ProviderId, op: F) -> Result<T, String>
    where
        F: FnOnce(ProviderId) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let start = Instant::now();
        let result = op(provider.clone()).await;
        let elapsed = start.elapsed();
        match result {
            Ok(value) => {
                self.recorder.record_success(provider, elapsed);
                Ok(value)
            }
            Err(e) => {
                let message = e.to_string();
                self.recorder.record_failure(provider, elapsed, &message);
                Err(message)
            }
        }
    }
}
