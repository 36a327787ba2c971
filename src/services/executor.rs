use crate::broker::BrokerPort;
use crate::error::{AppError, Result};
use crate::idempotency::{IdempotencyCoordinator, IdempotencyStatus};
use crate::models::{OperationCommand, OperationResult};
use crate::observability::{get_metrics, LatencyTimer};
use chrono::Duration;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Serialized form shared by fingerprinting and result caching.
///
/// Deterministic because commands and results use ordered maps and fixed
/// field order, so equal values always fingerprint equally.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(AppError::Serialization)
}

/// Execute-once-and-cache workflow around one broker port.
///
/// One instance serves one operation kind; the kind tag comes from the port's
/// command type, so produce and consume share this implementation. The
/// executor replays cached results, delegates locking to the coordinator, and
/// otherwise passes broker outcomes through untouched.
pub struct OperationExecutor<P: BrokerPort> {
    port: P,
    coordinator: Arc<IdempotencyCoordinator>,
}

impl<P: BrokerPort> OperationExecutor<P> {
    pub fn new(port: P, coordinator: Arc<IdempotencyCoordinator>) -> Self {
        Self { port, coordinator }
    }

    /// Runs the command with the default record TTL.
    pub async fn run(&self, command: &P::Command) -> Result<OperationResult> {
        self.run_with_ttl(command, None).await
    }

    /// Runs the command, optionally overriding the record TTL.
    ///
    /// Overrides of zero or less fall back to the default, matching the
    /// coordinator's acquire contract.
    pub async fn run_with_ttl(
        &self,
        command: &P::Command,
        ttl_override: Option<Duration>,
    ) -> Result<OperationResult> {
        let kind = <P::Command as OperationCommand>::KIND;
        let key = command.idempotency_key();
        let serialized_command = canonical_json(command)?;

        let fingerprint = self.coordinator.fingerprint_of(&serialized_command);
        if let Some(cached) = self.coordinator.find(kind, key).await? {
            // Replay only a completed record of this exact command; a completed
            // record of a different command must fall through and conflict.
            if cached.is_completed() && cached.request_fingerprint == fingerprint {
                let payload = cached.response_payload.ok_or_else(|| {
                    AppError::Conflict(format!(
                        "completed idempotency record for key {key} is missing its response payload"
                    ))
                })?;
                let result: OperationResult = serde_json::from_str(&payload)?;
                get_metrics().record_replay(kind.as_str());
                info!("Replaying cached {} result for key {}", kind, key);
                return Ok(result);
            }
            // IN_PROGRESS, FAILED and mismatched records fall through to
            // acquire, which reports the precise conflict.
        }

        self.coordinator.acquire(kind, key, &serialized_command, ttl_override).await?;

        let timer = LatencyTimer::new();
        debug!("Executing {} operation for key {}", kind, key);
        match self.port.execute(command).await {
            Ok(result) => {
                get_metrics().record_operation(kind.as_str(), "success", timer.elapsed_ms());
                self.coordinator.complete(kind, key, &canonical_json(&result)?).await?;
                Ok(result)
            }
            Err(broker_error) => {
                get_metrics().record_operation(kind.as_str(), "failure", timer.elapsed_ms());
                // The broker error is what the caller must see; a failed
                // FAILED-marking is logged, not substituted for it.
                if let Err(mark_error) =
                    self.coordinator.fail(kind, key, IdempotencyStatus::Failed).await
                {
                    error!("Failed to mark {} key {} as FAILED: {}", kind, key, mark_error);
                }
                Err(broker_error)
            }
        }
    }
}
