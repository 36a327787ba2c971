use crate::error::{AppError, Result};
use crate::idempotency::fingerprint::{FingerprintStrategy, Sha256Fingerprint};
use crate::idempotency::record::{IdempotencyRecord, IdempotencyStatus, RecordMutation};
use crate::idempotency::store::RecordStore;
use crate::models::OperationKind;
use crate::observability::get_metrics;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

/// Implements the locking protocol on top of a [`RecordStore`].
///
/// The coordinator holds no in-process lock; mutual exclusion across all
/// callers, including other processes, rests on the store's conditional
/// create/update being atomic per (kind, key). A losing caller gets a
/// [`AppError::Conflict`] immediately; there is no retry or backoff here.
pub struct IdempotencyCoordinator {
    store: Arc<dyn RecordStore>,
    fingerprint: Arc<dyn FingerprintStrategy>,
    default_ttl: Duration,
}

impl IdempotencyCoordinator {
    pub fn new(store: Arc<dyn RecordStore>, default_ttl: Duration) -> Self {
        Self { store, fingerprint: Arc::new(Sha256Fingerprint), default_ttl }
    }

    /// Replaces the default SHA-256 fingerprint strategy.
    pub fn with_fingerprint(mut self, fingerprint: Arc<dyn FingerprintStrategy>) -> Self {
        self.fingerprint = fingerprint;
        self
    }

    /// Digest of a serialized command under the configured strategy.
    pub fn fingerprint_of(&self, serialized_command: &str) -> String {
        self.fingerprint.digest(serialized_command)
    }

    /// Looks up the current record without side effects.
    pub async fn find(
        &self,
        kind: OperationKind,
        key: &str,
    ) -> Result<Option<IdempotencyRecord>> {
        self.store.find(kind, key).await
    }

    /// Claims the (kind, key) identity for this caller.
    ///
    /// A TTL override of zero or less falls back to the default. Returns
    /// normally as a no-op when a COMPLETED record with the same fingerprint
    /// already exists; every other occupied state is a conflict.
    pub async fn acquire(
        &self,
        kind: OperationKind,
        key: &str,
        serialized_command: &str,
        ttl_override: Option<Duration>,
    ) -> Result<()> {
        let fingerprint = self.fingerprint.digest(serialized_command);
        let now = Utc::now();
        let expires_at = now + self.effective_ttl(ttl_override);

        if let Some(existing) = self.store.find(kind, key).await? {
            if existing.is_in_progress() {
                warn!("Rejected {} key {}: operation already in progress", kind, key);
                get_metrics().record_conflict(kind.as_str(), "in_progress");
                return Err(AppError::Conflict(format!(
                    "operation already in progress for key {key}"
                )));
            }
            if existing.request_fingerprint != fingerprint {
                warn!("Rejected {} key {}: payload fingerprint mismatch", kind, key);
                get_metrics().record_conflict(kind.as_str(), "payload_mismatch");
                return Err(AppError::Conflict(format!(
                    "idempotency key {key} reused with a different payload"
                )));
            }
            if existing.is_completed() {
                // Safety net: the caller normally replays via find() before
                // ever calling acquire on a completed record.
                debug!("Acquire on completed {} key {} is a no-op", kind, key);
                return Ok(());
            }
            // FAILED with a matching fingerprint falls through; the create
            // below loses to the live record and reports the conflict.
        }

        let record = IdempotencyRecord::in_progress(kind, key, fingerprint, now, expires_at);
        if !self.store.create_if_absent(&record).await? {
            warn!("Lost acquire race for {} key {}", kind, key);
            get_metrics().record_conflict(kind.as_str(), "lock_lost");
            return Err(AppError::Conflict(format!(
                "failed to acquire idempotency lock for key {key}"
            )));
        }

        get_metrics().record_lock_acquired(kind.as_str());
        debug!("Acquired {} key {} until {}", kind, key, record.expires_at);
        Ok(())
    }

    /// Records a successful outcome and its serialized result.
    ///
    /// The update applies only while the record is live and IN_PROGRESS; a
    /// failed precondition surfaces as a conflict instead of silently
    /// overwriting whatever state won in the meantime.
    pub async fn complete(
        &self,
        kind: OperationKind,
        key: &str,
        serialized_result: &str,
    ) -> Result<()> {
        let mutation = RecordMutation::completed(serialized_result, Utc::now());
        if !self.store.update_if_present(kind, key, mutation).await? {
            get_metrics().record_conflict(kind.as_str(), "stale_update");
            return Err(AppError::Conflict(format!(
                "idempotency record for {kind} key {key} is missing or no longer in progress"
            )));
        }
        debug!("Completed {} key {}", kind, key);
        Ok(())
    }

    /// Records a terminal failure outcome, normally [`IdempotencyStatus::Failed`].
    ///
    /// Same precondition as [`complete`](Self::complete).
    pub async fn fail(
        &self,
        kind: OperationKind,
        key: &str,
        status: IdempotencyStatus,
    ) -> Result<()> {
        let mutation = RecordMutation::failed(status, Utc::now());
        if !self.store.update_if_present(kind, key, mutation).await? {
            get_metrics().record_conflict(kind.as_str(), "stale_update");
            return Err(AppError::Conflict(format!(
                "idempotency record for {kind} key {key} is missing or no longer in progress"
            )));
        }
        debug!("Marked {} key {} as {}", kind, key, status.as_str());
        Ok(())
    }

    fn effective_ttl(&self, ttl_override: Option<Duration>) -> Duration {
        ttl_override.filter(|ttl| *ttl > Duration::zero()).unwrap_or(self.default_ttl)
    }
}
