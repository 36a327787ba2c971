use crate::error::{AppError, Result};
use crate::idempotency::record::{IdempotencyRecord, IdempotencyStatus, RecordMutation};
use crate::idempotency::store::RecordStore;
use crate::models::OperationKind;
use crate::observability::get_metrics;
use async_trait::async_trait;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{error, info};

/// PostgreSQL-backed record store.
///
/// Every conditional operation is a single statement, so per-key atomicity
/// comes from the database rather than any in-process locking. Expired rows
/// are treated as absent even before the sweeper deletes them.
#[derive(Debug, Clone)]
pub struct PostgresRecordStore {
    pool: PgPool,
}

impl PostgresRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Deletes expired records, returning how many were removed.
    pub async fn cleanup_expired(&self) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM idempotency_records
            WHERE expires_at <= NOW()
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected())
    }

    /// Counts live records by status.
    pub async fn count_by_status(&self, status: IdempotencyStatus) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM idempotency_records
            WHERE status = $1 AND expires_at > NOW()
            "#,
        )
        .bind(status)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row.0)
    }
}

#[async_trait]
impl RecordStore for PostgresRecordStore {
    async fn find(&self, kind: OperationKind, key: &str) -> Result<Option<IdempotencyRecord>> {
        let record = sqlx::query_as::<_, IdempotencyRecord>(
            r#"
            SELECT operation_kind, idempotency_key, request_fingerprint, status,
                   response_payload, created_at, expires_at, updated_at
            FROM idempotency_records
            WHERE operation_kind = $1 AND idempotency_key = $2 AND expires_at > NOW()
            "#,
        )
        .bind(kind)
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(record)
    }

    async fn create_if_absent(&self, record: &IdempotencyRecord) -> Result<bool> {
        // A live row wins the conflict and nothing is returned; an expired row
        // is overwritten in place so the identity frees up without waiting for
        // the sweeper.
        let created = sqlx::query_as::<_, (String,)>(
            r#"
            INSERT INTO idempotency_records
                (operation_kind, idempotency_key, request_fingerprint, status,
                 response_payload, created_at, expires_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (operation_kind, idempotency_key) DO UPDATE
            SET request_fingerprint = EXCLUDED.request_fingerprint,
                status = EXCLUDED.status,
                response_payload = EXCLUDED.response_payload,
                created_at = EXCLUDED.created_at,
                expires_at = EXCLUDED.expires_at,
                updated_at = EXCLUDED.updated_at
            WHERE idempotency_records.expires_at <= NOW()
            RETURNING idempotency_key
            "#,
        )
        .bind(record.operation_kind)
        .bind(&record.idempotency_key)
        .bind(&record.request_fingerprint)
        .bind(&record.status)
        .bind(&record.response_payload)
        .bind(record.created_at)
        .bind(record.expires_at)
        .bind(record.updated_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(created.is_some())
    }

    async fn update_if_present(
        &self,
        kind: OperationKind,
        key: &str,
        mutation: RecordMutation,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE idempotency_records
            SET status = $3, response_payload = $4, updated_at = $5
            WHERE operation_kind = $1 AND idempotency_key = $2
              AND status = 'IN_PROGRESS' AND expires_at > NOW()
            "#,
        )
        .bind(kind)
        .bind(key)
        .bind(&mutation.status)
        .bind(&mutation.response_payload)
        .bind(mutation.updated_at)
        .execute(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }
}

/// Background task that physically removes expired records.
///
/// Correctness never depends on it running; reads and conditional writes
/// already ignore expired rows. It only keeps the table from growing.
pub struct RecordSweeper {
    store: PostgresRecordStore,
    interval: Duration,
}

impl RecordSweeper {
    pub fn new(store: PostgresRecordStore, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Runs a single sweep.
    pub async fn run_once(&self) -> Result<u64> {
        let deleted = self.store.cleanup_expired().await?;
        if deleted > 0 {
            get_metrics().record_sweep(deleted);
            info!("Removed {} expired idempotency records", deleted);
        }

        let in_progress = self
            .store
            .count_by_status(IdempotencyStatus::InProgress)
            .await?;
        get_metrics().set_records_in_progress(in_progress);

        Ok(deleted)
    }

    /// Spawns the periodic sweep loop.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if let Err(e) = self.run_once().await {
                    error!("Idempotency sweep failed: {}", e);
                }
            }
        })
    }
}
