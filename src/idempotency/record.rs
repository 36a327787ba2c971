use crate::models::OperationKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of an idempotency record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdempotencyStatus {
    InProgress,
    Completed,
    Failed,
}

impl IdempotencyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdempotencyStatus::InProgress => "IN_PROGRESS",
            IdempotencyStatus::Completed => "COMPLETED",
            IdempotencyStatus::Failed => "FAILED",
        }
    }

    /// True once the record can no longer change, short of expiry.
    pub fn is_terminal(&self) -> bool {
        matches!(self, IdempotencyStatus::Completed | IdempotencyStatus::Failed)
    }
}

/// Persisted state of one (operation kind, idempotency key) pair.
///
/// Identity is the composite (operation_kind, idempotency_key); the
/// fingerprint is fixed at creation and the status only moves forward:
/// IN_PROGRESS, then exactly one of COMPLETED or FAILED, until expiry
/// removes the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct IdempotencyRecord {
    pub operation_kind: OperationKind,
    pub idempotency_key: String,
    /// Hex digest of the canonical serialized command.
    pub request_fingerprint: String,
    pub status: IdempotencyStatus,
    /// Serialized result, present only once the record is COMPLETED.
    pub response_payload: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IdempotencyRecord {
    /// Builds the IN_PROGRESS record that a successful acquire persists.
    pub fn in_progress(
        operation_kind: OperationKind,
        idempotency_key: impl Into<String>,
        request_fingerprint: impl Into<String>,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            operation_kind,
            idempotency_key: idempotency_key.into(),
            request_fingerprint: request_fingerprint.into(),
            status: IdempotencyStatus::InProgress,
            response_payload: None,
            created_at,
            expires_at,
            updated_at: created_at,
        }
    }

    pub fn is_in_progress(&self) -> bool {
        self.status == IdempotencyStatus::InProgress
    }

    pub fn is_completed(&self) -> bool {
        self.status == IdempotencyStatus::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.status == IdempotencyStatus::Failed
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Applies a conditional-update mutation in place.
    pub fn apply(&mut self, mutation: &RecordMutation) {
        self.status = mutation.status;
        self.response_payload = mutation.response_payload.clone();
        self.updated_at = mutation.updated_at;
    }
}

/// Field changes carried by a conditional update.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordMutation {
    pub status: IdempotencyStatus,
    pub response_payload: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl RecordMutation {
    /// Mutation written when the guarded operation succeeded.
    pub fn completed(response_payload: impl Into<String>, updated_at: DateTime<Utc>) -> Self {
        Self {
            status: IdempotencyStatus::Completed,
            response_payload: Some(response_payload.into()),
            updated_at,
        }
    }

    /// Mutation written when the guarded operation failed.
    pub fn failed(status: IdempotencyStatus, updated_at: DateTime<Utc>) -> Self {
        Self { status, response_payload: None, updated_at }
    }
}
