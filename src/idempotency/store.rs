use crate::error::Result;
use crate::idempotency::record::{IdempotencyRecord, RecordMutation};
use crate::models::OperationKind;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Narrow contract the coordinator needs from a record store.
///
/// Conditional operations must be atomic per (kind, key): `create_if_absent`
/// succeeds only when no live record holds the identity, `update_if_present`
/// only while a live record is still IN_PROGRESS. Expired records count as
/// absent everywhere, whether or not a sweeper has physically removed them.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Looks up the live record for the identity, if any.
    async fn find(&self, kind: OperationKind, key: &str) -> Result<Option<IdempotencyRecord>>;

    /// Atomically creates the record unless a live one already exists.
    /// Returns true if this caller created it.
    async fn create_if_absent(&self, record: &IdempotencyRecord) -> Result<bool>;

    /// Atomically applies the mutation to a live IN_PROGRESS record.
    /// Returns false when the precondition does not hold.
    async fn update_if_present(
        &self,
        kind: OperationKind,
        key: &str,
        mutation: RecordMutation,
    ) -> Result<bool>;
}

/// Mutex-guarded map implementing the store contract for tests.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    records: Mutex<HashMap<(OperationKind, String), IdempotencyRecord>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record directly, bypassing the conditional guards.
    pub async fn seed(&self, record: IdempotencyRecord) {
        let mut records = self.records.lock().await;
        records.insert((record.operation_kind, record.idempotency_key.clone()), record);
    }

    /// Returns the stored record even when expired, for assertions.
    pub async fn get_raw(&self, kind: OperationKind, key: &str) -> Option<IdempotencyRecord> {
        let records = self.records.lock().await;
        records.get(&(kind, key.to_string())).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn find(&self, kind: OperationKind, key: &str) -> Result<Option<IdempotencyRecord>> {
        let records = self.records.lock().await;
        Ok(records
            .get(&(kind, key.to_string()))
            .filter(|record| !record.is_expired())
            .cloned())
    }

    async fn create_if_absent(&self, record: &IdempotencyRecord) -> Result<bool> {
        let mut records = self.records.lock().await;
        let identity = (record.operation_kind, record.idempotency_key.clone());
        if let Some(existing) = records.get(&identity) {
            if !existing.is_expired() {
                return Ok(false);
            }
        }
        records.insert(identity, record.clone());
        Ok(true)
    }

    async fn update_if_present(
        &self,
        kind: OperationKind,
        key: &str,
        mutation: RecordMutation,
    ) -> Result<bool> {
        let mut records = self.records.lock().await;
        match records.get_mut(&(kind, key.to_string())) {
            Some(record) if record.is_in_progress() && !record.is_expired() => {
                record.apply(&mutation);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
