use crate::models::ReceivedMessage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Kind of broker operation guarded by idempotency coordination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationKind {
    Produce,
    Consume,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Produce => "PRODUCE",
            OperationKind::Consume => "CONSUME",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Implemented by every command that can run under idempotency coordination.
///
/// The serialized form of the command is what gets fingerprinted, so commands
/// must serialize deterministically (ordered maps, no volatile fields).
pub trait OperationCommand: Serialize + Send + Sync {
    /// Kind tag stored alongside the key as the record identity.
    const KIND: OperationKind;

    /// Client-supplied key scoping this logical operation.
    fn idempotency_key(&self) -> &str;
}

/// Outcome of a produce or consume operation.
///
/// Serialized verbatim into the idempotency record on completion and replayed
/// to retrying callers, so every field must round-trip deterministically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    pub idempotency_key: String,
    pub operation: OperationKind,
    pub requested_messages: u32,
    pub processed_messages: u32,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    /// Operation-specific details (broker name, queue, batch counts, offsets).
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// Messages returned by consume operations; empty for produce.
    pub messages: Vec<ReceivedMessage>,
}

impl OperationResult {
    pub fn new(
        idempotency_key: impl Into<String>,
        operation: OperationKind,
        requested_messages: u32,
        processed_messages: u32,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> Self {
        let elapsed_ms = (completed_at - started_at).num_milliseconds().max(0) as u64;
        Self {
            idempotency_key: idempotency_key.into(),
            operation,
            requested_messages,
            processed_messages,
            started_at,
            completed_at,
            elapsed_ms,
            metadata: BTreeMap::new(),
            messages: Vec::new(),
        }
    }

    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_messages(mut self, messages: Vec<ReceivedMessage>) -> Self {
        self.messages = messages;
        self
    }

    /// True when every requested message was processed.
    pub fn is_complete(&self) -> bool {
        self.processed_messages >= self.requested_messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn operation_kind_round_trips_through_serde() {
        let json = serde_json::to_string(&OperationKind::Produce).unwrap();
        assert_eq!(json, "\"PRODUCE\"");
        let parsed: OperationKind = serde_json::from_str("\"CONSUME\"").unwrap();
        assert_eq!(parsed, OperationKind::Consume);
    }

    #[test]
    fn elapsed_is_computed_from_timestamps() {
        let started = Utc::now();
        let completed = started + Duration::milliseconds(250);
        let result =
            OperationResult::new("k1", OperationKind::Produce, 3, 3, started, completed);
        assert_eq!(result.elapsed_ms, 250);
        assert!(result.is_complete());
    }

    #[test]
    fn result_round_trips_through_json() {
        let started = Utc::now();
        let result = OperationResult::new("k1", OperationKind::Consume, 5, 2, started, started)
            .with_metadata("queue", "Q1")
            .with_messages(vec![ReceivedMessage {
                message_id: "Q1-0@7".to_string(),
                body: "hello".to_string(),
                headers: Default::default(),
            }]);
        let json = serde_json::to_string(&result).unwrap();
        let parsed: OperationResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, result);
    }
}
