use crate::models::{BrokerDescriptor, MessagePayload, OperationCommand, OperationKind, QueueTarget};
use serde::{Deserialize, Serialize};

/// Default wait applied to consume operations when the caller gives none.
pub const DEFAULT_WAIT_TIMEOUT_MS: u32 = 5_000;

/// Tuning knobs for a produce operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProduceSettings {
    /// Total number of messages to write; payloads are cycled to reach it.
    pub total_messages: u32,
    /// Messages per broker write.
    pub batch_size: u32,
}

impl ProduceSettings {
    pub fn new(total_messages: u32, batch_size: u32) -> Self {
        Self { total_messages, batch_size }
    }
}

/// Tuning knobs for a consume operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumeSettings {
    /// Upper bound on messages returned.
    pub max_messages: u32,
    /// How long a single fetch waits for records before giving up.
    pub wait_timeout_ms: u32,
}

impl ConsumeSettings {
    pub fn new(max_messages: u32) -> Self {
        Self { max_messages, wait_timeout_ms: DEFAULT_WAIT_TIMEOUT_MS }
    }

    pub fn with_wait_timeout_ms(mut self, wait_timeout_ms: u32) -> Self {
        self.wait_timeout_ms = wait_timeout_ms;
        self
    }
}

/// Request to write messages to a queue, deduplicated by idempotency key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProduceCommand {
    pub idempotency_key: String,
    pub broker: BrokerDescriptor,
    pub target: QueueTarget,
    pub payloads: Vec<MessagePayload>,
    pub settings: ProduceSettings,
}

impl OperationCommand for ProduceCommand {
    const KIND: OperationKind = OperationKind::Produce;

    fn idempotency_key(&self) -> &str {
        &self.idempotency_key
    }
}

/// Request to read messages from a queue, deduplicated by idempotency key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumeCommand {
    pub idempotency_key: String,
    pub broker: BrokerDescriptor,
    pub target: QueueTarget,
    pub settings: ConsumeSettings,
}

impl OperationCommand for ConsumeCommand {
    const KIND: OperationKind = OperationKind::Consume;

    fn idempotency_key(&self) -> &str {
        &self.idempotency_key
    }
}
