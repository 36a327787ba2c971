use serde::{Deserialize, Serialize};

use crate::models::{
    BrokerDescriptor, ConsumeCommand, ConsumeSettings, MessagePayload, ProduceCommand,
    ProduceSettings, QueueTarget,
};

/// Validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: &str) -> Self {
        Self { field: field.to_string(), message: message.to_string() }
    }
}

fn validate_broker(broker: &Option<BrokerDescriptor>, errors: &mut Vec<ValidationError>) {
    if let Some(broker) = broker {
        for (i, endpoint) in broker.endpoints.iter().enumerate() {
            if endpoint.host.trim().is_empty() {
                errors.push(ValidationError {
                    field: format!("broker.endpoints[{}].host", i),
                    message: "host cannot be empty".to_string(),
                });
            }
            if endpoint.port == 0 {
                errors.push(ValidationError {
                    field: format!("broker.endpoints[{}].port", i),
                    message: "port must be positive".to_string(),
                });
            }
        }
    }
}

/// A broker named in a request but without endpoints resolves to the
/// configured default cluster.
fn broker_or_default(broker: Option<BrokerDescriptor>) -> BrokerDescriptor {
    broker.unwrap_or_else(|| BrokerDescriptor::new("default", Vec::new()))
}

/// Request to produce messages onto a queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProduceMessageRequest {
    pub idempotency_key: String,
    pub broker: Option<BrokerDescriptor>,
    pub target: QueueTarget,
    pub payloads: Vec<MessagePayload>,
    pub total_messages: u32,
    pub batch_size: Option<u32>,
}

impl ProduceMessageRequest {
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if self.idempotency_key.trim().is_empty() {
            errors.push(ValidationError::new("idempotency_key", "idempotency_key cannot be empty"));
        }
        if self.target.queue.trim().is_empty() {
            errors.push(ValidationError::new("target.queue", "queue cannot be empty"));
        }
        if self.total_messages == 0 {
            errors.push(ValidationError::new("total_messages", "total_messages must be positive"));
        }
        if self.payloads.is_empty() {
            errors.push(ValidationError::new("payloads", "at least one payload is required"));
        }
        for (i, payload) in self.payloads.iter().enumerate() {
            if payload.body.is_empty() {
                errors.push(ValidationError {
                    field: format!("payloads[{}].body", i),
                    message: "body cannot be empty".to_string(),
                });
            }
        }
        if self.batch_size == Some(0) {
            errors.push(ValidationError::new("batch_size", "batch_size must be positive"));
        }
        validate_broker(&self.broker, &mut errors);
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    /// Builds the canonical command, applying defaults so that omitted and
    /// explicitly-default fields fingerprint identically.
    pub fn to_command(self) -> ProduceCommand {
        let batch_size = self.batch_size.unwrap_or(self.total_messages);
        ProduceCommand {
            idempotency_key: self.idempotency_key,
            broker: broker_or_default(self.broker),
            target: self.target,
            payloads: self.payloads,
            settings: ProduceSettings::new(self.total_messages, batch_size),
        }
    }
}

/// Request to consume messages from a queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumeMessageRequest {
    pub idempotency_key: String,
    pub broker: Option<BrokerDescriptor>,
    pub target: QueueTarget,
    pub max_messages: u32,
    pub wait_timeout_ms: Option<u32>,
}

impl ConsumeMessageRequest {
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if self.idempotency_key.trim().is_empty() {
            errors.push(ValidationError::new("idempotency_key", "idempotency_key cannot be empty"));
        }
        if self.target.queue.trim().is_empty() {
            errors.push(ValidationError::new("target.queue", "queue cannot be empty"));
        }
        if self.max_messages == 0 {
            errors.push(ValidationError::new("max_messages", "max_messages must be positive"));
        }
        validate_broker(&self.broker, &mut errors);
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    pub fn to_command(self) -> ConsumeCommand {
        let mut settings = ConsumeSettings::new(self.max_messages);
        if let Some(wait_timeout_ms) = self.wait_timeout_ms {
            settings = settings.with_wait_timeout_ms(wait_timeout_ms);
        }
        ConsumeCommand {
            idempotency_key: self.idempotency_key,
            broker: broker_or_default(self.broker),
            target: self.target,
            settings,
        }
    }
}
