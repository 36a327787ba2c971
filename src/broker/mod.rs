use crate::error::Result;
use crate::models::{OperationCommand, OperationResult};
use async_trait::async_trait;

pub mod kafka;

pub use kafka::{ConnectorConfig, KafkaConnector, KafkaMessageConsumer, KafkaMessageProducer};

/// Executes one kind of broker operation.
///
/// Implementations perform the real produce or consume work and surface
/// failures as [`crate::error::AppError::Operation`]; deduplication and
/// caching live entirely outside, in the executor that wraps the port.
#[async_trait]
pub trait BrokerPort: Send + Sync {
    /// Command type the port accepts; its kind tag names the operation.
    type Command: OperationCommand;

    async fn execute(&self, command: &Self::Command) -> Result<OperationResult>;
}
