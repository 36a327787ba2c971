pub mod command;
pub mod message;
pub mod operation;
pub mod queue;

pub use command::{
    ConsumeCommand, ConsumeSettings, ProduceCommand, ProduceSettings, DEFAULT_WAIT_TIMEOUT_MS,
};
pub use message::{MessagePayload, PayloadFormat, ReceivedMessage};
pub use operation::{OperationCommand, OperationKind, OperationResult};
pub use queue::{BrokerDescriptor, QueueEndpoint, QueueTarget};
