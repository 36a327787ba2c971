use serde::{Deserialize, Serialize};

/// Network address of a single broker node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEndpoint {
    pub host: String,
    pub port: u16,
}

impl QueueEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port }
    }

    /// Renders the endpoint as a `host:port` bootstrap address.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Describes which broker cluster an operation should run against.
///
/// An empty endpoint list means "use the configured default endpoints".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerDescriptor {
    /// Logical name, echoed back in result metadata.
    pub name: String,
    pub endpoints: Vec<QueueEndpoint>,
}

impl BrokerDescriptor {
    pub fn new(name: impl Into<String>, endpoints: Vec<QueueEndpoint>) -> Self {
        Self { name: name.into(), endpoints }
    }

    /// Bootstrap address list handed to the broker client.
    pub fn bootstrap_addresses(&self) -> Vec<String> {
        self.endpoints.iter().map(QueueEndpoint::address).collect()
    }
}

/// The queue an operation reads from or writes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueTarget {
    pub queue: String,
    /// Optional reply destination, stamped onto produced messages.
    pub reply_to: Option<String>,
}

impl QueueTarget {
    pub fn new(queue: impl Into<String>) -> Self {
        Self { queue: queue.into(), reply_to: None }
    }

    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }
}
