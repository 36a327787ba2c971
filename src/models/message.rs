use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Declared format of an outbound message body.
///
/// The broker receives the body bytes either way; the format travels with the
/// message as a header so consumers can interpret the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayloadFormat {
    Text,
    Json,
    Binary,
}

impl PayloadFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadFormat::Text => "TEXT",
            PayloadFormat::Json => "JSON",
            PayloadFormat::Binary => "BINARY",
        }
    }
}

impl Default for PayloadFormat {
    fn default() -> Self {
        PayloadFormat::Text
    }
}

/// One message body to be produced, with its user-supplied headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    pub body: String,
    #[serde(default)]
    pub format: PayloadFormat,
    /// Ordered so command serialization is deterministic.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl MessagePayload {
    pub fn text(body: impl Into<String>) -> Self {
        Self { body: body.into(), format: PayloadFormat::Text, headers: BTreeMap::new() }
    }

    pub fn json(body: impl Into<String>) -> Self {
        Self { body: body.into(), format: PayloadFormat::Json, headers: BTreeMap::new() }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

/// A message returned by a consume operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedMessage {
    /// Broker-assigned identity of the message.
    pub message_id: String,
    pub body: String,
    pub headers: BTreeMap<String, String>,
}
