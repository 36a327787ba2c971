use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{OperationKind, OperationResult, ReceivedMessage};

/// Standard API response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ErrorResponse>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(error: ErrorResponse) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(error),
        }
    }
}

/// Error response structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Vec<ValidationErrorDetail>) -> Self {
        self.details = Some(details);
        self
    }
}

/// Validation error detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    pub field: String,
    pub message: String,
}

/// Message operation response DTO.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageOperationResponse {
    pub idempotency_key: String,
    pub operation: OperationKind,
    pub requested_messages: u32,
    pub processed_messages: u32,
    pub complete: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub messages: Vec<ReceivedMessageResponse>,
}

impl From<OperationResult> for MessageOperationResponse {
    fn from(result: OperationResult) -> Self {
        let complete = result.is_complete();
        Self {
            idempotency_key: result.idempotency_key,
            operation: result.operation,
            requested_messages: result.requested_messages,
            processed_messages: result.processed_messages,
            complete,
            started_at: result.started_at,
            completed_at: result.completed_at,
            elapsed_ms: result.elapsed_ms,
            metadata: result.metadata,
            messages: result
                .messages
                .into_iter()
                .map(ReceivedMessageResponse::from)
                .collect(),
        }
    }
}

/// Received message response DTO.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceivedMessageResponse {
    pub message_id: String,
    pub body: String,
    pub headers: BTreeMap<String, String>,
}

impl From<ReceivedMessage> for ReceivedMessageResponse {
    fn from(message: ReceivedMessage) -> Self {
        Self {
            message_id: message.message_id,
            body: message.body,
            headers: message.headers,
        }
    }
}
