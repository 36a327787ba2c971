use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application-wide error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Idempotency protocol violation: key locked by an in-flight operation,
    /// reused with a different payload, or pointing at corrupted record state.
    #[error("idempotency conflict: {0}")]
    Conflict(String),

    /// Failure raised by the broker while producing or consuming messages.
    #[error("broker operation failed: {0}")]
    Operation(String),

    /// Failure communicating with the record store.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Malformed or inconsistent caller input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Command or result could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration could not be loaded or parsed.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Anything that does not fit the categories above.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Returns true for errors caused by the caller rather than the system.
    pub fn is_client_error(&self) -> bool {
        matches!(self, AppError::Conflict(_) | AppError::Validation(_) | AppError::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_message_includes_detail() {
        let err = AppError::Conflict("operation already in progress for key k1".to_string());
        assert_eq!(
            err.to_string(),
            "idempotency conflict: operation already in progress for key k1"
        );
        assert!(err.is_client_error());
    }

    #[test]
    fn operation_errors_are_not_client_errors() {
        let err = AppError::Operation("unable to reach broker".to_string());
        assert!(!err.is_client_error());
    }
}
