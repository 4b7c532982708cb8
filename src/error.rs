// Blog service error taxonomy
use thiserror::Error;
use uuid::Uuid;

use crate::config::ConfigError;
use crate::database::StoreError;
use crate::models::{Collection, ModelError};
use crate::observer::ObserverError;

/// Errors surfaced to callers of the blog service
#[derive(Debug, Error)]
pub enum BlogError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{collection} not found: {id}")]
    NotFound { collection: Collection, id: Uuid },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A retirement failed and was rolled back. Carries no step detail.
    #[error("Transaction failed")]
    TransactionFailed,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BlogError {
    /// Stable code for callers that map errors onto their own protocol
    pub fn error_code(&self) -> &'static str {
        match self {
            BlogError::Validation(_) => "VALIDATION_ERROR",
            BlogError::NotFound { .. } => "NOT_FOUND",
            BlogError::Forbidden(_) => "FORBIDDEN",
            BlogError::TransactionFailed => "TRANSACTION_FAILED",
            BlogError::Config(_) => "CONFIG_ERROR",
            BlogError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        BlogError::Validation(message.into())
    }

    pub fn not_found(collection: Collection, id: Uuid) -> Self {
        BlogError::NotFound { collection, id }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, BlogError::NotFound { .. })
    }
}

impl From<ObserverError> for BlogError {
    fn from(err: ObserverError) -> Self {
        if err.is_validation() {
            return BlogError::Validation(err.to_string());
        }
        match err {
            ObserverError::NotFound { collection, id } => BlogError::NotFound { collection, id },
            ObserverError::SecurityError(msg) => BlogError::Forbidden(msg),
            other => {
                // Don't expose store internals to callers
                tracing::error!("Entity operation failed: {}", other);
                BlogError::Internal(other.to_string())
            }
        }
    }
}

impl From<StoreError> for BlogError {
    fn from(err: StoreError) -> Self {
        ObserverError::from(err).into()
    }
}

impl From<ModelError> for BlogError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::Validation { .. } => BlogError::Validation(err.to_string()),
            ModelError::Decode(msg) => {
                tracing::error!("Stored document could not be decoded: {}", msg);
                BlogError::Internal(msg)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observer_errors_map_onto_caller_kinds() {
        let id = Uuid::new_v4();
        let not_found: BlogError = ObserverError::NotFound {
            collection: Collection::Posts,
            id,
        }
        .into();
        assert!(not_found.is_not_found());

        let invalid: BlogError = ObserverError::ValidationError("bad".to_string()).into();
        assert_eq!(invalid.error_code(), "VALIDATION_ERROR");

        let deep: BlogError = ObserverError::RecursionError { depth: 4, max_depth: 3 }.into();
        assert_eq!(deep.error_code(), "INTERNAL_ERROR");
    }

    #[test]
    fn transaction_failure_is_opaque() {
        assert_eq!(BlogError::TransactionFailed.to_string(), "Transaction failed");
    }
}
