use thiserror::Error;
use uuid::Uuid;

use crate::database::StoreError;
use crate::filter::FilterError;
use crate::models::{Collection, ModelError};
use crate::observer::traits::ObserverRing;

/// Observer system errors with structured error types
#[derive(Debug, Error)]
pub enum ObserverError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Security error: {0}")]
    SecurityError(String),

    #[error("{collection} not found: {id}")]
    NotFound { collection: Collection, id: Uuid },

    #[error("System error: {0}")]
    SystemError(String),

    #[error("Timeout error: {0}")]
    TimeoutError(String),

    #[error("Observer recursion error: depth {depth} exceeds maximum {max_depth}")]
    RecursionError { depth: usize, max_depth: usize },

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ObserverError {
    /// Whether the error describes bad input rather than a failure of the
    /// system itself.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ObserverError::ValidationError(_) | ObserverError::Filter(_) | ObserverError::Model(ModelError::Validation { .. })
        )
    }
}

/// Observer warnings (non-fatal issues)
#[derive(Debug, Clone)]
pub struct ObserverWarning {
    pub observer: String,
    pub ring: ObserverRing,
    pub message: String,
}

impl ObserverWarning {
    pub fn new(observer: &str, ring: ObserverRing, message: impl Into<String>) -> Self {
        Self {
            observer: observer.to_string(),
            ring,
            message: message.into(),
        }
    }
}
