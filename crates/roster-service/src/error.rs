use std::time::Duration;

use roster_storage::StorageError;
use thiserror::Error;

/// Errors surfaced by the application service and the ingestion path.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Store error, forwarded unchanged
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The store call did not finish within the configured timeout
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    /// Payload could not be decoded into a record
    #[error("Malformed payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    /// Broker delivery or subscription failure
    #[error("Broker error: {0}")]
    Broker(String),
}

impl ServiceError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// The underlying storage error, if any
    pub fn storage(&self) -> Option<&StorageError> {
        match self {
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
