use thiserror::Error;

/// Storage-specific error types for the record store.
///
/// Engine errors are classified on conversion so callers can tell a
/// duplicate key from a lost connection without inspecting driver codes.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No row matched the lookup
    #[error("Entity not found: {entity_type} with {field}={value}")]
    NotFound {
        entity_type: String,
        field: String,
        value: String,
    },

    /// Unique, foreign-key or check constraint rejected the write
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Pool or transport failure reaching the database
    #[error("Connection failure: {0}")]
    ConnectionFailure(#[source] sqlx::Error),

    /// Statement could not be assembled from the request
    #[error("Query construction error: {0}")]
    QueryConstruction(String),

    /// Field name is not a column of the record kind
    #[error("Unknown field '{field}' for {entity_type}")]
    UnknownField { entity_type: String, field: String },

    /// Any other engine error
    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    /// Migration execution failed
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl StorageError {
    pub fn not_found(entity_type: &str, field: &str, value: impl ToString) -> Self {
        Self::NotFound {
            entity_type: entity_type.to_string(),
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    pub fn unknown_field(entity_type: &str, field: &str) -> Self {
        Self::UnknownField {
            entity_type: entity_type.to_string(),
            field: field.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Self::ConstraintViolation(_))
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(ref db_err)
                if db_err.is_unique_violation()
                    || db_err.is_foreign_key_violation()
                    || db_err.is_check_violation() =>
            {
                Self::ConstraintViolation(db_err.message().to_string())
            }
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => Self::ConnectionFailure(err),
            other => Self::Database(other),
        }
    }
}

/// Specialized result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
