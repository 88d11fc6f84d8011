use thiserror::Error;

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A table or column name was not a plain identifier.
    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    /// The backend rejected the query.
    #[error("Query rejected: {0}")]
    Query(String),

    /// The change feed could not be joined.
    #[error("Subscription error: {0}")]
    Subscription(String),
}

/// Result type for backend operations.
pub type Result<T> = std::result::Result<T, BackendError>;
