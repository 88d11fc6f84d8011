//! Feed error types.

use thiserror::Error;

/// Errors that can occur while loading feed data.
///
/// These never escape [`OrderFeed`](crate::OrderFeed); they decide which
/// degraded shape an order takes.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The backend failed the request.
    #[error("Backend error: {0}")]
    Backend(#[from] backend::BackendError),

    /// A returned row did not match the expected record shape.
    #[error("Invalid row: {0}")]
    InvalidRow(#[from] domain::RowError),

    /// A spawned feed task panicked or was cancelled.
    #[error("Task failed: {0}")]
    TaskFailed(String),
}

impl From<tokio::task::JoinError> for FeedError {
    fn from(err: tokio::task::JoinError) -> Self {
        FeedError::TaskFailed(err.to_string())
    }
}

/// Result type for feed operations.
pub type Result<T> = std::result::Result<T, FeedError>;
