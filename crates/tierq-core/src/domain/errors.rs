//! Errors - queue error taxonomy.
//!
//! Timeout expiry and exceeding `max_executions` are *not* errors: the engine
//! records them as a Failed status and carries on.

use thiserror::Error;

use super::timexpr::TimeExprError;

/// Top-level error returned by stores, the engine and the facade.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Missing or malformed configuration (fatal, never retried).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Backend failure while reading or writing tasks.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The task's worker selector is not registered.
    /// The task has already been marked Failed and persisted.
    #[error("worker not found: {0}")]
    WorkerNotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl From<TimeExprError> for QueueError {
    fn from(err: TimeExprError) -> Self {
        QueueError::InvalidArgument(err.to_string())
    }
}

impl From<tokio_rusqlite::Error> for QueueError {
    fn from(err: tokio_rusqlite::Error) -> Self {
        QueueError::Storage(StorageError::from(err))
    }
}

impl From<rusqlite::Error> for QueueError {
    fn from(err: rusqlite::Error) -> Self {
        QueueError::Storage(StorageError::Sqlite(err))
    }
}

/// StorageError wraps whatever the backend reported.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error("connection: {0}")]
    Connection(String),

    #[error("meta_data encoding: {0}")]
    MetaData(#[from] serde_json::Error),
}

impl From<tokio_rusqlite::Error> for StorageError {
    fn from(err: tokio_rusqlite::Error) -> Self {
        match err {
            tokio_rusqlite::Error::Rusqlite(e) => StorageError::Sqlite(e),
            other => StorageError::Connection(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rusqlite_errors_become_storage_errors() {
        let err: QueueError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, QueueError::Storage(StorageError::Sqlite(_))));
    }

    #[test]
    fn time_expression_errors_are_invalid_arguments() {
        let err: QueueError = TimeExprError::Unrecognized("soonish".into()).into();
        assert!(matches!(err, QueueError::InvalidArgument(_)));
        assert!(err.to_string().contains("soonish"));
    }
}
