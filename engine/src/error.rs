//! Error types for the CardSales sync engine.

use crate::{CollectionName, OperationKind};
use thiserror::Error;

/// Errors surfaced by the sync engine.
///
/// Only [`Error::MissingRecordId`] ever reaches callers of the
/// [`SyncManager`](crate::SyncManager); storage, serialization and remote
/// failures are absorbed inside it and turned into "stays queued".
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Validation errors
    #[error("{kind} on '{collection}' requires a record id")]
    MissingRecordId {
        kind: OperationKind,
        collection: CollectionName,
    },

    // Local state errors
    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    // Remote errors
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Failure of a single call against the remote data store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("network error: {0}")]
    Network(String),

    #[error("remote returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("could not decode remote response: {0}")]
    Decode(String),

    #[error("operation rejected: {0}")]
    Rejected(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = Error::MissingRecordId {
            kind: OperationKind::Update,
            collection: "customers".into(),
        };
        assert_eq!(err.to_string(), "update on 'customers' requires a record id");

        let err = Error::Remote(RemoteError::Status {
            status: 503,
            message: "Database error".into(),
        });
        assert_eq!(
            err.to_string(),
            "remote error: remote returned 503: Database error"
        );

        let err = Error::Storage("disk full".into());
        assert_eq!(err.to_string(), "storage error: disk full");
    }

    #[test]
    fn json_errors_convert() {
        let parse = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: Error = parse.into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
