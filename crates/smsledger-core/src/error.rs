//! Error types for the core library.

use thiserror::Error;

use crate::message::MessageId;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No stored message has this identifier.
    #[error("Message not found: {0}")]
    NotFound(MessageId),

    /// Refused to persist a message whose classification is unresolved.
    #[error("Message {0} has no resolved classification")]
    Unclassified(MessageId),

    /// The message store has not signalled readiness yet.
    #[error("Message store is not ready")]
    StoreNotReady,

    /// The event source could not be reached or subscribed to.
    #[error("Event source unavailable: {0}")]
    SourceUnavailable(String),

    /// Storage kept failing; the pipeline gave up on the store.
    #[error("Message store unavailable after {failures} consecutive failures: {last_error}")]
    StoreUnavailable {
        /// Number of consecutive failed writes.
        failures: u32,
        /// The last storage error observed.
        last_error: String,
    },

    /// The ingestion coordinator has shut down.
    #[error("Ingestion coordinator is not running")]
    CoordinatorStopped,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Returns `true` for failures of a single store operation.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Io(_))
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_classification() {
        assert!(Error::Database(sqlx::Error::PoolTimedOut).is_storage());
        assert!(!Error::NotFound(MessageId::from("x")).is_storage());
        assert!(!Error::SourceUnavailable("gone".into()).is_storage());
    }

    #[test]
    fn test_store_unavailable_message() {
        let err = Error::StoreUnavailable {
            failures: 3,
            last_error: "disk full".into(),
        };
        assert_eq!(
            err.to_string(),
            "Message store unavailable after 3 consecutive failures: disk full"
        );
    }
}
