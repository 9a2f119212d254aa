//! Subscription Engine Error Hierarchy
//!
//! Errors are grouped by the layer they originate from. Storage and transport
//! failures are expected during normal operation and are retried on the next
//! scheduling cycle; subscription errors are returned to the administrative
//! caller.

use std::path::PathBuf;

use config::ConfigError;
use tokio::task::JoinError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Infrastructure-level failures (storage, transport, serialization)
    #[error(transparent)]
    System(#[from] SystemError),

    /// Configuration loading or validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Administrative request rejected (subscribe/unsubscribe/update)
    #[error(transparent)]
    Subscription(#[from] SubscriptionError),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

impl Error {
    /// Whether the failure should be retried on a later scheduling cycle
    /// rather than surfaced to a caller.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::System(SystemError::Storage(_))
                | Error::System(SystemError::Transport(_))
                | Error::System(SystemError::Io(_))
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    // Storage layer
    #[error("Storage operation failed: {0}")]
    Storage(#[from] StorageError),

    // Delivery transport
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    //Serialization
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    TaskJoin(#[from] JoinError),

    #[error("Metrics registry error: {0}")]
    Metrics(#[from] prometheus::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Embedded database errors
    #[error(transparent)]
    Sled(#[from] sled::Error),

    /// Serialization failures for persisted records
    #[error(transparent)]
    Codec(#[from] bincode::Error),

    /// Record written by a newer schema than this build understands
    #[error("Unsupported {kind} record version: {found}")]
    UnsupportedRecordVersion { kind: &'static str, found: u8 },

    /// Key bytes could not be split into their components
    #[error("Corrupt storage key: {0}")]
    CorruptKey(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    /// Custom error with the offending path
    #[error("Error occurred at path: {path}")]
    PathError {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connection, timeout or protocol failure
    #[error("Request to {url} failed: {message}")]
    Request { url: String, message: String },

    /// Non-success HTTP status
    #[error("Subscriber {url} answered HTTP {status}: {message}")]
    HttpStatus {
        url: String,
        status: u16,
        message: String,
    },

    /// Success status line but a FAILURE status document
    #[error("Subscriber {url} rejected delivery: {message}")]
    Rejected { url: String, message: String },

    #[error("Invalid delivery URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to read {path:?}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum SubscriptionError {
    #[error("Invalid subscriber URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid priority {0}: must be >= 1")]
    InvalidPriority(u32),

    #[error("Invalid concurrency {requested}: must be within 1..={max}")]
    InvalidConcurrency { requested: usize, max: usize },

    #[error("Unknown subscriber: {0}")]
    UnknownSubscriber(String),

    /// A different subscription is already registered under this id
    #[error("Subscriber {0} already exists with a different definition")]
    Conflict(String),

    #[error("Unknown filter predicate: {0}")]
    UnknownPredicate(String),

    #[error("Subscription engine is stopped")]
    EngineStopped,
}

// ============== Conversion Implementations ============== //
impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Error::System(SystemError::Storage(e))
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Error::System(SystemError::Transport(e))
    }
}

impl From<sled::Error> for Error {
    fn from(e: sled::Error) -> Self {
        Error::System(SystemError::Storage(StorageError::Sled(e)))
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::System(SystemError::Storage(StorageError::Codec(e)))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::System(SystemError::Io(e))
    }
}

impl From<JoinError> for Error {
    fn from(e: JoinError) -> Self {
        Error::System(SystemError::TaskJoin(e))
    }
}

impl From<prometheus::Error> for Error {
    fn from(e: prometheus::Error) -> Self {
        Error::System(SystemError::Metrics(e))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::System(SystemError::Serialization(e.to_string()))
    }
}
