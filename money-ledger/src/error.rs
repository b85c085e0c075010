//! Error types for the ledger

use std::fmt;
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or missing input
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Referenced account or transaction does not exist
    #[error("{0} not found")]
    NotFound(String),

    /// Business rule violation (insufficient balance, ...)
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    /// Concurrent mutation collision, safe to retry
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Unique key already taken (account id, email)
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Deadline passed, outcome may be ambiguous
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// Commit failure after validation passed
    #[error("Internal error: {0}")]
    Internal(String),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Transaction status change outside the state machine
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        /// Current status
        from: String,
        /// Requested status
        to: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Machine-readable error kind carried on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`Error::InvalidArgument`]
    InvalidArgument,
    /// See [`Error::NotFound`]
    NotFound,
    /// See [`Error::FailedPrecondition`]
    FailedPrecondition,
    /// See [`Error::Conflict`]
    Conflict,
    /// See [`Error::AlreadyExists`]
    AlreadyExists,
    /// See [`Error::DeadlineExceeded`]
    DeadlineExceeded,
    /// Everything the caller cannot act on
    Internal,
}

impl ErrorKind {
    /// Wire code
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "INVALID_ARGUMENT",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::FailedPrecondition => "FAILED_PRECONDITION",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::AlreadyExists => "ALREADY_EXISTS",
            ErrorKind::DeadlineExceeded => "DEADLINE_EXCEEDED",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Classify the error for callers and the transport
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::FailedPrecondition(_) => ErrorKind::FailedPrecondition,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Error::DeadlineExceeded(_) => ErrorKind::DeadlineExceeded,
            Error::Internal(_)
            | Error::Storage(_)
            | Error::Serialization(_)
            | Error::InvalidTransition { .. }
            | Error::Config(_)
            | Error::Io(_) => ErrorKind::Internal,
        }
    }

    /// Whether the whole operation may be retried from validation
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        match err.kind() {
            // Lock wait timed out or the write raced another writer
            rocksdb::ErrorKind::Busy
            | rocksdb::ErrorKind::TimedOut
            | rocksdb::ErrorKind::TryAgain => Error::Conflict(err.to_string()),
            _ => Error::Storage(err.to_string()),
        }
    }
}
