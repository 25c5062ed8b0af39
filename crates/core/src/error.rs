//! Error types for the transaction manager
//!
//! This module defines the error taxonomy shared by every layer.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Recovery code only cares about four classes of failure, exposed through
//! [`Error::kind`]:
//!
//! - **Invalid state**: a persisted archive cannot describe an unresolved
//!   transaction. Not retryable, the record must be purged.
//! - **Commit required / rollback required**: one more forced action is
//!   needed before the transaction is resolved. Retried on the next sweep.
//! - **Resource unavailable**: infrastructure could not be reached. Retried.
//! - **Fault**: anything unexpected. Retried, but logged distinctly.

use std::io;
use thiserror::Error;

/// Result type alias for transaction manager operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the transaction manager
#[derive(Debug, Error)]
pub enum Error {
    /// Persisted or live state cannot represent a legitimate transaction
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A commit step could not complete and must be retried
    #[error("Commit required for {xid}: {pending} branch(es) pending")]
    CommitRequired {
        /// Global transaction id (hex)
        xid: String,
        /// Number of branches that are still incomplete
        pending: usize,
    },

    /// A rollback step could not complete and must be retried
    #[error("Rollback required for {xid}: {pending} branch(es) pending")]
    RollbackRequired {
        /// Global transaction id (hex)
        xid: String,
        /// Number of branches that are still incomplete
        pending: usize,
    },

    /// A resource manager or remote coordinator could not be reached
    #[error("Resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// Unexpected runtime condition
    #[error("Fault: {0}")]
    Fault(String),

    /// I/O error from the durable log
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Data corruption detected in the durable log
    #[error("Data corruption: {0}")]
    Corruption(String),
}

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Archive must be purged, never retried
    InvalidState,
    /// Commit must be driven again
    CommitRequired,
    /// Rollback must be driven again
    RollbackRequired,
    /// Infrastructure issue
    ResourceUnavailable,
    /// Unexpected condition, possibly a defect
    Fault,
    /// Durable log I/O or encoding failure
    Storage,
}

impl Error {
    /// Create an invalid-state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }

    /// Create a resource-unavailable error
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Error::ResourceUnavailable(msg.into())
    }

    /// Create a fault
    pub fn fault(msg: impl Into<String>) -> Self {
        Error::Fault(msg.into())
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidState(_) => ErrorKind::InvalidState,
            Error::CommitRequired { .. } => ErrorKind::CommitRequired,
            Error::RollbackRequired { .. } => ErrorKind::RollbackRequired,
            Error::ResourceUnavailable(_) => ErrorKind::ResourceUnavailable,
            Error::Fault(_) => ErrorKind::Fault,
            Error::Io(_) | Error::Serialization(_) | Error::Corruption(_) => ErrorKind::Storage,
        }
    }

    /// Whether a later recovery pass may succeed where this one failed
    pub fn is_retryable(&self) -> bool {
        self.kind() != ErrorKind::InvalidState
    }
}

impl From<rmp_serde::encode::Error> for Error {
    fn from(e: rmp_serde::encode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for Error {
    fn from(e: rmp_serde::decode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
