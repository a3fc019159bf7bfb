//! Error types for the allocation core

use crate::types::{ClassCounts, ResourceClass};
use thiserror::Error;

/// Result type for allocation operations
pub type Result<T> = std::result::Result<T, Error>;

/// Allocation errors
#[derive(Error, Debug)]
pub enum Error {
    /// Holder identity already registered
    #[error("Holder already exists: {0}")]
    AlreadyExists(String),

    /// Credential check failed
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Holder is at or over the per-holder cap
    #[error("Holder {holder} has reached the cap of {cap} (holds {held})")]
    CapExceeded {
        /// Holder that hit the cap
        holder: String,
        /// Current total holdings
        held: u32,
        /// Configured cap
        cap: u32,
    },

    /// Class inventory is at zero
    #[error("No {0} inventory available")]
    Exhausted(ResourceClass),

    /// Cancel requested more than the holder holds
    #[error("Holder {holder} has no {class} holdings left to cancel")]
    InsufficientHoldings {
        /// Holder that requested the cancellation
        holder: String,
        /// Class that ran out
        class: ResourceClass,
        /// Holdings after the cancellations that were applied
        remaining: ClassCounts,
    },

    /// Holder not found
    #[error("Holder not found: {0}")]
    NotFound(String),

    /// Input rejected at the boundary
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Metrics registration error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the caller can retry or correct the request.
    ///
    /// Persistence failures abort the current operation and are not retried.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Error::Storage(_) | Error::Serialization(_) | Error::Io(_)
        )
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persistence_errors_are_fatal() {
        assert!(!Error::Storage("disk full".into()).is_recoverable());
        assert!(!Error::Io(std::io::Error::new(std::io::ErrorKind::Other, "boom")).is_recoverable());
        assert!(Error::Exhausted(ResourceClass::Vip).is_recoverable());
        assert!(Error::NotFound("alice".into()).is_recoverable());
    }

    #[test]
    fn test_cap_exceeded_message() {
        let err = Error::CapExceeded {
            holder: "alice".into(),
            held: 10,
            cap: 10,
        };
        assert_eq!(
            err.to_string(),
            "Holder alice has reached the cap of 10 (holds 10)"
        );
    }
}
