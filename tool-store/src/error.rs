//! Error types for the persistence layer.

use serde_json::Error as SerdeError;
use thiserror::Error;
use tool_primitives::ExecutionId;

use crate::record::ExecutionStatus;

/// Errors emitted by store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying I/O failure while reading or writing journal files.
    #[error("i/o error: {source}")]
    Io {
        /// Source [`std::io::Error`].
        #[from]
        source: std::io::Error,
    },
    /// Serialization or deserialization error.
    #[error("serialization error: {source}")]
    Serialization {
        /// Source [`serde_json::Error`].
        #[from]
        source: SerdeError,
    },
    /// Requested record does not exist.
    #[error("{entity} `{id}` not found")]
    NotFound {
        /// Kind of record.
        entity: &'static str,
        /// Identifier that was looked up.
        id: String,
    },
    /// Record with the same identifier already exists.
    #[error("{entity} `{id}` already exists")]
    AlreadyExists {
        /// Kind of record.
        entity: &'static str,
        /// Conflicting identifier.
        id: String,
    },
    /// Execution status change is not permitted.
    #[error("invalid status transition for execution {execution_id}: {from:?} -> {to:?}")]
    InvalidTransition {
        /// Execution being updated.
        execution_id: ExecutionId,
        /// Current status.
        from: ExecutionStatus,
        /// Requested status.
        to: ExecutionStatus,
    },
    /// Backend-specific failure.
    #[error("store backend failure: {reason}")]
    Backend {
        /// Human-readable reason.
        reason: String,
    },
}

impl StoreError {
    /// Helper to construct backend errors from string-like values.
    #[must_use]
    pub fn backend(reason: impl Into<String>) -> Self {
        Self::Backend {
            reason: reason.into(),
        }
    }
}

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
