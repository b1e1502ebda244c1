//! Shared error definitions for engine primitives.

use thiserror::Error;
use uuid::Error as UuidError;

/// Result alias used throughout the engine primitives.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while constructing primitive types.
#[derive(Debug, Error)]
pub enum Error {
    /// The provided execution identifier could not be parsed.
    #[error("invalid execution id: {source}")]
    InvalidExecutionId {
        /// Source parsing error from the UUID library.
        #[from]
        source: UuidError,
    },

    /// Tool identifier failed validation.
    #[error("invalid tool id `{id}`: {reason}")]
    InvalidToolId {
        /// The offending identifier string.
        id: String,
        /// Human-readable reason for rejection.
        reason: String,
    },
}
