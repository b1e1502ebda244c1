use thiserror::Error;
use tool_store::StoreError;

/// Errors produced by registration and lookup.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Tool id collided with an existing registration.
    #[error("tool `{tool_id}` is already registered")]
    DuplicateTool {
        /// Identifier of the offending tool.
        tool_id: String,
    },

    /// Health check reported the tool as unusable.
    #[error("cannot register unhealthy tool `{tool_id}`: {reason}")]
    UnhealthyTool {
        /// Identifier of the rejected tool.
        tool_id: String,
        /// Message reported by the health check.
        reason: String,
    },

    /// Requested tool does not exist.
    #[error("tool `{tool_id}` is not registered")]
    UnknownTool {
        /// Identifier that was looked up.
        tool_id: String,
    },

    /// Definition store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RegistryError {
    pub(crate) fn unknown(tool_id: impl Into<String>) -> Self {
        Self::UnknownTool {
            tool_id: tool_id.into(),
        }
    }
}

/// Result alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
