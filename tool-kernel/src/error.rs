use thiserror::Error;
use tool_store::StoreError;

/// Errors returned by the executor for contract violations and store access.
///
/// Expected execution failures are never reported here; they are carried by
/// the returned [`ExecutionResult`](tool_contract::ExecutionResult).
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The supplied tool identifier is malformed.
    #[error("invalid tool id `{tool_id}`: {source}")]
    InvalidToolId {
        /// Identifier as supplied.
        tool_id: String,
        /// Validation failure.
        #[source]
        source: tool_primitives::Error,
    },
    /// Execution history could not be read.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result alias for executor operations.
pub type ExecutorResult<T> = Result<T, ExecutorError>;
