use thiserror::Error;
use tool_store::StoreError;

/// Errors surfaced by the security pipeline.
#[derive(Debug, Error)]
pub enum SecurityError {
    /// Sanitization pattern failed to compile.
    #[error("invalid sanitization pattern `{pattern}`: {source}")]
    InvalidPattern {
        /// Offending pattern.
        pattern: String,
        /// Compilation error.
        #[source]
        source: regex::Error,
    },
    /// Action submitted to a sandbox that was already disposed.
    #[error("sandbox `{sandbox_id}` has been disposed")]
    SandboxDisposed {
        /// Identifier of the sandbox.
        sandbox_id: String,
    },
    /// Audit backend failure.
    #[error("audit log failure: {0}")]
    Audit(#[from] StoreError),
}

/// Result alias for security operations.
pub type SecurityResult<T> = Result<T, SecurityError>;
