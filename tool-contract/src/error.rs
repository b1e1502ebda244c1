//! Errors raised while declaring tools and parameters.

use thiserror::Error;

/// Errors produced while building descriptors and parameter specs.
#[derive(Debug, Error)]
pub enum ContractError {
    /// Descriptor failed validation.
    #[error("invalid tool descriptor: {reason}")]
    InvalidDescriptor {
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Two parameters share a name within one tool.
    #[error("tool `{tool_id}` declares parameter `{name}` more than once")]
    DuplicateParameter {
        /// Tool declaring the parameters.
        tool_id: String,
        /// Duplicated parameter name.
        name: String,
    },

    /// Parameter spec failed validation.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Offending parameter name.
        name: String,
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Regex facet did not compile.
    #[error("invalid pattern for parameter `{name}`: {source}")]
    InvalidPattern {
        /// Parameter carrying the pattern.
        name: String,
        /// Source regex error.
        source: regex::Error,
    },

    /// Identifier failed validation.
    #[error(transparent)]
    Primitive(#[from] tool_primitives::Error),
}

/// Result alias for contract declarations.
pub type ContractResult<T> = Result<T, ContractError>;
