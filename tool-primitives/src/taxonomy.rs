//! Structured error taxonomy shared by every tool outcome.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// Stable error codes carried on failed results.
pub mod codes {
    /// Parameter or input validation failed.
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    /// Generic execution failure inside a tool.
    pub const EXECUTION_ERROR: &str = "EXECUTION_ERROR";
    /// Execution exceeded its deadline.
    pub const TIMEOUT_ERROR: &str = "TIMEOUT_ERROR";
    /// Network failure while talking to a remote system.
    pub const NETWORK_ERROR: &str = "NETWORK_ERROR";
    /// Caller was not authenticated or authorized.
    pub const AUTHENTICATION_ERROR: &str = "AUTHENTICATION_ERROR";
    /// Tool or host configuration is invalid.
    pub const CONFIGURATION_ERROR: &str = "CONFIGURATION_ERROR";
    /// A dependency is unavailable or the feature is not implemented.
    pub const SERVICE_UNAVAILABLE: &str = "SERVICE_UNAVAILABLE";
    /// A remote system answered with something unusable.
    pub const INVALID_RESPONSE: &str = "INVALID_RESPONSE";
    /// A referenced resource does not exist.
    pub const RESOURCE_NOT_FOUND: &str = "RESOURCE_NOT_FOUND";
    /// A rate limit was hit.
    pub const RATE_LIMIT_EXCEEDED: &str = "RATE_LIMIT_EXCEEDED";
    /// The requested tool is not registered.
    pub const TOOL_NOT_FOUND: &str = "TOOL_NOT_FOUND";
    /// The execution was cancelled before completing.
    pub const CANCELLED: &str = "CANCELLED";
    /// Unexpected failure inside the engine itself.
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

/// Classification of a failed tool execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Input failed parameter or security validation.
    ValidationError,
    /// Remote call failed at the network level.
    NetworkError,
    /// Tool or engine configuration problem.
    ConfigurationError,
    /// Generic failure inside tool logic.
    ExecutionError,
    /// Caller lacks the identity or rights to run the tool.
    AuthenticationError,
    /// Execution was cancelled or its deadline elapsed.
    TimeoutError,
    /// Dependency unavailable or functionality not implemented.
    ServiceUnavailable,
    /// Remote system returned an unusable response.
    InvalidResponse,
    /// Referenced resource is missing.
    ResourceNotFound,
    /// Rate limit exceeded.
    RateLimitExceeded,
    /// Tool id did not resolve to a registered tool.
    ToolNotFound,
    /// Execution was cancelled by the caller.
    Cancelled,
    /// Unexpected engine failure.
    InternalError,
}

impl ErrorKind {
    /// Returns the stable wire code for this kind.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ValidationError => codes::VALIDATION_ERROR,
            Self::NetworkError => codes::NETWORK_ERROR,
            Self::ConfigurationError => codes::CONFIGURATION_ERROR,
            Self::ExecutionError => codes::EXECUTION_ERROR,
            Self::AuthenticationError => codes::AUTHENTICATION_ERROR,
            Self::TimeoutError => codes::TIMEOUT_ERROR,
            Self::ServiceUnavailable => codes::SERVICE_UNAVAILABLE,
            Self::InvalidResponse => codes::INVALID_RESPONSE,
            Self::ResourceNotFound => codes::RESOURCE_NOT_FOUND,
            Self::RateLimitExceeded => codes::RATE_LIMIT_EXCEEDED,
            Self::ToolNotFound => codes::TOOL_NOT_FOUND,
            Self::Cancelled => codes::CANCELLED,
            Self::InternalError => codes::INTERNAL_ERROR,
        }
    }

    /// Maps a wire code back onto a kind, defaulting to [`ErrorKind::ExecutionError`].
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code {
            codes::VALIDATION_ERROR => Self::ValidationError,
            codes::NETWORK_ERROR => Self::NetworkError,
            codes::CONFIGURATION_ERROR => Self::ConfigurationError,
            codes::AUTHENTICATION_ERROR => Self::AuthenticationError,
            codes::TIMEOUT_ERROR => Self::TimeoutError,
            codes::SERVICE_UNAVAILABLE => Self::ServiceUnavailable,
            codes::INVALID_RESPONSE => Self::InvalidResponse,
            codes::RESOURCE_NOT_FOUND => Self::ResourceNotFound,
            codes::RATE_LIMIT_EXCEEDED => Self::RateLimitExceeded,
            codes::TOOL_NOT_FOUND => Self::ToolNotFound,
            codes::CANCELLED => Self::Cancelled,
            codes::INTERNAL_ERROR => Self::InternalError,
            _ => Self::ExecutionError,
        }
    }

    /// Returns `true` when a retry may reasonably succeed.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::NetworkError
                | Self::TimeoutError
                | Self::ServiceUnavailable
                | Self::RateLimitExceeded
        )
    }

    /// Returns `true` for cancellation and deadline outcomes.
    #[must_use]
    pub const fn is_cancellation(self) -> bool {
        matches!(self, Self::TimeoutError | Self::Cancelled)
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_map_back_to_kinds() {
        for kind in [
            ErrorKind::ValidationError,
            ErrorKind::NetworkError,
            ErrorKind::AuthenticationError,
            ErrorKind::TimeoutError,
            ErrorKind::ToolNotFound,
            ErrorKind::Cancelled,
        ] {
            assert_eq!(ErrorKind::from_code(kind.code()), kind);
        }
        assert_eq!(ErrorKind::from_code("SOMETHING_ELSE"), ErrorKind::ExecutionError);
    }

    #[test]
    fn retryable_kinds() {
        assert!(ErrorKind::NetworkError.is_retryable());
        assert!(!ErrorKind::ValidationError.is_retryable());
        assert!(ErrorKind::Cancelled.is_cancellation());
    }
}
