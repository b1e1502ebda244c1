//! Faults raised by tool core logic.

use std::time::Duration;

use thiserror::Error;
use tool_primitives::ErrorKind;

/// Failure returned by [`Tool::run`](crate::Tool::run).
///
/// Faults never reach the executor's caller as errors; [`ToolHandle`](crate::ToolHandle)
/// converts them into failed results using [`ToolFault::kind`].
#[derive(Debug, Error)]
pub enum ToolFault {
    /// The cancellation signal was observed.
    #[error("operation cancelled")]
    Cancelled,

    /// The tool was not permitted to access something it needed.
    #[error("permission denied: {reason}")]
    PermissionDenied {
        /// Human-readable reason.
        reason: String,
    },

    /// An argument was malformed in a way generic validation could not catch.
    #[error("invalid argument `{name}`: {reason}")]
    InvalidArgument {
        /// Offending argument.
        name: String,
        /// Human-readable reason.
        reason: String,
    },

    /// A network call failed.
    #[error("network failure: {reason}")]
    Network {
        /// Human-readable reason.
        reason: String,
    },

    /// Functionality is not available.
    #[error("not implemented: {feature}")]
    NotImplemented {
        /// Missing feature.
        feature: String,
    },

    /// A remote system answered with something unusable.
    #[error("invalid response: {reason}")]
    InvalidResponse {
        /// Human-readable reason.
        reason: String,
    },

    /// The tool is misconfigured.
    #[error("configuration error: {reason}")]
    Configuration {
        /// Human-readable reason.
        reason: String,
    },

    /// A referenced resource does not exist.
    #[error("resource not found: {resource}")]
    NotFound {
        /// Missing resource.
        resource: String,
    },

    /// A remote rate limit was hit.
    #[error("rate limit exceeded")]
    RateLimited {
        /// Suggested wait before retrying.
        retry_after: Option<Duration>,
    },

    /// Any other failure.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ToolFault {
    /// Creates a [`ToolFault::PermissionDenied`].
    #[must_use]
    pub fn permission_denied(reason: impl Into<String>) -> Self {
        Self::PermissionDenied {
            reason: reason.into(),
        }
    }

    /// Creates a [`ToolFault::InvalidArgument`].
    #[must_use]
    pub fn invalid_argument(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates a [`ToolFault::Network`].
    #[must_use]
    pub fn network(reason: impl Into<String>) -> Self {
        Self::Network {
            reason: reason.into(),
        }
    }

    /// Creates a [`ToolFault::NotImplemented`].
    #[must_use]
    pub fn not_implemented(feature: impl Into<String>) -> Self {
        Self::NotImplemented {
            feature: feature.into(),
        }
    }

    /// Creates a [`ToolFault::Internal`] from a message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(anyhow::anyhow!(message.into()))
    }

    /// Maps the fault onto the engine error taxonomy.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Cancelled => ErrorKind::TimeoutError,
            Self::PermissionDenied { .. } => ErrorKind::AuthenticationError,
            Self::InvalidArgument { .. } => ErrorKind::ValidationError,
            Self::Network { .. } => ErrorKind::NetworkError,
            Self::NotImplemented { .. } => ErrorKind::ServiceUnavailable,
            Self::InvalidResponse { .. } => ErrorKind::InvalidResponse,
            Self::Configuration { .. } => ErrorKind::ConfigurationError,
            Self::NotFound { .. } => ErrorKind::ResourceNotFound,
            Self::RateLimited { .. } => ErrorKind::RateLimitExceeded,
            Self::Internal(_) => ErrorKind::InternalError,
        }
    }

    /// Returns the retry hint, if the fault carries one.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_faults_onto_taxonomy() {
        assert_eq!(ToolFault::Cancelled.kind(), ErrorKind::TimeoutError);
        assert_eq!(
            ToolFault::permission_denied("no").kind(),
            ErrorKind::AuthenticationError
        );
        assert_eq!(
            ToolFault::invalid_argument("url", "bad scheme").kind(),
            ErrorKind::ValidationError
        );
        assert_eq!(ToolFault::network("reset").kind(), ErrorKind::NetworkError);
        assert_eq!(
            ToolFault::not_implemented("pdf").kind(),
            ErrorKind::ServiceUnavailable
        );
        assert_eq!(ToolFault::internal("boom").kind(), ErrorKind::InternalError);
        assert_eq!(ToolFault::internal("boom").to_string(), "boom");
    }
}
