//! Core shared types for the tool execution engine.

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod ids;
mod sequence;
mod taxonomy;

/// Error type and result alias shared across the engine.
pub use error::{Error, Result};
/// Identifiers for tools and individual executions.
pub use ids::{ExecutionId, ToolId};
/// Explicitly owned monotonic counter.
pub use sequence::SequenceGenerator;
/// Structured error taxonomy and its stable wire codes.
pub use taxonomy::{ErrorKind, codes};
