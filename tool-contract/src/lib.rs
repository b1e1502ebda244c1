//! Contract every tool implements, plus the parameter and result models.
//!
//! A tool supplies a [`ToolDescriptor`] and its core logic through the
//! [`Tool`] trait. Callers never invoke that logic directly: they go through a
//! [`ToolHandle`], which re-validates input, fills defaults, converts values
//! to their declared types, honours cancellation, and turns every fault into a
//! structured [`ExecutionResult`].

#![warn(missing_docs, clippy::pedantic)]

mod context;
mod error;
mod fault;
mod handle;
mod param;
mod result;
mod stream;
mod tool;
mod validation;

pub use context::ExecutionContext;
pub use error::{ContractError, ContractResult};
pub use fault::ToolFault;
pub use handle::ToolHandle;
pub use param::{
    CustomValidator, FacetSchema, ParameterSchema, ParameterSpec, ParameterType, UiHints,
    ValidationFacets,
};
pub use result::{
    ExecutionFailure, ExecutionResult, LogEntry, LogLevel, PerformanceMetrics, ResultFormat,
};
pub use stream::{ChunkEmitter, ChunkKind, StreamChunk};
pub use tool::{
    Capabilities, HealthState, HealthStatus, ParamMap, Tool, ToolDescriptor,
    ToolDescriptorBuilder,
};
pub use validation::{FieldError, ValidationResult, field_codes};

/// Re-exported cancellation primitive passed to tool logic.
pub use tokio_util::sync::CancellationToken;
