//! Tool execution engine facade.
//!
//! Depend on this crate to get the whole engine, or disable default features
//! to pick components. The tool contract and primitives are always present.

#![warn(missing_docs, clippy::pedantic)]

/// Identifiers, error taxonomy, and sequence generation.
pub use tool_primitives as primitives;

/// Tool trait, parameter model, and result model.
pub use tool_contract as contract;

/// Persistence collaborators (enabled by `store` feature).
#[cfg(feature = "store")]
pub use tool_store as store;

/// Live tool registry (enabled by `registry` feature).
#[cfg(feature = "registry")]
pub use tool_registry as registry;

/// Authorization, scanning, redaction, sandbox, and audit (enabled by `security` feature).
#[cfg(feature = "security")]
pub use tool_security as security;

/// Executor (enabled by `kernel` feature).
#[cfg(feature = "kernel")]
pub use tool_kernel as kernel;

/// Tracing setup and execution metrics (enabled by `telemetry` feature).
#[cfg(feature = "telemetry")]
pub use tool_telemetry as telemetry;

/// Configuration loading (enabled by `config` feature).
#[cfg(feature = "config")]
pub use tool_config as config;
