//! Observability for the tool engine.
//!
//! [`init_tracing`] installs the process-wide `tracing` subscriber;
//! [`MetricsObserver`] aggregates execution outcomes reported by the
//! executor.

#![warn(missing_docs, clippy::pedantic)]

mod metrics;
mod subscriber;

pub use metrics::{ExecutionMetrics, MetricsObserver, ToolExecutionStats};
pub use subscriber::{TelemetryConfig, TelemetryError, TelemetryResult, init_tracing};
