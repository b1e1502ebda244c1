//! Executor core of the tool engine.
//!
//! [`ToolExecutor`] resolves a tool through the registry, runs the security
//! pipeline and parameter validation, executes the tool under a merged
//! cancellation/timeout signal, records the execution, and notifies an
//! [`ExecutionObserver`]. Batches run sequentially or under a bounded
//! semaphore; streaming tools surface their chunks through an
//! [`ExecutionStream`].

#![warn(missing_docs, clippy::pedantic)]

mod config;
mod error;
mod events;
mod executor;
mod invocation;
mod stream;

pub use config::{ExecutorConfig, SensitiveDataMode};
pub use error::{ExecutorError, ExecutorResult};
pub use events::{
    CollectingExecutionObserver, CompositeExecutionObserver, ExecutionEvent, ExecutionObserver,
    TracingExecutionObserver,
};
pub use executor::ToolExecutor;
pub use invocation::{ExecutionValidation, ToolInvocation};
pub use stream::ExecutionStream;
