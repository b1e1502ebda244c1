//! Persistence for tool definitions and execution records.
//!
//! The engine only needs create/update/find semantics from its store. This
//! crate defines those traits, an in-process implementation, and an
//! append-only NDJSON journal used for durable audit trails.

#![warn(missing_docs, clippy::pedantic)]

mod definition;
mod error;
mod journal;
mod memory;
mod record;
mod traits;

pub use definition::ToolDefinition;
pub use error::{StoreError, StoreResult};
pub use journal::FileJournal;
pub use memory::{MemoryStore, MemoryStoreConfig, MemoryStoreStats};
pub use record::{ExecutionRecord, ExecutionStatus};
pub use traits::{DefinitionStore, ExecutionStore};
