//! Registry of executable tools.
//!
//! The registry owns the live map of [`ToolHandle`](tool_contract::ToolHandle)s,
//! a rollup of per-tool execution statistics, and the enabled flag the
//! executor consults before accepting new work. Definitions are written
//! through to a [`DefinitionStore`](tool_store::DefinitionStore).

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod events;
mod metadata;
mod registry;

pub use error::{RegistryError, RegistryResult};
pub use events::{
    CollectingRegistryObserver, CompositeRegistryObserver, RegistryEvent, RegistryObserver,
    TracingRegistryObserver,
};
pub use metadata::ToolMetadata;
pub use registry::{ToolRegistry, ToolSearch};
