//! Storage seams consumed by the registry and the executor.

use async_trait::async_trait;
use tool_primitives::{ExecutionId, ToolId};

use crate::StoreResult;
use crate::definition::ToolDefinition;
use crate::record::ExecutionRecord;

/// Persistence for tool definitions.
#[async_trait]
pub trait DefinitionStore: Send + Sync {
    /// Looks up a definition by tool id.
    async fn find_definition(&self, tool_id: &ToolId) -> StoreResult<Option<ToolDefinition>>;

    /// Inserts or replaces a definition.
    async fn upsert_definition(&self, definition: ToolDefinition) -> StoreResult<()>;

    /// Returns every stored definition ordered by tool id.
    async fn list_definitions(&self) -> StoreResult<Vec<ToolDefinition>>;

    /// Returns enabled definitions ordered by tool id.
    async fn list_enabled_definitions(&self) -> StoreResult<Vec<ToolDefinition>> {
        let mut definitions = self.list_definitions().await?;
        definitions.retain(ToolDefinition::is_enabled);
        Ok(definitions)
    }
}

/// Persistence for execution records.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Stores a new record.
    ///
    /// Implementations reject duplicate execution ids.
    async fn create_execution(&self, record: ExecutionRecord) -> StoreResult<()>;

    /// Replaces an existing record.
    async fn update_execution(&self, record: ExecutionRecord) -> StoreResult<()>;

    /// Looks up a record by execution id.
    async fn find_execution(&self, execution_id: ExecutionId)
    -> StoreResult<Option<ExecutionRecord>>;

    /// Returns up to `limit` records, newest first, optionally filtered by tool.
    async fn list_executions(
        &self,
        tool_id: Option<&ToolId>,
        limit: usize,
    ) -> StoreResult<Vec<ExecutionRecord>>;
}
