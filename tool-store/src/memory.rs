//! In-process store retaining definitions and a bounded execution history.

use std::collections::{BTreeMap, VecDeque};
use std::num::NonZeroUsize;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tool_primitives::{ExecutionId, ToolId};
use tracing::trace;

use crate::definition::ToolDefinition;
use crate::record::ExecutionRecord;
use crate::traits::{DefinitionStore, ExecutionStore};
use crate::{StoreError, StoreResult};

const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// Configuration for [`MemoryStore`].
#[derive(Debug, Clone, Copy)]
pub struct MemoryStoreConfig {
    history_capacity: NonZeroUsize,
}

impl MemoryStoreConfig {
    /// Creates a configuration retaining at most `history_capacity` records.
    #[must_use]
    pub const fn new(history_capacity: NonZeroUsize) -> Self {
        Self { history_capacity }
    }

    /// Returns the configured history capacity.
    #[must_use]
    pub const fn history_capacity(self) -> NonZeroUsize {
        self.history_capacity
    }
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            history_capacity: NonZeroUsize::new(DEFAULT_HISTORY_CAPACITY).expect("non-zero"),
        }
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    definitions: BTreeMap<ToolId, ToolDefinition>,
    executions: VecDeque<ExecutionRecord>,
    evicted: u64,
}

/// Store keeping everything in process memory.
///
/// Execution history behaves as a ring: once the capacity is reached the
/// oldest record is evicted on every insert.
#[derive(Debug, Default)]
pub struct MemoryStore {
    config: MemoryStoreConfig,
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    /// Creates a store using the supplied configuration.
    #[must_use]
    pub fn new(config: MemoryStoreConfig) -> Self {
        Self {
            config,
            inner: RwLock::new(MemoryInner {
                executions: VecDeque::with_capacity(config.history_capacity().get().min(1024)),
                ..MemoryInner::default()
            }),
        }
    }

    /// Returns utilisation statistics.
    pub async fn stats(&self) -> MemoryStoreStats {
        let guard = self.inner.read().await;
        MemoryStoreStats {
            definitions: guard.definitions.len(),
            executions: guard.executions.len(),
            evicted: guard.evicted,
            capacity: self.config.history_capacity().get(),
        }
    }
}

#[async_trait]
impl DefinitionStore for MemoryStore {
    async fn find_definition(&self, tool_id: &ToolId) -> StoreResult<Option<ToolDefinition>> {
        Ok(self.inner.read().await.definitions.get(tool_id).cloned())
    }

    async fn upsert_definition(&self, definition: ToolDefinition) -> StoreResult<()> {
        let mut guard = self.inner.write().await;
        trace!(tool_id = %definition.tool_id(), "upserting tool definition");
        guard
            .definitions
            .insert(definition.tool_id().clone(), definition);
        Ok(())
    }

    async fn list_definitions(&self) -> StoreResult<Vec<ToolDefinition>> {
        Ok(self
            .inner
            .read()
            .await
            .definitions
            .values()
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ExecutionStore for MemoryStore {
    async fn create_execution(&self, record: ExecutionRecord) -> StoreResult<()> {
        let mut guard = self.inner.write().await;
        if guard
            .executions
            .iter()
            .any(|existing| existing.execution_id() == record.execution_id())
        {
            return Err(StoreError::AlreadyExists {
                entity: "execution",
                id: record.execution_id().to_string(),
            });
        }

        guard.executions.push_back(record);
        while guard.executions.len() > self.config.history_capacity().get() {
            if guard.executions.pop_front().is_some() {
                guard.evicted += 1;
            }
        }
        Ok(())
    }

    async fn update_execution(&self, record: ExecutionRecord) -> StoreResult<()> {
        let mut guard = self.inner.write().await;
        let slot = guard
            .executions
            .iter_mut()
            .find(|existing| existing.execution_id() == record.execution_id())
            .ok_or_else(|| StoreError::NotFound {
                entity: "execution",
                id: record.execution_id().to_string(),
            })?;
        *slot = record;
        Ok(())
    }

    async fn find_execution(
        &self,
        execution_id: ExecutionId,
    ) -> StoreResult<Option<ExecutionRecord>> {
        Ok(self
            .inner
            .read()
            .await
            .executions
            .iter()
            .find(|record| record.execution_id() == execution_id)
            .cloned())
    }

    async fn list_executions(
        &self,
        tool_id: Option<&ToolId>,
        limit: usize,
    ) -> StoreResult<Vec<ExecutionRecord>> {
        let guard = self.inner.read().await;
        Ok(guard
            .executions
            .iter()
            .rev()
            .filter(|record| tool_id.is_none_or(|id| record.tool_id() == id))
            .take(limit)
            .cloned()
            .collect())
    }
}

/// Snapshot describing utilisation of a [`MemoryStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryStoreStats {
    /// Stored tool definitions.
    pub definitions: usize,
    /// Execution records currently retained.
    pub executions: usize,
    /// Records dropped because the history was full.
    pub evicted: u64,
    /// Maximum number of retained execution records.
    pub capacity: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tool_contract::{ExecutionContext, ParamMap, ToolDescriptor};

    fn record(tool: &str) -> ExecutionRecord {
        ExecutionRecord::new(
            ExecutionId::random(),
            ToolId::new(tool).unwrap(),
            tool,
            &ExecutionContext::new("alice"),
            &ParamMap::new(),
        )
    }

    #[tokio::test]
    async fn history_is_bounded_and_newest_first() {
        let store = MemoryStore::new(MemoryStoreConfig::new(NonZeroUsize::new(2).unwrap()));
        let first = record("echo");
        let second = record("search");
        let third = record("echo");
        let third_id = third.execution_id();

        store.create_execution(first.clone()).await.unwrap();
        store.create_execution(second).await.unwrap();
        store.create_execution(third).await.unwrap();

        assert!(
            store
                .find_execution(first.execution_id())
                .await
                .unwrap()
                .is_none()
        );
        let all = store.list_executions(None, 10).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].execution_id(), third_id);

        let echo = ToolId::new("echo").unwrap();
        let filtered = store.list_executions(Some(&echo), 10).await.unwrap();
        assert_eq!(filtered.len(), 1);

        let stats = store.stats().await;
        assert_eq!(stats.evicted, 1);
        assert_eq!(stats.executions, 2);
    }

    #[tokio::test]
    async fn rejects_duplicate_and_unknown_records() {
        let store = MemoryStore::default();
        let record = record("echo");
        store.create_execution(record.clone()).await.unwrap();
        assert!(matches!(
            store.create_execution(record).await,
            Err(StoreError::AlreadyExists { .. })
        ));
        assert!(matches!(
            store.update_execution(self::record("echo")).await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn definitions_filter_enabled() {
        let store = MemoryStore::default();
        let enabled = ToolDescriptor::builder("echo", "Echo").unwrap().build().unwrap();
        let disabled = ToolDescriptor::builder("legacy", "Legacy")
            .unwrap()
            .enabled(false)
            .build()
            .unwrap();
        store
            .upsert_definition(ToolDefinition::from_descriptor(&enabled))
            .await
            .unwrap();
        store
            .upsert_definition(ToolDefinition::from_descriptor(&disabled))
            .await
            .unwrap();

        assert_eq!(store.list_definitions().await.unwrap().len(), 2);
        let active = store.list_enabled_definitions().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].tool_id().as_str(), "echo");
    }
}
