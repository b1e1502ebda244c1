//! Live registry of tool handles.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tool_contract::{HealthState, Tool, ToolDescriptor, ToolHandle};
use tool_primitives::ToolId;
use tool_store::{DefinitionStore, MemoryStore, ToolDefinition};
use tracing::{debug, info, warn};

use crate::error::{RegistryError, RegistryResult};
use crate::events::{RegistryEvent, RegistryObserver, TracingRegistryObserver};
use crate::metadata::ToolMetadata;

/// Filters applied by [`ToolRegistry::search`].
#[derive(Debug, Clone, Default)]
pub struct ToolSearch {
    text: Option<String>,
    category: Option<String>,
    enabled: Option<bool>,
}

impl ToolSearch {
    /// Creates a search with no filters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Case-insensitive substring match over id, name, and description.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into().to_lowercase());
        self
    }

    /// Case-insensitive category match.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Restricts results to tools whose enabled flag equals `enabled`.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    fn matches(&self, handle: &ToolHandle, enabled: bool) -> bool {
        let descriptor = handle.descriptor();
        if let Some(text) = self.text.as_deref().filter(|text| !text.is_empty()) {
            let hit = descriptor.id().as_str().to_lowercase().contains(text)
                || descriptor.name().to_lowercase().contains(text)
                || descriptor.description().to_lowercase().contains(text);
            if !hit {
                return false;
            }
        }
        if let Some(category) = self.category.as_deref().filter(|c| !c.is_empty()) {
            if !descriptor.category().eq_ignore_ascii_case(category) {
                return false;
            }
        }
        self.enabled.is_none_or(|wanted| wanted == enabled)
    }
}

/// Registry that stores tool handles keyed by id.
///
/// Reads and writes use short-lived locks so lookups stay safe while other
/// tasks register or unregister tools. The std locks are never held across an
/// await. Read-modify-write cycles on persisted definitions are serialised by
/// an async mutex so concurrent executions cannot lose rollup updates.
pub struct ToolRegistry {
    tools: RwLock<HashMap<ToolId, ToolHandle>>,
    metadata: RwLock<HashMap<ToolId, ToolMetadata>>,
    definition_writes: Mutex<()>,
    store: Arc<dyn DefinitionStore>,
    observer: Arc<dyn RegistryObserver>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tools = self.tools.read().expect("tool registry poisoned");
        let mut ids: Vec<_> = tools.keys().map(ToolId::as_str).collect();
        ids.sort_unstable();
        f.debug_struct("ToolRegistry")
            .field("registered", &ids)
            .finish_non_exhaustive()
    }
}

impl ToolRegistry {
    /// Creates an empty registry backed by an in-memory definition store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::default()))
    }

    /// Creates an empty registry persisting definitions to `store`.
    #[must_use]
    pub fn with_store(store: Arc<dyn DefinitionStore>) -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
            metadata: RwLock::new(HashMap::new()),
            definition_writes: Mutex::new(()),
            store,
            observer: Arc::new(TracingRegistryObserver),
        }
    }

    /// Replaces the lifecycle observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn RegistryObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Returns the definition store this registry writes through to.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn DefinitionStore> {
        &self.store
    }

    /// Registers a tool after probing its health.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateTool`] if the id is taken and
    /// [`RegistryError::UnhealthyTool`] if the health check reports
    /// [`HealthState::Unhealthy`].
    ///
    /// # Panics
    ///
    /// Panics if an internal registry lock is poisoned.
    pub async fn register(&self, handle: ToolHandle) -> RegistryResult<()> {
        let tool_id = handle.id().clone();
        if self.is_registered(tool_id.as_str()) {
            warn!(tool_id = %tool_id, "tool is already registered");
            return Err(RegistryError::DuplicateTool {
                tool_id: tool_id.to_string(),
            });
        }

        let health = handle.health_status().await;
        if health.state() == HealthState::Unhealthy {
            let reason = health.message().unwrap_or("unhealthy").to_owned();
            warn!(tool_id = %tool_id, reason = %reason, "cannot register unhealthy tool");
            return Err(RegistryError::UnhealthyTool {
                tool_id: tool_id.to_string(),
                reason,
            });
        }

        let descriptor = handle.descriptor().clone();
        {
            let mut tools = self.tools.write().expect("tool registry poisoned");
            if tools.contains_key(&tool_id) {
                return Err(RegistryError::DuplicateTool {
                    tool_id: tool_id.to_string(),
                });
            }
            tools.insert(tool_id.clone(), handle);
        }
        self.metadata
            .write()
            .expect("tool metadata poisoned")
            .insert(tool_id.clone(), ToolMetadata::seed(&descriptor));

        if let Err(err) = self.persist_definition(&descriptor).await {
            warn!(tool_id = %tool_id, ?err, "failed to persist tool definition");
        }

        self.observer.on_event(&RegistryEvent::Registered {
            tool_id,
            tool_name: descriptor.name().to_owned(),
            at: Utc::now(),
        });
        Ok(())
    }

    /// Wraps `tool` in a handle and registers it.
    ///
    /// # Errors
    ///
    /// See [`ToolRegistry::register`].
    pub async fn register_tool<T>(&self, tool: T) -> RegistryResult<()>
    where
        T: Tool + 'static,
    {
        self.register(ToolHandle::new(tool)).await
    }

    /// Registers every handle, logging each outcome, and returns how many succeeded.
    pub async fn register_all<I>(&self, handles: I) -> usize
    where
        I: IntoIterator<Item = ToolHandle>,
    {
        let mut registered = 0;
        for handle in handles {
            let tool_id = handle.id().clone();
            match self.register(handle).await {
                Ok(()) => registered += 1,
                Err(err) => warn!(tool_id = %tool_id, %err, "startup registration failed"),
            }
        }
        info!(registered, "tool registration pass finished");
        registered
    }

    async fn persist_definition(
        &self,
        descriptor: &ToolDescriptor,
    ) -> RegistryResult<()> {
        let _writes = self.definition_writes.lock().await;
        let definition = match self.store.find_definition(descriptor.id()).await? {
            Some(mut existing) => {
                existing.refresh_from(descriptor);
                existing
            }
            None => ToolDefinition::from_descriptor(descriptor),
        };
        self.store.upsert_definition(definition).await?;
        Ok(())
    }

    /// Removes a tool and marks its persisted definition disabled.
    ///
    /// In-flight executions holding a cloned handle run to completion.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownTool`] if nothing is registered under `tool_id`.
    ///
    /// # Panics
    ///
    /// Panics if an internal registry lock is poisoned.
    pub async fn unregister(&self, tool_id: &str) -> RegistryResult<()> {
        let removed = self
            .tools
            .write()
            .expect("tool registry poisoned")
            .remove(tool_id);
        let Some(handle) = removed else {
            warn!(tool_id, "tool is not registered");
            return Err(RegistryError::unknown(tool_id));
        };
        self.metadata
            .write()
            .expect("tool metadata poisoned")
            .remove(tool_id);

        if let Err(err) = self.write_enabled(handle.id(), false).await {
            warn!(tool_id, ?err, "failed to disable persisted definition");
        }

        self.observer.on_event(&RegistryEvent::Unregistered {
            tool_id: handle.id().clone(),
            tool_name: handle.descriptor().name().to_owned(),
            at: Utc::now(),
        });
        Ok(())
    }

    /// Flips the enabled flag without removing the tool.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownTool`] for unregistered ids and
    /// [`RegistryError::Store`] when the definition cannot be updated.
    ///
    /// # Panics
    ///
    /// Panics if an internal registry lock is poisoned.
    pub async fn set_enabled(&self, tool_id: &str, enabled: bool) -> RegistryResult<()> {
        let (id, tool_name) = {
            let mut metadata = self.metadata.write().expect("tool metadata poisoned");
            let entry = metadata
                .get_mut(tool_id)
                .ok_or_else(|| RegistryError::unknown(tool_id))?;
            entry.set_enabled(enabled);
            (entry.tool_id().clone(), entry.name().to_owned())
        };

        self.write_enabled(&id, enabled).await?;

        self.observer.on_event(&RegistryEvent::EnabledChanged {
            tool_id: id,
            tool_name,
            enabled,
            at: Utc::now(),
        });
        Ok(())
    }

    async fn write_enabled(&self, tool_id: &ToolId, enabled: bool) -> RegistryResult<()> {
        let _writes = self.definition_writes.lock().await;
        if let Some(mut definition) = self.store.find_definition(tool_id).await? {
            definition.set_enabled(enabled);
            self.store.upsert_definition(definition).await?;
        }
        Ok(())
    }

    /// Returns the handle registered under `tool_id`.
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    #[must_use]
    pub fn get(&self, tool_id: &str) -> Option<ToolHandle> {
        self.tools
            .read()
            .expect("tool registry poisoned")
            .get(tool_id)
            .cloned()
    }

    /// Returns `true` when a tool is registered under `tool_id`.
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    #[must_use]
    pub fn is_registered(&self, tool_id: &str) -> bool {
        self.tools
            .read()
            .expect("tool registry poisoned")
            .contains_key(tool_id)
    }

    /// Returns `true` when the tool is registered and accepts new executions.
    ///
    /// # Panics
    ///
    /// Panics if the internal metadata lock is poisoned.
    #[must_use]
    pub fn is_enabled(&self, tool_id: &str) -> bool {
        self.metadata
            .read()
            .expect("tool metadata poisoned")
            .get(tool_id)
            .is_some_and(ToolMetadata::is_enabled)
    }

    /// Returns every registered tool, ordered by id.
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    #[must_use]
    pub fn all(&self) -> Vec<ToolHandle> {
        self.collect(|_, _| true)
    }

    /// Returns tools whose category matches case-insensitively.
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    #[must_use]
    pub fn by_category(&self, category: &str) -> Vec<ToolHandle> {
        if category.is_empty() {
            return Vec::new();
        }
        self.collect(|handle, _| handle.descriptor().category().eq_ignore_ascii_case(category))
    }

    /// Returns tools that currently accept new executions.
    ///
    /// # Panics
    ///
    /// Panics if an internal lock is poisoned.
    #[must_use]
    pub fn enabled(&self) -> Vec<ToolHandle> {
        self.collect(|_, enabled| enabled)
    }

    /// Returns tools matching every filter in `search`.
    ///
    /// # Panics
    ///
    /// Panics if an internal lock is poisoned.
    #[must_use]
    pub fn search(&self, search: &ToolSearch) -> Vec<ToolHandle> {
        self.collect(|handle, enabled| search.matches(handle, enabled))
    }

    fn collect<F>(&self, mut keep: F) -> Vec<ToolHandle>
    where
        F: FnMut(&ToolHandle, bool) -> bool,
    {
        let tools = self.tools.read().expect("tool registry poisoned");
        let metadata = self.metadata.read().expect("tool metadata poisoned");
        let mut selected: Vec<ToolHandle> = tools
            .iter()
            .filter(|(id, handle)| {
                let enabled = metadata.get(*id).is_some_and(ToolMetadata::is_enabled);
                keep(handle, enabled)
            })
            .map(|(_, handle)| handle.clone())
            .collect();
        selected.sort_by(|a, b| a.id().cmp(b.id()));
        selected
    }

    /// Returns the distinct non-empty categories, sorted.
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    #[must_use]
    pub fn categories(&self) -> Vec<String> {
        let tools = self.tools.read().expect("tool registry poisoned");
        tools
            .values()
            .map(|handle| handle.descriptor().category())
            .filter(|category| !category.is_empty())
            .map(ToOwned::to_owned)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Returns the rollup metadata for `tool_id`.
    ///
    /// # Panics
    ///
    /// Panics if the internal metadata lock is poisoned.
    #[must_use]
    pub fn metadata(&self, tool_id: &str) -> Option<ToolMetadata> {
        self.metadata
            .read()
            .expect("tool metadata poisoned")
            .get(tool_id)
            .cloned()
    }

    /// Returns the rollup metadata of every tool, ordered by id.
    ///
    /// # Panics
    ///
    /// Panics if the internal metadata lock is poisoned.
    #[must_use]
    pub fn all_metadata(&self) -> Vec<ToolMetadata> {
        let mut all: Vec<_> = self
            .metadata
            .read()
            .expect("tool metadata poisoned")
            .values()
            .cloned()
            .collect();
        all.sort_by(|a, b| a.tool_id().cmp(b.tool_id()));
        all
    }

    /// Folds one execution outcome into the rollup and the persisted definition.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Store`] when the definition cannot be updated.
    ///
    /// # Panics
    ///
    /// Panics if the internal metadata lock is poisoned.
    pub async fn update_metrics(
        &self,
        tool_id: &ToolId,
        success: bool,
        duration: Duration,
    ) -> RegistryResult<()> {
        let _writes = self.definition_writes.lock().await;
        {
            let mut metadata = self.metadata.write().expect("tool metadata poisoned");
            if let Some(entry) = metadata.get_mut(tool_id) {
                entry.record_execution(success, duration);
            }
        }

        if let Some(mut definition) = self.store.find_definition(tool_id).await? {
            definition.record_execution(success, duration);
            self.store.upsert_definition(definition).await?;
        }
        debug!(tool_id = %tool_id, success, "tool metrics updated");
        Ok(())
    }

    /// Re-derives rollup statistics from persisted definitions.
    ///
    /// Every registered tool is refreshed, enabled or not. Registered handles
    /// are left untouched. Returns how many entries were refreshed.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Store`] if the definitions cannot be listed.
    ///
    /// # Panics
    ///
    /// Panics if the internal metadata lock is poisoned.
    pub async fn refresh(&self) -> RegistryResult<usize> {
        info!("refreshing tool registry");
        let _writes = self.definition_writes.lock().await;
        let definitions = self.store.list_definitions().await?;
        let (total, refreshed) = {
            let mut metadata = self.metadata.write().expect("tool metadata poisoned");
            let mut refreshed = 0;
            for definition in &definitions {
                if let Some(entry) = metadata.get_mut(definition.tool_id()) {
                    entry.apply_definition(definition);
                    refreshed += 1;
                }
            }
            (metadata.len(), refreshed)
        };
        info!(total, refreshed, "tool registry refreshed");
        Ok(refreshed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use serde_json::Value;
    use tool_contract::{
        CancellationToken, HealthStatus, ParamMap, ToolDescriptor, ToolFault,
    };

    use crate::events::CollectingRegistryObserver;

    struct StubTool {
        descriptor: ToolDescriptor,
        healthy: bool,
    }

    impl StubTool {
        fn new(id: &str, category: &str) -> Self {
            Self {
                descriptor: ToolDescriptor::builder(id, format!("{id} tool"))
                    .unwrap()
                    .description(format!("Does {id} things"))
                    .category(category)
                    .build()
                    .unwrap(),
                healthy: true,
            }
        }

        fn unhealthy(mut self) -> Self {
            self.healthy = false;
            self
        }
    }

    #[async_trait]
    impl Tool for StubTool {
        fn descriptor(&self) -> &ToolDescriptor {
            &self.descriptor
        }

        async fn run(&self, _: ParamMap, _: CancellationToken) -> Result<Value, ToolFault> {
            Ok(Value::Null)
        }

        async fn check_health(&self) -> Result<HealthStatus, ToolFault> {
            if self.healthy {
                Ok(HealthStatus::healthy())
            } else {
                Ok(HealthStatus::unhealthy("backend unreachable"))
            }
        }
    }

    #[tokio::test]
    async fn register_lookup_and_events() {
        let observer = CollectingRegistryObserver::new();
        let registry = ToolRegistry::new().with_observer(observer.clone());

        registry
            .register_tool(StubTool::new("echo", "Utility"))
            .await
            .unwrap();
        registry
            .register_tool(StubTool::new("search", "Web"))
            .await
            .unwrap();

        assert!(registry.is_registered("echo"));
        assert!(registry.get("search").is_some());
        assert_eq!(registry.by_category("utility").len(), 1);
        assert_eq!(registry.categories(), vec!["Utility", "Web"]);
        assert_eq!(registry.all()[0].id().as_str(), "echo");

        let metadata = registry.metadata("echo").unwrap();
        assert_eq!(metadata.execution_count(), 0);
        assert!(metadata.is_enabled());

        let events = observer.drain();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], RegistryEvent::Registered { .. }));

        let stored = registry
            .store()
            .find_definition(&ToolId::new("echo").unwrap())
            .await
            .unwrap();
        assert!(stored.is_some());
    }

    #[tokio::test]
    async fn duplicate_and_unhealthy_rejected() {
        let registry = ToolRegistry::new();
        registry
            .register_tool(StubTool::new("echo", "Utility"))
            .await
            .unwrap();

        let err = registry
            .register_tool(StubTool::new("echo", "Utility"))
            .await
            .expect_err("duplicate registration should fail");
        assert!(matches!(err, RegistryError::DuplicateTool { tool_id } if tool_id == "echo"));

        let err = registry
            .register_tool(StubTool::new("flaky", "Utility").unhealthy())
            .await
            .expect_err("unhealthy tool should be rejected");
        assert!(
            matches!(err, RegistryError::UnhealthyTool { ref reason, .. } if reason == "backend unreachable")
        );
        assert!(!registry.is_registered("flaky"));
    }

    #[tokio::test]
    async fn enabled_flag_and_unregister() {
        let observer = CollectingRegistryObserver::new();
        let registry = ToolRegistry::new().with_observer(observer.clone());
        registry
            .register_tool(StubTool::new("echo", "Utility"))
            .await
            .unwrap();
        registry
            .register_tool(StubTool::new("search", "Web"))
            .await
            .unwrap();

        registry.set_enabled("echo", false).await.unwrap();
        assert!(registry.is_registered("echo"));
        assert!(!registry.is_enabled("echo"));
        assert_eq!(registry.enabled().len(), 1);
        assert_eq!(
            registry
                .search(&ToolSearch::new().with_enabled(false))
                .len(),
            1
        );

        registry.unregister("search").await.unwrap();
        assert!(registry.get("search").is_none());
        let definition = registry
            .store()
            .find_definition(&ToolId::new("search").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert!(!definition.is_enabled());

        assert!(matches!(
            registry.unregister("search").await,
            Err(RegistryError::UnknownTool { .. })
        ));

        let events = observer.drain();
        assert!(matches!(
            events[2],
            RegistryEvent::EnabledChanged { enabled: false, .. }
        ));
        assert!(matches!(events[3], RegistryEvent::Unregistered { .. }));
    }

    #[tokio::test]
    async fn search_filters_combine() {
        let registry = ToolRegistry::new();
        registry
            .register_tool(StubTool::new("web-search", "Web"))
            .await
            .unwrap();
        registry
            .register_tool(StubTool::new("file-search", "Files"))
            .await
            .unwrap();

        let hits = registry.search(&ToolSearch::new().with_text("SEARCH"));
        assert_eq!(hits.len(), 2);
        let hits = registry.search(&ToolSearch::new().with_text("search").with_category("web"));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id().as_str(), "web-search");
    }

    #[tokio::test]
    async fn metrics_roll_up_and_refresh() {
        let registry = ToolRegistry::new();
        registry
            .register_tool(StubTool::new("echo", "Utility"))
            .await
            .unwrap();
        let id = ToolId::new("echo").unwrap();

        registry
            .update_metrics(&id, true, Duration::from_millis(10))
            .await
            .unwrap();
        registry
            .update_metrics(&id, false, Duration::from_millis(30))
            .await
            .unwrap();

        let metadata = registry.metadata("echo").unwrap();
        assert_eq!(metadata.execution_count(), 2);
        assert!((metadata.success_rate() - 50.0).abs() < 1e-9);
        assert!((metadata.average_execution_ms() - 20.0).abs() < 1e-6);

        assert_eq!(registry.refresh().await.unwrap(), 1);
        let refreshed = registry.metadata("echo").unwrap();
        assert_eq!(refreshed.execution_count(), 2);
        assert!((refreshed.success_rate() - 50.0).abs() < 1e-9);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_metric_updates_are_not_lost() {
        let registry = Arc::new(ToolRegistry::new());
        registry
            .register_tool(StubTool::new("echo", "Utility"))
            .await
            .unwrap();
        let id = ToolId::new("echo").unwrap();

        let updates: Vec<_> = (0..200)
            .map(|n| {
                let registry = Arc::clone(&registry);
                let id = id.clone();
                tokio::spawn(async move {
                    registry
                        .update_metrics(&id, n % 4 != 0, Duration::from_millis(1))
                        .await
                })
            })
            .collect();
        for update in updates {
            update.await.unwrap().unwrap();
        }

        let persisted = registry.store().find_definition(&id).await.unwrap().unwrap();
        assert_eq!(persisted.execution_count(), 200);
        assert_eq!(persisted.failure_count(), 50);
        assert_eq!(registry.metadata("echo").unwrap().execution_count(), 200);

        registry.refresh().await.unwrap();
        let refreshed = registry.metadata("echo").unwrap();
        assert_eq!(refreshed.execution_count(), 200);
        assert!((refreshed.success_rate() - 75.0).abs() < 1e-9);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn toggling_enabled_keeps_concurrent_rollups() {
        let registry = Arc::new(ToolRegistry::new());
        registry
            .register_tool(StubTool::new("echo", "Utility"))
            .await
            .unwrap();
        let id = ToolId::new("echo").unwrap();

        let toggler = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                for n in 0..50 {
                    registry.set_enabled("echo", n % 2 == 1).await.unwrap();
                }
            })
        };
        let updates: Vec<_> = (0..100)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let id = id.clone();
                tokio::spawn(async move {
                    registry
                        .update_metrics(&id, true, Duration::from_millis(1))
                        .await
                })
            })
            .collect();
        toggler.await.unwrap();
        for update in updates {
            update.await.unwrap().unwrap();
        }

        let persisted = registry.store().find_definition(&id).await.unwrap().unwrap();
        assert_eq!(persisted.execution_count(), 100);
        assert!(persisted.is_enabled());
    }

    #[tokio::test]
    async fn refresh_covers_disabled_tools() {
        let registry = ToolRegistry::new();
        registry
            .register_tool(StubTool::new("echo", "Utility"))
            .await
            .unwrap();
        let id = ToolId::new("echo").unwrap();
        registry.set_enabled("echo", false).await.unwrap();

        let mut definition = registry.store().find_definition(&id).await.unwrap().unwrap();
        definition.record_execution(true, Duration::from_millis(5));
        definition.record_execution(false, Duration::from_millis(15));
        registry.store().upsert_definition(definition).await.unwrap();

        assert_eq!(registry.refresh().await.unwrap(), 1);
        let refreshed = registry.metadata("echo").unwrap();
        assert!(!refreshed.is_enabled());
        assert_eq!(refreshed.execution_count(), 2);
        assert!((refreshed.success_rate() - 50.0).abs() < 1e-9);
    }
}
