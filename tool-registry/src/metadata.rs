use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tool_contract::ToolDescriptor;
use tool_primitives::ToolId;
use tool_store::ToolDefinition;

/// Rollup of a registered tool's identity and execution statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolMetadata {
    tool_id: ToolId,
    name: String,
    description: String,
    category: String,
    version: String,
    enabled: bool,
    registered_at: DateTime<Utc>,
    execution_count: u64,
    success_count: u64,
    average_execution_ms: f64,
    success_rate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_executed_at: Option<DateTime<Utc>>,
}

impl ToolMetadata {
    pub(crate) fn seed(descriptor: &ToolDescriptor) -> Self {
        Self {
            tool_id: descriptor.id().clone(),
            name: descriptor.name().to_owned(),
            description: descriptor.description().to_owned(),
            category: descriptor.category().to_owned(),
            version: descriptor.version().to_owned(),
            enabled: descriptor.is_enabled(),
            registered_at: Utc::now(),
            execution_count: 0,
            success_count: 0,
            average_execution_ms: 0.0,
            success_rate: 0.0,
            last_executed_at: None,
        }
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub(crate) fn apply_definition(&mut self, definition: &ToolDefinition) {
        self.execution_count = definition.execution_count();
        self.success_count = definition.success_count();
        self.average_execution_ms = definition.average_execution_ms();
        self.success_rate = definition.success_rate();
        self.last_executed_at = definition.last_executed_at();
    }

    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn record_execution(&mut self, success: bool, duration: Duration) {
        let previous = self.execution_count as f64;
        self.execution_count += 1;
        if success {
            self.success_count += 1;
        }
        let count = self.execution_count as f64;
        self.average_execution_ms =
            (self.average_execution_ms * previous + duration.as_secs_f64() * 1000.0) / count;
        self.success_rate = self.success_count as f64 / count * 100.0;
        self.last_executed_at = Some(Utc::now());
    }

    /// Returns the tool identifier.
    #[must_use]
    pub fn tool_id(&self) -> &ToolId {
        &self.tool_id
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the category.
    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Returns the version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns whether new executions are accepted.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns when the tool was registered.
    #[must_use]
    pub fn registered_at(&self) -> DateTime<Utc> {
        self.registered_at
    }

    /// Returns the number of recorded executions.
    #[must_use]
    pub fn execution_count(&self) -> u64 {
        self.execution_count
    }

    /// Returns the mean execution time in milliseconds.
    #[must_use]
    pub fn average_execution_ms(&self) -> f64 {
        self.average_execution_ms
    }

    /// Returns the success percentage in `[0, 100]`.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        self.success_rate
    }

    /// Returns when the tool last ran.
    #[must_use]
    pub fn last_executed_at(&self) -> Option<DateTime<Utc>> {
        self.last_executed_at
    }
}
