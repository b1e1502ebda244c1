//! Persisted tool definitions with rolled-up execution statistics.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tool_contract::ToolDescriptor;
use tool_primitives::ToolId;

/// Stored description of a registered tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    tool_id: ToolId,
    name: String,
    description: String,
    category: String,
    version: String,
    enabled: bool,
    parameters_schema: Value,
    capabilities: Value,
    max_execution_time_secs: u64,
    execution_count: u64,
    success_count: u64,
    failure_count: u64,
    average_execution_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_executed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ToolDefinition {
    /// Captures a descriptor as a fresh definition with zeroed statistics.
    #[must_use]
    pub fn from_descriptor(descriptor: &ToolDescriptor) -> Self {
        let now = Utc::now();
        Self {
            tool_id: descriptor.id().clone(),
            name: descriptor.name().to_owned(),
            description: descriptor.description().to_owned(),
            category: descriptor.category().to_owned(),
            version: descriptor.version().to_owned(),
            enabled: descriptor.is_enabled(),
            parameters_schema: serde_json::to_value(descriptor.schema()).unwrap_or_default(),
            capabilities: serde_json::to_value(descriptor.capabilities()).unwrap_or_default(),
            max_execution_time_secs: descriptor.capabilities().max_execution_time_secs,
            execution_count: 0,
            success_count: 0,
            failure_count: 0,
            average_execution_ms: 0.0,
            last_executed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Refreshes descriptive fields from `descriptor`, keeping statistics.
    pub fn refresh_from(&mut self, descriptor: &ToolDescriptor) {
        let fresh = Self::from_descriptor(descriptor);
        self.name = fresh.name;
        self.description = fresh.description;
        self.category = fresh.category;
        self.version = fresh.version;
        self.enabled = fresh.enabled;
        self.parameters_schema = fresh.parameters_schema;
        self.capabilities = fresh.capabilities;
        self.max_execution_time_secs = fresh.max_execution_time_secs;
        self.updated_at = Utc::now();
    }

    /// Folds one execution outcome into the running statistics.
    pub fn record_execution(&mut self, success: bool, duration: Duration) {
        let previous = self.execution_count;
        self.execution_count += 1;
        if success {
            self.success_count += 1;
        } else {
            self.failure_count += 1;
        }

        #[allow(clippy::cast_precision_loss)]
        {
            let sample = duration.as_secs_f64() * 1000.0;
            self.average_execution_ms = (self.average_execution_ms * previous as f64 + sample)
                / self.execution_count as f64;
        }

        let now = Utc::now();
        self.last_executed_at = Some(now);
        self.updated_at = now;
    }

    /// Marks the definition enabled or disabled.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.updated_at = Utc::now();
    }

    /// Returns the percentage of successful executions, or `0.0` before any run.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.execution_count == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            self.success_count as f64 / self.execution_count as f64 * 100.0
        }
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

    /// Returns whether the tool may be executed.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the exported parameter schema.
    #[must_use]
    pub fn parameters_schema(&self) -> &Value {
        &self.parameters_schema
    }

    /// Returns the serialized capabilities.
    #[must_use]
    pub fn capabilities(&self) -> &Value {
        &self.capabilities
    }

    /// Returns the execution ceiling in seconds.
    #[must_use]
    pub fn max_execution_time_secs(&self) -> u64 {
        self.max_execution_time_secs
    }

    /// Returns the number of recorded executions.
    #[must_use]
    pub fn execution_count(&self) -> u64 {
        self.execution_count
    }

    /// Returns the number of successful executions.
    #[must_use]
    pub fn success_count(&self) -> u64 {
        self.success_count
    }

    /// Returns the number of failed executions.
    #[must_use]
    pub fn failure_count(&self) -> u64 {
        self.failure_count
    }

    /// Returns the mean execution time in milliseconds.
    #[must_use]
    pub fn average_execution_ms(&self) -> f64 {
        self.average_execution_ms
    }

    /// Returns when the tool last ran.
    #[must_use]
    pub fn last_executed_at(&self) -> Option<DateTime<Utc>> {
        self.last_executed_at
    }

    /// Returns when the definition was first stored.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the definition last changed.
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
