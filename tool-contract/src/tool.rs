//! Tool identity, capabilities, health, and the trait tools implement.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tool_primitives::ToolId;

use crate::error::{ContractError, ContractResult};
use crate::fault::ToolFault;
use crate::param::{ParameterSchema, ParameterSpec};
use crate::stream::ChunkEmitter;
use crate::validation::ValidationResult;

/// Raw parameter map supplied by callers.
pub type ParamMap = Map<String, Value>;

const DEFAULT_CATEGORY: &str = "General";
const DEFAULT_VERSION: &str = "1.0.0";

/// Execution features a tool advertises.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Tool can emit incremental chunks.
    pub supports_streaming: bool,
    /// Tool observes the cancellation signal.
    pub supports_cancellation: bool,
    /// Tool requires an authenticated caller.
    pub requires_authentication: bool,
    /// Upper bound on execution time in seconds.
    pub max_execution_time_secs: u64,
    /// Upper bound on serialized input size.
    pub max_input_bytes: u64,
    /// Upper bound on serialized output size.
    pub max_output_bytes: u64,
    /// Output formats the tool can produce.
    pub supported_formats: Vec<String>,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            supports_streaming: false,
            supports_cancellation: true,
            requires_authentication: false,
            max_execution_time_secs: 300,
            max_input_bytes: 10 * 1024 * 1024,
            max_output_bytes: 10 * 1024 * 1024,
            supported_formats: vec!["json".to_owned(), "text".to_owned()],
        }
    }
}

impl Capabilities {
    /// Sets streaming support.
    #[must_use]
    pub fn with_streaming(mut self, supported: bool) -> Self {
        self.supports_streaming = supported;
        self
    }

    /// Sets cancellation support.
    #[must_use]
    pub fn with_cancellation(mut self, supported: bool) -> Self {
        self.supports_cancellation = supported;
        self
    }

    /// Sets the authentication requirement.
    #[must_use]
    pub fn with_authentication(mut self, required: bool) -> Self {
        self.requires_authentication = required;
        self
    }

    /// Sets the maximum execution time.
    #[must_use]
    pub fn with_max_execution_time_secs(mut self, secs: u64) -> Self {
        self.max_execution_time_secs = secs;
        self
    }
}

/// Coarse health classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HealthState {
    /// Fully operational.
    Healthy,
    /// Operational with reduced capability.
    Degraded,
    /// Not usable.
    Unhealthy,
}

/// Result of a tool self-test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    state: HealthState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    checked_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    details: Map<String, Value>,
}

impl HealthStatus {
    fn new(state: HealthState, message: Option<String>) -> Self {
        Self {
            state,
            message,
            checked_at: Utc::now(),
            details: Map::new(),
        }
    }

    /// Returns a healthy status.
    #[must_use]
    pub fn healthy() -> Self {
        Self::new(HealthState::Healthy, None)
    }

    /// Returns a degraded status.
    #[must_use]
    pub fn degraded(message: impl Into<String>) -> Self {
        Self::new(HealthState::Degraded, Some(message.into()))
    }

    /// Returns an unhealthy status.
    #[must_use]
    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::new(HealthState::Unhealthy, Some(message.into()))
    }

    /// Adds a diagnostic detail.
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: Value) -> Self {
        self.details.insert(key.into(), value);
        self
    }

    /// Returns the state.
    #[must_use]
    pub fn state(&self) -> HealthState {
        self.state
    }

    /// Returns the message.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns when the check ran.
    #[must_use]
    pub fn checked_at(&self) -> DateTime<Utc> {
        self.checked_at
    }

    /// Returns diagnostic details.
    #[must_use]
    pub fn details(&self) -> &Map<String, Value> {
        &self.details
    }

    /// Returns `true` unless the tool is unhealthy.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.state != HealthState::Unhealthy
    }
}

/// Identity, schema, and capabilities of a tool.
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    id: ToolId,
    name: String,
    description: String,
    category: String,
    version: String,
    enabled: bool,
    parameters: Vec<ParameterSpec>,
    capabilities: Capabilities,
}

impl ToolDescriptor {
    /// Starts building a descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::Primitive`] when `id` is not a valid tool id.
    pub fn builder(id: &str, name: impl Into<String>) -> ContractResult<ToolDescriptorBuilder> {
        Ok(ToolDescriptorBuilder {
            id: ToolId::new(id)?,
            name: name.into(),
            description: String::new(),
            category: DEFAULT_CATEGORY.to_owned(),
            version: DEFAULT_VERSION.to_owned(),
            enabled: true,
            parameters: Vec::new(),
            capabilities: Capabilities::default(),
        })
    }

    /// Returns the unique identifier.
    #[must_use]
    pub fn id(&self) -> &ToolId {
        &self.id
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

    /// Returns the version string.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns whether the tool starts enabled when registered.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the ordered parameter specs.
    #[must_use]
    pub fn parameters(&self) -> &[ParameterSpec] {
        &self.parameters
    }

    /// Looks up a parameter spec by name.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|spec| spec.name() == name)
    }

    /// Returns the capabilities.
    #[must_use]
    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Exports the ordered parameter schema.
    #[must_use]
    pub fn schema(&self) -> Vec<ParameterSchema> {
        self.parameters.iter().map(ParameterSpec::export).collect()
    }
}

/// Builder for [`ToolDescriptor`].
#[derive(Debug)]
pub struct ToolDescriptorBuilder {
    id: ToolId,
    name: String,
    description: String,
    category: String,
    version: String,
    enabled: bool,
    parameters: Vec<ParameterSpec>,
    capabilities: Capabilities,
}

impl ToolDescriptorBuilder {
    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the category.
    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Sets the version string.
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Sets whether the tool starts enabled.
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Appends a parameter spec.
    #[must_use]
    pub fn parameter(mut self, spec: ParameterSpec) -> Self {
        self.parameters.push(spec);
        self
    }

    /// Replaces the capabilities.
    #[must_use]
    pub fn capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Finalises the descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::InvalidDescriptor`] when the name or version is
    /// blank, [`ContractError::DuplicateParameter`] when two parameters share a
    /// name, and [`ContractError::InvalidParameter`] when a default value does
    /// not satisfy its own spec.
    pub fn build(self) -> ContractResult<ToolDescriptor> {
        if self.name.trim().is_empty() {
            return Err(ContractError::InvalidDescriptor {
                reason: "tool name cannot be empty".into(),
            });
        }
        if self.version.trim().is_empty() {
            return Err(ContractError::InvalidDescriptor {
                reason: "tool version cannot be empty".into(),
            });
        }

        let mut seen = HashSet::new();
        for spec in &self.parameters {
            if !seen.insert(spec.name()) {
                return Err(ContractError::DuplicateParameter {
                    tool_id: self.id.to_string(),
                    name: spec.name().to_owned(),
                });
            }
            if let Some(default) = spec.default_value() {
                spec.check(default)
                    .map_err(|reason| ContractError::InvalidParameter {
                        name: spec.name().to_owned(),
                        reason: format!("default value rejected: {reason}"),
                    })?;
            }
        }

        Ok(ToolDescriptor {
            id: self.id,
            name: self.name,
            description: self.description,
            category: self.category,
            version: self.version,
            enabled: self.enabled,
            parameters: self.parameters,
            capabilities: self.capabilities,
        })
    }
}

/// Capability module executed by the engine.
///
/// Implementations supply a descriptor and their core logic. Parameters passed
/// to [`Tool::run`] have already been validated, defaulted, and converted.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the tool's descriptor.
    fn descriptor(&self) -> &ToolDescriptor;

    /// Tool-specific checks run after the generic parameter validation.
    fn validate_custom(&self, _parameters: &ParamMap) -> ValidationResult {
        ValidationResult::valid()
    }

    /// Runs the tool's core logic.
    async fn run(
        &self,
        parameters: ParamMap,
        cancel: CancellationToken,
    ) -> Result<Value, ToolFault>;

    /// Runs the core logic while emitting incremental chunks.
    ///
    /// Only called for tools advertising streaming support. The default
    /// delegates to [`Tool::run`] without emitting anything.
    async fn run_streaming(
        &self,
        parameters: ParamMap,
        cancel: CancellationToken,
        emitter: ChunkEmitter,
    ) -> Result<Value, ToolFault> {
        let _ = emitter;
        self.run(parameters, cancel).await
    }

    /// Lightweight self-test, e.g. a connectivity check.
    async fn check_health(&self) -> Result<HealthStatus, ToolFault> {
        Ok(HealthStatus::healthy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_applies_defaults() {
        let descriptor = ToolDescriptor::builder("echo", "Echo")
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(descriptor.category(), "General");
        assert_eq!(descriptor.version(), "1.0.0");
        assert!(descriptor.is_enabled());
        assert!(descriptor.capabilities().supports_cancellation);
        assert!(!descriptor.capabilities().supports_streaming);
        assert_eq!(descriptor.capabilities().max_execution_time_secs, 300);
    }

    #[test]
    fn builder_rejects_duplicates_and_bad_defaults() {
        let err = ToolDescriptor::builder("search", "Search")
            .unwrap()
            .parameter(ParameterSpec::string("query").unwrap())
            .parameter(ParameterSpec::string("query").unwrap())
            .build()
            .expect_err("duplicate parameter");
        assert!(matches!(err, ContractError::DuplicateParameter { name, .. } if name == "query"));

        let err = ToolDescriptor::builder("search", "Search")
            .unwrap()
            .parameter(
                ParameterSpec::integer("limit")
                    .unwrap()
                    .with_max_value(10.0)
                    .with_default(json!(50)),
            )
            .build()
            .expect_err("default out of range");
        assert!(matches!(err, ContractError::InvalidParameter { .. }));

        assert!(ToolDescriptor::builder("bad id", "x").is_err());
    }

    #[test]
    fn health_status_helpers() {
        assert!(HealthStatus::healthy().is_usable());
        assert!(HealthStatus::degraded("slow").is_usable());
        let status = HealthStatus::unhealthy("down").with_detail("check", json!("dns"));
        assert!(!status.is_usable());
        assert_eq!(status.message(), Some("down"));
    }
}
