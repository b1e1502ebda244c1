//! Shared handle that wraps tool logic in the validation/execution template.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tool_primitives::{ErrorKind, ExecutionId, ToolId};
use tracing::{debug, warn};

use crate::fault::ToolFault;
use crate::result::{ExecutionFailure, ExecutionResult, PerformanceMetrics};
use crate::stream::ChunkEmitter;
use crate::tool::{HealthStatus, ParamMap, Tool, ToolDescriptor};
use crate::validation::{ValidationResult, field_codes};

/// Cloneable handle to a tool implementation.
///
/// All engine access to a tool goes through this type so that validation,
/// defaulting, conversion, cancellation checks, and fault wrapping cannot be
/// bypassed by an implementation.
#[derive(Clone)]
pub struct ToolHandle {
    tool: Arc<dyn Tool>,
}

impl fmt::Debug for ToolHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let descriptor = self.descriptor();
        f.debug_struct("ToolHandle")
            .field("id", descriptor.id())
            .field("version", &descriptor.version())
            .finish_non_exhaustive()
    }
}

impl ToolHandle {
    /// Wraps a tool implementation.
    #[must_use]
    pub fn new<T>(tool: T) -> Self
    where
        T: Tool + 'static,
    {
        Self {
            tool: Arc::new(tool),
        }
    }

    /// Wraps an already shared tool implementation.
    #[must_use]
    pub fn from_arc(tool: Arc<dyn Tool>) -> Self {
        Self { tool }
    }

    /// Returns the tool's descriptor.
    #[must_use]
    pub fn descriptor(&self) -> &ToolDescriptor {
        self.tool.descriptor()
    }

    /// Returns the tool identifier.
    #[must_use]
    pub fn id(&self) -> &ToolId {
        self.descriptor().id()
    }

    /// Validates `parameters` against the declared specs and the tool's own
    /// rules. Unknown keys are logged but not rejected.
    #[must_use]
    pub fn validate(&self, parameters: &ParamMap) -> ValidationResult {
        let descriptor = self.descriptor();
        let mut result = ValidationResult::valid();

        for spec in descriptor.parameters() {
            match parameters.get(spec.name()) {
                None | Some(Value::Null) => {
                    if spec.is_required() {
                        result.add_field_error(
                            spec.name(),
                            "Required parameter is missing",
                            field_codes::REQUIRED,
                        );
                    }
                }
                Some(Value::String(text)) if spec.is_required() && text.trim().is_empty() => {
                    result.add_field_error(
                        spec.name(),
                        "Required parameter is missing",
                        field_codes::REQUIRED,
                    );
                }
                Some(value) => match spec.convert(value) {
                    Err(message) => {
                        result.add_field_error(spec.name(), message, field_codes::INVALID_TYPE);
                    }
                    Ok(converted) => {
                        if let Err(message) = spec.facets().check(&converted) {
                            result.add_field_error(
                                spec.name(),
                                message,
                                field_codes::INVALID_VALUE,
                            );
                        }
                    }
                },
            }
        }

        for key in parameters.keys() {
            if descriptor.parameter(key).is_none() {
                warn!(tool_id = %descriptor.id(), parameter = %key, "unknown parameter supplied");
            }
        }

        result.merge(self.tool.validate_custom(parameters));
        result
    }

    /// Fills defaults for omitted parameters and converts every declared
    /// parameter to its type. Undeclared keys pass through unchanged.
    ///
    /// # Errors
    ///
    /// Returns the conversion failures as a [`ValidationResult`].
    pub fn prepare(&self, mut parameters: ParamMap) -> Result<ParamMap, ValidationResult> {
        let mut errors = ValidationResult::valid();

        for spec in self.descriptor().parameters() {
            let raw = match parameters.get(spec.name()).filter(|value| !value.is_null()) {
                Some(value) => value.clone(),
                None => match spec.default_value() {
                    Some(default) => default.clone(),
                    None => continue,
                },
            };

            match spec.convert(&raw) {
                Ok(converted) => {
                    parameters.insert(spec.name().to_owned(), converted);
                }
                Err(message) => {
                    errors.add_field_error(spec.name(), message, field_codes::INVALID_TYPE);
                }
            }
        }

        if errors.is_valid() {
            Ok(parameters)
        } else {
            Err(errors)
        }
    }

    /// Runs the tool: validate, prepare, check cancellation, run, wrap.
    ///
    /// Never fails; every outcome, including panics inside the tool, is
    /// reported through the returned [`ExecutionResult`].
    pub async fn execute(
        &self,
        execution_id: ExecutionId,
        parameters: ParamMap,
        cancel: CancellationToken,
    ) -> ExecutionResult {
        self.run_template(execution_id, parameters, cancel, None)
            .await
    }

    /// Same as [`Self::execute`], handing `emitter` to the tool's streaming entry point.
    pub async fn execute_streaming(
        &self,
        execution_id: ExecutionId,
        parameters: ParamMap,
        cancel: CancellationToken,
        emitter: ChunkEmitter,
    ) -> ExecutionResult {
        self.run_template(execution_id, parameters, cancel, Some(emitter))
            .await
    }

    async fn run_template(
        &self,
        execution_id: ExecutionId,
        parameters: ParamMap,
        cancel: CancellationToken,
        emitter: Option<ChunkEmitter>,
    ) -> ExecutionResult {
        let started_at = Utc::now();
        let clock = Instant::now();
        let tool_id = self.id().clone();
        let echoed = parameters.clone();
        let mut metrics = PerformanceMetrics {
            input_bytes: byte_len(&parameters),
            ..PerformanceMetrics::default()
        };

        let validation = self.validate(&parameters);
        let prepared = if validation.is_valid() {
            self.prepare(parameters)
        } else {
            Err(validation)
        };
        metrics.validation_ms = elapsed_ms(clock);

        let prepared = match prepared {
            Ok(prepared) => prepared,
            Err(validation) => {
                debug!(
                    tool_id = %tool_id,
                    %execution_id,
                    errors = %validation.summary(),
                    "parameter validation failed"
                );
                return ExecutionResult::failure(
                    execution_id,
                    tool_id,
                    ExecutionFailure::from_validation(&validation),
                    started_at,
                )
                .with_parameters(echoed)
                .with_performance(metrics);
            }
        };

        if cancel.is_cancelled() {
            debug!(tool_id = %tool_id, %execution_id, "cancelled before tool logic started");
            return ExecutionResult::failure(
                execution_id,
                tool_id,
                ExecutionFailure::from_fault(&ToolFault::Cancelled),
                started_at,
            )
            .with_parameters(echoed)
            .with_performance(metrics);
        }

        let run_clock = Instant::now();
        let future = match emitter {
            Some(emitter) => self.tool.run_streaming(prepared, cancel, emitter),
            None => self.tool.run(prepared, cancel),
        };
        let outcome = AssertUnwindSafe(future).catch_unwind().await;
        metrics.execution_ms = elapsed_ms(run_clock);

        let result = match outcome {
            Ok(Ok(data)) => {
                metrics.output_bytes = byte_len(&data);
                ExecutionResult::success(execution_id, tool_id, data, started_at)
            }
            Ok(Err(fault)) => {
                if matches!(fault, ToolFault::Cancelled) {
                    debug!(tool_id = %tool_id, %execution_id, "tool observed cancellation");
                } else {
                    warn!(tool_id = %tool_id, %execution_id, error = %fault, "tool execution failed");
                }
                ExecutionResult::failure(
                    execution_id,
                    tool_id,
                    ExecutionFailure::from_fault(&fault),
                    started_at,
                )
            }
            Err(_) => {
                warn!(tool_id = %tool_id, %execution_id, "tool panicked during execution");
                ExecutionResult::failure(
                    execution_id,
                    tool_id,
                    ExecutionFailure::new(ErrorKind::InternalError, "Tool execution failed")
                        .with_details("tool panicked during execution"),
                    started_at,
                )
            }
        };

        result.with_parameters(echoed).with_performance(metrics)
    }

    /// Runs the tool's self-test. Failures and panics become
    /// [`HealthState::Unhealthy`](crate::HealthState::Unhealthy).
    pub async fn health_status(&self) -> HealthStatus {
        match AssertUnwindSafe(self.tool.check_health())
            .catch_unwind()
            .await
        {
            Ok(Ok(status)) => status,
            Ok(Err(fault)) => HealthStatus::unhealthy(format!("Health check failed: {fault}")),
            Err(_) => HealthStatus::unhealthy("Health check failed: health check panicked"),
        }
    }
}

fn byte_len<T: Serialize>(value: &T) -> u64 {
    serde_json::to_vec(value).map_or(0, |bytes| u64::try_from(bytes.len()).unwrap_or(u64::MAX))
}

fn elapsed_ms(clock: Instant) -> u64 {
    u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;

    use crate::{HealthState, ParameterSpec};

    struct SearchTool {
        descriptor: ToolDescriptor,
        runs: AtomicUsize,
        fault: Option<fn() -> ToolFault>,
    }

    impl SearchTool {
        fn new() -> Self {
            let descriptor = ToolDescriptor::builder("search", "Search")
                .unwrap()
                .parameter(ParameterSpec::string("query").unwrap().required())
                .parameter(
                    ParameterSpec::integer("limit")
                        .unwrap()
                        .with_default(json!(5))
                        .with_max_value(50.0),
                )
                .build()
                .unwrap();
            Self {
                descriptor,
                runs: AtomicUsize::new(0),
                fault: None,
            }
        }

        fn failing(fault: fn() -> ToolFault) -> Self {
            Self {
                fault: Some(fault),
                ..Self::new()
            }
        }
    }

    #[async_trait]
    impl Tool for SearchTool {
        fn descriptor(&self) -> &ToolDescriptor {
            &self.descriptor
        }

        async fn run(
            &self,
            parameters: ParamMap,
            _cancel: CancellationToken,
        ) -> Result<Value, ToolFault> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if let Some(fault) = self.fault {
                return Err(fault());
            }
            Ok(Value::Object(parameters))
        }

        async fn check_health(&self) -> Result<HealthStatus, ToolFault> {
            Err(ToolFault::network("dns lookup failed"))
        }
    }

    fn params(value: Value) -> ParamMap {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn validate_is_pure_and_reports_fields() {
        let handle = ToolHandle::new(SearchTool::new());
        let input = params(json!({"limit": "abc", "extra": true}));

        let first = handle.validate(&input);
        let second = handle.validate(&input);
        assert_eq!(first, second);

        let query: Vec<_> = first.errors_for("query").collect();
        assert_eq!(query[0].code(), field_codes::REQUIRED);
        let limit: Vec<_> = first.errors_for("limit").collect();
        assert_eq!(limit[0].code(), field_codes::INVALID_TYPE);
        assert!(first.errors_for("extra").next().is_none());

        let blank = handle.validate(&params(json!({"query": "   "})));
        assert!(!blank.is_valid());
    }

    #[tokio::test]
    async fn execute_applies_defaults_and_conversion() {
        let handle = ToolHandle::new(SearchTool::new());
        let result = handle
            .execute(
                ExecutionId::random(),
                params(json!({"query": "rust", "extra": 1})),
                CancellationToken::new(),
            )
            .await;

        assert!(result.is_success());
        let data = result.data().unwrap();
        assert_eq!(data["limit"], json!(5));
        assert_eq!(data["extra"], json!(1));
        assert_eq!(result.execution_parameters().get("limit"), None);
        assert!(result.performance().input_bytes > 0);
    }

    #[tokio::test]
    async fn invalid_input_never_reaches_tool_logic() {
        let tool = Arc::new(SearchTool::new());
        let handle = ToolHandle::from_arc(tool.clone());
        let result = handle
            .execute(ExecutionId::random(), ParamMap::new(), CancellationToken::new())
            .await;

        assert!(!result.is_success());
        let error = result.error().unwrap();
        assert_eq!(error.kind(), ErrorKind::ValidationError);
        assert_eq!(error.message(), "Parameter validation failed");
        assert_eq!(error.details(), Some("Required parameter 'query' is missing"));
        assert_eq!(error.field_errors()[0].parameter(), "query");
        assert_eq!(tool.runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits() {
        let tool = Arc::new(SearchTool::new());
        let handle = ToolHandle::from_arc(tool.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = handle
            .execute(ExecutionId::random(), params(json!({"query": "q"})), cancel)
            .await;
        assert_eq!(result.error_kind(), Some(ErrorKind::TimeoutError));
        assert_eq!(tool.runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn faults_become_structured_errors() {
        let handle = ToolHandle::new(SearchTool::failing(|| ToolFault::network("reset")));
        let result = handle
            .execute(ExecutionId::random(), params(json!({"query": "q"})), CancellationToken::new())
            .await;
        let error = result.error().unwrap();
        assert_eq!(error.kind(), ErrorKind::NetworkError);
        assert_eq!(error.message(), "Tool execution failed");
        assert!(error.is_retryable());

        let handle = ToolHandle::new(SearchTool::failing(|| ToolFault::internal("boom")));
        let result = handle
            .execute(ExecutionId::random(), params(json!({"query": "q"})), CancellationToken::new())
            .await;
        assert_eq!(result.error_kind(), Some(ErrorKind::InternalError));
        assert_eq!(result.error().unwrap().details(), Some("boom"));
    }

    #[tokio::test]
    async fn failing_health_check_reports_unhealthy() {
        let handle = ToolHandle::new(SearchTool::new());
        let status = handle.health_status().await;
        assert_eq!(status.state(), HealthState::Unhealthy);
        assert_eq!(
            status.message(),
            Some("Health check failed: network failure: dns lookup failed")
        );
    }
}
