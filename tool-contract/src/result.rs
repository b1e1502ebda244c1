//! Closed success/error outcome shared by every tool invocation.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tool_primitives::{ErrorKind, ExecutionId, ToolId};

use crate::fault::ToolFault;
use crate::validation::{FieldError, ValidationResult, field_codes};

const SUMMARY_LIMIT: usize = 200;

/// Structured error carried by a failed [`ExecutionResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionFailure {
    code: String,
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    #[serde(rename = "type")]
    kind: ErrorKind,
    #[serde(default)]
    retryable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    retry_after_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    field_errors: Vec<FieldError>,
}

impl ExecutionFailure {
    /// Creates a failure of the supplied kind, using the kind's wire code.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            code: kind.code().to_owned(),
            message: message.into(),
            details: None,
            kind,
            retryable: kind.is_retryable(),
            retry_after_ms: None,
            field_errors: Vec::new(),
        }
    }

    /// Builds the failure reported when parameter validation rejects input.
    #[must_use]
    pub fn from_validation(validation: &ValidationResult) -> Self {
        Self::new(ErrorKind::ValidationError, "Parameter validation failed")
            .with_details(validation.summary())
            .with_field_errors(validation.field_errors().to_vec())
    }

    /// Builds the failure reported for a fault raised by tool logic.
    #[must_use]
    pub fn from_fault(fault: &ToolFault) -> Self {
        match fault {
            ToolFault::Cancelled => {
                Self::new(ErrorKind::TimeoutError, "Tool execution was cancelled")
            }
            ToolFault::InvalidArgument { name, reason } => {
                Self::new(fault.kind(), "Tool execution failed")
                    .with_details(fault.to_string())
                    .with_field_errors(vec![FieldError::new(
                        name.clone(),
                        reason.clone(),
                        field_codes::INVALID_VALUE,
                    )])
            }
            other => {
                let failure =
                    Self::new(other.kind(), "Tool execution failed").with_details(other.to_string());
                match other.retry_after() {
                    Some(delay) => failure.with_retry_after(delay),
                    None => failure,
                }
            }
        }
    }

    /// Overrides the wire code.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    /// Attaches free-form details.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Attaches per-parameter errors.
    #[must_use]
    pub fn with_field_errors(mut self, field_errors: Vec<FieldError>) -> Self {
        self.field_errors = field_errors;
        self
    }

    /// Marks the failure retryable after `delay`.
    #[must_use]
    pub fn with_retry_after(mut self, delay: Duration) -> Self {
        self.retryable = true;
        self.retry_after_ms = Some(u64::try_from(delay.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Returns the wire code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Returns the message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the details.
    #[must_use]
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// Returns the taxonomy kind.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns `true` when a retry may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// Returns the per-parameter errors.
    #[must_use]
    pub fn field_errors(&self) -> &[FieldError] {
        &self.field_errors
    }
}

/// Severity of a [`LogEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Very verbose diagnostics.
    Trace,
    /// Diagnostics.
    Debug,
    /// Normal progress.
    Info,
    /// Something unexpected that did not fail the call.
    Warning,
    /// A failure.
    Error,
}

/// Log line captured during an execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Time the line was recorded.
    pub timestamp: DateTime<Utc>,
    /// Severity.
    pub level: LogLevel,
    /// Message text.
    pub message: String,
    /// Optional category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl LogEntry {
    /// Creates an entry stamped with the current time.
    #[must_use]
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            category: None,
        }
    }

    /// Sets the category.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// Phase timings and size counters for one execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    /// Time spent validating and preparing parameters.
    pub validation_ms: u64,
    /// Time spent inside tool logic.
    pub execution_ms: u64,
    /// Time spent post-processing the result.
    pub result_processing_ms: u64,
    /// Serialized size of the input parameters.
    pub input_bytes: u64,
    /// Serialized size of the output payload.
    pub output_bytes: u64,
    /// Memory used, when a tool reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_bytes: Option<u64>,
    /// CPU usage, when a tool reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_percent: Option<f32>,
    /// Tool-defined counters.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom: BTreeMap<String, f64>,
}

/// Rendering formats for [`ExecutionResult::format`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultFormat {
    /// Plain text payload or error line.
    Text,
    /// Full result as pretty JSON.
    Json,
    /// Markdown block suitable for chat transcripts.
    Markdown,
}

/// Outcome of one tool execution.
///
/// Exactly one of [`data`](Self::data) and [`error`](Self::error) is populated,
/// and `completed_at >= started_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    execution_id: ExecutionId,
    tool_id: ToolId,
    is_success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<ExecutionFailure>,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
    duration_ms: u64,
    #[serde(default)]
    warnings: Vec<String>,
    #[serde(default)]
    metadata: Map<String, Value>,
    #[serde(default)]
    logs: Vec<LogEntry>,
    #[serde(default)]
    performance_metrics: PerformanceMetrics,
    #[serde(default)]
    execution_parameters: Map<String, Value>,
    #[serde(default)]
    contains_sensitive_data: bool,
}

impl ExecutionResult {
    /// Creates a successful result completed now.
    #[must_use]
    pub fn success(
        execution_id: ExecutionId,
        tool_id: ToolId,
        data: Value,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self::finish(execution_id, tool_id, Some(data), None, started_at)
    }

    /// Creates a failed result completed now.
    #[must_use]
    pub fn failure(
        execution_id: ExecutionId,
        tool_id: ToolId,
        error: ExecutionFailure,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self::finish(execution_id, tool_id, None, Some(error), started_at)
    }

    fn finish(
        execution_id: ExecutionId,
        tool_id: ToolId,
        data: Option<Value>,
        error: Option<ExecutionFailure>,
        started_at: DateTime<Utc>,
    ) -> Self {
        let completed_at = Utc::now().max(started_at);
        let duration_ms =
            u64::try_from((completed_at - started_at).num_milliseconds()).unwrap_or_default();
        Self {
            execution_id,
            tool_id,
            is_success: error.is_none(),
            data,
            error,
            started_at,
            completed_at,
            duration_ms,
            warnings: Vec::new(),
            metadata: Map::new(),
            logs: Vec::new(),
            performance_metrics: PerformanceMetrics::default(),
            execution_parameters: Map::new(),
            contains_sensitive_data: false,
        }
    }

    /// Echoes the parameters the execution ran with.
    #[must_use]
    pub fn with_parameters(mut self, parameters: Map<String, Value>) -> Self {
        self.execution_parameters = parameters;
        self
    }

    /// Appends a warning.
    #[must_use]
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    /// Appends several warnings.
    #[must_use]
    pub fn with_warnings<I, S>(mut self, warnings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.warnings.extend(warnings.into_iter().map(Into::into));
        self
    }

    /// Appends a log entry.
    #[must_use]
    pub fn with_log(mut self, entry: LogEntry) -> Self {
        self.logs.push(entry);
        self
    }

    /// Inserts a metadata value.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Replaces the performance metrics.
    #[must_use]
    pub fn with_performance(mut self, metrics: PerformanceMetrics) -> Self {
        self.performance_metrics = metrics;
        self
    }

    /// Sets the sensitive-data flag.
    #[must_use]
    pub fn with_sensitive_data(mut self, contains_sensitive_data: bool) -> Self {
        self.contains_sensitive_data = contains_sensitive_data;
        self
    }

    /// Replaces the payload of a successful result. Failed results are
    /// returned unchanged.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        if self.is_success {
            self.data = Some(data);
        }
        self
    }

    /// Returns the execution identifier.
    #[must_use]
    pub fn execution_id(&self) -> ExecutionId {
        self.execution_id
    }

    /// Returns the tool identifier.
    #[must_use]
    pub fn tool_id(&self) -> &ToolId {
        &self.tool_id
    }

    /// Returns `true` for successful results.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.is_success
    }

    /// Returns the payload of a successful result.
    #[must_use]
    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    /// Returns the error of a failed result.
    #[must_use]
    pub fn error(&self) -> Option<&ExecutionFailure> {
        self.error.as_ref()
    }

    /// Returns the error kind of a failed result.
    #[must_use]
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(ExecutionFailure::kind)
    }

    /// Returns when the execution started.
    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Returns when the execution completed.
    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    /// Returns the wall-clock duration.
    #[must_use]
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// Returns the warnings.
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Returns the metadata.
    #[must_use]
    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Returns the captured log entries.
    #[must_use]
    pub fn logs(&self) -> &[LogEntry] {
        &self.logs
    }

    /// Returns the performance metrics.
    #[must_use]
    pub fn performance(&self) -> &PerformanceMetrics {
        &self.performance_metrics
    }

    /// Returns the echoed execution parameters.
    #[must_use]
    pub fn execution_parameters(&self) -> &Map<String, Value> {
        &self.execution_parameters
    }

    /// Returns `true` when sensitive data was detected in the payload.
    #[must_use]
    pub fn contains_sensitive_data(&self) -> bool {
        self.contains_sensitive_data
    }

    /// Renders the payload as text: strings verbatim, other values as pretty JSON.
    #[must_use]
    pub fn render_data(&self) -> String {
        match &self.data {
            Some(Value::String(text)) => text.clone(),
            Some(other) => serde_json::to_string_pretty(other).unwrap_or_default(),
            None => String::new(),
        }
    }

    /// Returns a short, single-paragraph description of the outcome.
    #[must_use]
    pub fn summary(&self) -> String {
        match &self.error {
            Some(error) => format!("{}: {}", error.code(), error.message()),
            None => {
                let rendered = self.render_data();
                if rendered.chars().count() <= SUMMARY_LIMIT {
                    rendered
                } else {
                    let truncated: String = rendered.chars().take(SUMMARY_LIMIT).collect();
                    format!("{truncated}...")
                }
            }
        }
    }

    /// Renders the result in the requested format.
    #[must_use]
    pub fn format(&self, format: ResultFormat) -> String {
        match (format, &self.error) {
            (ResultFormat::Json, _) => serde_json::to_string_pretty(self).unwrap_or_default(),
            (ResultFormat::Text, None) => self.render_data(),
            (ResultFormat::Text, Some(error)) => {
                format!("Error [{}]: {}", error.code(), error.message())
            }
            (ResultFormat::Markdown, None) => {
                let body = match &self.data {
                    Some(Value::String(text)) => text.clone(),
                    Some(other) => format!(
                        "```json\n{}\n```",
                        serde_json::to_string_pretty(other).unwrap_or_default()
                    ),
                    None => String::new(),
                };
                format!("### {} succeeded\n\n{body}\n", self.tool_id)
            }
            (ResultFormat::Markdown, Some(error)) => {
                let mut out = format!(
                    "### {} failed\n\n**{}**: {}\n",
                    self.tool_id,
                    error.code(),
                    error.message()
                );
                if let Some(details) = error.details() {
                    out.push_str(&format!("\n> {details}\n"));
                }
                out
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool_id() -> ToolId {
        ToolId::new("echo").unwrap()
    }

    #[test]
    fn success_and_failure_are_exclusive() {
        let started = Utc::now();
        let ok = ExecutionResult::success(ExecutionId::random(), tool_id(), json!(1), started);
        assert!(ok.is_success());
        assert!(ok.data().is_some() && ok.error().is_none());
        assert!(ok.completed_at() >= ok.started_at());

        let failed = ExecutionResult::failure(
            ExecutionId::random(),
            tool_id(),
            ExecutionFailure::new(ErrorKind::NetworkError, "down"),
            started,
        );
        assert!(!failed.is_success());
        assert!(failed.data().is_none());
        assert_eq!(failed.error_kind(), Some(ErrorKind::NetworkError));
        assert!(failed.error().unwrap().is_retryable());
        assert_eq!(failed.clone().with_data(json!("x")).data(), None);
    }

    #[test]
    fn fault_conversion_preserves_field() {
        let failure = ExecutionFailure::from_fault(&ToolFault::invalid_argument("url", "bad"));
        assert_eq!(failure.kind(), ErrorKind::ValidationError);
        assert_eq!(failure.field_errors()[0].parameter(), "url");

        let cancelled = ExecutionFailure::from_fault(&ToolFault::Cancelled);
        assert_eq!(cancelled.kind(), ErrorKind::TimeoutError);
        assert_eq!(cancelled.message(), "Tool execution was cancelled");
    }

    #[test]
    fn summary_truncates_long_payloads() {
        let long = "x".repeat(500);
        let result =
            ExecutionResult::success(ExecutionId::random(), tool_id(), json!(long), Utc::now());
        let summary = result.summary();
        assert_eq!(summary.chars().count(), SUMMARY_LIMIT + 3);
        assert!(summary.ends_with("..."));
    }

    #[test]
    fn formats_render() {
        let result = ExecutionResult::success(
            ExecutionId::random(),
            tool_id(),
            json!({"answer": 42}),
            Utc::now(),
        );
        assert!(result.format(ResultFormat::Markdown).contains("```json"));
        let as_json: Value = serde_json::from_str(&result.format(ResultFormat::Json)).unwrap();
        assert_eq!(as_json["isSuccess"], json!(true));
        assert_eq!(as_json["toolId"], json!("echo"));

        let failed = ExecutionResult::failure(
            ExecutionId::random(),
            tool_id(),
            ExecutionFailure::new(ErrorKind::ValidationError, "bad input"),
            Utc::now(),
        );
        assert_eq!(
            failed.format(ResultFormat::Text),
            "Error [VALIDATION_ERROR]: bad input"
        );
        let as_json: Value = serde_json::from_str(&failed.format(ResultFormat::Json)).unwrap();
        assert_eq!(as_json["error"]["type"], json!("ValidationError"));
    }
}
