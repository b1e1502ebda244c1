//! Execution records and their status state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tool_contract::{ExecutionContext, ExecutionResult, ParamMap};
use tool_primitives::{ExecutionId, ToolId};
use tracing::debug;

use crate::{StoreError, StoreResult};

/// Lifecycle status of a single execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// Record created, tool not yet invoked.
    Pending,
    /// Tool logic is running.
    Running,
    /// Tool returned a successful result.
    Completed,
    /// Tool returned or raised a failure.
    Failed,
    /// Execution was cancelled or timed out.
    Cancelled,
}

impl ExecutionStatus {
    /// Returns `true` once no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Returns `true` when moving to `next` is permitted.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running | Self::Cancelled)
                | (
                    Self::Running,
                    Self::Completed | Self::Failed | Self::Cancelled
                )
        )
    }
}

/// Mutable row tracking one invocation's lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    execution_id: ExecutionId,
    tool_id: ToolId,
    tool_name: String,
    user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    conversation_id: Option<String>,
    input_parameters: String,
    status: ExecutionStatus,
    started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    duration_ms: Option<u64>,
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<String>,
    contains_sensitive_data: bool,
    input_size_bytes: u64,
    output_size_bytes: u64,
}

impl ExecutionRecord {
    /// Creates a pending record for an execution requested through `context`.
    #[must_use]
    pub fn new(
        execution_id: ExecutionId,
        tool_id: ToolId,
        tool_name: impl Into<String>,
        context: &ExecutionContext,
        parameters: &ParamMap,
    ) -> Self {
        let input_parameters = serde_json::to_string(parameters).unwrap_or_default();
        let input_size_bytes = u64::try_from(input_parameters.len()).unwrap_or(u64::MAX);
        Self {
            execution_id,
            tool_id,
            tool_name: tool_name.into(),
            user_id: context.user_id().to_owned(),
            session_id: context.session_id().map(ToOwned::to_owned),
            conversation_id: context.conversation_id().map(ToOwned::to_owned),
            input_parameters,
            status: ExecutionStatus::Pending,
            started_at: Utc::now(),
            completed_at: None,
            duration_ms: None,
            success: false,
            error_code: None,
            error_message: None,
            result: None,
            contains_sensitive_data: false,
            input_size_bytes,
            output_size_bytes: 0,
        }
    }

    fn transition(&mut self, next: ExecutionStatus) -> StoreResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(StoreError::InvalidTransition {
                execution_id: self.execution_id,
                from: self.status,
                to: next,
            });
        }

        debug!(
            execution_id = %self.execution_id,
            from = ?self.status,
            to = ?next,
            "execution status transition"
        );
        self.status = next;
        Ok(())
    }

    /// Moves a pending record to [`ExecutionStatus::Running`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidTransition`] unless the record is pending.
    pub fn start(&mut self) -> StoreResult<()> {
        self.transition(ExecutionStatus::Running)
    }

    /// Records the tool's outcome, moving to `Completed` or `Failed`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidTransition`] unless the record is running.
    pub fn complete(&mut self, result: &ExecutionResult) -> StoreResult<()> {
        let next = if result.is_success() {
            ExecutionStatus::Completed
        } else {
            ExecutionStatus::Failed
        };
        self.transition(next)?;
        self.apply_result(result);
        Ok(())
    }

    /// Records a cancellation outcome.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidTransition`] when the record is already terminal.
    pub fn cancel(&mut self, result: &ExecutionResult) -> StoreResult<()> {
        self.transition(ExecutionStatus::Cancelled)?;
        self.apply_result(result);
        Ok(())
    }

    /// Records a failure that did not produce a tool result.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidTransition`] unless the record is running.
    pub fn fail(&mut self, result: &ExecutionResult) -> StoreResult<()> {
        self.transition(ExecutionStatus::Failed)?;
        self.apply_result(result);
        Ok(())
    }

    fn apply_result(&mut self, result: &ExecutionResult) {
        let completed_at = result.completed_at().max(self.started_at);
        self.completed_at = Some(completed_at);
        self.duration_ms =
            Some(u64::try_from((completed_at - self.started_at).num_milliseconds()).unwrap_or(0));
        self.success = result.is_success();
        self.contains_sensitive_data = result.contains_sensitive_data();
        self.error_code = result.error().map(|error| error.code().to_owned());
        self.error_message = result.error().map(|error| error.message().to_owned());
        self.result = result
            .data()
            .and_then(|data| serde_json::to_string(data).ok());
        self.output_size_bytes = self
            .result
            .as_ref()
            .map_or(0, |text| u64::try_from(text.len()).unwrap_or(u64::MAX));
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

    /// Returns the tool display name.
    #[must_use]
    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    /// Returns the calling user.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Returns the session identifier.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Returns the conversation identifier.
    #[must_use]
    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    /// Returns the serialized input parameters.
    #[must_use]
    pub fn input_parameters(&self) -> &str {
        &self.input_parameters
    }

    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> ExecutionStatus {
        self.status
    }

    /// Returns when the record was created.
    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Returns when the execution reached a terminal state.
    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Returns the duration in milliseconds once terminal.
    #[must_use]
    pub fn duration_ms(&self) -> Option<u64> {
        self.duration_ms
    }

    /// Returns `true` when the execution succeeded.
    #[must_use]
    pub fn success(&self) -> bool {
        self.success
    }

    /// Returns the error code of a failed execution.
    #[must_use]
    pub fn error_code(&self) -> Option<&str> {
        self.error_code.as_deref()
    }

    /// Returns the error message of a failed execution.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Returns the serialized result payload.
    #[must_use]
    pub fn result(&self) -> Option<&str> {
        self.result.as_deref()
    }

    /// Returns `true` when the payload contained sensitive data.
    #[must_use]
    pub fn contains_sensitive_data(&self) -> bool {
        self.contains_sensitive_data
    }

    /// Returns the serialized input size.
    #[must_use]
    pub fn input_size_bytes(&self) -> u64 {
        self.input_size_bytes
    }

    /// Returns the serialized output size.
    #[must_use]
    pub fn output_size_bytes(&self) -> u64 {
        self.output_size_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tool_contract::ExecutionFailure;
    use tool_primitives::ErrorKind;

    fn record() -> ExecutionRecord {
        let params = json!({"query": "rust"}).as_object().cloned().unwrap();
        ExecutionRecord::new(
            ExecutionId::random(),
            ToolId::new("search").unwrap(),
            "Search",
            &ExecutionContext::new("alice").with_session_id("s-1"),
            &params,
        )
    }

    #[test]
    fn pending_to_completed_flow() {
        let mut record = record();
        assert_eq!(record.status(), ExecutionStatus::Pending);
        assert_eq!(record.session_id(), Some("s-1"));
        record.start().unwrap();

        let result = ExecutionResult::success(
            record.execution_id(),
            record.tool_id().clone(),
            json!({"hits": 3}),
            record.started_at(),
        );
        record.complete(&result).unwrap();

        assert_eq!(record.status(), ExecutionStatus::Completed);
        assert!(record.success());
        assert_eq!(record.result(), Some("{\"hits\":3}"));
        assert!(record.completed_at().unwrap() >= record.started_at());
    }

    #[test]
    fn failed_result_marks_failed() {
        let mut record = record();
        record.start().unwrap();
        let result = ExecutionResult::failure(
            record.execution_id(),
            record.tool_id().clone(),
            ExecutionFailure::new(ErrorKind::NetworkError, "down"),
            record.started_at(),
        );
        record.complete(&result).unwrap();
        assert_eq!(record.status(), ExecutionStatus::Failed);
        assert_eq!(record.error_code(), Some("NETWORK_ERROR"));
    }

    #[test]
    fn terminal_states_reject_transitions() {
        let mut record = record();
        record.start().unwrap();
        let result = ExecutionResult::failure(
            record.execution_id(),
            record.tool_id().clone(),
            ExecutionFailure::new(ErrorKind::Cancelled, "cancelled"),
            record.started_at(),
        );
        record.cancel(&result).unwrap();

        let err = record.start().expect_err("terminal record cannot restart");
        assert!(matches!(
            err,
            StoreError::InvalidTransition {
                from: ExecutionStatus::Cancelled,
                to: ExecutionStatus::Running,
                ..
            }
        ));
        assert!(record.complete(&result).is_err());
    }
}
