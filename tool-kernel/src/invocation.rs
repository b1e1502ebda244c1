use serde::{Deserialize, Serialize};
use tool_contract::ParamMap;

/// One step of a sequential or parallel batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Tool to run.
    pub tool_id: String,
    /// Raw parameters.
    #[serde(default)]
    pub parameters: ParamMap,
    /// Keep going after this step fails. Only consulted by sequential batches.
    #[serde(default)]
    pub continue_on_error: bool,
}

impl ToolInvocation {
    /// Creates a step that stops a sequential batch on failure.
    #[must_use]
    pub fn new(tool_id: impl Into<String>, parameters: ParamMap) -> Self {
        Self {
            tool_id: tool_id.into(),
            parameters,
            continue_on_error: false,
        }
    }

    /// Sets whether a sequential batch continues after this step fails.
    #[must_use]
    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }
}

/// Outcome of a dry-run check: could the call execute right now?
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionValidation {
    /// `true` when nothing would block the execution.
    pub can_execute: bool,
    /// Blocking problems.
    pub errors: Vec<String>,
    /// Non-blocking parameter risk findings.
    pub security_warnings: Vec<String>,
}
