use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::audit::AuditEntry;
use crate::violation::SecurityViolation;

/// Security statistics over a time window, derived from the audit trail.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecurityMetrics {
    /// Audited execution attempts.
    pub total_executions: usize,
    /// Attempts that succeeded.
    pub successful_executions: usize,
    /// Attempts that failed for any reason.
    pub failed_executions: usize,
    /// Attempts rejected by authorization.
    pub authorization_failures: usize,
    /// Attempts rejected by parameter or security validation.
    pub validation_failures: usize,
    /// Results flagged as containing sensitive data.
    pub sensitive_data_detections: usize,
    /// Violations raised in the window.
    pub violations: usize,
    /// Violation counts keyed by kind.
    pub violations_by_type: BTreeMap<String, usize>,
    /// Attempt counts keyed by tool.
    pub executions_by_tool: BTreeMap<String, usize>,
    /// Mean duration of audited attempts.
    pub average_duration_ms: f64,
}

impl SecurityMetrics {
    pub(crate) fn derive(entries: &[AuditEntry], violations: &[SecurityViolation]) -> Self {
        let mut metrics = Self {
            total_executions: entries.len(),
            violations: violations.len(),
            ..Self::default()
        };

        let mut total_ms: u64 = 0;
        for entry in entries {
            if entry.success() {
                metrics.successful_executions += 1;
            } else {
                metrics.failed_executions += 1;
            }
            if entry.is_authorization_failure() {
                metrics.authorization_failures += 1;
            }
            if entry.is_validation_failure() {
                metrics.validation_failures += 1;
            }
            if entry.contains_sensitive_data() {
                metrics.sensitive_data_detections += 1;
            }
            *metrics
                .executions_by_tool
                .entry(entry.tool_id().to_owned())
                .or_default() += 1;
            total_ms = total_ms.saturating_add(entry.duration_ms());
        }

        for violation in violations {
            *metrics
                .violations_by_type
                .entry(violation.kind().to_owned())
                .or_default() += 1;
        }

        if !entries.is_empty() {
            #[allow(clippy::cast_precision_loss)]
            {
                metrics.average_duration_ms = total_ms as f64 / entries.len() as f64;
            }
        }
        metrics
    }
}
