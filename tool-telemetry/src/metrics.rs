//! Execution outcome counters.

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde::Serialize;
use tool_kernel::{ExecutionEvent, ExecutionObserver};
use tool_primitives::ErrorKind;

/// Per-tool execution counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ToolExecutionStats {
    /// Executions started.
    pub started: u64,
    /// Executions that succeeded.
    pub completed: u64,
    /// Executions that failed for any reason.
    pub failed: u64,
    /// Summed duration of finished executions.
    pub total_duration_ms: u64,
}

impl ToolExecutionStats {
    /// Mean duration of finished executions.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average_duration_ms(&self) -> f64 {
        let finished = self.completed + self.failed;
        if finished == 0 {
            0.0
        } else {
            self.total_duration_ms as f64 / finished as f64
        }
    }
}

/// Snapshot of everything a [`MetricsObserver`] has seen.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionMetrics {
    /// Executions started.
    pub started: u64,
    /// Executions that succeeded.
    pub completed: u64,
    /// Executions that failed, excluding cancellations and timeouts.
    pub failed: u64,
    /// Executions cancelled by a caller.
    pub cancelled: u64,
    /// Executions that hit their deadline.
    pub timed_out: u64,
    /// Started but not yet finished.
    pub in_flight: u64,
    /// Failure counts keyed by error code.
    pub failures_by_code: BTreeMap<String, u64>,
    /// Counts keyed by tool id.
    pub by_tool: BTreeMap<String, ToolExecutionStats>,
}

/// Execution observer that aggregates outcome counters.
#[derive(Debug, Default)]
pub struct MetricsObserver {
    metrics: Mutex<ExecutionMetrics>,
}

impl MetricsObserver {
    /// Creates an observer with zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current counters.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex has been poisoned by a previous panic.
    #[must_use]
    pub fn snapshot(&self) -> ExecutionMetrics {
        self.metrics.lock().expect("execution metrics poisoned").clone()
    }
}

impl ExecutionObserver for MetricsObserver {
    fn on_event(&self, event: &ExecutionEvent) {
        let mut metrics = self.metrics.lock().expect("execution metrics poisoned");
        let tool = event.tool_id().to_string();

        match event {
            ExecutionEvent::Started { .. } => {
                metrics.started += 1;
                metrics.in_flight += 1;
                metrics.by_tool.entry(tool).or_default().started += 1;
            }
            ExecutionEvent::Completed { duration, .. } => {
                metrics.completed += 1;
                metrics.in_flight = metrics.in_flight.saturating_sub(1);
                let stats = metrics.by_tool.entry(tool).or_default();
                stats.completed += 1;
                stats.total_duration_ms += millis(*duration);
            }
            ExecutionEvent::Failed { kind, duration, .. } => {
                match kind {
                    ErrorKind::Cancelled => metrics.cancelled += 1,
                    ErrorKind::TimeoutError => metrics.timed_out += 1,
                    _ => metrics.failed += 1,
                }
                metrics.in_flight = metrics.in_flight.saturating_sub(1);
                *metrics
                    .failures_by_code
                    .entry(kind.code().to_owned())
                    .or_default() += 1;
                let stats = metrics.by_tool.entry(tool).or_default();
                stats.failed += 1;
                stats.total_duration_ms += millis(*duration);
            }
        }
    }
}

fn millis(duration: std::time::Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
