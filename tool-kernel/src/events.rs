//! Execution lifecycle notifications.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tool_contract::ExecutionResult;
use tool_primitives::{ErrorKind, ExecutionId, ToolId};
use tracing::{info, warn};

/// Lifecycle notification for one execution.
///
/// For a given execution id `Started` is always delivered before `Completed`
/// or `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionEvent {
    /// The tool's core logic is about to run.
    Started {
        /// Execution being started.
        execution_id: ExecutionId,
        /// Tool being run.
        tool_id: ToolId,
        /// Caller.
        user_id: String,
        /// When the execution started.
        at: DateTime<Utc>,
    },
    /// The tool finished successfully.
    Completed {
        /// Finished execution.
        execution_id: ExecutionId,
        /// Tool that ran.
        tool_id: ToolId,
        /// Wall-clock duration.
        duration: Duration,
        /// When the execution finished.
        at: DateTime<Utc>,
    },
    /// The tool failed, was cancelled, or timed out.
    Failed {
        /// Finished execution.
        execution_id: ExecutionId,
        /// Tool that ran.
        tool_id: ToolId,
        /// Failure class.
        kind: ErrorKind,
        /// Failure message.
        message: String,
        /// Wall-clock duration.
        duration: Duration,
        /// When the execution finished.
        at: DateTime<Utc>,
    },
}

impl ExecutionEvent {
    pub(crate) fn started(execution_id: ExecutionId, tool_id: ToolId, user_id: &str) -> Self {
        Self::Started {
            execution_id,
            tool_id,
            user_id: user_id.to_owned(),
            at: Utc::now(),
        }
    }

    pub(crate) fn finished(result: &ExecutionResult) -> Self {
        match result.error() {
            None => Self::Completed {
                execution_id: result.execution_id(),
                tool_id: result.tool_id().clone(),
                duration: result.duration(),
                at: result.completed_at(),
            },
            Some(error) => Self::Failed {
                execution_id: result.execution_id(),
                tool_id: result.tool_id().clone(),
                kind: error.kind(),
                message: error.message().to_owned(),
                duration: result.duration(),
                at: result.completed_at(),
            },
        }
    }

    /// Returns the execution the event refers to.
    #[must_use]
    pub fn execution_id(&self) -> ExecutionId {
        match self {
            Self::Started { execution_id, .. }
            | Self::Completed { execution_id, .. }
            | Self::Failed { execution_id, .. } => *execution_id,
        }
    }

    /// Returns the tool the event refers to.
    #[must_use]
    pub fn tool_id(&self) -> &ToolId {
        match self {
            Self::Started { tool_id, .. }
            | Self::Completed { tool_id, .. }
            | Self::Failed { tool_id, .. } => tool_id,
        }
    }

    /// Returns `true` for `Completed` and `Failed`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Started { .. })
    }
}

/// Observer notified of execution lifecycle events.
pub trait ExecutionObserver: Send + Sync {
    /// Handles one event.
    fn on_event(&self, event: &ExecutionEvent);
}

/// Observer that writes events to the tracing system.
#[derive(Debug, Default)]
pub struct TracingExecutionObserver;

impl ExecutionObserver for TracingExecutionObserver {
    fn on_event(&self, event: &ExecutionEvent) {
        match event {
            ExecutionEvent::Started {
                execution_id,
                tool_id,
                user_id,
                ..
            } => info!(%execution_id, tool_id = %tool_id, user_id, "tool execution started"),
            ExecutionEvent::Completed {
                execution_id,
                tool_id,
                duration,
                ..
            } => info!(
                %execution_id,
                tool_id = %tool_id,
                duration_ms = duration.as_millis(),
                "tool execution completed"
            ),
            ExecutionEvent::Failed {
                execution_id,
                tool_id,
                kind,
                message,
                ..
            } => warn!(
                %execution_id,
                tool_id = %tool_id,
                kind = %kind,
                message,
                "tool execution failed"
            ),
        }
    }
}

/// Fans events out to several observers.
pub struct CompositeExecutionObserver {
    observers: Vec<Arc<dyn ExecutionObserver>>,
}

impl CompositeExecutionObserver {
    /// Creates a composite from the supplied observers.
    #[must_use]
    pub fn new<I>(observers: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn ExecutionObserver>>,
    {
        Self {
            observers: observers.into_iter().collect(),
        }
    }

    /// Adds an observer.
    pub fn push(&mut self, observer: Arc<dyn ExecutionObserver>) {
        self.observers.push(observer);
    }
}

impl ExecutionObserver for CompositeExecutionObserver {
    fn on_event(&self, event: &ExecutionEvent) {
        for observer in &self.observers {
            observer.on_event(event);
        }
    }
}

/// Observer that records every event, for tests.
#[derive(Debug, Default)]
pub struct CollectingExecutionObserver {
    events: Mutex<Vec<ExecutionEvent>>,
}

impl CollectingExecutionObserver {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Returns and clears the recorded events.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex has been poisoned by a previous panic.
    #[must_use]
    pub fn drain(&self) -> Vec<ExecutionEvent> {
        let mut lock = self.events.lock().expect("execution collector poisoned");
        lock.drain(..).collect()
    }
}

impl ExecutionObserver for CollectingExecutionObserver {
    fn on_event(&self, event: &ExecutionEvent) {
        self.events
            .lock()
            .expect("execution collector poisoned")
            .push(event.clone());
    }
}
