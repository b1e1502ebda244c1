//! Security violations and their observers.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::scan::{ScanReport, Severity};

/// Record of a blocked or suspicious request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityViolation {
    id: String,
    kind: String,
    tool_id: String,
    user_id: String,
    severity: Severity,
    description: String,
    issue_count: usize,
    detected_at: DateTime<Utc>,
}

impl SecurityViolation {
    pub(crate) fn from_scan(tool_id: &str, user_id: &str, report: &ScanReport) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind: "ParameterValidation".to_owned(),
            tool_id: tool_id.to_owned(),
            user_id: user_id.to_owned(),
            severity: report.max_severity().unwrap_or(Severity::High),
            description: report.describe(),
            issue_count: report.issues().len(),
            detected_at: Utc::now(),
        }
    }

    /// Returns the violation id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the violation kind, e.g. `ParameterValidation`.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Returns the targeted tool.
    #[must_use]
    pub fn tool_id(&self) -> &str {
        &self.tool_id
    }

    /// Returns the caller.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Returns the highest severity among the findings.
    #[must_use]
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Returns the joined finding descriptions.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the number of findings.
    #[must_use]
    pub fn issue_count(&self) -> usize {
        self.issue_count
    }

    /// Returns when the violation was detected.
    #[must_use]
    pub fn detected_at(&self) -> DateTime<Utc> {
        self.detected_at
    }
}

/// Observer notified of every violation.
pub trait ViolationObserver: Send + Sync {
    /// Handles one violation.
    fn on_violation(&self, violation: &SecurityViolation);
}

/// Observer that logs violations at warn level.
#[derive(Debug, Default)]
pub struct TracingViolationObserver;

impl ViolationObserver for TracingViolationObserver {
    fn on_violation(&self, violation: &SecurityViolation) {
        warn!(
            violation_id = violation.id(),
            kind = violation.kind(),
            tool_id = violation.tool_id(),
            user_id = violation.user_id(),
            severity = ?violation.severity(),
            description = violation.description(),
            "security violation detected"
        );
    }
}

/// Fans violations out to several observers.
pub struct CompositeViolationObserver {
    observers: Vec<Arc<dyn ViolationObserver>>,
}

impl CompositeViolationObserver {
    /// Creates a composite from the supplied observers.
    #[must_use]
    pub fn new<I>(observers: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn ViolationObserver>>,
    {
        Self {
            observers: observers.into_iter().collect(),
        }
    }

    /// Adds an observer.
    pub fn push(&mut self, observer: Arc<dyn ViolationObserver>) {
        self.observers.push(observer);
    }
}

impl ViolationObserver for CompositeViolationObserver {
    fn on_violation(&self, violation: &SecurityViolation) {
        for observer in &self.observers {
            observer.on_violation(violation);
        }
    }
}

/// Observer that keeps every violation, for tests.
#[derive(Debug, Default)]
pub struct CollectingViolationObserver {
    violations: Mutex<Vec<SecurityViolation>>,
}

impl CollectingViolationObserver {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Returns and clears the collected violations.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex has been poisoned by a previous panic.
    #[must_use]
    pub fn drain(&self) -> Vec<SecurityViolation> {
        let mut lock = self.violations.lock().expect("violation collector poisoned");
        lock.drain(..).collect()
    }
}

impl ViolationObserver for CollectingViolationObserver {
    fn on_violation(&self, violation: &SecurityViolation) {
        self.violations
            .lock()
            .expect("violation collector poisoned")
            .push(violation.clone());
    }
}
