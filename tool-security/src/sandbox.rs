//! Execution sandbox handles.
//!
//! A sandbox records the resource limits a tool was granted and tracks its
//! own lifecycle. It performs no process or OS isolation; enforcement is
//! left to a future layer that can consume the declared limits.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::policy::SecurityRequirements;
use crate::{SecurityError, SecurityResult};

/// Lifecycle state of a [`Sandbox`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SandboxState {
    /// Allocated, not yet activated.
    Created,
    /// Accepting work.
    Active,
    /// Disposed or failed; no further work accepted.
    Terminated,
}

/// Snapshot of a sandbox's declared limits and usage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxMetrics {
    /// Time since the sandbox was created.
    pub elapsed: Duration,
    /// Number of actions executed.
    pub executions: u64,
    /// Current state.
    pub state: SandboxState,
    /// Declared limits keyed by resource name.
    pub limits: BTreeMap<String, u64>,
}

/// Handle scoping one tool's execution.
#[derive(Debug)]
pub struct Sandbox {
    id: String,
    tool_id: String,
    state: SandboxState,
    limits: BTreeMap<String, u64>,
    created: Instant,
    executions: u64,
}

impl Sandbox {
    pub(crate) fn new(tool_id: &str, requirements: &SecurityRequirements) -> Self {
        let mut sandbox = Self {
            id: format!("{tool_id}_{}", Uuid::new_v4().simple()),
            tool_id: tool_id.to_owned(),
            state: SandboxState::Created,
            limits: BTreeMap::new(),
            created: Instant::now(),
            executions: 0,
        };
        if requirements.max_memory_bytes > 0 {
            sandbox.set_limit("memory", requirements.max_memory_bytes);
        }
        if requirements.max_execution_time_secs > 0 {
            sandbox.set_limit("execution_time", requirements.max_execution_time_secs);
        }
        sandbox.state = SandboxState::Active;
        sandbox
    }

    /// Declares a resource limit.
    pub fn set_limit(&mut self, resource: impl Into<String>, limit: u64) {
        let resource = resource.into();
        debug!(sandbox_id = %self.id, %resource, limit, "sandbox resource limit set");
        self.limits.insert(resource, limit);
    }

    /// Runs `action` inside the sandbox.
    ///
    /// When the action itself fails the sandbox moves to
    /// [`SandboxState::Terminated`] and the action's error is returned inside
    /// the `Ok` variant.
    ///
    /// # Errors
    ///
    /// Returns [`SecurityError::SandboxDisposed`] if the sandbox is terminated.
    pub async fn execute<F, T, E>(&mut self, action: F) -> SecurityResult<Result<T, E>>
    where
        F: Future<Output = Result<T, E>>,
    {
        if self.state == SandboxState::Terminated {
            return Err(SecurityError::SandboxDisposed {
                sandbox_id: self.id.clone(),
            });
        }

        self.state = SandboxState::Active;
        self.executions += 1;
        debug!(sandbox_id = %self.id, "executing action in sandbox");
        let outcome = action.await;
        if outcome.is_err() {
            warn!(sandbox_id = %self.id, tool_id = %self.tool_id, "sandboxed action failed");
            self.state = SandboxState::Terminated;
        }
        Ok(outcome)
    }

    /// Terminates the sandbox. Idempotent.
    pub fn dispose(&mut self) {
        if self.state != SandboxState::Terminated {
            self.state = SandboxState::Terminated;
            debug!(sandbox_id = %self.id, "sandbox disposed");
        }
    }

    /// Returns the sandbox id, `{tool_id}_{uuid}`.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the tool the sandbox was created for.
    #[must_use]
    pub fn tool_id(&self) -> &str {
        &self.tool_id
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> SandboxState {
        self.state
    }

    /// Returns the declared limits.
    #[must_use]
    pub fn limits(&self) -> &BTreeMap<String, u64> {
        &self.limits
    }

    /// Returns declared limits and elapsed time.
    #[must_use]
    pub fn metrics(&self) -> SandboxMetrics {
        SandboxMetrics {
            elapsed: self.created.elapsed(),
            executions: self.executions,
            state: self.state,
            limits: self.limits.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lifecycle_follows_outcomes() {
        let mut sandbox = Sandbox::new("echo", &SecurityRequirements::default());
        assert!(sandbox.id().starts_with("echo_"));
        assert_eq!(sandbox.id().len(), "echo_".len() + 32);
        assert_eq!(sandbox.state(), SandboxState::Active);
        assert_eq!(sandbox.limits().get("execution_time"), Some(&300));
        assert_eq!(sandbox.limits().get("memory"), Some(&(100 * 1024 * 1024)));

        let ok: Result<u32, String> = sandbox.execute(async { Ok(7) }).await.unwrap();
        assert_eq!(ok, Ok(7));
        assert_eq!(sandbox.state(), SandboxState::Active);

        let failed: Result<u32, String> = sandbox
            .execute(async { Err("boom".to_owned()) })
            .await
            .unwrap();
        assert!(failed.is_err());
        assert_eq!(sandbox.state(), SandboxState::Terminated);

        let err = sandbox
            .execute(async { Ok::<_, String>(1) })
            .await
            .expect_err("terminated sandbox rejects work");
        assert!(matches!(err, SecurityError::SandboxDisposed { .. }));
        assert_eq!(sandbox.metrics().executions, 2);
    }

    #[test]
    fn dispose_terminates() {
        let requirements = SecurityRequirements {
            max_memory_bytes: 0,
            ..SecurityRequirements::default()
        };
        let mut sandbox = Sandbox::new("calc", &requirements);
        assert!(!sandbox.limits().contains_key("memory"));
        sandbox.dispose();
        sandbox.dispose();
        assert_eq!(sandbox.metrics().state, SandboxState::Terminated);
    }
}
