//! Security service gating tool executions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use tool_contract::{ExecutionContext, ExecutionResult, ParamMap};
use tracing::{debug, info, warn};

use crate::audit::{AuditEntry, AuditLog, MemoryAuditLog};
use crate::metrics::SecurityMetrics;
use crate::policy::{AuthorizationDecision, SecurityPolicy, SecurityRequirements};
use crate::sandbox::Sandbox;
use crate::scan::{ScanReport, scan_parameters};
use crate::sensitive::{self, SanitizationRules, SensitiveDataReport};
use crate::violation::{SecurityViolation, TracingViolationObserver, ViolationObserver};
use crate::SecurityResult;

/// Authorization, risk scanning, redaction, sandboxing, and audit.
pub struct SecurityService {
    policies: RwLock<HashMap<String, SecurityPolicy>>,
    default_policy_for_unknown: bool,
    audit_log: Arc<dyn AuditLog>,
    observer: Arc<dyn ViolationObserver>,
    violations: Mutex<Vec<SecurityViolation>>,
}

impl Default for SecurityService {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SecurityService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let policies = self.policies.read().expect("security policies poisoned");
        f.debug_struct("SecurityService")
            .field("policies", &policies.len())
            .field("default_policy_for_unknown", &self.default_policy_for_unknown)
            .finish_non_exhaustive()
    }
}

impl SecurityService {
    /// Creates a service with an in-memory audit log and tracing observer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            policies: RwLock::new(HashMap::new()),
            default_policy_for_unknown: true,
            audit_log: Arc::new(MemoryAuditLog::new()),
            observer: Arc::new(TracingViolationObserver),
            violations: Mutex::new(Vec::new()),
        }
    }

    /// Replaces the audit backend.
    #[must_use]
    pub fn with_audit_log(mut self, audit_log: Arc<dyn AuditLog>) -> Self {
        self.audit_log = audit_log;
        self
    }

    /// Replaces the violation observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ViolationObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Controls whether tools without an explicit policy fall back to
    /// [`SecurityPolicy::default_for`].
    #[must_use]
    pub fn with_default_policy(mut self, enabled: bool) -> Self {
        self.default_policy_for_unknown = enabled;
        self
    }

    /// Installs or replaces the policy for `policy.tool_id()`.
    ///
    /// # Panics
    ///
    /// Panics if the internal policy lock is poisoned.
    pub fn set_policy(&self, policy: SecurityPolicy) {
        info!(tool_id = policy.tool_id(), "security policy updated");
        self.policies
            .write()
            .expect("security policies poisoned")
            .insert(policy.tool_id().to_owned(), policy);
    }

    /// Returns the explicit policy for `tool_id`.
    ///
    /// # Panics
    ///
    /// Panics if the internal policy lock is poisoned.
    #[must_use]
    pub fn policy(&self, tool_id: &str) -> Option<SecurityPolicy> {
        self.policies
            .read()
            .expect("security policies poisoned")
            .get(tool_id)
            .cloned()
    }

    /// Removes and returns the explicit policy for `tool_id`.
    ///
    /// # Panics
    ///
    /// Panics if the internal policy lock is poisoned.
    pub fn remove_policy(&self, tool_id: &str) -> Option<SecurityPolicy> {
        self.policies
            .write()
            .expect("security policies poisoned")
            .remove(tool_id)
    }

    /// Returns the explicit policy, or the default one when enabled.
    ///
    /// # Panics
    ///
    /// Panics if the internal policy lock is poisoned.
    #[must_use]
    pub fn effective_policy(&self, tool_id: &str) -> Option<SecurityPolicy> {
        self.policy(tool_id).or_else(|| {
            self.default_policy_for_unknown
                .then(|| SecurityPolicy::default_for(tool_id))
        })
    }

    /// Decides whether `user_id` may execute `tool_id`.
    ///
    /// Checks run in order: caller present, block-list, allow-list, roles,
    /// permissions. MFA and rate limits are logged only.
    ///
    /// # Panics
    ///
    /// Panics if the internal policy lock is poisoned.
    #[must_use]
    pub fn authorize(
        &self,
        user_id: &str,
        tool_id: &str,
        context: &ExecutionContext,
    ) -> AuthorizationDecision {
        if user_id.trim().is_empty() {
            return AuthorizationDecision::deny("User ID is required for tool execution");
        }

        let Some(policy) = self.effective_policy(tool_id) else {
            debug!(tool_id, "no security policy; allowing");
            return AuthorizationDecision::allow();
        };

        if policy.blocked_users().contains(user_id) {
            return AuthorizationDecision::deny("User is blocked from using this tool");
        }

        if !policy.allowed_users().is_empty() && !policy.allowed_users().contains(user_id) {
            return AuthorizationDecision::deny("User is not authorized to use this tool");
        }

        let missing_roles: Vec<String> = policy
            .required_roles()
            .difference(context.roles())
            .cloned()
            .collect();
        if !missing_roles.is_empty() {
            return AuthorizationDecision::deny_missing("User lacks required roles", missing_roles);
        }

        let missing_permissions: Vec<String> = policy
            .required_permissions()
            .difference(context.permissions())
            .cloned()
            .collect();
        if !missing_permissions.is_empty() {
            return AuthorizationDecision::deny_missing(
                "User lacks required permissions",
                missing_permissions,
            );
        }

        if policy.requires_mfa() {
            warn!(tool_id, "MFA is declared for tool but not enforced");
        }
        if policy.rate_limit_per_minute() > 0 || policy.rate_limit_per_hour() > 0 {
            debug!(
                tool_id,
                per_minute = policy.rate_limit_per_minute(),
                per_hour = policy.rate_limit_per_hour(),
                "rate limits declared for tool but not enforced"
            );
        }

        AuthorizationDecision::allow()
    }

    /// Scans parameter values and raises a violation when the set is not secure.
    ///
    /// # Panics
    ///
    /// Panics if the internal violation lock is poisoned.
    pub fn validate_parameters(
        &self,
        tool_id: &str,
        user_id: &str,
        parameters: &ParamMap,
    ) -> ScanReport {
        let report = scan_parameters(parameters);
        if !report.is_secure() {
            let violation = SecurityViolation::from_scan(tool_id, user_id, &report);
            self.observer.on_violation(&violation);
            self.violations
                .lock()
                .expect("security violations poisoned")
                .push(violation);
        }
        report
    }

    /// Scans a result payload for personal data and credentials.
    #[must_use]
    pub fn detect_sensitive_data(&self, result: &ExecutionResult) -> SensitiveDataReport {
        sensitive::detect_sensitive_data(result)
    }

    /// Returns a masked copy of `result`.
    ///
    /// # Errors
    ///
    /// Returns [`SecurityError::InvalidPattern`](crate::SecurityError::InvalidPattern)
    /// when a mask pattern does not compile.
    pub fn sanitize(
        &self,
        result: &ExecutionResult,
        rules: &SanitizationRules,
    ) -> SecurityResult<ExecutionResult> {
        sensitive::sanitize(result, rules)
    }

    /// Allocates an active sandbox carrying the requirements' resource limits.
    #[must_use]
    pub fn create_sandbox(&self, tool_id: &str, requirements: &SecurityRequirements) -> Sandbox {
        let sandbox = Sandbox::new(tool_id, requirements);
        info!(tool_id, sandbox_id = sandbox.id(), "execution sandbox created");
        sandbox
    }

    /// Appends an audit entry. Backend failures are logged, never returned.
    pub async fn audit(&self, entry: &AuditEntry) {
        info!(
            tool_id = entry.tool_id(),
            user_id = entry.user_id(),
            execution_id = %entry.execution_id(),
            success = entry.success(),
            "tool execution audit"
        );
        if let Some(message) = entry.error_message().filter(|_| !entry.success()) {
            warn!(tool_id = entry.tool_id(), error = message, "audited execution failed");
        }

        if let Err(err) = self.audit_log.append(entry).await {
            warn!(tool_id = entry.tool_id(), ?err, "failed to write audit entry");
        }
    }

    /// Returns audit entries within `[from, to]`.
    ///
    /// # Errors
    ///
    /// Propagates audit backend failures.
    pub async fn audit_entries(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> SecurityResult<Vec<AuditEntry>> {
        self.audit_log.entries(from, to).await
    }

    /// Returns every violation raised so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal violation lock is poisoned.
    #[must_use]
    pub fn violations(&self) -> Vec<SecurityViolation> {
        self.violations
            .lock()
            .expect("security violations poisoned")
            .clone()
    }

    /// Derives statistics for `[from, to]` from the audit trail and violations.
    ///
    /// # Errors
    ///
    /// Propagates audit backend failures.
    ///
    /// # Panics
    ///
    /// Panics if the internal violation lock is poisoned.
    pub async fn security_metrics(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> SecurityResult<SecurityMetrics> {
        let entries = self.audit_log.entries(from, to).await?;
        let violations: Vec<SecurityViolation> = self
            .violations()
            .into_iter()
            .filter(|violation| violation.detected_at() >= from && violation.detected_at() <= to)
            .collect();
        Ok(SecurityMetrics::derive(&entries, &violations))
    }
}
