//! Per-tool security policies and authorization decisions.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

const MIB: u64 = 1024 * 1024;

/// Runtime constraints a tool should execute under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityRequirements {
    /// Execution should happen inside a sandbox.
    pub requires_sandbox: bool,
    /// Payloads should be encrypted at rest.
    pub requires_encryption: bool,
    /// Every execution must be audited.
    pub requires_audit: bool,
    /// Maximum execution time in seconds.
    pub max_execution_time_secs: u64,
    /// Maximum memory in bytes.
    pub max_memory_bytes: u64,
    /// Tool may open network connections.
    pub allow_network_access: bool,
    /// Tool may touch the file system.
    pub allow_file_system_access: bool,
}

impl Default for SecurityRequirements {
    fn default() -> Self {
        Self {
            requires_sandbox: false,
            requires_encryption: false,
            requires_audit: true,
            max_execution_time_secs: 300,
            max_memory_bytes: 100 * MIB,
            allow_network_access: false,
            allow_file_system_access: false,
        }
    }
}

/// Access rules attached to a single tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityPolicy {
    tool_id: String,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    required_permissions: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    required_roles: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    allowed_users: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    blocked_users: BTreeSet<String>,
    #[serde(default)]
    requirements: SecurityRequirements,
    #[serde(default)]
    rate_limit_per_minute: u32,
    #[serde(default)]
    rate_limit_per_hour: u32,
    #[serde(default)]
    requires_mfa: bool,
}

fn collect<I, S>(values: I) -> impl Iterator<Item = String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    values
        .into_iter()
        .map(Into::into)
        .filter(|value: &String| !value.trim().is_empty())
}

impl SecurityPolicy {
    /// Creates an unrestricted policy for `tool_id`.
    #[must_use]
    pub fn new(tool_id: impl Into<String>) -> Self {
        Self {
            tool_id: tool_id.into(),
            required_permissions: BTreeSet::new(),
            required_roles: BTreeSet::new(),
            allowed_users: BTreeSet::new(),
            blocked_users: BTreeSet::new(),
            requirements: SecurityRequirements::default(),
            rate_limit_per_minute: 0,
            rate_limit_per_hour: 0,
            requires_mfa: false,
        }
    }

    /// Returns the policy applied to tools without an explicit one:
    /// audited, 300 s, 100 MiB, no network or file system, 60/min, 1000/h.
    #[must_use]
    pub fn default_for(tool_id: impl Into<String>) -> Self {
        Self::new(tool_id).with_rate_limits(60, 1000)
    }

    /// Requires every listed permission.
    #[must_use]
    pub fn with_required_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_permissions.extend(collect(permissions));
        self
    }

    /// Requires every listed role.
    #[must_use]
    pub fn with_required_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_roles.extend(collect(roles));
        self
    }

    /// Restricts the tool to the listed users.
    #[must_use]
    pub fn with_allowed_users<I, S>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_users.extend(collect(users));
        self
    }

    /// Blocks the listed users.
    #[must_use]
    pub fn with_blocked_users<I, S>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.blocked_users.extend(collect(users));
        self
    }

    /// Replaces the runtime requirements.
    #[must_use]
    pub fn with_requirements(mut self, requirements: SecurityRequirements) -> Self {
        self.requirements = requirements;
        self
    }

    /// Declares rate limits. Limits are recorded and logged, not enforced.
    #[must_use]
    pub fn with_rate_limits(mut self, per_minute: u32, per_hour: u32) -> Self {
        self.rate_limit_per_minute = per_minute;
        self.rate_limit_per_hour = per_hour;
        self
    }

    /// Declares an MFA requirement. Recorded and logged, not enforced.
    #[must_use]
    pub fn with_mfa(mut self, required: bool) -> Self {
        self.requires_mfa = required;
        self
    }

    /// Returns the tool this policy applies to.
    #[must_use]
    pub fn tool_id(&self) -> &str {
        &self.tool_id
    }

    /// Returns the required permissions.
    #[must_use]
    pub fn required_permissions(&self) -> &BTreeSet<String> {
        &self.required_permissions
    }

    /// Returns the required roles.
    #[must_use]
    pub fn required_roles(&self) -> &BTreeSet<String> {
        &self.required_roles
    }

    /// Returns the allow-list. Empty means everyone not blocked.
    #[must_use]
    pub fn allowed_users(&self) -> &BTreeSet<String> {
        &self.allowed_users
    }

    /// Returns the block-list.
    #[must_use]
    pub fn blocked_users(&self) -> &BTreeSet<String> {
        &self.blocked_users
    }

    /// Returns the runtime requirements.
    #[must_use]
    pub fn requirements(&self) -> &SecurityRequirements {
        &self.requirements
    }

    /// Returns the declared per-minute limit (0 = none).
    #[must_use]
    pub fn rate_limit_per_minute(&self) -> u32 {
        self.rate_limit_per_minute
    }

    /// Returns the declared per-hour limit (0 = none).
    #[must_use]
    pub fn rate_limit_per_hour(&self) -> u32 {
        self.rate_limit_per_hour
    }

    /// Returns `true` when MFA is declared.
    #[must_use]
    pub fn requires_mfa(&self) -> bool {
        self.requires_mfa
    }
}

/// Outcome of [`SecurityService::authorize`](crate::SecurityService::authorize).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationDecision {
    allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    missing: Vec<String>,
}

impl AuthorizationDecision {
    /// Returns an allow decision.
    #[must_use]
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
            missing: Vec::new(),
        }
    }

    /// Returns a deny decision with an explanatory reason.
    #[must_use]
    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            missing: Vec::new(),
        }
    }

    /// Returns a deny decision listing the missing roles or permissions.
    #[must_use]
    pub fn deny_missing(reason: impl Into<String>, missing: Vec<String>) -> Self {
        Self {
            missing,
            ..Self::deny(reason)
        }
    }

    /// Returns `true` when execution may proceed.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        self.allowed
    }

    /// Returns the denial reason.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// Returns the roles or permissions the caller lacks.
    #[must_use]
    pub fn missing(&self) -> &[String] {
        &self.missing
    }
}
