//! Security pipeline for tool executions.
//!
//! [`SecurityService`] gates every execution: it authorizes the caller
//! against a per-tool [`SecurityPolicy`], scans parameter values against a
//! fixed catalogue of injection patterns, detects and masks sensitive data in
//! results, hands out [`Sandbox`] handles, and keeps an append-only audit
//! trail from which [`SecurityMetrics`] are derived.

#![warn(missing_docs, clippy::pedantic)]

mod audit;
mod error;
mod metrics;
mod policy;
mod sandbox;
mod scan;
mod sensitive;
mod service;
mod violation;

pub use audit::{AuditEntry, AuditLog, JournalAuditLog, MemoryAuditLog};
pub use error::{SecurityError, SecurityResult};
pub use metrics::SecurityMetrics;
pub use policy::{AuthorizationDecision, SecurityPolicy, SecurityRequirements};
pub use sandbox::{Sandbox, SandboxMetrics, SandboxState};
pub use scan::{RiskLevel, ScanReport, SecurityIssue, Severity, scan_parameters};
pub use sensitive::{
    SanitizationRules, SensitiveDataReport, SensitiveMatch, detect_sensitive_data,
    detect_sensitive_value, redact_sensitive_value, sanitize,
};
pub use service::SecurityService;
pub use violation::{
    CollectingViolationObserver, CompositeViolationObserver, SecurityViolation,
    TracingViolationObserver, ViolationObserver,
};
