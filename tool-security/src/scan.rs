//! Regex risk scan over parameter values.

use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tool_contract::ParamMap;

/// Severity of a single finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Informational.
    Low,
    /// Warning.
    Medium,
    /// Blocks execution.
    High,
    /// Blocks execution.
    Critical,
}

impl Severity {
    /// Returns `true` for severities that block execution.
    #[must_use]
    pub const fn is_blocking(self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

/// Aggregate risk of a parameter set.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum RiskLevel {
    /// No findings.
    #[default]
    None,
    /// Highest finding is low.
    Low,
    /// Highest finding is medium.
    Medium,
    /// Highest finding is high.
    High,
    /// Highest finding is critical.
    Critical,
}

impl From<Severity> for RiskLevel {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Low => Self::Low,
            Severity::Medium => Self::Medium,
            Severity::High => Self::High,
            Severity::Critical => Self::Critical,
        }
    }
}

/// One pattern match inside a parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityIssue {
    issue_type: String,
    description: String,
    parameter: String,
    severity: Severity,
    recommendation: String,
}

impl SecurityIssue {
    /// Returns the catalogue entry that matched, e.g. `SqlInjection`.
    #[must_use]
    pub fn issue_type(&self) -> &str {
        &self.issue_type
    }

    /// Returns the human-readable description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the offending parameter.
    #[must_use]
    pub fn parameter(&self) -> &str {
        &self.parameter
    }

    /// Returns the finding's severity.
    #[must_use]
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Returns the remediation hint.
    #[must_use]
    pub fn recommendation(&self) -> &str {
        &self.recommendation
    }
}

/// Result of scanning a parameter map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    issues: Vec<SecurityIssue>,
    risk_level: RiskLevel,
}

impl ScanReport {
    /// Returns `false` when any finding is high or critical.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        !self.issues.iter().any(|issue| issue.severity.is_blocking())
    }

    /// Returns the highest severity observed.
    #[must_use]
    pub fn risk_level(&self) -> RiskLevel {
        self.risk_level
    }

    /// Returns every finding in scan order.
    #[must_use]
    pub fn issues(&self) -> &[SecurityIssue] {
        &self.issues
    }

    /// Returns the highest finding severity, if any.
    #[must_use]
    pub fn max_severity(&self) -> Option<Severity> {
        self.issues.iter().map(SecurityIssue::severity).max()
    }

    /// Joins every description with `"; "`.
    #[must_use]
    pub fn describe(&self) -> String {
        self.issues
            .iter()
            .map(SecurityIssue::description)
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Returns descriptions of findings that do not block execution.
    #[must_use]
    pub fn warnings(&self) -> Vec<String> {
        self.issues
            .iter()
            .filter(|issue| !issue.severity.is_blocking())
            .map(|issue| issue.description.clone())
            .collect()
    }
}

struct RiskPattern {
    issue_type: &'static str,
    description: &'static str,
    regex: Regex,
    severity: Severity,
    recommendation: &'static str,
}

fn pattern(
    issue_type: &'static str,
    description: &'static str,
    source: &str,
    severity: Severity,
    recommendation: &'static str,
) -> RiskPattern {
    RiskPattern {
        issue_type,
        description,
        regex: RegexBuilder::new(source)
            .case_insensitive(true)
            .build()
            .expect("risk catalogue pattern is valid"),
        severity,
        recommendation,
    }
}

static CATALOGUE: LazyLock<Vec<RiskPattern>> = LazyLock::new(|| {
    vec![
        pattern(
            "PathTraversal",
            "path traversal sequence",
            r"\.\.[/\\]",
            Severity::High,
            "Use absolute paths or validate path components",
        ),
        pattern(
            "SqlInjection",
            "potential SQL injection",
            r"('|(--)|;|\s+(OR|AND)\s+)",
            Severity::Critical,
            "Use parameterized queries",
        ),
        pattern(
            "ScriptInjection",
            "potential script injection",
            r"<script|javascript:|data:text/html",
            Severity::High,
            "Sanitize input and encode output",
        ),
        pattern(
            "CommandInjection",
            "potential command injection",
            r"[;&|`$]",
            Severity::Critical,
            "Use command argument arrays instead of string concatenation",
        ),
    ]
});

fn scan_value(parameter: &str, value: &Value, issues: &mut Vec<SecurityIssue>) {
    match value {
        Value::String(text) if !text.is_empty() => {
            for entry in CATALOGUE.iter() {
                if entry.regex.is_match(text) {
                    issues.push(SecurityIssue {
                        issue_type: entry.issue_type.to_owned(),
                        description: format!(
                            "Parameter '{parameter}' contains {}",
                            entry.description
                        ),
                        parameter: parameter.to_owned(),
                        severity: entry.severity,
                        recommendation: entry.recommendation.to_owned(),
                    });
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                scan_value(parameter, item, issues);
            }
        }
        Value::Object(map) => {
            for item in map.values() {
                scan_value(parameter, item, issues);
            }
        }
        _ => {}
    }
}

/// Runs every parameter's string content against the risk catalogue.
///
/// Nested arrays and objects are walked; findings are attributed to the
/// top-level parameter name.
#[must_use]
pub fn scan_parameters(parameters: &ParamMap) -> ScanReport {
    let mut issues = Vec::new();
    for (name, value) in parameters {
        scan_value(name, value, &mut issues);
    }
    let risk_level = issues
        .iter()
        .map(|issue| RiskLevel::from(issue.severity))
        .max()
        .unwrap_or_default();
    ScanReport { issues, risk_level }
}
