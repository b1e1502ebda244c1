//! Sensitive-data detection and result sanitization.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tool_contract::ExecutionResult;

use crate::{SecurityError, SecurityResult};

const MATCH_CONFIDENCE: f64 = 0.8;
const MASK: &str = "***MASKED***";

const DETECTORS: [(&str, &str, bool); 6] = [
    (
        "email",
        r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Z|a-z]{2,}\b",
        true,
    ),
    ("phone", r"\b\d{3}-?\d{3}-?\d{4}\b", false),
    ("ssn", r"\b\d{3}-?\d{2}-?\d{4}\b", false),
    (
        "credit_card",
        r"\b\d{4}[- ]?\d{4}[- ]?\d{4}[- ]?\d{4}\b",
        false,
    ),
    ("api_key", r"\b[A-Za-z0-9]{32,}\b", false),
    (
        "password",
        r#"password['"]?[=:\s]+['"]?[^'"\s,;{}\[\]<>]+"#,
        true,
    ),
];

static COMPILED: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    DETECTORS
        .iter()
        .map(|(kind, source, insensitive)| {
            let regex = RegexBuilder::new(source)
                .case_insensitive(*insensitive)
                .build()
                .expect("sensitive data pattern is valid");
            (*kind, regex)
        })
        .collect()
});

static REDACTOR: LazyLock<Sanitizer> = LazyLock::new(|| Sanitizer {
    masks: COMPILED.iter().map(|(_, regex)| regex.clone()).collect(),
    replacements: Vec::new(),
});

/// One sensitive-data hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitiveMatch {
    /// Detector that fired, e.g. `email`.
    pub data_type: String,
    /// Byte offset of the match in the scanned text.
    pub location: usize,
    /// Source of the pattern that matched.
    pub pattern: String,
    /// Fixed detector confidence.
    pub confidence: f64,
}

/// Summary of a sensitive-data scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensitiveDataReport {
    matches: Vec<SensitiveMatch>,
    counts_by_type: BTreeMap<String, usize>,
}

impl SensitiveDataReport {
    /// Returns `true` when any detector fired.
    #[must_use]
    pub fn contains_sensitive_data(&self) -> bool {
        !self.matches.is_empty()
    }

    /// Returns every hit in detector order.
    #[must_use]
    pub fn matches(&self) -> &[SensitiveMatch] {
        &self.matches
    }

    /// Returns hit counts keyed by detector.
    #[must_use]
    pub fn counts_by_type(&self) -> &BTreeMap<String, usize> {
        &self.counts_by_type
    }
}

fn scanned_text(data: &Value) -> String {
    match data {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Scans a result's payload for personal data and credentials.
#[must_use]
pub fn detect_sensitive_data(result: &ExecutionResult) -> SensitiveDataReport {
    result
        .data()
        .map(detect_sensitive_value)
        .unwrap_or_default()
}

/// Scans an arbitrary payload, e.g. a stream chunk, the same way
/// [`detect_sensitive_data`] scans a result.
#[must_use]
pub fn detect_sensitive_value(data: &Value) -> SensitiveDataReport {
    if data.is_null() {
        return SensitiveDataReport::default();
    }
    detect_in_text(&scanned_text(data))
}

/// Masks everything [`detect_sensitive_value`] would report.
#[must_use]
pub fn redact_sensitive_value(data: &Value) -> Value {
    REDACTOR.clean(data)
}

fn detect_in_text(text: &str) -> SensitiveDataReport {
    let mut report = SensitiveDataReport::default();
    if text.is_empty() {
        return report;
    }

    for (kind, regex) in COMPILED.iter() {
        let before = report.matches.len();
        report
            .matches
            .extend(regex.find_iter(text).map(|hit| SensitiveMatch {
                data_type: (*kind).to_owned(),
                location: hit.start(),
                pattern: regex.as_str().to_owned(),
                confidence: MATCH_CONFIDENCE,
            }));
        let found = report.matches.len() - before;
        if found > 0 {
            report.counts_by_type.insert((*kind).to_owned(), found);
        }
    }
    report
}

/// Masking and replacement rules applied by [`sanitize`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanitizationRules {
    patterns_to_mask: Vec<String>,
    replacements: Vec<(String, String)>,
}

impl SanitizationRules {
    /// Creates an empty rule set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rule set masking everything [`detect_sensitive_data`] looks for.
    #[must_use]
    pub fn redact_detected() -> Self {
        DETECTORS
            .iter()
            .fold(Self::new(), |rules, (_, source, _)| {
                rules.with_mask_pattern(*source)
            })
    }

    /// Adds a case-insensitive regex whose matches are replaced by the mask token.
    #[must_use]
    pub fn with_mask_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.patterns_to_mask.push(pattern.into());
        self
    }

    /// Adds a literal find-and-replace rule, applied after masking.
    #[must_use]
    pub fn with_replacement(mut self, find: impl Into<String>, replace: impl Into<String>) -> Self {
        self.replacements.push((find.into(), replace.into()));
        self
    }

    /// Returns the mask patterns.
    #[must_use]
    pub fn patterns_to_mask(&self) -> &[String] {
        &self.patterns_to_mask
    }

    /// Returns the literal replacements.
    #[must_use]
    pub fn replacements(&self) -> &[(String, String)] {
        &self.replacements
    }

    fn compile(&self) -> SecurityResult<Sanitizer> {
        let masks = self
            .patterns_to_mask
            .iter()
            .map(|pattern| {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|source| SecurityError::InvalidPattern {
                        pattern: pattern.clone(),
                        source,
                    })
            })
            .collect::<SecurityResult<_>>()?;
        Ok(Sanitizer {
            masks,
            replacements: self.replacements.clone(),
        })
    }
}

/// Compiled rules applied to every part of a payload: string leaves, object
/// keys, and the rendered text of numbers and booleans.
#[derive(Debug)]
struct Sanitizer {
    masks: Vec<Regex>,
    replacements: Vec<(String, String)>,
}

impl Sanitizer {
    fn mask_text(&self, text: &str) -> String {
        let mut cleaned = text.to_owned();
        for mask in &self.masks {
            cleaned = mask.replace_all(&cleaned, MASK).into_owned();
        }
        for (find, replace) in &self.replacements {
            if !find.is_empty() {
                cleaned = cleaned.replace(find.as_str(), replace);
            }
        }
        cleaned
    }

    fn clean(&self, value: &Value) -> Value {
        match value {
            Value::Null => Value::Null,
            Value::String(text) => Value::String(self.mask_text(text)),
            Value::Number(_) | Value::Bool(_) => {
                let rendered = value.to_string();
                let masked = self.mask_text(&rendered);
                if masked == rendered {
                    value.clone()
                } else {
                    Value::String(masked)
                }
            }
            Value::Array(items) => Value::Array(items.iter().map(|item| self.clean(item)).collect()),
            Value::Object(map) => {
                let mut cleaned = Map::with_capacity(map.len());
                for (key, item) in map {
                    let mut item = self.clean(item);
                    if self.spans_pair(key, &item) {
                        item = Value::String(MASK.to_owned());
                    }
                    cleaned.insert(self.mask_text(key), item);
                }
                Value::Object(cleaned)
            }
        }
    }

    /// A mask that only matches the rendered `"key":value` text, such as a
    /// `password` key followed by its value.
    fn spans_pair(&self, key: &str, value: &Value) -> bool {
        let key_text = Value::String(key.to_owned()).to_string();
        let boundary = key_text.len();
        let pair = format!("{key_text}:{value}");
        self.masks.iter().any(|mask| {
            mask.find_iter(&pair)
                .any(|hit| hit.start() < boundary && hit.end() > boundary)
        })
    }
}

fn has_residual(data: &Value) -> bool {
    detect_in_text(&scanned_text(data).replace(MASK, "")).contains_sensitive_data()
}

/// Returns a masked copy of `result`. The input is never modified.
///
/// The sensitive-data flag is cleared unless detection still finds something
/// in the masked payload.
///
/// # Errors
///
/// Returns [`SecurityError::InvalidPattern`] when a mask pattern does not compile.
pub fn sanitize(
    result: &ExecutionResult,
    rules: &SanitizationRules,
) -> SecurityResult<ExecutionResult> {
    let sanitizer = rules.compile()?;
    Ok(match result.data() {
        Some(data) => {
            let cleaned = sanitizer.clean(data);
            let residual = has_residual(&cleaned);
            result
                .clone()
                .with_data(cleaned)
                .with_sensitive_data(residual)
        }
        None => result.clone().with_sensitive_data(false),
    })
}
