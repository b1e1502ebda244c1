//! Validation outcomes for tool parameters.

use serde::{Deserialize, Serialize};

/// Codes attached to [`FieldError`]s.
pub mod field_codes {
    /// A required parameter was absent, null, or blank.
    pub const REQUIRED: &str = "REQUIRED";
    /// The value could not be converted to the declared type.
    pub const INVALID_TYPE: &str = "INVALID_TYPE";
    /// The value violated a validation facet.
    pub const INVALID_VALUE: &str = "INVALID_VALUE";
    /// A tool-specific rule rejected the value.
    pub const CUSTOM: &str = "CUSTOM";
}

/// Validation failure tied to one parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    parameter: String,
    message: String,
    code: String,
}

impl FieldError {
    /// Creates a field error.
    #[must_use]
    pub fn new(
        parameter: impl Into<String>,
        message: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            parameter: parameter.into(),
            message: message.into(),
            code: code.into(),
        }
    }

    /// Returns the parameter name.
    #[must_use]
    pub fn parameter(&self) -> &str {
        &self.parameter
    }

    /// Returns the message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the machine-readable code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Renders the error as a caller-facing sentence.
    #[must_use]
    pub fn describe(&self) -> String {
        if self.code == field_codes::REQUIRED {
            format!("Required parameter '{}' is missing", self.parameter)
        } else {
            format!("Parameter '{}': {}", self.parameter, self.message)
        }
    }
}

/// Outcome of validating a parameter map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    field_errors: Vec<FieldError>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    general_errors: Vec<String>,
}

impl ValidationResult {
    /// Returns an empty, passing result.
    #[must_use]
    pub fn valid() -> Self {
        Self::default()
    }

    /// Returns a failing result carrying a single general error.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        let mut result = Self::default();
        result.add_general_error(message);
        result
    }

    /// Returns `true` when no errors were recorded.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.field_errors.is_empty() && self.general_errors.is_empty()
    }

    /// Records an error against a named parameter.
    pub fn add_field_error(
        &mut self,
        parameter: impl Into<String>,
        message: impl Into<String>,
        code: impl Into<String>,
    ) {
        self.field_errors
            .push(FieldError::new(parameter, message, code));
    }

    /// Records an error not tied to a single parameter.
    pub fn add_general_error(&mut self, message: impl Into<String>) {
        self.general_errors.push(message.into());
    }

    /// Adds a field error and returns the updated result.
    #[must_use]
    pub fn with_field_error(
        mut self,
        parameter: impl Into<String>,
        message: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        self.add_field_error(parameter, message, code);
        self
    }

    /// Appends every error from `other`.
    pub fn merge(&mut self, other: Self) {
        self.field_errors.extend(other.field_errors);
        self.general_errors.extend(other.general_errors);
    }

    /// Returns the per-parameter errors.
    #[must_use]
    pub fn field_errors(&self) -> &[FieldError] {
        &self.field_errors
    }

    /// Returns the errors not tied to a parameter.
    #[must_use]
    pub fn general_errors(&self) -> &[String] {
        &self.general_errors
    }

    /// Returns the errors recorded against `parameter`.
    pub fn errors_for<'a>(&'a self, parameter: &'a str) -> impl Iterator<Item = &'a FieldError> {
        self.field_errors
            .iter()
            .filter(move |error| error.parameter == parameter)
    }

    /// Returns every error rendered as a sentence, field errors first.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.field_errors
            .iter()
            .map(FieldError::describe)
            .chain(self.general_errors.iter().cloned())
            .collect()
    }

    /// Returns [`Self::messages`] joined by `"; "`.
    #[must_use]
    pub fn summary(&self) -> String {
        self.messages().join("; ")
    }

    /// Consumes the result, returning the field errors.
    #[must_use]
    pub fn into_field_errors(self) -> Vec<FieldError> {
        self.field_errors
    }
}
