//! Parameter specifications, type conversion, and validation facets.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::error::{ContractError, ContractResult};

/// Declared type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterType {
    /// UTF-8 text.
    String,
    /// Signed 64-bit integer.
    Integer,
    /// Floating point number.
    Decimal,
    /// `true` or `false`.
    Boolean,
    /// Timestamp, normalised to RFC 3339 UTC.
    DateTime,
    /// Arbitrary JSON.
    Json,
}

impl ParameterType {
    /// Converts a raw JSON value into this type's canonical representation.
    ///
    /// # Errors
    ///
    /// Returns a human-readable message when the value cannot be represented
    /// as this type.
    pub fn convert(self, value: &Value) -> Result<Value, String> {
        match self {
            Self::String => convert_string(value),
            Self::Integer => convert_integer(value),
            Self::Decimal => convert_decimal(value),
            Self::Boolean => convert_boolean(value),
            Self::DateTime => convert_date_time(value),
            Self::Json => Ok(match value {
                Value::String(raw) => serde_json::from_str(raw).unwrap_or_else(|_| value.clone()),
                other => other.clone(),
            }),
        }
    }
}

fn describe_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn convert_string(value: &Value) -> Result<Value, String> {
    match value {
        Value::String(_) => Ok(value.clone()),
        Value::Number(number) => Ok(Value::String(number.to_string())),
        Value::Bool(flag) => Ok(Value::String(flag.to_string())),
        other => Err(format!("expected a string, found {}", describe_kind(other))),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn convert_integer(value: &Value) -> Result<Value, String> {
    match value {
        Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                return Ok(Value::from(int));
            }
            match number.as_f64() {
                Some(float)
                    if float.fract() == 0.0
                        && float >= i64::MIN as f64
                        && float <= i64::MAX as f64 =>
                {
                    Ok(Value::from(float as i64))
                }
                _ => Err(format!("{number} is not a valid integer")),
            }
        }
        Value::String(raw) => raw
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| format!("'{raw}' is not a valid integer")),
        Value::Bool(flag) => Ok(Value::from(i64::from(*flag))),
        other => Err(format!("expected an integer, found {}", describe_kind(other))),
    }
}

fn convert_decimal(value: &Value) -> Result<Value, String> {
    let float = match value {
        Value::Number(number) => number
            .as_f64()
            .ok_or_else(|| format!("{number} is not a valid decimal"))?,
        Value::String(raw) => raw
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("'{raw}' is not a valid decimal"))?,
        Value::Bool(flag) => {
            if *flag {
                1.0
            } else {
                0.0
            }
        }
        other => return Err(format!("expected a decimal, found {}", describe_kind(other))),
    };

    Number::from_f64(float)
        .map(Value::Number)
        .ok_or_else(|| "decimal value must be finite".to_owned())
}

fn convert_boolean(value: &Value) -> Result<Value, String> {
    match value {
        Value::Bool(_) => Ok(value.clone()),
        Value::String(raw) => {
            let trimmed = raw.trim();
            if trimmed.eq_ignore_ascii_case("true") {
                Ok(Value::Bool(true))
            } else if trimmed.eq_ignore_ascii_case("false") {
                Ok(Value::Bool(false))
            } else {
                Err(format!("'{raw}' is not a valid boolean"))
            }
        }
        Value::Number(number) => Ok(Value::Bool(number.as_f64().is_some_and(|n| n != 0.0))),
        other => Err(format!("expected a boolean, found {}", describe_kind(other))),
    }
}

fn convert_date_time(value: &Value) -> Result<Value, String> {
    let parsed = match value {
        Value::String(raw) => parse_timestamp(raw.trim())
            .ok_or_else(|| format!("'{raw}' is not a valid date/time"))?,
        Value::Number(number) => number
            .as_i64()
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .ok_or_else(|| format!("{number} is not a valid unix timestamp"))?,
        other => return Err(format!("expected a date/time, found {}", describe_kind(other))),
    };

    Ok(Value::String(
        parsed.to_rfc3339_opts(SecondsFormat::AutoSi, true),
    ))
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Tool-specific validation hook run after type conversion.
#[derive(Clone)]
pub struct CustomValidator(Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>);

impl CustomValidator {
    /// Wraps a validation closure.
    pub fn new<F>(validator: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        Self(Arc::new(validator))
    }

    fn check(&self, value: &Value) -> Result<(), String> {
        (self.0)(value)
    }
}

impl fmt::Debug for CustomValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CustomValidator(..)")
    }
}

/// Constraint set applied to a converted parameter value.
#[derive(Debug, Clone, Default)]
pub struct ValidationFacets {
    min_value: Option<f64>,
    max_value: Option<f64>,
    min_length: Option<usize>,
    max_length: Option<usize>,
    pattern: Option<Regex>,
    allowed_values: Vec<Value>,
    allowed_file_extensions: Vec<String>,
    max_file_size_bytes: Option<u64>,
    custom: Option<CustomValidator>,
}

impl ValidationFacets {
    /// Checks `value` against every configured facet.
    ///
    /// File-size limits apply to the `size` field of an object value, or to the
    /// byte length of a string value (inline content).
    ///
    /// # Errors
    ///
    /// Returns the first violated facet as a human-readable message.
    pub fn check(&self, value: &Value) -> Result<(), String> {
        if let Some(number) = value.as_f64() {
            if let Some(min) = self.min_value {
                if number < min {
                    return Err(format!("must be at least {min}"));
                }
            }
            if let Some(max) = self.max_value {
                if number > max {
                    return Err(format!("must be at most {max}"));
                }
            }
        }

        if let Some(text) = value.as_str() {
            let length = text.chars().count();
            if let Some(min) = self.min_length {
                if length < min {
                    return Err(format!("must be at least {min} characters long"));
                }
            }
            if let Some(max) = self.max_length {
                if length > max {
                    return Err(format!("must be at most {max} characters long"));
                }
            }
            if let Some(pattern) = &self.pattern {
                if !pattern.is_match(text) {
                    return Err(format!(
                        "does not match the required pattern `{}`",
                        pattern.as_str()
                    ));
                }
            }
            if !self.allowed_file_extensions.is_empty() {
                let extension = Path::new(text)
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map(str::to_ascii_lowercase);
                let allowed = extension.as_deref().is_some_and(|ext| {
                    self.allowed_file_extensions.iter().any(|item| item == ext)
                });
                if !allowed {
                    return Err(format!(
                        "file extension must be one of: {}",
                        self.allowed_file_extensions.join(", ")
                    ));
                }
            }
        }

        if !self.allowed_values.is_empty() && !self.allowed_values.contains(value) {
            let rendered: Vec<String> = self.allowed_values.iter().map(render_value).collect();
            return Err(format!("must be one of: {}", rendered.join(", ")));
        }

        if let Some(limit) = self.max_file_size_bytes {
            let size = match value {
                Value::Object(map) => map.get("size").and_then(Value::as_u64),
                Value::String(text) => Some(text.len() as u64),
                _ => None,
            };
            if size.is_some_and(|size| size > limit) {
                return Err(format!("exceeds the maximum file size of {limit} bytes"));
            }
        }

        if let Some(custom) = &self.custom {
            custom.check(value)?;
        }

        Ok(())
    }

    fn schema(&self) -> FacetSchema {
        FacetSchema {
            min_value: self.min_value,
            max_value: self.max_value,
            min_length: self.min_length,
            max_length: self.max_length,
            pattern: self.pattern.as_ref().map(|regex| regex.as_str().to_owned()),
            allowed_values: self.allowed_values.clone(),
            allowed_file_extensions: self.allowed_file_extensions.clone(),
            max_file_size_bytes: self.max_file_size_bytes,
            custom_validator: self.custom.is_some(),
        }
    }
}

fn render_value(value: &Value) -> String {
    value
        .as_str()
        .map_or_else(|| value.to_string(), ToOwned::to_owned)
}

/// Advisory rendering hints for parameter editors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiHints {
    /// Preferred input widget (e.g. `textarea`, `select`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
    /// Placeholder text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    /// Help text shown next to the input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
    /// Group the input belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Display order within the group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
    /// Hide behind an "advanced" toggle.
    #[serde(default)]
    pub advanced: bool,
}

/// Declared name, type, and constraints of one tool input.
#[derive(Debug, Clone)]
pub struct ParameterSpec {
    name: String,
    display_name: Option<String>,
    description: Option<String>,
    param_type: ParameterType,
    required: bool,
    default: Option<Value>,
    facets: ValidationFacets,
    ui_hints: UiHints,
}

impl ParameterSpec {
    /// Creates an optional parameter of the supplied type.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::InvalidParameter`] when the name is empty or
    /// contains whitespace.
    pub fn new(name: impl Into<String>, param_type: ParameterType) -> ContractResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ContractError::InvalidParameter {
                name,
                reason: "parameter name cannot be empty".into(),
            });
        }
        if name.chars().any(char::is_whitespace) {
            return Err(ContractError::InvalidParameter {
                name,
                reason: "parameter name cannot contain whitespace".into(),
            });
        }

        Ok(Self {
            name,
            display_name: None,
            description: None,
            param_type,
            required: false,
            default: None,
            facets: ValidationFacets::default(),
            ui_hints: UiHints::default(),
        })
    }

    /// Shorthand for a [`ParameterType::String`] parameter.
    ///
    /// # Errors
    ///
    /// See [`ParameterSpec::new`].
    pub fn string(name: impl Into<String>) -> ContractResult<Self> {
        Self::new(name, ParameterType::String)
    }

    /// Shorthand for a [`ParameterType::Integer`] parameter.
    ///
    /// # Errors
    ///
    /// See [`ParameterSpec::new`].
    pub fn integer(name: impl Into<String>) -> ContractResult<Self> {
        Self::new(name, ParameterType::Integer)
    }

    /// Shorthand for a [`ParameterType::Decimal`] parameter.
    ///
    /// # Errors
    ///
    /// See [`ParameterSpec::new`].
    pub fn decimal(name: impl Into<String>) -> ContractResult<Self> {
        Self::new(name, ParameterType::Decimal)
    }

    /// Shorthand for a [`ParameterType::Boolean`] parameter.
    ///
    /// # Errors
    ///
    /// See [`ParameterSpec::new`].
    pub fn boolean(name: impl Into<String>) -> ContractResult<Self> {
        Self::new(name, ParameterType::Boolean)
    }

    /// Shorthand for a [`ParameterType::DateTime`] parameter.
    ///
    /// # Errors
    ///
    /// See [`ParameterSpec::new`].
    pub fn date_time(name: impl Into<String>) -> ContractResult<Self> {
        Self::new(name, ParameterType::DateTime)
    }

    /// Shorthand for a [`ParameterType::Json`] parameter.
    ///
    /// # Errors
    ///
    /// See [`ParameterSpec::new`].
    pub fn json(name: impl Into<String>) -> ContractResult<Self> {
        Self::new(name, ParameterType::Json)
    }

    /// Marks the parameter as required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the value used when the caller omits the parameter.
    #[must_use]
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Sets the inclusive numeric lower bound.
    #[must_use]
    pub fn with_min_value(mut self, min: f64) -> Self {
        self.facets.min_value = Some(min);
        self
    }

    /// Sets the inclusive numeric upper bound.
    #[must_use]
    pub fn with_max_value(mut self, max: f64) -> Self {
        self.facets.max_value = Some(max);
        self
    }

    /// Sets the minimum string length in characters.
    #[must_use]
    pub fn with_min_length(mut self, min: usize) -> Self {
        self.facets.min_length = Some(min);
        self
    }

    /// Sets the maximum string length in characters.
    #[must_use]
    pub fn with_max_length(mut self, max: usize) -> Self {
        self.facets.max_length = Some(max);
        self
    }

    /// Requires string values to match `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::InvalidPattern`] if the regex does not compile.
    pub fn with_pattern(mut self, pattern: &str) -> ContractResult<Self> {
        let regex = Regex::new(pattern).map_err(|source| ContractError::InvalidPattern {
            name: self.name.clone(),
            source,
        })?;
        self.facets.pattern = Some(regex);
        Ok(self)
    }

    /// Restricts values to the supplied set.
    #[must_use]
    pub fn with_allowed_values<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.facets.allowed_values = values.into_iter().map(Into::into).collect();
        self
    }

    /// Restricts file paths to the supplied extensions (without the dot).
    #[must_use]
    pub fn with_allowed_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.facets.allowed_file_extensions = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .collect();
        self
    }

    /// Sets the maximum file size in bytes.
    #[must_use]
    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.facets.max_file_size_bytes = Some(bytes);
        self
    }

    /// Installs a tool-specific validator run after the built-in facets.
    #[must_use]
    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        self.facets.custom = Some(CustomValidator::new(validator));
        self
    }

    /// Sets UI hints.
    #[must_use]
    pub fn with_ui_hints(mut self, ui_hints: UiHints) -> Self {
        self.ui_hints = ui_hints;
        self
    }

    /// Returns the parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the display name, falling back to the name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }

    /// Returns the description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the declared type.
    #[must_use]
    pub fn param_type(&self) -> ParameterType {
        self.param_type
    }

    /// Returns `true` if the parameter is required.
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Returns the default value.
    #[must_use]
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Returns the validation facets.
    #[must_use]
    pub fn facets(&self) -> &ValidationFacets {
        &self.facets
    }

    /// Returns the UI hints.
    #[must_use]
    pub fn ui_hints(&self) -> &UiHints {
        &self.ui_hints
    }

    /// Converts `value` to the declared type.
    ///
    /// # Errors
    ///
    /// Returns a message describing why the conversion failed.
    pub fn convert(&self, value: &Value) -> Result<Value, String> {
        self.param_type.convert(value)
    }

    /// Converts `value` and checks it against every facet, returning the
    /// converted value.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first failed check.
    pub fn check(&self, value: &Value) -> Result<Value, String> {
        let converted = self.convert(value)?;
        self.facets.check(&converted)?;
        Ok(converted)
    }

    /// Exports the language-neutral schema record for this parameter.
    #[must_use]
    pub fn export(&self) -> ParameterSchema {
        ParameterSchema {
            name: self.name.clone(),
            display_name: self.display_name().to_owned(),
            description: self.description.clone(),
            param_type: self.param_type,
            required: self.required,
            default: self.default.clone(),
            validation: self.facets.schema(),
            ui_hints: self.ui_hints.clone(),
        }
    }
}

/// Serializable description of a parameter, consumed by editors and clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Parameter name.
    pub name: String,
    /// Display name.
    pub display_name: String,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Declared type.
    #[serde(rename = "type")]
    pub param_type: ParameterType,
    /// Whether the parameter must be supplied.
    pub required: bool,
    /// Default value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Validation facets.
    pub validation: FacetSchema,
    /// UI hints.
    pub ui_hints: UiHints,
}

/// Serializable form of [`ValidationFacets`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct FacetSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_values: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_file_extensions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_file_size_bytes: Option<u64>,
    #[serde(default)]
    pub custom_validator: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn converts_between_types() {
        assert_eq!(ParameterType::Integer.convert(&json!("42")), Ok(json!(42)));
        assert_eq!(ParameterType::Integer.convert(&json!(3.0)), Ok(json!(3)));
        assert!(ParameterType::Integer.convert(&json!(3.5)).is_err());
        assert_eq!(ParameterType::Decimal.convert(&json!("2.5")), Ok(json!(2.5)));
        assert_eq!(ParameterType::Boolean.convert(&json!("TRUE")), Ok(json!(true)));
        assert!(ParameterType::Boolean.convert(&json!("yes")).is_err());
        assert_eq!(ParameterType::String.convert(&json!(7)), Ok(json!("7")));
        assert_eq!(
            ParameterType::DateTime.convert(&json!("2024-03-01")),
            Ok(json!("2024-03-01T00:00:00Z"))
        );
        assert_eq!(
            ParameterType::Json.convert(&json!("{\"a\":1}")),
            Ok(json!({"a": 1}))
        );
    }

    #[test]
    fn facets_reject_out_of_range_values() {
        let spec = ParameterSpec::integer("limit")
            .unwrap()
            .with_min_value(1.0)
            .with_max_value(10.0);
        assert_eq!(spec.check(&json!("5")), Ok(json!(5)));
        assert_eq!(spec.check(&json!(11)), Err("must be at most 10".to_owned()));

        let spec = ParameterSpec::string("code")
            .unwrap()
            .with_max_length(3)
            .with_pattern("^[A-Z]+$")
            .unwrap();
        assert!(spec.check(&json!("ABC")).is_ok());
        assert!(spec.check(&json!("ABCD")).is_err());
        assert!(spec.check(&json!("ab")).is_err());
    }

    #[test]
    fn allowed_values_and_extensions() {
        let spec = ParameterSpec::string("mode")
            .unwrap()
            .with_allowed_values(["fast", "slow"]);
        assert!(spec.check(&json!("fast")).is_ok());
        assert_eq!(
            spec.check(&json!("medium")),
            Err("must be one of: fast, slow".to_owned())
        );

        let spec = ParameterSpec::string("path")
            .unwrap()
            .with_allowed_extensions([".PDF", "txt"])
            .with_max_file_size(16);
        assert!(spec.check(&json!("report.pdf")).is_ok());
        assert!(spec.check(&json!("report.exe")).is_err());
        assert!(spec.check(&json!("a-very-long-name.txt")).is_err());
    }

    #[test]
    fn custom_validator_runs_after_conversion() {
        let spec = ParameterSpec::integer("even")
            .unwrap()
            .with_validator(|value| match value.as_i64() {
                Some(n) if n % 2 == 0 => Ok(()),
                _ => Err("must be even".to_owned()),
            });
        assert!(spec.check(&json!("4")).is_ok());
        assert_eq!(spec.check(&json!(3)), Err("must be even".to_owned()));
    }

    #[test]
    fn export_describes_facets() {
        let schema = ParameterSpec::string("query")
            .unwrap()
            .required()
            .with_display_name("Query")
            .with_max_length(200)
            .export();
        assert_eq!(schema.display_name, "Query");
        assert!(schema.required);
        assert_eq!(schema.validation.max_length, Some(200));

        let rendered = serde_json::to_value(&schema).unwrap();
        assert_eq!(rendered["type"], json!("String"));
    }

    #[test]
    fn rejects_bad_names() {
        assert!(ParameterSpec::string("").is_err());
        assert!(ParameterSpec::string("two words").is_err());
        assert!(matches!(
            ParameterSpec::string("p").unwrap().with_pattern("("),
            Err(ContractError::InvalidPattern { .. })
        ));
    }
}
