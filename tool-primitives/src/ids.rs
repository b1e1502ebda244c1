//! Tool and execution identifier types.

use std::borrow::Borrow;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

const MAX_TOOL_ID_LEN: usize = 128;

/// Unique identifier for a single tool execution.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionId(Uuid);

impl ExecutionId {
    /// Generates a random execution identifier.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an identifier from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::random()
    }
}

impl Display for ExecutionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl From<Uuid> for ExecutionId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<ExecutionId> for Uuid {
    fn from(value: ExecutionId) -> Self {
        value.0
    }
}

impl FromStr for ExecutionId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = Uuid::parse_str(s).map_err(Error::from)?;
        Ok(Self::from_uuid(uuid))
    }
}

/// Identifier for a tool, unique within a registry.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ToolId(String);

impl ToolId {
    /// Creates a new tool identifier after validating its format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidToolId`] if the supplied identifier is empty,
    /// too long, or contains unsupported characters.
    pub fn new(id: impl Into<String>) -> crate::Result<Self> {
        let id = id.into();
        validate_identifier(&id)?;
        Ok(Self(id))
    }

    /// Returns the tool identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ToolId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ToolId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ToolId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for ToolId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ToolId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ToolId> for String {
    fn from(value: ToolId) -> Self {
        value.0
    }
}

fn validate_identifier(id: &str) -> crate::Result<()> {
    if id.trim().is_empty() {
        return Err(Error::InvalidToolId {
            id: id.into(),
            reason: "identifier cannot be empty".into(),
        });
    }

    if id.len() > MAX_TOOL_ID_LEN {
        return Err(Error::InvalidToolId {
            id: id.into(),
            reason: format!("identifier length must be <= {MAX_TOOL_ID_LEN}"),
        });
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(Error::InvalidToolId {
            id: id.into(),
            reason: "identifier must contain alphanumeric, dash, underscore, or dot".into(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_execution_id() {
        let id = ExecutionId::random();
        let parsed = id.to_string().parse::<ExecutionId>().expect("parse");
        assert_eq!(id, parsed);
    }

    #[test]
    fn tool_id_rejects_bad_input() {
        assert!(ToolId::new("web_search").is_ok());
        assert!(matches!(
            ToolId::new("  "),
            Err(Error::InvalidToolId { .. })
        ));
        assert!(ToolId::new("rm -rf").is_err());
        assert!(ToolId::new("x".repeat(MAX_TOOL_ID_LEN + 1)).is_err());
    }

    #[test]
    fn tool_id_deserialization_validates() {
        let ok: ToolId = serde_json::from_str("\"echo\"").expect("valid id");
        assert_eq!(ok.as_str(), "echo");
        assert!(serde_json::from_str::<ToolId>("\"\"").is_err());
    }
}
