//! Append-only audit trail of execution attempts.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tool_contract::ExecutionResult;
use tool_primitives::{ExecutionId, codes};
use tool_store::FileJournal;
use uuid::Uuid;

use crate::SecurityResult;

/// One audited execution attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    id: Uuid,
    execution_id: ExecutionId,
    tool_id: String,
    user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    session_id: Option<String>,
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
    duration_ms: u64,
    contains_sensitive_data: bool,
    occurred_at: DateTime<Utc>,
}

impl AuditEntry {
    /// Builds an entry describing `result` as executed by `user_id`.
    #[must_use]
    pub fn from_result(user_id: &str, session_id: Option<&str>, result: &ExecutionResult) -> Self {
        Self {
            id: Uuid::new_v4(),
            execution_id: result.execution_id(),
            tool_id: result.tool_id().to_string(),
            user_id: user_id.to_owned(),
            session_id: session_id.map(ToOwned::to_owned),
            success: result.is_success(),
            error_code: result.error().map(|error| error.code().to_owned()),
            error_message: result.error().map(|error| error.message().to_owned()),
            duration_ms: u64::try_from(result.duration().as_millis()).unwrap_or(u64::MAX),
            contains_sensitive_data: result.contains_sensitive_data(),
            occurred_at: result.completed_at(),
        }
    }

    /// Returns the entry id.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the audited execution.
    #[must_use]
    pub fn execution_id(&self) -> ExecutionId {
        self.execution_id
    }

    /// Returns the tool id.
    #[must_use]
    pub fn tool_id(&self) -> &str {
        &self.tool_id
    }

    /// Returns the caller.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Returns the caller's session.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Returns `true` for successful executions.
    #[must_use]
    pub fn success(&self) -> bool {
        self.success
    }

    /// Returns the failure code.
    #[must_use]
    pub fn error_code(&self) -> Option<&str> {
        self.error_code.as_deref()
    }

    /// Returns the failure message.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Returns the execution duration.
    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    /// Returns whether the payload held sensitive data.
    #[must_use]
    pub fn contains_sensitive_data(&self) -> bool {
        self.contains_sensitive_data
    }

    /// Returns when the attempt finished.
    #[must_use]
    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    /// Returns `true` when the attempt was rejected by authorization.
    #[must_use]
    pub fn is_authorization_failure(&self) -> bool {
        self.error_code.as_deref() == Some(codes::AUTHENTICATION_ERROR)
    }

    /// Returns `true` when the attempt was rejected by validation.
    #[must_use]
    pub fn is_validation_failure(&self) -> bool {
        self.error_code.as_deref() == Some(codes::VALIDATION_ERROR)
    }

    fn within(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
        self.occurred_at >= from && self.occurred_at <= to
    }
}

/// Backend storing audit entries.
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Appends one entry.
    async fn append(&self, entry: &AuditEntry) -> SecurityResult<()>;

    /// Returns entries that occurred within `[from, to]`, oldest first.
    async fn entries(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> SecurityResult<Vec<AuditEntry>>;
}

/// Audit log held in process memory.
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    entries: RwLock<Vec<AuditEntry>>,
}

impl MemoryAuditLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns `true` when nothing has been audited.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl AuditLog for MemoryAuditLog {
    async fn append(&self, entry: &AuditEntry) -> SecurityResult<()> {
        self.entries.write().await.push(entry.clone());
        Ok(())
    }

    async fn entries(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> SecurityResult<Vec<AuditEntry>> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .filter(|entry| entry.within(from, to))
            .cloned()
            .collect())
    }
}

/// Audit log persisted as newline-delimited JSON.
#[derive(Debug)]
pub struct JournalAuditLog {
    journal: FileJournal,
}

impl JournalAuditLog {
    /// Opens (or creates) the journal at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`SecurityError::Audit`](crate::SecurityError::Audit) when the
    /// file cannot be opened.
    pub async fn open(path: impl Into<PathBuf>) -> SecurityResult<Self> {
        Ok(Self {
            journal: FileJournal::open(path).await?,
        })
    }
}

#[async_trait]
impl AuditLog for JournalAuditLog {
    async fn append(&self, entry: &AuditEntry) -> SecurityResult<()> {
        self.journal.append(entry).await?;
        Ok(())
    }

    async fn entries(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> SecurityResult<Vec<AuditEntry>> {
        let entries: Vec<AuditEntry> = self.journal.read_all().await?;
        Ok(entries
            .into_iter()
            .filter(|entry| entry.within(from, to))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;
    use tool_contract::ExecutionFailure;
    use tool_primitives::{ErrorKind, ToolId};

    fn entry(success: bool) -> AuditEntry {
        let tool_id = ToolId::new("echo").unwrap();
        let result = if success {
            ExecutionResult::success(ExecutionId::random(), tool_id, json!("ok"), Utc::now())
        } else {
            ExecutionResult::failure(
                ExecutionId::random(),
                tool_id,
                ExecutionFailure::new(ErrorKind::AuthenticationError, "Access denied"),
                Utc::now(),
            )
        };
        AuditEntry::from_result("alice", Some("s-1"), &result)
    }

    #[tokio::test]
    async fn memory_log_filters_by_window() {
        let log = MemoryAuditLog::new();
        log.append(&entry(true)).await.unwrap();
        log.append(&entry(false)).await.unwrap();
        assert_eq!(log.len().await, 2);

        let now = Utc::now();
        let all = log
            .entries(now - Duration::minutes(1), now + Duration::minutes(1))
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[1].is_authorization_failure());
        assert_eq!(all[1].error_message(), Some("Access denied"));

        let none = log
            .entries(now - Duration::hours(2), now - Duration::hours(1))
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn journal_log_round_trips_entries() {
        let mut path = std::env::temp_dir();
        path.push(format!("tool-audit-{}.ndjson", Uuid::new_v4()));
        let log = JournalAuditLog::open(&path).await.unwrap();

        let first = entry(true);
        log.append(&first).await.unwrap();
        log.append(&entry(false)).await.unwrap();

        let now = Utc::now();
        let entries = log
            .entries(now - Duration::minutes(1), now + Duration::minutes(1))
            .await
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id(), first.id());
        assert_eq!(entries[0].session_id(), Some("s-1"));

        if path.exists() {
            let _ = std::fs::remove_file(path);
        }
    }
}
