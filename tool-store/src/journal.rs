//! Append-only journal writing newline-delimited JSON entries.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::StoreResult;

/// File-backed journal of serializable entries.
///
/// Every entry occupies exactly one line. Writers are serialized through an
/// async mutex so concurrent appends never interleave.
#[derive(Debug)]
pub struct FileJournal {
    path: PathBuf,
    file: Mutex<fs::File>,
}

impl FileJournal {
    /// Opens (or creates) a journal file at the provided path.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors encountered while creating parent directories or
    /// opening the file.
    pub async fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&path)
            .await?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Returns the underlying path of the journal file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one entry.
    ///
    /// # Errors
    ///
    /// Returns serialization or I/O errors.
    pub async fn append<T: Serialize + Sync>(&self, entry: &T) -> StoreResult<()> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');
        let mut guard = self.file.lock().await;
        guard.write_all(&line).await?;
        guard.flush().await?;
        Ok(())
    }

    /// Reads every entry, oldest first.
    ///
    /// # Errors
    ///
    /// Returns I/O errors or the first line that fails to deserialize.
    pub async fn read_all<T: DeserializeOwned>(&self) -> StoreResult<Vec<T>> {
        let data = fs::read(&self.path).await?;
        data.split(|byte| *byte == b'\n')
            .filter(|chunk| !chunk.is_empty())
            .map(|chunk| serde_json::from_slice(chunk).map_err(Into::into))
            .collect()
    }

    /// Returns the most recent `limit` entries, ordered oldest to newest.
    ///
    /// # Errors
    ///
    /// See [`FileJournal::read_all`].
    pub async fn tail<T: DeserializeOwned>(&self, limit: usize) -> StoreResult<Vec<T>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut entries = self.read_all().await?;
        if entries.len() > limit {
            entries.drain(..entries.len() - limit);
        }
        Ok(entries)
    }

    /// Truncates the journal.
    ///
    /// # Errors
    ///
    /// Returns I/O errors from truncation.
    pub async fn clear(&self) -> StoreResult<()> {
        let mut guard = self.file.lock().await;
        guard.rewind().await?;
        guard.set_len(0).await?;
        guard.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tool_contract::{ExecutionContext, ParamMap};
    use tool_primitives::{ExecutionId, ToolId};
    use uuid::Uuid;

    use crate::record::ExecutionRecord;

    fn temp_path() -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("tool-journal-{}.ndjson", Uuid::new_v4()));
        path
    }

    #[tokio::test]
    async fn append_and_tail_records() {
        let path = temp_path();
        let journal = FileJournal::open(&path).await.unwrap();

        let mut ids = Vec::new();
        for tool in ["echo", "search", "calc"] {
            let record = ExecutionRecord::new(
                ExecutionId::random(),
                ToolId::new(tool).unwrap(),
                tool,
                &ExecutionContext::new("alice"),
                &ParamMap::new(),
            );
            ids.push(record.execution_id());
            journal.append(&record).await.unwrap();
        }

        let tail: Vec<ExecutionRecord> = journal.tail(2).await.unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].execution_id(), ids[1]);
        assert_eq!(tail[1].tool_id().as_str(), "calc");

        journal.clear().await.unwrap();
        let empty: Vec<ExecutionRecord> = journal.read_all().await.unwrap();
        assert!(empty.is_empty());

        if path.exists() {
            let _ = std::fs::remove_file(path);
        }
    }
}
