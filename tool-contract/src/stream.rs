//! Incremental output emitted by streaming executions.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::channel::mpsc::UnboundedSender;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tool_primitives::{ExecutionId, SequenceGenerator};

/// Kind of a [`StreamChunk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    /// Percentage and step description.
    Progress,
    /// Part of the eventual payload.
    PartialResult,
    /// Log line.
    LogMessage,
    /// Free-form status change.
    StatusUpdate,
    /// Terminal failure.
    Error,
    /// Terminal success.
    Complete,
}

impl ChunkKind {
    /// Returns `true` for the kinds that end a stream.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Error | Self::Complete)
    }
}

/// One element of a streaming execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamChunk {
    execution_id: ExecutionId,
    sequence: u64,
    kind: ChunkKind,
    data: Value,
    timestamp: DateTime<Utc>,
    is_final: bool,
}

impl StreamChunk {
    /// Creates a chunk stamped with the current time.
    #[must_use]
    pub fn new(execution_id: ExecutionId, sequence: u64, kind: ChunkKind, data: Value) -> Self {
        Self {
            execution_id,
            sequence,
            kind,
            data,
            timestamp: Utc::now(),
            is_final: kind.is_terminal(),
        }
    }

    /// Returns the owning execution.
    #[must_use]
    pub fn execution_id(&self) -> ExecutionId {
        self.execution_id
    }

    /// Returns the position of this chunk within its stream.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Returns the chunk kind.
    #[must_use]
    pub fn kind(&self) -> ChunkKind {
        self.kind
    }

    /// Returns the payload.
    #[must_use]
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Returns when the chunk was produced.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns `true` for the last chunk of a stream.
    #[must_use]
    pub fn is_final(&self) -> bool {
        self.is_final
    }
}

/// Handle through which a streaming tool publishes non-terminal chunks.
///
/// Every method returns `false` once the consumer has dropped the stream.
#[derive(Debug, Clone)]
pub struct ChunkEmitter {
    execution_id: ExecutionId,
    sequence: Arc<SequenceGenerator>,
    sender: UnboundedSender<StreamChunk>,
}

impl ChunkEmitter {
    /// Creates an emitter that numbers chunks from `sequence`.
    #[must_use]
    pub fn new(
        execution_id: ExecutionId,
        sequence: Arc<SequenceGenerator>,
        sender: UnboundedSender<StreamChunk>,
    ) -> Self {
        Self {
            execution_id,
            sequence,
            sender,
        }
    }

    /// Returns the execution this emitter belongs to.
    #[must_use]
    pub fn execution_id(&self) -> ExecutionId {
        self.execution_id
    }

    fn send(&self, kind: ChunkKind, data: Value) -> bool {
        let chunk = StreamChunk::new(self.execution_id, self.sequence.next_value(), kind, data);
        self.sender.unbounded_send(chunk).is_ok()
    }

    /// Reports progress.
    pub fn progress(&self, percent_complete: u8, current_step: impl Into<String>) -> bool {
        self.send(
            ChunkKind::Progress,
            json!({
                "percentComplete": percent_complete.min(100),
                "currentStep": current_step.into(),
            }),
        )
    }

    /// Publishes part of the payload.
    pub fn partial(&self, data: Value) -> bool {
        self.send(ChunkKind::PartialResult, data)
    }

    /// Publishes a log line.
    pub fn log(&self, message: impl Into<String>) -> bool {
        self.send(ChunkKind::LogMessage, Value::String(message.into()))
    }

    /// Publishes a status update.
    pub fn status(&self, message: impl Into<String>) -> bool {
        self.send(ChunkKind::StatusUpdate, Value::String(message.into()))
    }
}
