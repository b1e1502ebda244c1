use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::{BoxStream, Stream, StreamExt};
use serde_json::json;
use tool_contract::{ChunkKind, ExecutionResult, StreamChunk};
use tool_primitives::ExecutionId;

/// Lazy, finite chunk sequence for one execution.
///
/// Nothing runs until the stream is first polled. The last item is always a
/// single [`ChunkKind::Complete`] or [`ChunkKind::Error`] chunk.
pub struct ExecutionStream {
    execution_id: ExecutionId,
    chunks: BoxStream<'static, StreamChunk>,
}

impl ExecutionStream {
    pub(crate) fn new(execution_id: ExecutionId, chunks: BoxStream<'static, StreamChunk>) -> Self {
        Self {
            execution_id,
            chunks,
        }
    }

    /// Returns the id the execution will run under, usable with
    /// [`ToolExecutor::cancel`](crate::ToolExecutor::cancel).
    #[must_use]
    pub fn execution_id(&self) -> ExecutionId {
        self.execution_id
    }
}

impl fmt::Debug for ExecutionStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionStream")
            .field("execution_id", &self.execution_id)
            .finish_non_exhaustive()
    }
}

impl Stream for ExecutionStream {
    type Item = StreamChunk;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.chunks.poll_next_unpin(cx)
    }
}

pub(crate) fn terminal_chunk(result: &ExecutionResult, sequence: u64) -> StreamChunk {
    match result.error() {
        None => StreamChunk::new(
            result.execution_id(),
            sequence,
            ChunkKind::Complete,
            result.data().cloned().unwrap_or_default(),
        ),
        Some(error) => StreamChunk::new(
            result.execution_id(),
            sequence,
            ChunkKind::Error,
            json!({
                "code": error.code(),
                "message": error.message(),
                "details": error.details(),
            }),
        ),
    }
}
