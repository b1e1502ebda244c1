//! Executor tuning knobs.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::{Deserialize, Serialize};

const DEFAULT_MAX_CONCURRENCY: usize = 5;
const DEFAULT_HISTORY_LIMIT: usize = 1000;

/// What the executor does with sensitive data found in successful results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensitiveDataMode {
    /// Results are not scanned.
    Off,
    /// Results are scanned and flagged.
    #[default]
    Detect,
    /// Results are scanned and every detection is masked.
    Redact,
}

/// Configuration for a [`ToolExecutor`](crate::ToolExecutor).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorConfig {
    max_concurrency: NonZeroUsize,
    default_timeout: Option<Duration>,
    sensitive_data: SensitiveDataMode,
    history_limit: NonZeroUsize,
}

impl ExecutorConfig {
    /// Creates a configuration bounding parallel batches to `max_concurrency`.
    #[must_use]
    pub fn new(max_concurrency: NonZeroUsize) -> Self {
        Self {
            max_concurrency,
            ..Self::default()
        }
    }

    /// Applies a timeout to executions whose context carries none.
    #[must_use]
    pub const fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// Sets how sensitive data in results is handled.
    #[must_use]
    pub const fn with_sensitive_data(mut self, mode: SensitiveDataMode) -> Self {
        self.sensitive_data = mode;
        self
    }

    /// Sets how many execution records the default store retains.
    #[must_use]
    pub const fn with_history_limit(mut self, limit: NonZeroUsize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Returns the parallel batch limit.
    #[must_use]
    pub const fn max_concurrency(&self) -> NonZeroUsize {
        self.max_concurrency
    }

    /// Returns the fallback timeout.
    #[must_use]
    pub const fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout
    }

    /// Returns the sensitive data handling mode.
    #[must_use]
    pub const fn sensitive_data(&self) -> SensitiveDataMode {
        self.sensitive_data
    }

    /// Returns the execution history capacity.
    #[must_use]
    pub const fn history_limit(&self) -> NonZeroUsize {
        self.history_limit
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: NonZeroUsize::new(DEFAULT_MAX_CONCURRENCY).expect("non-zero"),
            default_timeout: None,
            sensitive_data: SensitiveDataMode::default(),
            history_limit: NonZeroUsize::new(DEFAULT_HISTORY_LIMIT).expect("non-zero"),
        }
    }
}
