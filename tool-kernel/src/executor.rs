//! Tool execution pipeline.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use futures::channel::mpsc;
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use tokio::sync::Semaphore;
use tool_contract::{
    CancellationToken, ChunkEmitter, ExecutionContext, ExecutionFailure, ExecutionResult,
    ParamMap, StreamChunk, ToolHandle,
};
use tool_primitives::{ErrorKind, ExecutionId, SequenceGenerator, ToolId};
use tool_registry::ToolRegistry;
use tool_security::{
    AuditEntry, SanitizationRules, SecurityService, detect_sensitive_value,
    redact_sensitive_value, scan_parameters,
};
use tool_store::{ExecutionRecord, ExecutionStore, MemoryStore, MemoryStoreConfig};
use tracing::{debug, info, warn};

use crate::config::{ExecutorConfig, SensitiveDataMode};
use crate::events::{ExecutionEvent, ExecutionObserver, TracingExecutionObserver};
use crate::invocation::{ExecutionValidation, ToolInvocation};
use crate::stream::{ExecutionStream, terminal_chunk};
use crate::{ExecutorError, ExecutorResult};

type RunningMap = Arc<Mutex<HashMap<ExecutionId, CancellationToken>>>;

/// Runs registered tools through authorization, validation, and recording.
///
/// Cloning is cheap; clones share the running-execution map, the batch
/// semaphore, and every collaborator.
#[derive(Clone)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    security: Arc<SecurityService>,
    store: Arc<dyn ExecutionStore>,
    observer: Arc<dyn ExecutionObserver>,
    running: RunningMap,
    permits: Arc<Semaphore>,
    config: ExecutorConfig,
}

impl fmt::Debug for ToolExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolExecutor")
            .field("config", &self.config)
            .field("running", &self.running().len())
            .finish_non_exhaustive()
    }
}

impl ToolExecutor {
    /// Creates an executor recording into an in-memory store sized by
    /// [`ExecutorConfig::history_limit`].
    #[must_use]
    pub fn new(
        registry: Arc<ToolRegistry>,
        security: Arc<SecurityService>,
        config: ExecutorConfig,
    ) -> Self {
        let store = MemoryStore::new(MemoryStoreConfig::new(config.history_limit()));
        Self {
            registry,
            security,
            store: Arc::new(store),
            observer: Arc::new(TracingExecutionObserver),
            running: Arc::new(Mutex::new(HashMap::new())),
            permits: Arc::new(Semaphore::new(config.max_concurrency().get())),
            config,
        }
    }

    /// Records executions into `store` instead of the in-memory default.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn ExecutionStore>) -> Self {
        self.store = store;
        self
    }

    /// Installs the lifecycle observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Returns the active configuration.
    #[must_use]
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Returns the registry tools are resolved from.
    #[must_use]
    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Returns the security service gating executions.
    #[must_use]
    pub fn security(&self) -> &Arc<SecurityService> {
        &self.security
    }

    /// Executes one tool.
    ///
    /// Every expected failure (unknown or disabled tool, denied caller, risky
    /// or invalid parameters, tool faults, cancellation, timeout) is reported
    /// through the returned [`ExecutionResult`].
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::InvalidToolId`] when `tool_id` is malformed.
    pub async fn execute(
        &self,
        tool_id: &str,
        parameters: ParamMap,
        context: &ExecutionContext,
    ) -> ExecutorResult<ExecutionResult> {
        self.execute_with_cancel(tool_id, parameters, context, CancellationToken::new())
            .await
    }

    /// Executes one tool, additionally stopping when `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::InvalidToolId`] when `tool_id` is malformed.
    pub async fn execute_with_cancel(
        &self,
        tool_id: &str,
        parameters: ParamMap,
        context: &ExecutionContext,
        cancel: CancellationToken,
    ) -> ExecutorResult<ExecutionResult> {
        let tool_id = parse_tool_id(tool_id)?;
        Ok(self
            .run(
                ExecutionId::random(),
                tool_id,
                parameters,
                context,
                &cancel,
                None,
            )
            .await)
    }

    /// Runs `steps` in order, stopping after the first failed step that does
    /// not allow continuing. Returns the results gathered so far.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::InvalidToolId`] before anything runs when any
    /// step names a malformed tool id.
    pub async fn execute_sequential(
        &self,
        steps: Vec<ToolInvocation>,
        context: &ExecutionContext,
    ) -> ExecutorResult<Vec<ExecutionResult>> {
        let steps = parse_steps(steps)?;
        let total = steps.len();
        let mut results = Vec::with_capacity(total);

        for (tool_id, parameters, continue_on_error) in steps {
            let result = self
                .run(
                    ExecutionId::random(),
                    tool_id,
                    parameters,
                    context,
                    &CancellationToken::new(),
                    None,
                )
                .await;
            let stop = !result.is_success() && !continue_on_error;
            results.push(result);
            if stop {
                info!(
                    completed = results.len(),
                    total, "sequential batch stopped after failed step"
                );
                break;
            }
        }
        Ok(results)
    }

    /// Runs every invocation concurrently, admitting at most
    /// [`ExecutorConfig::max_concurrency`] at a time.
    ///
    /// A failure never cancels siblings. Results follow submission order.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::InvalidToolId`] before anything runs when any
    /// invocation names a malformed tool id.
    ///
    /// # Panics
    ///
    /// Panics if the internal semaphore has been closed, which never happens
    /// while the executor is alive.
    pub async fn execute_parallel(
        &self,
        invocations: Vec<ToolInvocation>,
        context: &ExecutionContext,
    ) -> ExecutorResult<Vec<ExecutionResult>> {
        let steps = parse_steps(invocations)?;
        debug!(
            batch = steps.len(),
            max_concurrency = self.config.max_concurrency().get(),
            "starting parallel batch"
        );

        let runs = steps.into_iter().map(|(tool_id, parameters, _)| async move {
            let _permit = self
                .permits
                .acquire()
                .await
                .expect("executor semaphore closed while awaiting permit");
            self.run(
                ExecutionId::random(),
                tool_id,
                parameters,
                context,
                &CancellationToken::new(),
                None,
            )
            .await
        });
        Ok(join_all(runs).await)
    }

    /// Executes one tool as a stream of chunks.
    ///
    /// Streaming tools publish progress, partial, log, and status chunks as
    /// they run. Other tools run normally. Either way the stream ends with
    /// exactly one `Complete` or `Error` chunk. Intermediate chunks go through
    /// the same sensitive-data screening as the final result.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::InvalidToolId`] when `tool_id` is malformed.
    pub fn execute_streaming(
        &self,
        tool_id: &str,
        parameters: ParamMap,
        context: ExecutionContext,
    ) -> ExecutorResult<ExecutionStream> {
        let tool_id = parse_tool_id(tool_id)?;
        let execution_id = ExecutionId::random();
        let mode = self.config.sensitive_data();
        let executor = self.clone();

        let chunks = stream::once(async move {
            let sequence = Arc::new(SequenceGenerator::new());
            let (sender, receiver) = mpsc::unbounded();
            let emitter = executor
                .registry
                .get(tool_id.as_str())
                .filter(|handle| handle.descriptor().capabilities().supports_streaming)
                .map(|_| ChunkEmitter::new(execution_id, Arc::clone(&sequence), sender.clone()));

            tokio::spawn(async move {
                let result = executor
                    .run(
                        execution_id,
                        tool_id,
                        parameters,
                        &context,
                        &CancellationToken::new(),
                        emitter,
                    )
                    .await;
                if sender
                    .unbounded_send(terminal_chunk(&result, sequence.next_value()))
                    .is_err()
                {
                    debug!(%execution_id, "stream consumer dropped before completion");
                }
            });
            receiver.map(move |chunk| screen_chunk(chunk, mode))
        })
        .flatten()
        .boxed();

        Ok(ExecutionStream::new(execution_id, chunks))
    }

    /// Signals cancellation to a running execution.
    ///
    /// Returns `false` when the execution is unknown or already finished.
    ///
    /// # Panics
    ///
    /// Panics if the running-execution lock is poisoned.
    pub fn cancel(&self, execution_id: ExecutionId) -> bool {
        let token = self
            .running
            .lock()
            .expect("running executions poisoned")
            .get(&execution_id)
            .cloned();
        match token {
            Some(token) => {
                token.cancel();
                info!(%execution_id, "execution cancellation requested");
                true
            }
            None => false,
        }
    }

    /// Returns the ids of executions currently running, sorted.
    ///
    /// # Panics
    ///
    /// Panics if the running-execution lock is poisoned.
    #[must_use]
    pub fn running(&self) -> Vec<ExecutionId> {
        let mut ids: Vec<ExecutionId> = self
            .running
            .lock()
            .expect("running executions poisoned")
            .keys()
            .copied()
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Returns `true` while `execution_id` is running.
    ///
    /// # Panics
    ///
    /// Panics if the running-execution lock is poisoned.
    #[must_use]
    pub fn is_running(&self, execution_id: ExecutionId) -> bool {
        self.running
            .lock()
            .expect("running executions poisoned")
            .contains_key(&execution_id)
    }

    /// Checks, without running anything, whether the call could execute.
    ///
    /// Unlike [`Self::execute`] this raises no security violation.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::InvalidToolId`] when `tool_id` is malformed.
    pub fn validate_execution(
        &self,
        tool_id: &str,
        parameters: &ParamMap,
        context: &ExecutionContext,
    ) -> ExecutorResult<ExecutionValidation> {
        let tool_id = parse_tool_id(tool_id)?;
        let mut validation = ExecutionValidation::default();

        let Some(handle) = self.registry.get(tool_id.as_str()) else {
            validation.errors.push(format!("Tool '{tool_id}' not found"));
            return Ok(validation);
        };

        if !self.registry.is_enabled(tool_id.as_str()) {
            validation.errors.push(format!("Tool '{tool_id}' is disabled"));
        }

        let decision = self
            .security
            .authorize(context.user_id(), tool_id.as_str(), context);
        if !decision.is_allowed() {
            validation.errors.push(format!(
                "Access denied: {}",
                decision.reason().unwrap_or_default()
            ));
        }

        for issue in scan_parameters(parameters).issues() {
            if issue.severity().is_blocking() {
                validation.errors.push(issue.description().to_owned());
            } else {
                validation
                    .security_warnings
                    .push(issue.description().to_owned());
            }
        }

        validation
            .errors
            .extend(handle.validate(parameters).messages());
        validation.can_execute = validation.errors.is_empty();
        Ok(validation)
    }

    /// Returns recorded executions, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::InvalidToolId`] for a malformed filter and
    /// [`ExecutorError::Store`] when the store cannot be read.
    pub async fn history(
        &self,
        tool_id: Option<&str>,
        limit: usize,
    ) -> ExecutorResult<Vec<ExecutionRecord>> {
        let tool_id = tool_id.map(parse_tool_id).transpose()?;
        Ok(self.store.list_executions(tool_id.as_ref(), limit).await?)
    }

    /// Returns the record of one execution.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::Store`] when the store cannot be read.
    pub async fn execution(
        &self,
        execution_id: ExecutionId,
    ) -> ExecutorResult<Option<ExecutionRecord>> {
        Ok(self.store.find_execution(execution_id).await?)
    }

    async fn run(
        &self,
        execution_id: ExecutionId,
        tool_id: ToolId,
        parameters: ParamMap,
        context: &ExecutionContext,
        cancel: &CancellationToken,
        emitter: Option<ChunkEmitter>,
    ) -> ExecutionResult {
        let started_at = Utc::now();

        let Some(handle) = self.registry.get(tool_id.as_str()) else {
            warn!(tool_id = %tool_id, %execution_id, "execution requested for unknown tool");
            let failure =
                ExecutionFailure::new(ErrorKind::ToolNotFound, format!("Tool '{tool_id}' not found"));
            return ExecutionResult::failure(execution_id, tool_id, failure, started_at)
                .with_parameters(parameters);
        };

        match self.preflight(&handle, &parameters, context) {
            Ok(warnings) => {
                self.run_admitted(
                    execution_id,
                    &handle,
                    parameters,
                    context,
                    cancel,
                    emitter,
                )
                .await
                .with_warnings(warnings)
            }
            Err(failure) => {
                let result = ExecutionResult::failure(execution_id, tool_id, failure, started_at)
                    .with_parameters(parameters);
                self.audit(context, &result).await;
                result
            }
        }
    }

    /// Enabled flag, authorization, risk scan, then parameter validation.
    /// Returns the non-blocking scan warnings on success.
    fn preflight(
        &self,
        handle: &ToolHandle,
        parameters: &ParamMap,
        context: &ExecutionContext,
    ) -> Result<Vec<String>, ExecutionFailure> {
        let tool_id = handle.id();

        if !self.registry.is_enabled(tool_id.as_str()) {
            debug!(tool_id = %tool_id, "execution rejected; tool disabled");
            return Err(ExecutionFailure::new(
                ErrorKind::ServiceUnavailable,
                format!("Tool '{tool_id}' is disabled"),
            ));
        }

        let decision = self
            .security
            .authorize(context.user_id(), tool_id.as_str(), context);
        if !decision.is_allowed() {
            let reason = decision.reason().unwrap_or_default();
            warn!(
                tool_id = %tool_id,
                user_id = context.user_id(),
                reason,
                "execution denied"
            );
            let mut failure = ExecutionFailure::new(
                ErrorKind::AuthenticationError,
                format!("Access denied: {reason}"),
            );
            if !decision.missing().is_empty() {
                failure = failure.with_details(format!("missing: {}", decision.missing().join(", ")));
            }
            return Err(failure);
        }

        let report =
            self.security
                .validate_parameters(tool_id.as_str(), context.user_id(), parameters);
        if !report.is_secure() {
            return Err(
                ExecutionFailure::new(ErrorKind::ValidationError, "Security validation failed")
                    .with_details(report.describe()),
            );
        }

        let validation = handle.validate(parameters);
        if !validation.is_valid() {
            debug!(tool_id = %tool_id, errors = %validation.summary(), "execution rejected; invalid parameters");
            return Err(ExecutionFailure::from_validation(&validation));
        }

        Ok(report.warnings())
    }

    async fn run_admitted(
        &self,
        execution_id: ExecutionId,
        handle: &ToolHandle,
        parameters: ParamMap,
        context: &ExecutionContext,
        cancel: &CancellationToken,
        emitter: Option<ChunkEmitter>,
    ) -> ExecutionResult {
        let descriptor = handle.descriptor();
        let tool_id = descriptor.id().clone();

        let mut record = ExecutionRecord::new(
            execution_id,
            tool_id.clone(),
            descriptor.name(),
            context,
            &parameters,
        );
        if let Err(err) = record.start() {
            warn!(%execution_id, ?err, "execution record rejected start");
        }
        if let Err(err) = self.store.create_execution(record.clone()).await {
            warn!(%execution_id, ?err, "failed to persist execution record");
        }

        let token = cancel.child_token();
        let _running = RunningGuard::track(&self.running, execution_id, token.clone());
        self.observer.on_event(&ExecutionEvent::started(
            execution_id,
            tool_id.clone(),
            context.user_id(),
        ));
        if context.detailed_logging() {
            debug!(%execution_id, tool_id = %tool_id, ?parameters, "running tool");
        }

        let timeout = context.timeout().or(self.config.default_timeout());
        let run = {
            let token = token.clone();
            async move {
                match emitter {
                    Some(emitter) => {
                        handle
                            .execute_streaming(execution_id, parameters, token, emitter)
                            .await
                    }
                    None => handle.execute(execution_id, parameters, token).await,
                }
            }
        };
        let (result, deadline) = run_with_deadline(run, timeout, &token).await;

        let result = if token.is_cancelled()
            && result.error_kind().is_some_and(ErrorKind::is_cancellation)
        {
            interrupted(&result, deadline)
        } else {
            self.screen_sensitive_data(result)
        };

        let transition = if result.error_kind().is_some_and(ErrorKind::is_cancellation) {
            record.cancel(&result)
        } else {
            record.complete(&result)
        };
        if let Err(err) = transition {
            warn!(%execution_id, ?err, "execution record rejected completion");
        }
        if let Err(err) = self.store.update_execution(record).await {
            warn!(%execution_id, ?err, "failed to persist execution record");
        }
        if let Err(err) = self
            .registry
            .update_metrics(&tool_id, result.is_success(), result.duration())
            .await
        {
            warn!(tool_id = %tool_id, ?err, "failed to update tool metrics");
        }
        self.audit(context, &result).await;
        self.observer.on_event(&ExecutionEvent::finished(&result));
        result
    }

    fn screen_sensitive_data(&self, result: ExecutionResult) -> ExecutionResult {
        let mode = self.config.sensitive_data();
        if mode == SensitiveDataMode::Off || !result.is_success() {
            return result;
        }

        let report = self.security.detect_sensitive_data(&result);
        if !report.contains_sensitive_data() {
            return result;
        }
        warn!(
            execution_id = %result.execution_id(),
            tool_id = %result.tool_id(),
            kinds = ?report.counts_by_type(),
            "sensitive data detected in tool result"
        );

        if mode == SensitiveDataMode::Redact {
            match self
                .security
                .sanitize(&result, &SanitizationRules::redact_detected())
            {
                Ok(sanitized) => {
                    if sanitized.contains_sensitive_data() {
                        warn!(
                            execution_id = %result.execution_id(),
                            "sensitive data survived redaction"
                        );
                    }
                    return sanitized.with_warning("Sensitive data was redacted from the result");
                }
                Err(err) => warn!(?err, "failed to redact tool result"),
            }
        }
        result
            .with_sensitive_data(true)
            .with_warning("Result contains sensitive data")
    }

    async fn audit(&self, context: &ExecutionContext, result: &ExecutionResult) {
        let entry = AuditEntry::from_result(context.user_id(), context.session_id(), result);
        self.security.audit(&entry).await;
    }
}

/// Screens an intermediate chunk. Terminal chunks are built from an already
/// screened result and pass through untouched.
fn screen_chunk(chunk: StreamChunk, mode: SensitiveDataMode) -> StreamChunk {
    if mode == SensitiveDataMode::Off || chunk.is_final() {
        return chunk;
    }
    let report = detect_sensitive_value(chunk.data());
    if !report.contains_sensitive_data() {
        return chunk;
    }
    warn!(
        execution_id = %chunk.execution_id(),
        sequence = chunk.sequence(),
        kind = ?chunk.kind(),
        kinds = ?report.counts_by_type(),
        "sensitive data detected in stream chunk"
    );
    if mode == SensitiveDataMode::Redact {
        return StreamChunk::new(
            chunk.execution_id(),
            chunk.sequence(),
            chunk.kind(),
            redact_sensitive_value(chunk.data()),
        );
    }
    chunk
}

/// Awaits `run`; once `timeout` elapses the token is cancelled and the tool
/// is given the chance to observe it. Returns the deadline when it fired.
async fn run_with_deadline<F>(
    run: F,
    timeout: Option<Duration>,
    token: &CancellationToken,
) -> (ExecutionResult, Option<Duration>)
where
    F: Future<Output = ExecutionResult>,
{
    let Some(limit) = timeout else {
        return (run.await, None);
    };

    tokio::pin!(run);
    tokio::select! {
        result = &mut run => (result, None),
        () = tokio::time::sleep(limit) => {
            debug!(timeout_ms = limit.as_millis(), "execution deadline elapsed");
            token.cancel();
            (run.await, Some(limit))
        }
    }
}

fn interrupted(result: &ExecutionResult, deadline: Option<Duration>) -> ExecutionResult {
    let failure = match deadline {
        Some(limit) => ExecutionFailure::new(ErrorKind::TimeoutError, "Tool execution timed out")
            .with_details(format!("deadline of {}ms elapsed", limit.as_millis())),
        None => ExecutionFailure::new(ErrorKind::Cancelled, "Tool execution was cancelled"),
    };
    ExecutionResult::failure(
        result.execution_id(),
        result.tool_id().clone(),
        failure,
        result.started_at(),
    )
    .with_parameters(result.execution_parameters().clone())
    .with_performance(result.performance().clone())
}

fn parse_tool_id(tool_id: &str) -> ExecutorResult<ToolId> {
    ToolId::new(tool_id).map_err(|source| ExecutorError::InvalidToolId {
        tool_id: tool_id.to_owned(),
        source,
    })
}

fn parse_steps(steps: Vec<ToolInvocation>) -> ExecutorResult<Vec<(ToolId, ParamMap, bool)>> {
    steps
        .into_iter()
        .map(|step| {
            let tool_id = parse_tool_id(&step.tool_id)?;
            Ok((tool_id, step.parameters, step.continue_on_error))
        })
        .collect()
}

/// Keeps an execution's token in the running map until dropped.
struct RunningGuard {
    running: RunningMap,
    execution_id: ExecutionId,
}

impl RunningGuard {
    fn track(running: &RunningMap, execution_id: ExecutionId, token: CancellationToken) -> Self {
        running
            .lock()
            .expect("running executions poisoned")
            .insert(execution_id, token);
        Self {
            running: Arc::clone(running),
            execution_id,
        }
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        if let Ok(mut running) = self.running.lock() {
            running.remove(&self.execution_id);
        }
    }
}
