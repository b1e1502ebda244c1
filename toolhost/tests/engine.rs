use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use serde_json::{Value, json};
use toolhost::config::EngineConfig;
use toolhost::contract::{
    CancellationToken, Capabilities, ChunkEmitter, ChunkKind, ExecutionContext, ExecutionResult,
    HealthStatus, ParamMap, ParameterSpec, StreamChunk, Tool, ToolDescriptor, ToolFault,
    ToolHandle,
};
use toolhost::kernel::{
    CollectingExecutionObserver, CompositeExecutionObserver, ExecutionEvent, ExecutionObserver,
    ExecutorConfig, SensitiveDataMode, ToolExecutor, ToolInvocation,
};
use toolhost::primitives::{ErrorKind, ExecutionId, ToolId};
use toolhost::registry::{RegistryError, ToolRegistry};
use toolhost::security::{
    JournalAuditLog, SanitizationRules, SecurityService, Severity, detect_sensitive_data,
    sanitize, scan_parameters,
};
use toolhost::telemetry::MetricsObserver;

/// Test tool whose side effects are observable from the outside.
struct Worker {
    descriptor: ToolDescriptor,
    runs: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    healthy: bool,
}

impl Worker {
    fn with(descriptor: ToolDescriptor, healthy: bool) -> Arc<Self> {
        Arc::new(Self {
            descriptor,
            runs: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            healthy,
        })
    }

    fn echo() -> Arc<Self> {
        Self::with(
            ToolDescriptor::builder("echo", "Echo")
                .unwrap()
                .description("Returns its input")
                .category("Utility")
                .build()
                .unwrap(),
            true,
        )
    }

    fn search() -> Arc<Self> {
        Self::with(
            ToolDescriptor::builder("search", "Search")
                .unwrap()
                .category("Retrieval")
                .parameter(ParameterSpec::string("query").unwrap().required())
                .build()
                .unwrap(),
            true,
        )
    }

    fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Tool for Worker {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn run(&self, parameters: ParamMap, cancel: CancellationToken) -> Result<Value, ToolFault> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, Ordering::SeqCst);

        let sleep_ms = parameters.get("sleep_ms").and_then(Value::as_u64).unwrap_or(0);
        let outcome = tokio::select! {
            () = cancel.cancelled() => Err(ToolFault::Cancelled),
            () = tokio::time::sleep(Duration::from_millis(sleep_ms)) => {
                if parameters.get("fail").and_then(Value::as_bool).unwrap_or(false) {
                    Err(ToolFault::internal("requested failure"))
                } else {
                    Ok(Value::Object(parameters))
                }
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }

    async fn check_health(&self) -> Result<HealthStatus, ToolFault> {
        if self.healthy {
            Ok(HealthStatus::healthy())
        } else {
            Ok(HealthStatus::unhealthy("backend unreachable"))
        }
    }
}

/// Streams each entry of its `rows` parameter as a partial result.
struct Feed {
    descriptor: ToolDescriptor,
}

impl Feed {
    fn handle() -> ToolHandle {
        ToolHandle::new(Self {
            descriptor: ToolDescriptor::builder("feed", "Feed")
                .unwrap()
                .category("Retrieval")
                .capabilities(Capabilities::default().with_streaming(true))
                .build()
                .unwrap(),
        })
    }
}

#[async_trait]
impl Tool for Feed {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn run(&self, parameters: ParamMap, _: CancellationToken) -> Result<Value, ToolFault> {
        let rows = parameters.get("rows").and_then(Value::as_array).map_or(0, Vec::len);
        Ok(json!({ "rows": rows }))
    }

    async fn run_streaming(
        &self,
        parameters: ParamMap,
        cancel: CancellationToken,
        emitter: ChunkEmitter,
    ) -> Result<Value, ToolFault> {
        let rows = parameters.get("rows").and_then(Value::as_array).cloned().unwrap_or_default();
        for (index, row) in rows.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(ToolFault::Cancelled);
            }
            emitter.status(format!("row {index}"));
            emitter.partial(row.clone());
            tokio::task::yield_now().await;
        }
        Ok(json!({ "rows": rows.len() }))
    }
}

fn params(value: Value) -> ParamMap {
    value.as_object().cloned().unwrap()
}

fn context() -> ExecutionContext {
    ExecutionContext::new("integration-user").with_session_id("session-1")
}

async fn engine(tools: &[Arc<Worker>], config: ExecutorConfig) -> ToolExecutor {
    let registry = Arc::new(ToolRegistry::new());
    let handles = tools.iter().map(|tool| ToolHandle::from_arc(tool.clone()));
    assert_eq!(registry.register_all(handles).await, tools.len());
    ToolExecutor::new(registry, Arc::new(SecurityService::new()), config)
}

#[tokio::test]
async fn echo_without_parameters_succeeds() {
    let echo = Worker::echo();
    let executor = engine(&[echo.clone()], ExecutorConfig::default()).await;

    let result = executor.execute("echo", ParamMap::new(), &context()).await.unwrap();
    assert!(result.is_success());
    assert!(result.data().is_some());
    assert!(result.error().is_none());
    assert!(result.completed_at() >= result.started_at());
    assert_eq!(echo.runs(), 1);
}

#[tokio::test]
async fn search_without_query_fails_validation() {
    let search = Worker::search();
    let executor = engine(&[search.clone()], ExecutorConfig::default()).await;

    let result = executor.execute("search", ParamMap::new(), &context()).await.unwrap();
    assert!(!result.is_success());
    assert!(result.data().is_none());
    let error = result.error().unwrap();
    assert_eq!(error.kind(), ErrorKind::ValidationError);
    assert_eq!(error.field_errors()[0].parameter(), "query");
    assert_eq!(search.runs(), 0);
}

#[tokio::test]
async fn sql_injection_is_blocked_before_the_tool_runs() {
    let injection = params(json!({"query": "'; DROP TABLE users;"}));

    let report = scan_parameters(&injection);
    assert!(!report.is_secure());
    let sql = report
        .issues()
        .iter()
        .find(|issue| issue.issue_type() == "SqlInjection")
        .unwrap();
    assert!(sql.severity() >= Severity::High);

    let search = Worker::search();
    let executor = engine(&[search.clone()], ExecutorConfig::default()).await;
    let result = executor.execute("search", injection, &context()).await.unwrap();
    assert!(!result.is_success());
    assert_eq!(result.error_kind(), Some(ErrorKind::ValidationError));
    assert_eq!(search.runs(), 0);
}

#[tokio::test]
async fn unhealthy_tools_are_not_registered() {
    let registry = ToolRegistry::new();
    let broken = Worker::with(
        ToolDescriptor::builder("broken", "Broken").unwrap().build().unwrap(),
        false,
    );

    let err = registry
        .register(ToolHandle::from_arc(broken))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::UnhealthyTool { .. }));
    assert!(registry.get("broken").is_none());
    assert!(!registry.is_registered("broken"));
}

#[tokio::test]
async fn parallel_batch_never_exceeds_its_limit() {
    let echo = Worker::echo();
    let config = ExecutorConfig::new(NonZeroUsize::new(3).unwrap());
    let executor = engine(&[echo.clone()], config).await;

    let batch = (0..10)
        .map(|n| ToolInvocation::new("echo", params(json!({"sleep_ms": 25, "n": n}))))
        .collect();
    let results = executor.execute_parallel(batch, &context()).await.unwrap();

    assert_eq!(results.len(), 10);
    for (n, result) in results.iter().enumerate() {
        assert_eq!(result.data().unwrap()["n"], json!(n));
    }
    let peak = echo.peak.load(Ordering::SeqCst);
    assert!(peak <= 3, "observed {peak} concurrent executions");

    let ids: HashSet<ExecutionId> = results.iter().map(ExecutionResult::execution_id).collect();
    assert_eq!(ids.len(), 10);
}

#[tokio::test]
async fn cancelling_mid_flight_reports_cancellation() {
    let echo = Worker::echo();
    let executor = engine(&[echo], ExecutorConfig::default()).await;

    let background = executor.clone();
    let running = tokio::spawn(async move {
        background
            .execute("echo", params(json!({"sleep_ms": 30_000})), &context())
            .await
            .unwrap()
    });

    let execution_id = loop {
        if let Some(id) = executor.running().first().copied() {
            break id;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    };
    assert!(executor.cancel(execution_id));

    let result = running.await.unwrap();
    assert!(!result.is_success());
    assert!(result.error_kind().unwrap().is_cancellation());
    assert!(executor.running().is_empty());
}

#[tokio::test]
async fn sequential_batch_honours_continue_on_error() {
    let echo = Worker::echo();
    let executor = engine(&[echo.clone()], ExecutorConfig::default()).await;

    let batch = |continue_on_error| {
        vec![
            ToolInvocation::new("echo", params(json!({"step": 1}))),
            ToolInvocation::new("echo", params(json!({"step": 2, "fail": true})))
                .with_continue_on_error(continue_on_error),
            ToolInvocation::new("echo", params(json!({"step": 3}))),
        ]
    };

    let results = executor.execute_sequential(batch(false), &context()).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(echo.runs(), 2);

    let results = executor.execute_sequential(batch(true), &context()).await.unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[2].data().unwrap()["step"], json!(3));
    assert_eq!(echo.runs(), 5);
}

#[tokio::test]
async fn email_in_results_is_detected_and_removed() {
    let result = ExecutionResult::success(
        ExecutionId::random(),
        ToolId::new("echo").unwrap(),
        json!("contact: jane.doe@example.com"),
        Utc::now(),
    );

    let report = detect_sensitive_data(&result);
    assert!(report.contains_sensitive_data());
    assert!(report.matches().iter().any(|hit| hit.data_type == "email"));

    let cleaned = sanitize(&result, &SanitizationRules::redact_detected()).unwrap();
    assert!(!cleaned.render_data().contains("jane.doe@example.com"));
    assert!(!cleaned.contains_sensitive_data());
    assert!(result.render_data().contains("jane.doe@example.com"));
}

#[tokio::test]
async fn started_always_precedes_the_outcome() {
    let echo = Worker::echo();
    let collector = CollectingExecutionObserver::new();
    let metrics = Arc::new(MetricsObserver::new());
    let observers: [Arc<dyn ExecutionObserver>; 2] = [collector.clone(), metrics.clone()];
    let executor = engine(&[echo], ExecutorConfig::default())
        .await
        .with_observer(Arc::new(CompositeExecutionObserver::new(observers)));

    let batch = vec![
        ToolInvocation::new("echo", params(json!({"sleep_ms": 10}))),
        ToolInvocation::new("echo", params(json!({"fail": true}))),
        ToolInvocation::new("echo", ParamMap::new()),
    ];
    executor.execute_parallel(batch, &context()).await.unwrap();

    let events = collector.drain();
    assert_eq!(events.len(), 6);
    for (position, event) in events.iter().enumerate() {
        if event.is_terminal() {
            let started = events[..position].iter().any(|earlier| {
                matches!(earlier, ExecutionEvent::Started { .. })
                    && earlier.execution_id() == event.execution_id()
            });
            assert!(started, "outcome delivered before start");
        }
    }

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.started, 3);
    assert_eq!(snapshot.completed, 2);
    assert_eq!(snapshot.failed, 1);
    assert_eq!(snapshot.in_flight, 0);
}

#[tokio::test]
async fn configured_engine_audits_to_a_journal() {
    let mut journal = std::env::temp_dir();
    journal.push(format!("toolhost-audit-{}.ndjson", uuid::Uuid::new_v4()));

    let config = EngineConfig::from_json_str(&format!(
        r#"{{"executor": {{"max_concurrency": 2, "default_timeout_secs": 5}},
            "security": {{"audit_journal": {}}}}}"#,
        json!(journal.display().to_string())
    ))
    .unwrap();
    let audit_path = config.security.audit_journal.clone().unwrap();
    let security = SecurityService::new()
        .with_default_policy(config.security.default_policy_for_unknown_tools)
        .with_audit_log(Arc::new(JournalAuditLog::open(&audit_path).await.unwrap()));

    let registry = Arc::new(ToolRegistry::new());
    registry
        .register(ToolHandle::from_arc(Worker::search()))
        .await
        .unwrap();
    let executor = ToolExecutor::new(
        registry,
        Arc::new(security),
        config.executor_config().unwrap(),
    );
    assert_eq!(executor.config().max_concurrency().get(), 2);

    executor
        .execute("search", params(json!({"query": "rust"})), &context())
        .await
        .unwrap();
    executor
        .execute("search", ParamMap::new(), &context())
        .await
        .unwrap();

    let now = Utc::now();
    let entries = executor
        .security()
        .audit_entries(now - chrono::Duration::minutes(1), now + chrono::Duration::minutes(1))
        .await
        .unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries[0].success());
    assert!(entries[1].is_validation_failure());
    assert_eq!(entries[1].session_id(), Some("session-1"));

    let _ = std::fs::remove_file(&audit_path);
}

#[tokio::test]
async fn registry_rollups_follow_executions() {
    let echo = Worker::echo();
    let search = Worker::search();
    let executor = engine(&[echo, search], ExecutorConfig::default()).await;

    executor.execute("echo", ParamMap::new(), &context()).await.unwrap();
    executor
        .execute("echo", params(json!({"fail": true})), &context())
        .await
        .unwrap();

    let registry = executor.registry();
    let metadata = registry.metadata("echo").unwrap();
    assert_eq!(metadata.execution_count(), 2);
    assert!((metadata.success_rate() - 50.0).abs() < f64::EPSILON);
    assert_eq!(registry.categories(), vec!["Retrieval".to_owned(), "Utility".to_owned()]);
    assert_eq!(registry.by_category("utility").len(), 1);

    let history = executor.history(Some("echo"), 10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(!history[0].success());
}

#[tokio::test]
async fn streamed_rows_arrive_in_order_with_one_terminal_chunk() {
    let registry = Arc::new(ToolRegistry::new());
    registry.register(Feed::handle()).await.unwrap();
    let executor =
        ToolExecutor::new(registry, Arc::new(SecurityService::new()), ExecutorConfig::default());

    let stream = executor
        .execute_streaming("feed", params(json!({"rows": ["a", "b", "c"]})), context())
        .unwrap();
    let execution_id = stream.execution_id();
    let chunks: Vec<StreamChunk> = stream.collect().await;

    assert_eq!(chunks.len(), 7);
    assert!(chunks.iter().all(|chunk| chunk.execution_id() == execution_id));
    assert_eq!(chunks.iter().filter(|chunk| chunk.is_final()).count(), 1);
    let last = chunks.last().unwrap();
    assert_eq!(last.kind(), ChunkKind::Complete);
    assert_eq!(last.data(), &json!({"rows": 3}));

    let sequences: Vec<u64> = chunks.iter().map(StreamChunk::sequence).collect();
    assert!(sequences.windows(2).all(|pair| pair[0] < pair[1]));
    let partials: Vec<&Value> = chunks
        .iter()
        .filter(|chunk| chunk.kind() == ChunkKind::PartialResult)
        .map(StreamChunk::data)
        .collect();
    assert_eq!(partials, [&json!("a"), &json!("b"), &json!("c")]);

    let history = executor.history(Some("feed"), 10).await.unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn redaction_covers_keys_numbers_and_streamed_rows() {
    let registry = Arc::new(ToolRegistry::new());
    registry.register(Feed::handle()).await.unwrap();
    let config = ExecutorConfig::default().with_sensitive_data(SensitiveDataMode::Redact);
    let executor = ToolExecutor::new(registry, Arc::new(SecurityService::new()), config);

    let row = json!({"password": "hunter2", "phone": 5_551_234_567_u64});
    let result = ExecutionResult::success(
        ExecutionId::random(),
        ToolId::new("feed").unwrap(),
        row.clone(),
        Utc::now(),
    );
    let cleaned = sanitize(&result, &SanitizationRules::redact_detected()).unwrap();
    let rendered = cleaned.render_data();
    assert!(!rendered.contains("hunter2"));
    assert!(!rendered.contains("5551234567"));
    assert!(!cleaned.contains_sensitive_data());

    let streamed: Vec<StreamChunk> = executor
        .execute_streaming("feed", params(json!({"rows": [row]})), context())
        .unwrap()
        .collect()
        .await;
    for chunk in &streamed {
        let text = chunk.data().to_string();
        assert!(!text.contains("hunter2"), "leaked in {:?}", chunk.kind());
        assert!(!text.contains("5551234567"), "leaked in {:?}", chunk.kind());
    }
}
