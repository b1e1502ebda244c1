//! Runs a few demo tools through the execution engine.
//!
//! Pass a JSON config path as the first argument to override the defaults;
//! `TOOLHOST_*` environment variables are applied on top.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{Value, json};
use toolhost::config::EngineConfig;
use toolhost::contract::{
    CancellationToken, Capabilities, ChunkEmitter, ContractResult, ExecutionContext, ParamMap,
    ParameterSpec, ResultFormat, Tool, ToolDescriptor, ToolFault, ToolHandle,
};
use toolhost::kernel::{
    CompositeExecutionObserver, ExecutionObserver, ToolExecutor, ToolInvocation,
    TracingExecutionObserver,
};
use toolhost::registry::ToolRegistry;
use toolhost::security::{JournalAuditLog, SecurityPolicy, SecurityService};
use toolhost::telemetry::{MetricsObserver, init_tracing};
use tracing::{info, warn};

struct Echo {
    descriptor: ToolDescriptor,
}

impl Echo {
    fn new() -> ContractResult<Self> {
        Ok(Self {
            descriptor: ToolDescriptor::builder("echo", "Echo")?
                .description("Returns the message it was given")
                .category("Utility")
                .parameter(
                    ParameterSpec::string("message")?
                        .with_description("Text to echo back")
                        .with_default("hello"),
                )
                .build()?,
        })
    }
}

#[async_trait]
impl Tool for Echo {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn run(&self, parameters: ParamMap, _cancel: CancellationToken) -> Result<Value, ToolFault> {
        Ok(parameters.get("message").cloned().unwrap_or(Value::Null))
    }
}

struct Calculator {
    descriptor: ToolDescriptor,
}

impl Calculator {
    fn new() -> ContractResult<Self> {
        Ok(Self {
            descriptor: ToolDescriptor::builder("calculator", "Calculator")?
                .description("Applies a binary arithmetic operation")
                .category("Math")
                .parameter(
                    ParameterSpec::string("operation")?
                        .required()
                        .with_allowed_values(["add", "subtract", "multiply", "divide"]),
                )
                .parameter(ParameterSpec::decimal("a")?.required())
                .parameter(ParameterSpec::decimal("b")?.required())
                .build()?,
        })
    }
}

#[async_trait]
impl Tool for Calculator {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn run(&self, parameters: ParamMap, _cancel: CancellationToken) -> Result<Value, ToolFault> {
        let operand = |name: &str| {
            parameters
                .get(name)
                .and_then(Value::as_f64)
                .ok_or_else(|| ToolFault::invalid_argument(name, "expected a number"))
        };
        let (a, b) = (operand("a")?, operand("b")?);

        let result = match parameters.get("operation").and_then(Value::as_str) {
            Some("add") => a + b,
            Some("subtract") => a - b,
            Some("multiply") => a * b,
            Some("divide") if b == 0.0 => {
                return Err(ToolFault::invalid_argument("b", "division by zero"));
            }
            Some("divide") => a / b,
            _ => return Err(ToolFault::invalid_argument("operation", "unsupported")),
        };
        Ok(json!({ "result": result }))
    }
}

/// Counts up, streaming one partial chunk per tick.
struct Ticker {
    descriptor: ToolDescriptor,
}

impl Ticker {
    fn new() -> ContractResult<Self> {
        Ok(Self {
            descriptor: ToolDescriptor::builder("ticker", "Ticker")?
                .category("Utility")
                .parameter(
                    ParameterSpec::integer("count")?
                        .with_default(3)
                        .with_min_value(1.0)
                        .with_max_value(10.0),
                )
                .capabilities(Capabilities::default().with_streaming(true))
                .build()?,
        })
    }
}

#[async_trait]
impl Tool for Ticker {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn run(&self, parameters: ParamMap, cancel: CancellationToken) -> Result<Value, ToolFault> {
        tick(&parameters, &cancel, None).await
    }

    async fn run_streaming(
        &self,
        parameters: ParamMap,
        cancel: CancellationToken,
        emitter: ChunkEmitter,
    ) -> Result<Value, ToolFault> {
        tick(&parameters, &cancel, Some(&emitter)).await
    }
}

async fn tick(
    parameters: &ParamMap,
    cancel: &CancellationToken,
    emitter: Option<&ChunkEmitter>,
) -> Result<Value, ToolFault> {
    let count = parameters.get("count").and_then(Value::as_u64).unwrap_or(3);
    for tick in 1..=count {
        tokio::select! {
            () = cancel.cancelled() => return Err(ToolFault::Cancelled),
            () = tokio::time::sleep(Duration::from_millis(50)) => {}
        }
        if let Some(emitter) = emitter {
            let percent = u8::try_from(tick * 100 / count).unwrap_or(100);
            emitter.progress(percent, format!("tick {tick}"));
            emitter.partial(json!({ "tick": tick }));
        }
    }
    Ok(json!({ "ticks": count }))
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    }
    .with_env_overrides()?;
    init_tracing(config.telemetry_config())?;

    info!("=== Tool execution engine demo ===");

    let mut security =
        SecurityService::new().with_default_policy(config.security.default_policy_for_unknown_tools);
    if let Some(path) = &config.security.audit_journal {
        security = security.with_audit_log(Arc::new(JournalAuditLog::open(path.clone()).await?));
    }
    security.set_policy(SecurityPolicy::new("calculator").with_required_roles(["analyst"]));

    let registry = Arc::new(ToolRegistry::new());
    let registered = registry
        .register_all([
            ToolHandle::new(Echo::new()?),
            ToolHandle::new(Calculator::new()?),
            ToolHandle::new(Ticker::new()?),
        ])
        .await;
    info!(registered, categories = ?registry.categories(), "tools registered");

    let metrics = Arc::new(MetricsObserver::new());
    let observers: [Arc<dyn ExecutionObserver>; 2] =
        [Arc::new(TracingExecutionObserver), metrics.clone()];
    let executor = ToolExecutor::new(registry, Arc::new(security), config.executor_config()?)
        .with_observer(Arc::new(CompositeExecutionObserver::new(observers)));

    let analyst = ExecutionContext::new("demo-user")
        .with_session_id("demo-session")
        .with_roles(["analyst"]);

    single_calls(&executor, &analyst).await?;
    batch_calls(&executor, &analyst).await?;
    streaming_call(&executor, &analyst).await?;

    let snapshot = metrics.snapshot();
    info!("Metrics:\n{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

async fn single_calls(executor: &ToolExecutor, context: &ExecutionContext) -> Result<()> {
    info!("--- Single executions ---");

    let result = executor.execute("echo", ParamMap::new(), context).await?;
    info!("echo: {}", result.format(ResultFormat::Text));

    let result = executor
        .execute(
            "calculator",
            params(json!({"operation": "multiply", "a": 6, "b": "7"})),
            context,
        )
        .await?;
    info!("calculator:\n{}", result.format(ResultFormat::Markdown));

    let guest = ExecutionContext::new("guest");
    let result = executor
        .execute("calculator", params(json!({"operation": "add", "a": 1, "b": 2})), &guest)
        .await?;
    info!("calculator as guest: {}", result.format(ResultFormat::Text));

    let injection = params(json!({"message": "'; DROP TABLE users;"}));
    let validation = executor.validate_execution("echo", &injection, context)?;
    if !validation.can_execute {
        warn!(errors = ?validation.errors, "echo would be rejected");
    }
    Ok(())
}

async fn batch_calls(executor: &ToolExecutor, context: &ExecutionContext) -> Result<()> {
    info!("--- Parallel batch ---");

    let batch = (1..=6)
        .map(|n| {
            ToolInvocation::new(
                "calculator",
                params(json!({"operation": "divide", "a": 60, "b": n - 1})),
            )
        })
        .collect();
    for result in executor.execute_parallel(batch, context).await? {
        info!("{}", result.summary());
    }

    info!("--- Sequential batch ---");

    let steps = vec![
        ToolInvocation::new("echo", params(json!({"message": "step one"}))),
        ToolInvocation::new("calculator", params(json!({"operation": "divide", "a": 1, "b": 0})))
            .with_continue_on_error(true),
        ToolInvocation::new("echo", params(json!({"message": "step three"}))),
    ];
    for result in executor.execute_sequential(steps, context).await? {
        info!("{}", result.format(ResultFormat::Text));
    }
    Ok(())
}

async fn streaming_call(executor: &ToolExecutor, context: &ExecutionContext) -> Result<()> {
    info!("--- Streaming ---");

    let mut stream =
        executor.execute_streaming("ticker", params(json!({"count": 4})), context.clone())?;
    info!(execution_id = %stream.execution_id(), "stream opened");
    while let Some(chunk) = stream.next().await {
        info!(
            sequence = chunk.sequence(),
            kind = ?chunk.kind(),
            "chunk: {}",
            chunk.data()
        );
    }
    Ok(())
}

fn params(value: Value) -> ParamMap {
    match value {
        Value::Object(map) => map,
        _ => ParamMap::new(),
    }
}
