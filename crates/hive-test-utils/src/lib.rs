//! Shared test doubles and fixtures for Hive crates.
//!
//! The engine treats agent runtimes and lifecycle hooks as external
//! collaborators; these scripted stand-ins let crate tests exercise
//! orchestration semantics without any real delegate behind them.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, Once};
use std::time::Duration;

use futures::future::BoxFuture;

use hive_core::error::{HiveError, Result};
use hive_core::hooks::LifecycleHooks;
use hive_core::traits::AgentRuntime;
use hive_core::types::{SessionId, StepResult, TokenUsage, ToolCall, ToolOutput};

/// Install a fmt subscriber once for the whole test binary, honoring
/// `RUST_LOG`.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

type Transform = Box<dyn Fn(&str) -> String + Send + Sync>;

/// An [`AgentRuntime`] that follows a script instead of running an agent.
pub struct ScriptedRuntime {
    name: String,
    transform: Transform,
    delay: Option<Duration>,
    fail: bool,
    tool_activity: bool,
    runs: AtomicUsize,
}

impl ScriptedRuntime {
    pub fn new(name: impl Into<String>, transform: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Self {
            name: name.into(),
            transform: Box::new(transform),
            delay: None,
            fail: false,
            tool_activity: false,
            runs: AtomicUsize::new(0),
        }
    }

    /// Returns its input unchanged.
    pub fn echo(name: impl Into<String>) -> Self {
        Self::new(name, |input| input.to_string())
    }

    /// Uppercases its input.
    pub fn uppercase(name: impl Into<String>) -> Self {
        Self::new(name, |input| input.to_uppercase())
    }

    /// Returns a fixed output regardless of input.
    pub fn fixed(name: impl Into<String>, output: impl Into<String>) -> Self {
        let output = output.into();
        Self::new(name, move |_| output.clone())
    }

    /// Echoes after sleeping, like a slow delegate.
    pub fn sleepy(name: impl Into<String>, delay: Duration) -> Self {
        Self::echo(name).with_delay(delay)
    }

    /// Every run fails.
    pub fn failing(name: impl Into<String>) -> Self {
        let mut runtime = Self::echo(name);
        runtime.fail = true;
        runtime
    }

    /// Echoes and reports one tool call, its result, and token usage, the
    /// way a real agent run would.
    pub fn tool_using(name: impl Into<String>) -> Self {
        let mut runtime = Self::echo(name);
        runtime.tool_activity = true;
        runtime
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// How many times `run` was called.
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

impl AgentRuntime for ScriptedRuntime {
    fn name(&self) -> &str {
        &self.name
    }

    fn run<'a>(
        &'a self,
        input: &'a str,
        _session: Option<&'a SessionId>,
        _hooks: Option<&'a dyn LifecycleHooks>,
    ) -> BoxFuture<'a, Result<StepResult>> {
        Box::pin(async move {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(HiveError::step_failure(self.name.as_str(), "scripted failure"));
            }

            let mut result = StepResult::text((self.transform)(input));
            if self.tool_activity {
                let call = ToolCall::new("search", serde_json::json!({ "query": input }));
                result
                    .tool_results
                    .push(ToolOutput::success(call.id.as_str(), "1 hit"));
                result.tool_calls.push(call);
                result.usage = Some(TokenUsage::new(7, 3));
            }
            Ok(result)
        })
    }
}

/// Lifecycle hooks that record every notification as `"<kind>:<step>"`.
#[derive(Default)]
pub struct RecordingHooks {
    events: Mutex<Vec<String>>,
}

impl RecordingHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().expect("events lock").clone()
    }

    fn record(&self, kind: &str, step: &str) {
        self.events
            .lock()
            .expect("events lock")
            .push(format!("{kind}:{step}"));
    }
}

impl LifecycleHooks for RecordingHooks {
    fn on_step_start<'a>(&'a self, step: &'a str, _input: &'a str) -> BoxFuture<'a, ()> {
        self.record("start", step);
        Box::pin(async {})
    }

    fn on_step_end<'a>(&'a self, step: &'a str, _result: &'a StepResult) -> BoxFuture<'a, ()> {
        self.record("end", step);
        Box::pin(async {})
    }

    fn on_step_error<'a>(&'a self, step: &'a str, _error: &'a HiveError) -> BoxFuture<'a, ()> {
        self.record("error", step);
        Box::pin(async {})
    }
}
