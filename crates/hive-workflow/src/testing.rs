//! Step doubles shared across this crate's test modules.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;

use hive_core::error::{HiveError, Result};
use hive_core::types::StepResult;

use crate::context::{ContextStore, ExecutionContext};
use crate::step::Step;

pub fn test_context() -> ExecutionContext {
    ExecutionContext::new(Arc::new(ContextStore::new()))
}

/// Appends a fixed suffix to its input.
pub struct AppendStep {
    suffix: &'static str,
}

impl AppendStep {
    pub fn new(suffix: &'static str) -> Self {
        Self { suffix }
    }
}

impl Step for AppendStep {
    fn name(&self) -> &str {
        "append"
    }

    fn execute<'a>(
        &'a self,
        input: &'a str,
        _ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, Result<StepResult>> {
        let output = format!("{input}{}", self.suffix);
        Box::pin(async move { Ok(StepResult::text(output)) })
    }
}

/// Always fails with a `StepFailure` under the given step name.
pub struct FailStep {
    name: &'static str,
}

impl FailStep {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

impl Step for FailStep {
    fn name(&self) -> &str {
        self.name
    }

    fn execute<'a>(
        &'a self,
        _input: &'a str,
        _ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, Result<StepResult>> {
        Box::pin(async move {
            Err(HiveError::step_failure(self.name, "synthetic failure"))
        })
    }
}

/// Fails the first `failures` executions, then appends a suffix.
pub struct FailNTimesStep {
    name: &'static str,
    failures: usize,
    suffix: &'static str,
    calls: AtomicUsize,
}

impl FailNTimesStep {
    pub fn new(name: &'static str, failures: usize, suffix: &'static str) -> Self {
        Self {
            name,
            failures,
            suffix,
            calls: AtomicUsize::new(0),
        }
    }
}

impl Step for FailNTimesStep {
    fn name(&self) -> &str {
        self.name
    }

    fn execute<'a>(
        &'a self,
        input: &'a str,
        _ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, Result<StepResult>> {
        Box::pin(async move {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(HiveError::step_failure(self.name, format!("failure #{}", call + 1)))
            } else {
                Ok(StepResult::text(format!("{input}{}", self.suffix)))
            }
        })
    }
}

/// Sleeps, then emits a fixed output. With `respecting_cancel`, the sleep
/// is raced against context cancellation like a real delegate would.
pub struct SleepStep {
    delay: Duration,
    output: &'static str,
    respect_cancel: bool,
}

impl SleepStep {
    pub fn new(delay: Duration, output: &'static str) -> Self {
        Self {
            delay,
            output,
            respect_cancel: false,
        }
    }

    pub fn respecting_cancel(mut self) -> Self {
        self.respect_cancel = true;
        self
    }
}

impl Step for SleepStep {
    fn name(&self) -> &str {
        "sleep"
    }

    fn execute<'a>(
        &'a self,
        _input: &'a str,
        ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, Result<StepResult>> {
        Box::pin(async move {
            if self.respect_cancel {
                tokio::select! {
                    _ = ctx.cancelled() => return Err(HiveError::Cancelled),
                    _ = tokio::time::sleep(self.delay) => {}
                }
            } else {
                tokio::time::sleep(self.delay).await;
            }
            Ok(StepResult::text(self.output))
        })
    }
}
